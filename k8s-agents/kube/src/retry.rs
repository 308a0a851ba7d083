use std::{future::Future, time::Duration};

use rand::Rng;
use tokio_retry::RetryIf;

use crate::error::{KubeApiError, Result};

/// Exponential backoff with jitter, bounded both in number of attempts and in the length of a
/// single delay.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Growth of the delay between consecutive attempts, never below `1.0`.
    pub factor: f64,
    /// Each delay is randomly stretched or shrunk by up to this fraction, clamped to `0..=1`.
    pub jitter: f64,
    /// Total number of attempts, including the first one.
    pub attempts: usize,
    /// Upper bound of a single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            initial_delay: Duration::from_millis(10),
            factor: 1.5,
            jitter: 0.1,
            attempts: 20,
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delays to sleep between attempts, `attempts - 1` of them.
    pub fn delays(&self) -> Backoff {
        Backoff {
            next: self.initial_delay.min(self.max_delay),
            factor: if self.factor.is_finite() {
                self.factor.max(1.0)
            } else {
                1.0
            },
            jitter: if self.jitter.is_finite() {
                self.jitter.clamp(0.0, 1.0)
            } else {
                0.0
            },
            max_delay: self.max_delay,
            remaining: self.attempts.saturating_sub(1),
        }
    }

    /// Runs `action` until it succeeds, fails with something other than a "not found", or the
    /// attempts run out. Returns the last error in the latter cases.
    pub async fn retry_not_found<A, F, T>(&self, action: A) -> Result<T>
    where
        A: FnMut() -> F,
        F: Future<Output = Result<T>>,
    {
        RetryIf::spawn(self.delays(), action, KubeApiError::is_not_found).await
    }
}

/// Iterator produced by [`RetryPolicy::delays`].
#[derive(Debug)]
pub struct Backoff {
    next: Duration,
    factor: f64,
    jitter: f64,
    max_delay: Duration,
    remaining: usize,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let base = self.next;
        self.next = Duration::from_secs_f64(
            (base.as_secs_f64() * self.factor).min(self.max_delay.as_secs_f64()),
        );

        let delay = if self.jitter > 0.0 {
            let spread = rand::rng().random_range(-self.jitter..=self.jitter);
            Duration::from_secs_f64(base.as_secs_f64() * (1.0 + spread))
        } else {
            base
        };

        Some(delay.min(self.max_delay))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
