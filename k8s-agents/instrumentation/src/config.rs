use std::time::Duration;

use k8s_agents_kube::{owner::DEFAULT_MAX_DEPTH, retry::RetryPolicy};
use serde::Deserialize;

use crate::error::Result;

/// Operator-level settings of the injection, read from `K8S_AGENTS_*` environment variables.
///
/// Every field has a default, so an empty environment is a valid configuration.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct InjectorConfig {
    /// Secret the license key is read from, in the pod's namespace.
    pub license_key_secret: String,

    /// Key of the license key within [`Self::license_key_secret`].
    pub license_key_secret_key: String,

    /// Value of `NEW_RELIC_LABELS`.
    pub labels: String,

    pub lookup_initial_delay_ms: u64,

    pub lookup_backoff_factor: f64,

    pub lookup_jitter: f64,

    /// Total attempts of a ReplicaSet read before giving up on it.
    pub lookup_attempts: usize,

    pub lookup_max_delay_ms: u64,

    pub max_owner_depth: usize,

    pub log_json: bool,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();

        InjectorConfig {
            license_key_secret: "newrelic-key-secret".to_owned(),
            license_key_secret_key: "new_relic_license_key".to_owned(),
            labels: "operator:auto-injection".to_owned(),
            lookup_initial_delay_ms: retry.initial_delay.as_millis() as u64,
            lookup_backoff_factor: retry.factor,
            lookup_jitter: retry.jitter,
            lookup_attempts: retry.attempts,
            lookup_max_delay_ms: retry.max_delay.as_millis() as u64,
            max_owner_depth: DEFAULT_MAX_DEPTH,
            log_json: false,
        }
    }
}

impl InjectorConfig {
    pub const ENV_PREFIX: &'static str = "K8S_AGENTS_";

    pub fn from_env() -> Result<Self> {
        Ok(envy::prefixed(Self::ENV_PREFIX).from_env()?)
    }

    /// Same as [`Self::from_env`], reading from the given variables instead.
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::prefixed(Self::ENV_PREFIX).from_iter(vars)?)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(self.lookup_initial_delay_ms),
            factor: self.lookup_backoff_factor,
            jitter: self.lookup_jitter,
            attempts: self.lookup_attempts,
            max_delay: Duration::from_millis(self.lookup_max_delay_ms),
        }
    }
}
