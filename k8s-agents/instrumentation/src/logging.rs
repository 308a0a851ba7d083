use tracing_subscriber::{fmt::format::FmtSpan, prelude::*};

use crate::error::Result;

/// Installs the global subscriber, filtered with `RUST_LOG`.
///
/// Fails when a global subscriber is already set.
pub fn init_tracing(json: bool) -> Result<()> {
    if json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_thread_ids(true)
                    .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                    .json(),
            )
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_thread_ids(true)
                    .pretty()
                    .with_line_number(true),
            )
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .try_init()?;
    }

    Ok(())
}
