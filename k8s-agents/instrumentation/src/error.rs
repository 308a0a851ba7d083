use thiserror::Error;
use tracing_subscriber::util::TryInitError;

pub type Result<T, E = InstrumentationError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum InstrumentationError {
    #[error("env name should start with \"NEW_RELIC_\" or \"OTEL_\": {0}")]
    InvalidEnvName(String),

    #[error("Unknown language `{0}`")]
    UnknownLanguage(String),

    #[error("Failed to load configuration: {0}")]
    Config(#[from] envy::Error),

    #[error("Failed to initialize logging: {0}")]
    Logging(#[from] TryInitError),
}
