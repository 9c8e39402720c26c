use thiserror::Error;

/// Errors originating from the core crate: loading configuration and
/// initialising process-wide facilities.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration loading failed: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Logging setup failed: {0}")]
    LoggingSetup(String),
}
