pub mod config;
pub mod error;

pub use config::{
    Config, CredentialBackend, CredentialsConfig, LoggingConfig, RetrySettings, TrackerConfig,
    ValidationResult,
};
pub use error::{
    AppError, AuthError, ConfigError, NetworkError, ReqwestErrorExt, ValidationError,
};

use anyhow::Result;

/// Initialize logging for the application.
///
/// `RUST_LOG` wins when set; otherwise `default_level` (usually
/// `config.logging.level`) is used.
pub fn init(default_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // A subscriber may already be installed (tests, embedding hosts).
    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        Ok(()) => tracing::info!("Timebook core initialized"),
        Err(e) => tracing::debug!("Keeping the installed tracing subscriber: {}", e),
    }
    Ok(())
}
