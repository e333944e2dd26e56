//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::{
    config::Config,
    error::{ServiceError, ServiceResult},
};

/// Installs the global tracing subscriber described by `config`.
///
/// An invalid `log_level` directive falls back to `info`.
///
/// # Errors
///
/// `Configuration` when a global subscriber is already installed.
pub fn init_tracing(config: &Config) -> ServiceResult<()> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    installed.map_err(|err| ServiceError::Configuration(format!("tracing: {err}")))?;

    tracing::info!(environment = %config.environment, "tracing initialized");

    Ok(())
}
