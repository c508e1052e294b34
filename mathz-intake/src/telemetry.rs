//! Tracing initialization (tracing/tracing-subscriber).
//!
//! - `MATHZ_LOG` overrides the filter (`debug`, or directives such as
//!   `info,mathz_llm=debug`); otherwise `general.log_level` is used.
//! - `general.log_format` selects `pretty` (default) or `json`.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.

use mathz_core::config::GeneralConfig;
use tracing_subscriber::EnvFilter;

use crate::error::{IntakeError, Result};

/// Environment variable overriding the log filter.
pub const LOG_ENV: &str = "MATHZ_LOG";

/// Install the global subscriber.
///
/// # Errors
/// Returns `IntakeError::Config` if the filter is invalid or a global
/// subscriber is already installed.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_env(LOG_ENV) {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .map_err(|e| IntakeError::Config(format!("log_level '{}': {e}", config.log_level)))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match config.log_format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };
    installed.map_err(|e| IntakeError::Config(e.to_string()))
}
