//! Application configuration: one `mathz.toml` for the whole workspace.
//!
//! The core tables (`[general]`, `[classifier]`, `[collections]`,
//! `[persistence]`) sit at the top level; generation settings live under
//! `[llm]`. Every key is optional.
//!
//! Lookup order for [`AppConfig::load`]: explicit path, then `$MATHZ_CONFIG`,
//! then `./mathz.toml`, then built-in defaults.

use std::path::{Path, PathBuf};

use mathz_core::config::MathzConfig;
use mathz_llm::LlmConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IntakeError, Result};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "MATHZ_CONFIG";

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "mathz.toml";

/// Aggregated configuration for the intake pipeline and CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Classifier, collections, persistence and logging.
    #[serde(flatten)]
    pub core: MathzConfig,
    /// Model backend, tiers and prompt overrides.
    #[serde(default)]
    pub llm: LlmConfig,
}

impl AppConfig {
    /// Parse from a TOML string.
    ///
    /// # Errors
    /// Returns `IntakeError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| IntakeError::Config(e.to_string()))
    }

    /// Parse from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Resolve and load the configuration file, falling back to defaults.
    ///
    /// # Errors
    /// Returns an error if an explicitly named file is missing or any
    /// found file fails to parse.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let candidate: Option<PathBuf> = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        if let Some(path) = candidate {
            return Self::from_file(&path);
        }

        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Self::from_file(local);
        }

        debug!("No config file found; using defaults");
        Ok(Self::default())
    }
}
