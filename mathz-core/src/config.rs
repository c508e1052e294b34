//! Configuration for the MATHZ core library.
//!
//! Maps directly to the `[general]`, `[classifier]`, `[collections]` and
//! `[persistence]` tables of `mathz.toml`.

use serde::{Deserialize, Serialize};

/// Top-level core configuration, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MathzConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Classifier tuning.
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Collection lifecycle limits and palettes.
    #[serde(default)]
    pub collections: CollectionConfig,
    /// Persistence settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl MathzConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `MathzError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::MathzError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log filter: trace, debug, info, warn, error, or full `EnvFilter` directives.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format: "pretty" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// Classifier thresholds and cache sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Minimum final score for a category to win over the default.
    #[serde(default = "default_0_1")]
    pub min_score: f32,
    /// Confidence reported for the default category.
    #[serde(default = "default_0_5")]
    pub default_confidence: f32,
    /// Upper bound on any reported confidence.
    #[serde(default = "default_0_95")]
    pub max_confidence: f32,
    /// Maximum number of tags per result.
    #[serde(default = "default_5_usize")]
    pub max_tags: usize,
    /// Entries kept by the classification LRU cache (0 disables caching).
    #[serde(default = "default_1024")]
    pub cache_capacity: usize,
}

/// Hard ceiling on tags per result.
pub const TAG_LIMIT: usize = 5;
/// Hard ceiling on reported confidence.
pub const CONFIDENCE_CEILING: f32 = 0.95;
/// Lowest accepted `min_score`.
pub const MIN_SCORE_FLOOR: f32 = 0.1;

impl ClassifierConfig {
    /// Check the thresholds against the classifier's fixed bounds.
    ///
    /// Configuration may tighten the bounds (fewer tags, a lower
    /// confidence cap, a higher score threshold) but never loosen them.
    ///
    /// # Errors
    /// Returns `MathzError::Config` naming the first offending key.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::MathzError;

        if self.max_tags == 0 || self.max_tags > TAG_LIMIT {
            return Err(MathzError::Config(format!(
                "classifier.max_tags must be in 1..={TAG_LIMIT}, got {}",
                self.max_tags
            )));
        }
        if !(self.max_confidence > 0.0 && self.max_confidence <= CONFIDENCE_CEILING) {
            return Err(MathzError::Config(format!(
                "classifier.max_confidence must be in (0, {CONFIDENCE_CEILING}], got {}",
                self.max_confidence
            )));
        }
        if !(MIN_SCORE_FLOOR..=1.0).contains(&self.min_score) {
            return Err(MathzError::Config(format!(
                "classifier.min_score must be in [{MIN_SCORE_FLOOR}, 1], got {}",
                self.min_score
            )));
        }
        if !(0.0..=self.max_confidence).contains(&self.default_confidence) {
            return Err(MathzError::Config(format!(
                "classifier.default_confidence must be in [0, max_confidence], got {}",
                self.default_confidence
            )));
        }
        Ok(())
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_score: 0.1,
            default_confidence: 0.5,
            max_confidence: 0.95,
            max_tags: 5,
            cache_capacity: 1024,
        }
    }
}

/// Collection lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Name of the seeded default collection.
    #[serde(default = "default_collection_name")]
    pub default_name: String,
    /// Name of the seeded favorites collection.
    #[serde(default = "default_favorites_name")]
    pub favorites_name: String,
    /// Maximum collection name length, in characters.
    #[serde(default = "default_100")]
    pub max_name_chars: usize,
    /// Maximum description length, in characters.
    #[serde(default = "default_500")]
    pub max_description_chars: usize,
    /// Colors assigned to new collections in rotation.
    #[serde(default = "default_palette")]
    pub palette: Vec<String>,
    /// Icons assigned to new collections in rotation.
    #[serde(default = "default_icons")]
    pub icons: Vec<String>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            default_name: default_collection_name(),
            favorites_name: default_favorites_name(),
            max_name_chars: 100,
            max_description_chars: 500,
            palette: default_palette(),
            icons: default_icons(),
        }
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database path.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_5000")]
    pub busy_timeout_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            wal_mode: true,
            busy_timeout_ms: 5000,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }
fn default_collection_name() -> String { "Geral".to_string() }
fn default_favorites_name() -> String { "Favoritos".to_string() }
fn default_db_path() -> String { "mathz.db".to_string() }
fn default_0_1() -> f32 { 0.1 }
fn default_0_5() -> f32 { 0.5 }
fn default_0_95() -> f32 { 0.95 }
fn default_5_usize() -> usize { 5 }
fn default_100() -> usize { 100 }
fn default_500() -> usize { 500 }
fn default_1024() -> usize { 1024 }
fn default_5000() -> u64 { 5000 }

fn default_palette() -> Vec<String> {
    ["#4F46E5", "#0EA5E9", "#10B981", "#F59E0B", "#EF4444", "#EC4899", "#8B5CF6", "#14B8A6"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

fn default_icons() -> Vec<String> {
    ["folder", "book", "calculator", "star", "flask", "target", "bookmark", "layers"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = MathzConfig::from_toml("").expect("parse");
        assert_eq!(config.classifier.max_tags, 5);
        assert_eq!(config.collections.default_name, "Geral");
        assert_eq!(config.collections.max_name_chars, 100);
        assert!(config.persistence.wal_mode);
    }

    #[test]
    fn partial_toml_overrides_only_given_keys() {
        let config = MathzConfig::from_toml(
            r#"
            [classifier]
            cache_capacity = 16

            [collections]
            favorites_name = "Estrelas"
            "#,
        )
        .expect("parse");
        assert_eq!(config.classifier.cache_capacity, 16);
        assert!((config.classifier.min_score - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.collections.favorites_name, "Estrelas");
        assert_eq!(config.collections.default_name, "Geral");
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = MathzConfig::from_toml("[classifier\nmin_score = ").expect_err("should fail");
        assert!(matches!(err, crate::MathzError::Config(_)));
    }
}
