//! Configuration for the generation layer.
//!
//! Maps to the `[llm]` table of `mathz.toml`:
//!
//! ```toml
//! [llm]
//! provider = "ollama"
//! base_url = "http://localhost:11434"
//! model = "qwen2.5:7b"
//!
//! [llm.tiers.complex]
//! temperature = 0.4
//! max_tokens = 4096
//!
//! [llm.prompts]
//! fallback = "Responda apenas com o resultado de: {problem}"
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{LlmError, Result};
use crate::types::{Complexity, GenerationOptions};

/// Which backend [`crate::client::LlmClient`] talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Ollama `/api/generate`.
    Ollama,
    /// OpenAI-compatible `/v1/chat/completions`.
    OpenAi,
    /// No backend; every call is unavailable.
    None,
}

/// Top-level generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Backend kind.
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,
    /// Backend base URL, without a trailing path.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model name sent to the backend.
    #[serde(default = "default_model")]
    pub model: String,
    /// Bearer token for OpenAI-compatible providers.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-call timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Temperature ceiling for strict-format retries.
    #[serde(default = "default_strict_temperature")]
    pub strict_temperature: f32,
    /// Prefix of the degraded explanation's final answer.
    #[serde(default = "default_degraded_notice")]
    pub degraded_notice: String,
    /// Sampling options per complexity tier and for the fallback prompt.
    #[serde(default)]
    pub tiers: TierTable,
    /// Template overrides; unset entries use the built-in templates.
    #[serde(default)]
    pub prompts: PromptOverrides,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            timeout_ms: default_timeout_ms(),
            strict_temperature: default_strict_temperature(),
            degraded_notice: default_degraded_notice(),
            tiers: TierTable::default(),
            prompts: PromptOverrides::default(),
        }
    }
}

impl LlmConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `LlmError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| LlmError::Config(e.to_string()))
    }

    /// Options for a normal or strict attempt at the given complexity.
    #[must_use]
    pub fn options_for(&self, complexity: Complexity, strict: bool) -> GenerationOptions {
        let tier = self.tiers.get(complexity);
        let mut options = tier.to_options(self.timeout_ms);
        if strict {
            options.temperature = options.temperature.min(self.strict_temperature);
        }
        options
    }

    /// Options for the answer-only fallback attempt.
    #[must_use]
    pub fn fallback_options(&self) -> GenerationOptions {
        self.tiers.fallback.to_options(self.timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

/// Sampling parameters for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierOptions {
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling mass.
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Top-k cutoff.
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

impl TierOptions {
    const fn new(temperature: f32, top_p: f32, top_k: u32, max_tokens: u32) -> Self {
        Self {
            temperature,
            top_p,
            top_k,
            max_tokens,
        }
    }

    /// Combine with a timeout into per-call options.
    #[must_use]
    pub fn to_options(self, timeout_ms: u64) -> GenerationOptions {
        GenerationOptions {
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            max_tokens: self.max_tokens,
            timeout_ms,
        }
    }
}

/// Per-tier sampling table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierTable {
    /// Simple problems.
    #[serde(default = "default_simple_tier")]
    pub simple: TierOptions,
    /// Medium problems.
    #[serde(default = "default_medium_tier")]
    pub medium: TierOptions,
    /// Complex problems.
    #[serde(default = "default_complex_tier")]
    pub complex: TierOptions,
    /// Answer-only fallback.
    #[serde(default = "default_fallback_tier")]
    pub fallback: TierOptions,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            simple: default_simple_tier(),
            medium: default_medium_tier(),
            complex: default_complex_tier(),
            fallback: default_fallback_tier(),
        }
    }
}

impl TierTable {
    /// Options for a complexity tier.
    #[must_use]
    pub fn get(&self, complexity: Complexity) -> TierOptions {
        match complexity {
            Complexity::Simple => self.simple,
            Complexity::Medium => self.medium,
            Complexity::Complex => self.complex,
        }
    }
}

/// Optional replacements for the built-in prompt templates.
///
/// Every template must keep the `{problem}` placeholder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptOverrides {
    /// Template for simple problems.
    pub simple: Option<String>,
    /// Template for medium problems.
    pub medium: Option<String>,
    /// Template for complex problems.
    pub complex: Option<String>,
    /// Block appended on strict retries.
    pub strict: Option<String>,
    /// Answer-only template.
    pub fallback: Option<String>,
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_provider() -> ProviderKind { ProviderKind::Ollama }
fn default_base_url() -> String { "http://localhost:11434".to_string() }
fn default_model() -> String { "qwen2.5:7b".to_string() }
fn default_timeout_ms() -> u64 { 60_000 }
fn default_strict_temperature() -> f32 { 0.2 }
fn default_top_p() -> f32 { 0.9 }
fn default_top_k() -> u32 { 40 }
fn default_simple_tier() -> TierOptions { TierOptions::new(0.3, 0.9, 40, 1024) }
fn default_medium_tier() -> TierOptions { TierOptions::new(0.4, 0.9, 40, 2048) }
fn default_complex_tier() -> TierOptions { TierOptions::new(0.5, 0.95, 50, 4096) }
fn default_fallback_tier() -> TierOptions { TierOptions::new(0.1, 0.9, 20, 256) }

fn default_degraded_notice() -> String {
    "Não foi possível gerar a explicação passo a passo. Resposta obtida:".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_toml() {
        let config = LlmConfig::from_toml("").expect("parse");
        assert_eq!(config.provider, ProviderKind::Ollama);
        assert_eq!(config.tiers.simple.max_tokens, 1024);
        assert!(config.prompts.fallback.is_none());
    }

    #[test]
    fn strict_never_raises_temperature() {
        let config = LlmConfig::default();
        for &complexity in Complexity::all() {
            let normal = config.options_for(complexity, false);
            let strict = config.options_for(complexity, true);
            assert!(strict.temperature <= normal.temperature);
            assert!(strict.temperature <= config.strict_temperature);
            assert_eq!(strict.max_tokens, normal.max_tokens);
        }
    }

    #[test]
    fn partial_tier_override() {
        let config = LlmConfig::from_toml(
            r#"
            provider = "openai"
            api_key = "sk-test"

            [tiers.complex]
            temperature = 0.7
            max_tokens = 8000
            "#,
        )
        .expect("parse");
        assert_eq!(config.provider, ProviderKind::OpenAi);
        assert_eq!(config.tiers.complex.max_tokens, 8000);
        assert_eq!(config.tiers.complex.top_k, 40);
        assert_eq!(config.tiers.medium.max_tokens, 2048);
    }

    #[test]
    fn fallback_uses_global_timeout() {
        let config = LlmConfig {
            timeout_ms: 1234,
            ..LlmConfig::default()
        };
        assert_eq!(config.fallback_options().timeout_ms, 1234);
        assert_eq!(config.fallback_options().max_tokens, 256);
    }
}
