//! Model backends: the [`GenerativeModel`] contract and an HTTP client
//! for Ollama and OpenAI-compatible servers.
//!
//! Backends make exactly one request per call. Retrying with a different
//! prompt is the orchestrator's job, and a transport failure is reported
//! as [`LlmError::GenerationUnavailable`] so it can be surfaced at once.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{LlmConfig, ProviderKind};
use crate::error::{LlmError, Result};
use crate::types::{Generation, GenerationOptions};

/// A text generator the orchestrator can drive.
///
/// Implementations must return [`LlmError::Cancelled`] promptly once
/// `cancel` fires, and [`LlmError::GenerationUnavailable`] for transport
/// failures and timeouts.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
        cancel: &CancellationToken,
    ) -> Result<Generation>;
}

/// Provider backend for inference.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// Ollama running locally.
    Ollama {
        /// Server base URL.
        base_url: String,
    },
    /// OpenAI-compatible API.
    OpenAiCompatible {
        /// Server base URL.
        base_url: String,
        /// Bearer token.
        api_key: String,
    },
    /// No model available; every call is unavailable.
    None,
}

/// HTTP client that routes requests to the configured backend.
#[derive(Debug, Clone)]
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
    model: String,
}

impl LlmClient {
    /// Create a client for an explicit provider and model.
    #[must_use]
    pub fn new(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            http: Client::new(),
            model: model.into(),
        }
    }

    /// Create a client from configuration.
    ///
    /// # Errors
    /// Returns `LlmError::Config` if the OpenAI provider has no API key.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let provider = match config.provider {
            ProviderKind::Ollama => LlmProvider::Ollama { base_url },
            ProviderKind::OpenAi => {
                let api_key = config
                    .api_key
                    .clone()
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| LlmError::Config("openai provider requires api_key".into()))?;
                LlmProvider::OpenAiCompatible { base_url, api_key }
            }
            ProviderKind::None => LlmProvider::None,
        };
        Ok(Self::new(provider, config.model.clone()))
    }

    /// Create a client with no backend.
    #[must_use]
    pub fn none() -> Self {
        Self::new(LlmProvider::None, String::new())
    }

    /// Check if the client has a backend configured.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }

    async fn send(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        match &self.provider {
            LlmProvider::None => Err(LlmError::GenerationUnavailable(
                "no LLM provider configured".into(),
            )),
            LlmProvider::Ollama { base_url } => self.generate_ollama(base_url, prompt, options).await,
            LlmProvider::OpenAiCompatible { base_url, api_key } => {
                self.generate_openai(base_url, api_key, prompt, options).await
            }
        }
    }

    /// Generate using Ollama's API.
    async fn generate_ollama(
        &self,
        base_url: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String> {
        let url = format!("{base_url}/api/generate");
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": options.temperature,
                "top_p": options.top_p,
                "top_k": options.top_k,
                "num_predict": options.max_tokens,
            }
        });

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .timeout(Duration::from_millis(options.timeout_ms))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            warn!(%status, detail = %detail, "Ollama returned error");
            return Err(LlmError::GenerationUnavailable(format!("HTTP {status}: {detail}")));
        }

        let json: serde_json::Value = resp.json().await?;
        Ok(json["response"].as_str().unwrap_or_default().to_string())
    }

    /// Generate using an OpenAI-compatible API.
    async fn generate_openai(
        &self,
        base_url: &str,
        api_key: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String> {
        let url = format!("{base_url}/v1/chat/completions");
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt },
            ],
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
            "top_p": options.top_p,
        });

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .timeout(Duration::from_millis(options.timeout_ms))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            warn!(%status, "OpenAI API returned error");
            return Err(LlmError::GenerationUnavailable(format!("HTTP {status}")));
        }

        let json: serde_json::Value = resp.json().await?;
        Ok(json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }
}

#[async_trait]
impl GenerativeModel for LlmClient {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
        cancel: &CancellationToken,
    ) -> Result<Generation> {
        let start = Instant::now();
        let text = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(LlmError::Cancelled),
            result = self.send(prompt, options) => result?,
        };

        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(model = %self.model, elapsed_ms, chars = text.len(), "Model call completed");
        Ok(Generation { text, elapsed_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> GenerationOptions {
        LlmConfig::default().fallback_options()
    }

    #[tokio::test]
    async fn none_provider_is_unavailable() {
        let client = LlmClient::none();
        assert!(!client.is_available());
        let err = client
            .generate("1 + 1", &options(), &CancellationToken::new())
            .await
            .expect_err("no backend");
        assert!(matches!(err, LlmError::GenerationUnavailable(_)));
    }

    #[tokio::test]
    async fn cancelled_token_wins_over_request() {
        let client = LlmClient::none();
        let token = CancellationToken::new();
        token.cancel();
        let err = client
            .generate("1 + 1", &options(), &token)
            .await
            .expect_err("cancelled");
        assert!(matches!(err, LlmError::Cancelled));
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        let client = LlmClient::new(
            LlmProvider::Ollama {
                base_url: "http://127.0.0.1:9".into(),
            },
            "test-model",
        );
        let opts = GenerationOptions {
            timeout_ms: 500,
            ..options()
        };
        let err = client
            .generate("1 + 1", &opts, &CancellationToken::new())
            .await
            .expect_err("nothing listens on the discard port");
        assert!(matches!(err, LlmError::GenerationUnavailable(_)));
    }

    #[test]
    fn openai_without_key_is_config_error() {
        let config = LlmConfig {
            provider: ProviderKind::OpenAi,
            api_key: None,
            ..LlmConfig::default()
        };
        assert!(matches!(LlmClient::from_config(&config), Err(LlmError::Config(_))));
    }

    #[test]
    fn from_config_trims_trailing_slash() {
        let config = LlmConfig {
            base_url: "http://localhost:11434/".into(),
            ..LlmConfig::default()
        };
        let client = LlmClient::from_config(&config).expect("client");
        assert!(client.is_available());
        match client.provider {
            LlmProvider::Ollama { base_url } => assert_eq!(base_url, "http://localhost:11434"),
            other => panic!("unexpected provider {other:?}"),
        }
    }
}
