//! Text-generation provider abstraction.
//!
//! Same shape as the embedding side: a [`GenerationProvider`] trait with an
//! Ollama-backed implementation (`POST /api/generate`) and a disabled
//! fallback. Completions are best-effort text with no guaranteed format
//! compliance, which is why callers layer local heuristics on top.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::embedding::post_json_with_retry;

/// A text-completion backend: prompt in, free text out.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// A no-op provider that always returns errors. Used when
/// `generation.provider = "disabled"` in the configuration.
pub struct DisabledGenerator;

#[async_trait]
impl GenerationProvider for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        bail!("Generation provider is disabled. Set [generation] provider in config.")
    }
}

/// Generation provider backed by a local Ollama server.
pub struct OllamaGenerator {
    base_url: String,
    model: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl OllamaGenerator {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for Ollama provider"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model,
            client,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let json = post_json_with_retry(&self.client, &url, &body, self.max_retries).await?;

        let response = json
            .get("response")
            .and_then(|r| r.as_str())
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response text"))?;

        Ok(response.to_string())
    }
}

/// Create the configured [`GenerationProvider`].
pub fn create_generator(config: &ProviderConfig) -> Result<Box<dyn GenerationProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "ollama" => Ok(Box::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_generator_errors() {
        let provider = DisabledGenerator;
        assert!(provider.complete("prompt").await.is_err());
    }

    #[test]
    fn test_create_generator_dispatch() {
        let ollama = ProviderConfig {
            provider: "ollama".to_string(),
            model: Some("mistral:7b".to_string()),
            ..Default::default()
        };
        assert_eq!(
            create_generator(&ollama).unwrap().model_name(),
            "mistral:7b"
        );

        let unknown = ProviderConfig {
            provider: "gpt".to_string(),
            ..Default::default()
        };
        assert!(create_generator(&unknown).is_err());
    }
}
