use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::EmbeddingProvider;
use super::provider::{ensure_dimension, into_result};
use crate::error::{MatchError, MatchResult};
use crate::models::{EmbeddingProviderType, EmbeddingResult};

pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "all-minilm";

/// Ollama embedding provider configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    pub timeout: Duration,
}

impl OllamaConfig {
    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            model: model.into(),
            dimension,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Embeddings from a local Ollama server via `POST /api/embed`
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig) -> MatchResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MatchError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/embed", self.config.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Ollama
    }

    fn model(&self) -> String {
        self.config.model.clone()
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> MatchResult<EmbeddingResult> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| MatchError::EmbeddingFailure("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> MatchResult<Vec<EmbeddingResult>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let request = EmbedRequest {
            model: &self.config.model,
            input: texts,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MatchError::EmbeddingFailure(format!(
                        "Ollama request timed out after {:?}",
                        self.config.timeout
                    ))
                } else {
                    e.into()
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(MatchError::EmbeddingFailure(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let body: EmbedResponse = response.json().await?;

        if body.embeddings.len() != texts.len() {
            return Err(MatchError::EmbeddingFailure(format!(
                "Ollama returned {} embeddings for {} inputs",
                body.embeddings.len(),
                texts.len()
            )));
        }

        let tokens_per_embedding = body.prompt_eval_count.unwrap_or(0) / texts.len() as u32;

        body.embeddings
            .into_iter()
            .map(|values| {
                ensure_dimension(self.config.dimension, &values)?;
                Ok(into_result(values, tokens_per_embedding))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let provider = OllamaProvider::new(
            OllamaConfig::new(DEFAULT_OLLAMA_MODEL, 384).with_base_url("http://ollama:11434/"),
        )
        .unwrap();
        assert_eq!(provider.endpoint(), "http://ollama:11434/api/embed");
    }

    #[test]
    fn test_request_shape() {
        let input = vec!["hello".to_string()];
        let request = EmbedRequest {
            model: "all-minilm",
            input: &input,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "model": "all-minilm", "input": ["hello"] })
        );
    }

    #[test]
    fn test_response_without_token_count() {
        let body: EmbedResponse =
            serde_json::from_str(r#"{"model":"all-minilm","embeddings":[[0.1,0.2]]}"#).unwrap();
        assert_eq!(body.embeddings, vec![vec![0.1, 0.2]]);
        assert_eq!(body.prompt_eval_count, None);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_embedding_failure() {
        let provider = OllamaProvider::new(
            OllamaConfig::new(DEFAULT_OLLAMA_MODEL, 384)
                .with_base_url("http://127.0.0.1:1")
                .with_timeout(Duration::from_secs(2)),
        )
        .unwrap();

        let err = provider.embed("hello").await.unwrap_err();
        assert!(matches!(err, MatchError::EmbeddingFailure(_)));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let provider = OllamaProvider::new(
            OllamaConfig::new(DEFAULT_OLLAMA_MODEL, 384).with_base_url("http://127.0.0.1:1"),
        )
        .unwrap();
        assert!(provider.embed_batch(&[]).await.unwrap().is_empty());
    }
}
