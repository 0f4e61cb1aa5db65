use std::sync::Arc;
use std::time::Duration;

use core_config::{ConfigError, FromEnv, env_or_default, env_parse_or};

use super::hashing::HashingProvider;
use super::ollama::{DEFAULT_OLLAMA_BASE_URL, DEFAULT_OLLAMA_MODEL, OllamaConfig, OllamaProvider};
use super::openai::{DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL, OpenAIConfig, OpenAIProvider};
use super::EmbeddingProvider;
use crate::error::{MatchError, MatchResult};
use crate::models::EmbeddingProviderType;

pub const DEFAULT_DIMENSION: usize = 384;

/// Embedder selection and backend settings
#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    pub provider: EmbeddingProviderType,
    /// Overrides the provider's default model
    pub model: Option<String>,
    pub dimension: usize,
    pub ollama_base_url: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub timeout_secs: u64,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderType::Hashing,
            model: None,
            dimension: DEFAULT_DIMENSION,
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl EmbedderConfig {
    pub fn hashing(dimension: usize) -> Self {
        Self {
            dimension,
            ..Default::default()
        }
    }

    /// Configured model, or the default for the selected provider
    pub fn model_name(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(model), _) => model.as_str(),
            (None, EmbeddingProviderType::Hashing) => super::hashing::HASHING_MODEL,
            (None, EmbeddingProviderType::Ollama) => DEFAULT_OLLAMA_MODEL,
            (None, EmbeddingProviderType::OpenAI) => DEFAULT_OPENAI_MODEL,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl FromEnv for EmbedderConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let provider = env_parse_or("EMBEDDING_PROVIDER", EmbeddingProviderType::Hashing)?;
        let model = std::env::var("EMBEDDING_MODEL")
            .ok()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        let dimension = env_parse_or("EMBEDDING_DIMENSION", DEFAULT_DIMENSION)?;
        if dimension == 0 {
            return Err(ConfigError::InvalidValue {
                key: "EMBEDDING_DIMENSION".to_string(),
                details: "must be greater than zero".to_string(),
            });
        }

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        if provider == EmbeddingProviderType::OpenAI && openai_api_key.is_none() {
            return Err(ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()));
        }

        Ok(Self {
            provider,
            model,
            dimension,
            ollama_base_url: env_or_default("OLLAMA_BASE_URL", DEFAULT_OLLAMA_BASE_URL),
            openai_api_key,
            openai_base_url: env_or_default("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
            timeout_secs: env_parse_or("EMBEDDING_TIMEOUT_SECS", 30)?,
        })
    }
}

/// Construct the configured embedding provider
pub fn build_provider(config: &EmbedderConfig) -> MatchResult<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingProviderType::Hashing => Arc::new(HashingProvider::new(config.dimension)?),
        EmbeddingProviderType::Ollama => Arc::new(OllamaProvider::new(
            OllamaConfig::new(config.model_name(), config.dimension)
                .with_base_url(config.ollama_base_url.clone())
                .with_timeout(config.timeout()),
        )?),
        EmbeddingProviderType::OpenAI => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                MatchError::Config("OPENAI_API_KEY is required for the openai provider".to_string())
            })?;
            Arc::new(OpenAIProvider::new(
                OpenAIConfig::new(api_key, config.dimension)
                    .with_base_url(config.openai_base_url.clone())
                    .with_model(config.model_name())
                    .with_timeout(config.timeout()),
            )?)
        }
    };

    tracing::info!(
        provider = %provider.provider_type(),
        model = %provider.model(),
        dimension = provider.dimension(),
        "Embedding provider ready"
    );

    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HASHING_MODEL;

    const ALL_KEYS: [&str; 7] = [
        "EMBEDDING_PROVIDER",
        "EMBEDDING_MODEL",
        "EMBEDDING_DIMENSION",
        "OLLAMA_BASE_URL",
        "OPENAI_API_KEY",
        "OPENAI_BASE_URL",
        "EMBEDDING_TIMEOUT_SECS",
    ];

    #[test]
    fn test_defaults_to_hashing() {
        temp_env::with_vars_unset(ALL_KEYS, || {
            let config = EmbedderConfig::from_env().unwrap();
            assert_eq!(config.provider, EmbeddingProviderType::Hashing);
            assert_eq!(config.dimension, 384);
            assert_eq!(config.timeout_secs, 30);
            assert_eq!(config.model_name(), "feature-hashing-sha256");
        });
    }

    #[test]
    fn test_ollama_default_model() {
        temp_env::with_vars(
            [
                ("EMBEDDING_PROVIDER", Some("ollama")),
                ("EMBEDDING_MODEL", None),
                ("OLLAMA_BASE_URL", Some("http://ollama:11434")),
            ],
            || {
                let config = EmbedderConfig::from_env().unwrap();
                assert_eq!(config.provider, EmbeddingProviderType::Ollama);
                assert_eq!(config.model_name(), "all-minilm");
                assert_eq!(config.ollama_base_url, "http://ollama:11434");
            },
        );
    }

    #[test]
    fn test_openai_requires_api_key() {
        temp_env::with_vars(
            [
                ("EMBEDDING_PROVIDER", Some("openai")),
                ("OPENAI_API_KEY", None),
            ],
            || {
                let err = EmbedderConfig::from_env().unwrap_err();
                assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "OPENAI_API_KEY"));
            },
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        temp_env::with_vars(
            [
                ("EMBEDDING_PROVIDER", Some("vertex")),
                ("EMBEDDING_DIMENSION", None),
            ],
            || assert!(EmbedderConfig::from_env().is_err()),
        );
        temp_env::with_vars(
            [
                ("EMBEDDING_PROVIDER", None),
                ("EMBEDDING_DIMENSION", Some("0")),
            ],
            || {
                assert!(matches!(
                    EmbedderConfig::from_env(),
                    Err(ConfigError::InvalidValue { .. })
                ))
            },
        );
    }

    #[test]
    fn test_build_hashing_provider() {
        let provider = build_provider(&EmbedderConfig::hashing(8)).unwrap();
        assert_eq!(provider.provider_type(), EmbeddingProviderType::Hashing);
        assert_eq!(provider.model(), HASHING_MODEL);
        assert_eq!(provider.dimension(), 8);
    }

    #[test]
    fn test_build_ollama_provider_uses_configured_model() {
        let config = EmbedderConfig {
            provider: EmbeddingProviderType::Ollama,
            model: Some("nomic-embed-text".to_string()),
            dimension: 768,
            ..Default::default()
        };

        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.model(), "nomic-embed-text");
        assert_eq!(provider.dimension(), 768);
    }

    #[test]
    fn test_build_openai_without_key_fails() {
        let config = EmbedderConfig {
            provider: EmbeddingProviderType::OpenAI,
            ..Default::default()
        };
        assert!(matches!(
            build_provider(&config),
            Err(MatchError::Config(_))
        ));
    }
}
