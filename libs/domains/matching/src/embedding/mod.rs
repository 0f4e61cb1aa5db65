mod config;
mod hashing;
mod ollama;
mod openai;
mod provider;

pub use config::{DEFAULT_DIMENSION, EmbedderConfig, build_provider};
pub use hashing::{HASHING_MODEL, HashingProvider};
pub use ollama::{OllamaConfig, OllamaProvider};
pub use openai::{OpenAIConfig, OpenAIProvider};
pub use provider::EmbeddingProvider;

#[cfg(test)]
pub use provider::MockEmbeddingProvider;
