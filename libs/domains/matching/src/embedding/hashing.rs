use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::EmbeddingProvider;
use super::provider::into_result;
use crate::error::{MatchError, MatchResult};
use crate::models::{EmbeddingProviderType, EmbeddingResult};

pub const HASHING_MODEL: &str = "feature-hashing-sha256";

/// Local feature-hashing embedder
///
/// Each lower-cased alphanumeric token is hashed with SHA-256 into one of
/// `dimension` buckets with a sign taken from the digest, the bucket counts are
/// summed and the result is L2-normalized. Texts sharing words land close
/// together, which is enough for matching without a model server. Output is
/// stable across processes and platforms.
#[derive(Debug, Clone)]
pub struct HashingProvider {
    dimension: usize,
}

impl HashingProvider {
    pub fn new(dimension: usize) -> MatchResult<Self> {
        if dimension == 0 {
            return Err(MatchError::Config(
                "hashing embedder dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    /// Synchronous embedding, used from the blocking pool
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        self.embed_counted(text).0
    }

    /// Vector plus the number of tokens hashed into it
    fn embed_counted(&self, text: &str) -> (Vec<f32>, u32) {
        let mut values = vec![0.0f32; self.dimension];
        let mut tokens = 0u32;

        for token in tokenize(text) {
            tokens += 1;
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            values[bucket] += sign;
        }

        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            values.iter_mut().for_each(|v| *v /= norm);
        }
        (values, tokens)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Hashing
    }

    fn model(&self) -> String {
        HASHING_MODEL.to_string()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> MatchResult<EmbeddingResult> {
        let provider = self.clone();
        let text = text.to_string();
        let (values, tokens) =
            tokio::task::spawn_blocking(move || provider.embed_counted(&text)).await?;
        Ok(into_result(values, tokens))
    }

    async fn embed_batch(&self, texts: &[String]) -> MatchResult<Vec<EmbeddingResult>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let provider = self.clone();
        let texts = texts.to_vec();
        let batch = tokio::task::spawn_blocking(move || {
            texts
                .iter()
                .map(|text| provider.embed_counted(text))
                .collect::<Vec<_>>()
        })
        .await?;

        Ok(batch
            .into_iter()
            .map(|(values, tokens)| into_result(values, tokens))
            .collect())
    }
}
