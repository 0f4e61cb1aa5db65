use async_trait::async_trait;

use crate::error::{MatchError, MatchResult};
use crate::models::{EmbeddingProviderType, EmbeddingResult};

/// Trait for text-to-vector embedding providers
///
/// Implementations must be deterministic for a fixed model and must never
/// fail on empty input. Every returned vector has length [`dimension`](Self::dimension).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the provider type
    fn provider_type(&self) -> EmbeddingProviderType;

    /// Model name sent to (or identifying) the backend
    fn model(&self) -> String;

    /// Length of every vector this provider produces
    fn dimension(&self) -> usize;

    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> MatchResult<EmbeddingResult>;

    /// Generate embeddings for multiple texts in batch, in input order
    async fn embed_batch(&self, texts: &[String]) -> MatchResult<Vec<EmbeddingResult>>;
}

/// Reject backend output whose length disagrees with the configured dimension
pub(crate) fn ensure_dimension(expected: usize, values: &[f32]) -> MatchResult<()> {
    if values.len() != expected {
        return Err(MatchError::EmbeddingFailure(format!(
            "model returned {} dimensions, expected {}",
            values.len(),
            expected
        )));
    }
    Ok(())
}

pub(crate) fn into_result(values: Vec<f32>, tokens_used: u32) -> EmbeddingResult {
    EmbeddingResult {
        dimension: values.len() as u32,
        values,
        tokens_used,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_dimension() {
        assert!(ensure_dimension(3, &[0.0, 1.0, 2.0]).is_ok());

        let err = ensure_dimension(3, &[0.0]).unwrap_err();
        assert!(matches!(err, MatchError::EmbeddingFailure(_)));
    }
}
