use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{MatchError, MatchResult};
use crate::models::{Embedding, EmbeddingRecord, validate_user_id};

/// Persistence for one embedding per user
///
/// Every stored vector shares one dimension. The established dimension is the
/// length of the vectors currently stored; an empty store has none, and the
/// next upsert establishes it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Insert or overwrite the user's embedding
    ///
    /// Fails with `DimensionMismatch` when the vector's length differs from
    /// the established dimension, or `Validation` for an id that cannot be
    /// stored; the existing record is left untouched.
    async fn upsert(&self, user_id: &str, embedding: Embedding) -> MatchResult<EmbeddingRecord>;

    /// Get a user's embedding
    async fn get(&self, user_id: &str) -> MatchResult<Option<Embedding>>;

    /// Get a user's full record, timestamps included
    async fn get_record(&self, user_id: &str) -> MatchResult<Option<EmbeddingRecord>>;

    /// Every stored `(user_id, embedding)` pair
    async fn list_all(&self) -> MatchResult<Vec<(String, Embedding)>>;

    /// Delete a user's embedding, returns whether a record existed
    async fn delete(&self, user_id: &str) -> MatchResult<bool>;

    /// Number of stored records
    async fn count(&self) -> MatchResult<usize>;

    /// Established dimension, `None` when the store is empty
    async fn dimension(&self) -> MatchResult<Option<usize>>;
}

/// In-memory implementation of EmbeddingStore (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryEmbeddingStore {
    records: Arc<RwLock<HashMap<String, EmbeddingRecord>>>,
}

impl InMemoryEmbeddingStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl EmbeddingStore for InMemoryEmbeddingStore {
    async fn upsert(&self, user_id: &str, embedding: Embedding) -> MatchResult<EmbeddingRecord> {
        validate_user_id(user_id)?;

        let mut records = self.records.write().await;

        let established = records.values().next().map(EmbeddingRecord::dimension);
        if let Some(expected) = established.filter(|d| *d != embedding.dimension()) {
            return Err(MatchError::DimensionMismatch {
                expected,
                actual: embedding.dimension(),
            });
        }

        let record = match records.get_mut(user_id) {
            Some(existing) => {
                existing.embedding = embedding;
                existing.updated_at = Utc::now();
                existing.clone()
            }
            None => {
                let record = EmbeddingRecord::new(user_id, embedding);
                records.insert(user_id.to_string(), record.clone());
                record
            }
        };

        tracing::info!(
            user_id = %user_id,
            dimension = record.dimension(),
            "Upserted embedding"
        );
        Ok(record)
    }

    async fn get(&self, user_id: &str) -> MatchResult<Option<Embedding>> {
        let records = self.records.read().await;
        Ok(records.get(user_id).map(|r| r.embedding.clone()))
    }

    async fn get_record(&self, user_id: &str) -> MatchResult<Option<EmbeddingRecord>> {
        let records = self.records.read().await;
        Ok(records.get(user_id).cloned())
    }

    async fn list_all(&self) -> MatchResult<Vec<(String, Embedding)>> {
        let records = self.records.read().await;

        // Oldest first so enumeration order is stable between calls
        let mut all: Vec<&EmbeddingRecord> = records.values().collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });

        Ok(all
            .into_iter()
            .map(|r| (r.user_id.clone(), r.embedding.clone()))
            .collect())
    }

    async fn delete(&self, user_id: &str) -> MatchResult<bool> {
        let mut records = self.records.write().await;
        let removed = records.remove(user_id).is_some();

        if removed {
            tracing::info!(user_id = %user_id, "Deleted embedding");
        }
        Ok(removed)
    }

    async fn count(&self) -> MatchResult<usize> {
        Ok(self.records.read().await.len())
    }

    async fn dimension(&self) -> MatchResult<Option<usize>> {
        let records = self.records.read().await;
        Ok(records.values().next().map(EmbeddingRecord::dimension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_then_get() {
        let store = InMemoryEmbeddingStore::new();

        store.upsert("alice", emb(&[0.1, 0.2])).await.unwrap();
        let got = store.get("alice").await.unwrap();

        assert_eq!(got, Some(emb(&[0.1, 0.2])));
        assert_eq!(store.dimension().await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = InMemoryEmbeddingStore::new();
        assert_eq!(store.get("nobody").await.unwrap(), None);
        assert_eq!(store.dimension().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overwrite_keeps_single_record() {
        let store = InMemoryEmbeddingStore::new();

        let first = store.upsert("alice", emb(&[1.0, 0.0])).await.unwrap();
        let second = store.upsert("alice", emb(&[0.0, 1.0])).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(store.get("alice").await.unwrap(), Some(emb(&[0.0, 1.0])));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_leaves_record_untouched() {
        let store = InMemoryEmbeddingStore::new();
        store.upsert("alice", emb(&[1.0, 2.0])).await.unwrap();
        store.upsert("bob", emb(&[3.0, 4.0])).await.unwrap();

        let err = store.upsert("bob", emb(&[1.0, 2.0, 3.0])).await.unwrap_err();
        assert!(matches!(
            err,
            MatchError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert_eq!(store.get("bob").await.unwrap(), Some(emb(&[3.0, 4.0])));

        let err = store.upsert("carol", emb(&[1.0])).await.unwrap_err();
        assert!(matches!(err, MatchError::DimensionMismatch { .. }));
        assert_eq!(store.get("carol").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sole_record_keeps_dimension() {
        let store = InMemoryEmbeddingStore::new();
        store.upsert("alice", emb(&[1.0, 2.0])).await.unwrap();

        let err = store.upsert("alice", emb(&[1.0, 2.0, 3.0])).await.unwrap_err();
        assert!(matches!(
            err,
            MatchError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert_eq!(store.get("alice").await.unwrap(), Some(emb(&[1.0, 2.0])));
    }

    #[tokio::test]
    async fn test_overlong_user_id_rejected() {
        let store = InMemoryEmbeddingStore::new();

        let err = store
            .upsert(&"x".repeat(65), emb(&[1.0]))
            .await
            .unwrap_err();

        assert!(matches!(err, MatchError::Validation(_)));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryEmbeddingStore::new();
        store.upsert("alice", emb(&[1.0])).await.unwrap();

        assert!(store.delete("alice").await.unwrap());
        assert!(!store.delete("alice").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);

        // Empty again, so any dimension is accepted
        store.upsert("bob", emb(&[1.0, 1.0])).await.unwrap();
        assert_eq!(store.dimension().await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_list_all_is_stable() {
        let store = InMemoryEmbeddingStore::new();
        for id in ["a", "b", "c"] {
            store.upsert(id, emb(&[0.0])).await.unwrap();
        }

        let first = store.list_all().await.unwrap();
        let second = store.list_all().await.unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }
}
