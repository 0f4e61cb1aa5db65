use std::sync::Arc;

use tracing::instrument;

use crate::error::{MatchError, MatchResult};
use crate::index::FlatIndex;
use crate::models::{CandidateMatch, Embedding};
use crate::repository::EmbeddingStore;

/// Read-only nearest-neighbor matching over an [`EmbeddingStore`]
///
/// Each request reads a fresh snapshot, drops the requester's own record,
/// builds a [`FlatIndex`] over the rest and searches it. Nothing is cached and
/// the store is never written.
pub struct Matcher<S: EmbeddingStore> {
    store: Arc<S>,
}

impl<S: EmbeddingStore> Clone for Matcher<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: EmbeddingStore> Matcher<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The single most similar other user
    #[instrument(skip(self))]
    pub async fn find_candidate(&self, user_id: &str) -> MatchResult<CandidateMatch> {
        let (query, index) = self.prepare(user_id).await?;
        let nearest = index.nearest(query.values())?;

        tracing::debug!(
            candidate = %nearest.user_id,
            distance = nearest.distance,
            "Found candidate"
        );

        Ok(CandidateMatch {
            query_user_id: user_id.to_string(),
            candidate_user_id: nearest.user_id,
            distance: nearest.distance,
        })
    }

    /// Up to `k` most similar other users, closest first
    #[instrument(skip(self))]
    pub async fn find_candidates(
        &self,
        user_id: &str,
        k: usize,
    ) -> MatchResult<Vec<CandidateMatch>> {
        let (query, index) = self.prepare(user_id).await?;
        let neighbors = index.search(query.values(), k)?;

        Ok(neighbors
            .into_iter()
            .map(|n| CandidateMatch {
                query_user_id: user_id.to_string(),
                candidate_user_id: n.user_id,
                distance: n.distance,
            })
            .collect())
    }

    async fn prepare(&self, user_id: &str) -> MatchResult<(Embedding, FlatIndex)> {
        let query = self
            .store
            .get(user_id)
            .await?
            .ok_or_else(|| MatchError::NoEmbedding(user_id.to_string()))?;

        let population: Vec<_> = self
            .store
            .list_all()
            .await?
            .into_iter()
            .filter(|(id, _)| id != user_id)
            .collect();

        if population.is_empty() {
            return Err(MatchError::NoCandidates(user_id.to_string()));
        }

        tracing::debug!(population = population.len(), "Building candidate index");
        let index = FlatIndex::build(population)?;

        Ok((query, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryEmbeddingStore, MockEmbeddingStore};

    fn emb(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec()).unwrap()
    }

    async fn seeded(items: &[(&str, &[f32])]) -> Arc<InMemoryEmbeddingStore> {
        let store = InMemoryEmbeddingStore::new();
        for (id, values) in items {
            store.upsert(id, emb(values)).await.unwrap();
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_find_candidate_returns_closest() {
        let store = seeded(&[("a", &[0.0, 0.0]), ("b", &[1.0, 1.0]), ("c", &[5.0, 5.0])]).await;
        let matcher = Matcher::new(store);

        let result = matcher.find_candidate("a").await.unwrap();
        assert_eq!(result.query_user_id, "a");
        assert_eq!(result.candidate_user_id, "b");
        assert_eq!(result.distance, 2.0);
    }

    #[tokio::test]
    async fn test_missing_query_embedding() {
        let matcher = Matcher::new(seeded(&[("b", &[1.0])]).await);
        let err = matcher.find_candidate("a").await.unwrap_err();
        assert!(matches!(err, MatchError::NoEmbedding(id) if id == "a"));
    }

    #[tokio::test]
    async fn test_only_self_means_no_candidates() {
        let matcher = Matcher::new(seeded(&[("a", &[1.0])]).await);
        let err = matcher.find_candidate("a").await.unwrap_err();
        assert!(matches!(err, MatchError::NoCandidates(id) if id == "a"));
    }

    #[tokio::test]
    async fn test_never_returns_self_even_when_identical() {
        let store = seeded(&[("a", &[1.0, 1.0]), ("b", &[9.0, 9.0])]).await;
        let matcher = Matcher::new(store);

        let result = matcher.find_candidate("a").await.unwrap();
        assert_eq!(result.candidate_user_id, "b");
    }

    #[tokio::test]
    async fn test_find_candidates_ranked() {
        let store = seeded(&[
            ("a", &[0.0]),
            ("far", &[10.0]),
            ("near", &[1.0]),
            ("mid", &[-3.0]),
        ])
        .await;
        let matcher = Matcher::new(store);

        let ranked = matcher.find_candidates("a", 5).await.unwrap();
        let ids: Vec<_> = ranked.iter().map(|c| c.candidate_user_id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);
        assert!(ranked.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn test_store_failure_surfaces() {
        let mut store = MockEmbeddingStore::new();
        store
            .expect_get()
            .returning(|_| Err(MatchError::StoreUnavailable("timeout".to_string())));
        store.expect_list_all().never();

        let matcher = Matcher::new(Arc::new(store));
        let err = matcher.find_candidate("a").await.unwrap_err();
        assert!(matches!(err, MatchError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_matching_never_writes() {
        let mut store = MockEmbeddingStore::new();
        store
            .expect_get()
            .returning(|_| Ok(Some(Embedding::new(vec![0.0]).unwrap())));
        store.expect_list_all().returning(|| {
            Ok(vec![
                ("a".to_string(), Embedding::new(vec![0.0]).unwrap()),
                ("b".to_string(), Embedding::new(vec![2.0]).unwrap()),
            ])
        });
        store.expect_upsert().never();
        store.expect_delete().never();

        let matcher = Matcher::new(Arc::new(store));
        let result = matcher.find_candidate("a").await.unwrap();
        assert_eq!(result.candidate_user_id, "b");
        assert_eq!(result.distance, 4.0);
    }
}
