use std::sync::Arc;

use tracing::instrument;

use crate::embedding::EmbeddingProvider;
use crate::error::{MatchError, MatchResult};
use crate::matcher::Matcher;
use crate::models::{
    CandidateMatch, Embedding, EmbeddingRecord, EmbeddingResult, PostText, ProfileText,
    validate_user_id,
};
use crate::repository::EmbeddingStore;
use crate::text::TextSource;

/// Friend-candidate service: embedding write path plus matching
///
/// Profile, interest and post changes re-embed the user's text and upsert it.
/// On these write paths an embedding failure is logged and skipped so the
/// surrounding operation still succeeds; store and dimension errors surface.
pub struct FriendService<S: EmbeddingStore> {
    store: Arc<S>,
    matcher: Matcher<S>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
}

impl<S: EmbeddingStore> FriendService<S> {
    pub fn new(store: S, embedding_provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self::from_shared(Arc::new(store), embedding_provider)
    }

    pub fn from_shared(store: Arc<S>, embedding_provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            matcher: Matcher::new(Arc::clone(&store)),
            store,
            embedding_provider,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn matcher(&self) -> &Matcher<S> {
        &self.matcher
    }

    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    // ===== Embedding =====

    /// Embed `text`, failing if the provider cannot
    pub async fn embed_text(&self, text: &str) -> MatchResult<Embedding> {
        let result = self.embedding_provider.embed(text).await?;
        self.checked_embedding(result)
    }

    fn checked_embedding(&self, result: EmbeddingResult) -> MatchResult<Embedding> {
        let expected = self.embedding_provider.dimension();
        if result.values.len() != expected {
            return Err(MatchError::EmbeddingFailure(format!(
                "provider returned {} dimensions, expected {}",
                result.values.len(),
                expected
            )));
        }

        Embedding::try_from(result).map_err(|e| match e {
            MatchError::Validation(msg) => MatchError::EmbeddingFailure(msg),
            other => other,
        })
    }

    async fn embed_and_store(
        &self,
        user_id: &str,
        text: &str,
    ) -> MatchResult<Option<EmbeddingRecord>> {
        validate_user_id(user_id)?;

        let embedding = match self.embed_text(text).await {
            Ok(embedding) => embedding,
            Err(MatchError::EmbeddingFailure(reason)) => {
                tracing::warn!(
                    user_id = %user_id,
                    provider = %self.embedding_provider.provider_type(),
                    model = %self.embedding_provider.model(),
                    reason = %reason,
                    "Embedding failed, keeping previous embedding"
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.store.upsert(user_id, embedding).await.map(Some)
    }

    /// Embed many texts in one provider call
    ///
    /// The whole batch is skipped on an embedding failure, like the single
    /// write path.
    async fn embed_batch_checked(&self, texts: &[String]) -> MatchResult<Option<Vec<Embedding>>> {
        let batch = match self.embedding_provider.embed_batch(texts).await {
            Ok(batch) => batch,
            Err(e) => return self.skip_batch(e),
        };
        if batch.len() != texts.len() {
            return self.skip_batch(MatchError::EmbeddingFailure(format!(
                "provider returned {} embeddings for {} texts",
                batch.len(),
                texts.len()
            )));
        }

        let embeddings = batch
            .into_iter()
            .map(|result| self.checked_embedding(result))
            .collect::<MatchResult<Vec<_>>>();

        match embeddings {
            Ok(embeddings) => Ok(Some(embeddings)),
            Err(e) => self.skip_batch(e),
        }
    }

    fn skip_batch<T>(&self, err: MatchError) -> MatchResult<Option<T>> {
        match err {
            MatchError::EmbeddingFailure(reason) => {
                tracing::warn!(
                    provider = %self.embedding_provider.provider_type(),
                    model = %self.embedding_provider.model(),
                    reason = %reason,
                    "Batch embedding failed, keeping previous embeddings"
                );
                Ok(None)
            }
            other => Err(other),
        }
    }

    // ===== Write path =====

    /// Account created, bio or interests changed
    #[instrument(skip(self, profile))]
    pub async fn on_profile_changed(
        &self,
        user_id: &str,
        profile: &ProfileText,
    ) -> MatchResult<Option<EmbeddingRecord>> {
        self.embed_and_store(user_id, &profile.compose()).await
    }

    /// New post by `user_id`; the post text is folded into their embedding
    #[instrument(skip(self, profile, post))]
    pub async fn on_post_created(
        &self,
        user_id: &str,
        profile: &ProfileText,
        post: &PostText,
    ) -> MatchResult<Option<EmbeddingRecord>> {
        self.embed_and_store(user_id, &post.compose_with(profile))
            .await
    }

    /// Re-embed from the profile source; unknown users are skipped
    #[instrument(skip(self, source))]
    pub async fn refresh_from_source(
        &self,
        user_id: &str,
        source: &dyn TextSource,
    ) -> MatchResult<Option<EmbeddingRecord>> {
        let Some(profile) = source.profile_text(user_id).await? else {
            tracing::warn!(user_id = %user_id, "No profile text for user, skipping");
            return Ok(None);
        };
        self.embed_and_store(user_id, &profile.compose()).await
    }

    /// Bulk profile import or backfill, embedded in one batch
    ///
    /// Every id is validated before anything is embedded. Returns the stored
    /// records in input order, or an empty list when the batch was skipped.
    #[instrument(skip_all, fields(profiles = profiles.len()))]
    pub async fn on_profiles_changed(
        &self,
        profiles: &[(String, ProfileText)],
    ) -> MatchResult<Vec<EmbeddingRecord>> {
        for (user_id, _) in profiles {
            validate_user_id(user_id)?;
        }
        if profiles.is_empty() {
            return Ok(vec![]);
        }

        let texts: Vec<String> = profiles.iter().map(|(_, p)| p.compose()).collect();
        let Some(embeddings) = self.embed_batch_checked(&texts).await? else {
            return Ok(vec![]);
        };

        let mut records = Vec::with_capacity(profiles.len());
        for ((user_id, _), embedding) in profiles.iter().zip(embeddings) {
            records.push(self.store.upsert(user_id, embedding).await?);
        }

        tracing::info!(stored = records.len(), "Imported profile embeddings");
        Ok(records)
    }

    /// Owning account deleted; drop the embedding with it
    #[instrument(skip(self))]
    pub async fn on_account_deleted(&self, user_id: &str) -> MatchResult<bool> {
        self.store.delete(user_id).await
    }

    // ===== Read path =====

    pub async fn request_candidate(&self, user_id: &str) -> MatchResult<CandidateMatch> {
        validate_user_id(user_id)?;
        self.matcher.find_candidate(user_id).await
    }

    pub async fn request_candidates(
        &self,
        user_id: &str,
        k: usize,
    ) -> MatchResult<Vec<CandidateMatch>> {
        validate_user_id(user_id)?;
        self.matcher.find_candidates(user_id, k).await
    }
}
