use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::error::{MatchError, MatchResult};

/// Longest accepted user id, in characters; matches `user_embeddings.user_id VARCHAR(64)`
pub const MAX_USER_ID_LEN: usize = 64;

/// Reject blank ids and ids too long to persist
pub fn validate_user_id(user_id: &str) -> MatchResult<()> {
    if user_id.trim().is_empty() {
        return Err(MatchError::Validation("user_id must not be empty".to_string()));
    }
    let len = user_id.chars().count();
    if len > MAX_USER_ID_LEN {
        return Err(MatchError::Validation(format!(
            "user_id is {} characters, at most {} allowed",
            len, MAX_USER_ID_LEN
        )));
    }
    Ok(())
}

/// A validated embedding vector
///
/// Non-empty and every component finite. The dimension is the vector length;
/// agreement with other stored vectors is checked by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> MatchResult<Self> {
        if values.is_empty() {
            return Err(MatchError::Validation(
                "embedding must have at least one component".to_string(),
            ));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(MatchError::Validation(format!(
                "embedding component {} is not a finite number",
                pos
            )));
        }
        Ok(Self(values))
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }

    pub fn into_values(self) -> Vec<f32> {
        self.0
    }
}

impl TryFrom<Vec<f32>> for Embedding {
    type Error = MatchError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Embedding::new(values)
    }
}

impl From<Embedding> for Vec<f32> {
    fn from(embedding: Embedding) -> Self {
        embedding.0
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

/// One stored embedding per user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub user_id: String,
    pub embedding: Embedding,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmbeddingRecord {
    pub fn new(user_id: impl Into<String>, embedding: Embedding) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            embedding,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn dimension(&self) -> usize {
        self.embedding.dimension()
    }
}

/// Result of a friend-candidate request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub query_user_id: String,
    pub candidate_user_id: String,
    /// Squared L2 distance between the two embeddings
    pub distance: f32,
}

/// A single hit from a [`crate::index::FlatIndex`] search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub user_id: String,
    pub distance: f32,
}

/// Embedding provider type
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EmbeddingProviderType {
    /// Local feature-hashing embedder, no model download or network
    #[default]
    Hashing,
    Ollama,
    OpenAI,
}

/// Raw provider output, validated into an [`Embedding`] by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResult {
    pub values: Vec<f32>,
    pub dimension: u32,
    pub tokens_used: u32,
}

impl TryFrom<EmbeddingResult> for Embedding {
    type Error = MatchError;

    fn try_from(result: EmbeddingResult) -> Result<Self, Self::Error> {
        Embedding::new(result.values)
    }
}

/// Profile text that feeds a user's embedding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileText {
    pub bio: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

impl ProfileText {
    pub fn new(bio: Option<String>, interests: Vec<String>) -> Self {
        Self { bio, interests }
    }

    /// `bio` followed by the interests, space separated, blanks skipped
    pub fn compose(&self) -> String {
        let bio = self.bio.as_deref().unwrap_or_default();
        join_non_empty(std::iter::once(bio).chain(self.interests.iter().map(String::as_str)))
    }
}

/// Text of a newly created post
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostText {
    pub title: String,
    pub content: String,
}

impl PostText {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    /// Author profile text followed by title and content
    pub fn compose_with(&self, profile: &ProfileText) -> String {
        let profile_text = profile.compose();
        join_non_empty([
            profile_text.as_str(),
            self.title.as_str(),
            self.content.as_str(),
        ])
    }
}

fn join_non_empty<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_user_id_bounds() {
        assert!(validate_user_id("alice").is_ok());
        assert!(validate_user_id(&"x".repeat(MAX_USER_ID_LEN)).is_ok());
        // Counted in characters, like VARCHAR
        assert!(validate_user_id(&"é".repeat(MAX_USER_ID_LEN)).is_ok());

        for bad in [String::new(), "   ".to_string(), "x".repeat(MAX_USER_ID_LEN + 1)] {
            let err = validate_user_id(&bad).unwrap_err();
            assert!(matches!(err, MatchError::Validation(_)));
            assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_embedding_rejects_empty() {
        let err = Embedding::new(vec![]).unwrap_err();
        assert!(matches!(err, MatchError::Validation(_)));
    }

    #[test]
    fn test_embedding_rejects_non_finite() {
        assert!(Embedding::new(vec![0.0, f32::NAN]).is_err());
        assert!(Embedding::new(vec![f32::INFINITY]).is_err());
    }

    #[test]
    fn test_embedding_serde_is_plain_array() {
        let embedding = Embedding::new(vec![0.5, -1.25]).unwrap();
        let json = serde_json::to_string(&embedding).unwrap();
        assert_eq!(json, "[0.5,-1.25]");

        let back: Embedding = serde_json::from_str(&json).unwrap();
        assert_eq!(back, embedding);
        assert!(serde_json::from_str::<Embedding>("[]").is_err());
    }

    #[test]
    fn test_profile_compose() {
        let profile = ProfileText::new(
            Some("  likes hiking ".to_string()),
            vec!["music".to_string(), " ".to_string(), "rust".to_string()],
        );
        assert_eq!(profile.compose(), "likes hiking music rust");
    }

    #[test]
    fn test_profile_compose_without_bio() {
        let profile = ProfileText::new(None, vec!["chess".to_string()]);
        assert_eq!(profile.compose(), "chess");
        assert_eq!(ProfileText::default().compose(), "");
    }

    #[test]
    fn test_post_compose_with_profile() {
        let profile = ProfileText::new(Some("bio".to_string()), vec!["tag".to_string()]);
        let post = PostText::new("Title", "");
        assert_eq!(post.compose_with(&profile), "bio tag Title");
    }

    #[test]
    fn test_provider_type_parse() {
        assert_eq!(
            "OpenAI".parse::<EmbeddingProviderType>().unwrap(),
            EmbeddingProviderType::OpenAI
        );
        assert_eq!(
            "ollama".parse::<EmbeddingProviderType>().unwrap(),
            EmbeddingProviderType::Ollama
        );
        assert_eq!(EmbeddingProviderType::Hashing.to_string(), "hashing");
        assert!("vertex".parse::<EmbeddingProviderType>().is_err());
    }
}
