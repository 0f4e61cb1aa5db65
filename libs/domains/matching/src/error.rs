use http::StatusCode;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Embedding failed: {0}")]
    EmbeddingFailure(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("User embedding not found: {0}")]
    NoEmbedding(String),

    #[error("No other embeddings to match user {0} against")]
    NoCandidates(String),

    #[error("Index is empty")]
    EmptyIndex,

    #[error("Embedding store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type MatchResult<T> = Result<T, MatchError>;

/// Stable, machine-readable error kind
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchErrorKind {
    EmbeddingFailure,
    DimensionMismatch,
    NoEmbedding,
    NoCandidates,
    EmptyIndex,
    StoreUnavailable,
    Validation,
    Config,
}

impl MatchError {
    pub fn kind(&self) -> MatchErrorKind {
        match self {
            MatchError::EmbeddingFailure(_) => MatchErrorKind::EmbeddingFailure,
            MatchError::DimensionMismatch { .. } => MatchErrorKind::DimensionMismatch,
            MatchError::NoEmbedding(_) => MatchErrorKind::NoEmbedding,
            MatchError::NoCandidates(_) => MatchErrorKind::NoCandidates,
            MatchError::EmptyIndex => MatchErrorKind::EmptyIndex,
            MatchError::StoreUnavailable(_) => MatchErrorKind::StoreUnavailable,
            MatchError::Validation(_) => MatchErrorKind::Validation,
            MatchError::Config(_) => MatchErrorKind::Config,
        }
    }

    /// HTTP-equivalent status for callers that expose matching over a transport
    pub fn status_code(&self) -> StatusCode {
        match self {
            MatchError::NoEmbedding(_) | MatchError::NoCandidates(_) => StatusCode::NOT_FOUND,
            MatchError::DimensionMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            MatchError::Validation(_) => StatusCode::BAD_REQUEST,
            MatchError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            MatchError::EmbeddingFailure(_) => StatusCode::BAD_GATEWAY,
            MatchError::EmptyIndex | MatchError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Structured failure result handed back to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchFailure {
    pub kind: MatchErrorKind,
    pub message: String,
}

impl From<MatchError> for MatchFailure {
    fn from(err: MatchError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<&MatchError> for MatchFailure {
    fn from(err: &MatchError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<sea_orm::DbErr> for MatchError {
    fn from(err: sea_orm::DbErr) -> Self {
        MatchError::StoreUnavailable(err.to_string())
    }
}

impl From<reqwest::Error> for MatchError {
    fn from(err: reqwest::Error) -> Self {
        MatchError::EmbeddingFailure(err.to_string())
    }
}

impl From<tokio::task::JoinError> for MatchError {
    fn from(err: tokio::task::JoinError) -> Self {
        MatchError::EmbeddingFailure(format!("embedding task failed: {}", err))
    }
}

impl From<core_config::ConfigError> for MatchError {
    fn from(err: core_config::ConfigError) -> Self {
        MatchError::Config(err.to_string())
    }
}
