//! Matching Domain Library
//!
//! Friend-candidate recommendation from user text embeddings: profile and post
//! text is embedded into a fixed-dimension vector, stored one per user, and a
//! request for candidates is answered by an exact nearest-neighbor search over
//! everyone else's vectors.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  FriendService  │  ← write path (profile/post/deletion) + requests
//! └───┬─────────┬───┘
//!     │         │
//!     │  ┌──────▼──────┐      ┌──────────────────┐
//!     │  │   Matcher   │ ───► │    FlatIndex     │  ← rebuilt per request
//!     │  └──────┬──────┘      │  (squared L2)    │
//!     │         │             └──────────────────┘
//! ┌───▼─────────▼───┐     ┌───────────────────┐
//! │ EmbeddingStore  │     │ EmbeddingProvider │
//! │    (trait)      │     │      (trait)      │
//! └───────┬─────────┘     └─────────┬─────────┘
//!         │                         │
//! ┌───────▼───────────────┐ ┌───────▼─────────┐
//! │ PostgresEmbeddingStore│ │ HashingProvider │
//! │ InMemoryEmbeddingStore│ │ OllamaProvider  │
//! └───────────────────────┘ │ OpenAIProvider  │
//!                           └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_matching::{
//!     EmbedderConfig, FriendService, InMemoryEmbeddingStore, ProfileText, build_provider,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = build_provider(&EmbedderConfig::hashing(384))?;
//! let service = FriendService::new(InMemoryEmbeddingStore::new(), provider);
//!
//! let hiking = ProfileText::new(Some("weekend hiking".into()), vec!["mountains".into()]);
//! service.on_profile_changed("alice", &hiking).await?;
//! service.on_profile_changed("bob", &hiking).await?;
//!
//! let candidate = service.request_candidate("alice").await?;
//! assert_eq!(candidate.candidate_user_id, "bob");
//! # Ok(())
//! # }
//! ```

pub mod embedding;
pub mod error;
pub mod index;
pub mod matcher;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod service;
pub mod text;

// Re-export commonly used types
pub use embedding::{
    EmbedderConfig, EmbeddingProvider, HashingProvider, OllamaConfig, OllamaProvider,
    OpenAIConfig, OpenAIProvider, build_provider,
};
pub use error::{MatchError, MatchErrorKind, MatchFailure, MatchResult};
pub use index::{FlatIndex, squared_l2};
pub use matcher::Matcher;
pub use models::{
    CandidateMatch, Embedding, EmbeddingProviderType, EmbeddingRecord, EmbeddingResult,
    MAX_USER_ID_LEN, Neighbor, PostText, ProfileText, validate_user_id,
};
pub use postgres::PostgresEmbeddingStore;
pub use repository::{EmbeddingStore, InMemoryEmbeddingStore};
pub use service::FriendService;
pub use text::{StaticTextSource, TextSource};
