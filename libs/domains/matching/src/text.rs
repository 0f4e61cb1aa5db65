use async_trait::async_trait;

use crate::error::MatchResult;
use crate::models::ProfileText;

/// Where a user's profile text comes from (the accounts/profile store)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextSource: Send + Sync {
    /// Profile text for `user_id`, `None` when the user is unknown
    async fn profile_text(&self, user_id: &str) -> MatchResult<Option<ProfileText>>;
}

/// Fixed in-memory text source, handy for tools and tests
#[derive(Debug, Default, Clone)]
pub struct StaticTextSource {
    profiles: std::collections::HashMap<String, ProfileText>,
}

impl StaticTextSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, user_id: impl Into<String>, profile: ProfileText) -> Self {
        self.profiles.insert(user_id.into(), profile);
        self
    }
}

#[async_trait]
impl TextSource for StaticTextSource {
    async fn profile_text(&self, user_id: &str) -> MatchResult<Option<ProfileText>> {
        Ok(self.profiles.get(user_id).cloned())
    }
}
