//! Access token caching layer.

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::ApiToken;

/// Holds the current access token between authenticated calls.
///
/// Starts empty, which reads the same as expired. The lock only guards the slot
/// itself; callers that race on an expired token each authenticate and the last
/// store wins.
#[derive(Debug, Default)]
pub struct TokenCache {
    slot: RwLock<Option<ApiToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached token if it is still valid now.
    pub async fn valid_token(&self) -> Option<ApiToken> {
        self.valid_token_at(Utc::now()).await
    }

    pub async fn valid_token_at(&self, now: DateTime<Utc>) -> Option<ApiToken> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|token| token.is_valid_at(now))
            .cloned()
    }

    pub async fn store(&self, token: ApiToken) {
        *self.slot.write().await = Some(token);
    }

    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }

    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.slot.read().await.as_ref().map(ApiToken::expires_at)
    }
}
