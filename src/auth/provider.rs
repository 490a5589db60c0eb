//! Credentials store trait.

use async_trait::async_trait;
use secrecy::SecretString;

use super::CredentialsData;
use crate::Result;

/// Loads and saves per-server credential records.
///
/// Records are keyed by server URL (`CredentialsData::machine`). Implementations
/// store copies, so mutating a record after `save` never changes what is stored.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    /// Where records live, for diagnostics.
    fn store_location(&self) -> String;

    /// Record for `url`, or [`crate::Error::CredentialsNotFound`].
    async fn load(&self, url: &str) -> Result<CredentialsData>;

    /// Insert or replace the record keyed by `data.machine`.
    async fn save(&self, data: &CredentialsData) -> Result<()>;

    async fn exists(&self, url: &str) -> Result<bool>;

    /// Delete the record for `url`; fails when there is none.
    async fn remove(&self, url: &str) -> Result<()>;

    /// Delete the record for `url` if one exists.
    async fn cleanup_if_exists(&self, url: &str) -> Result<()> {
        if self.exists(url).await? {
            self.remove(url).await?;
        }
        Ok(())
    }

    /// Replace the stored API key of the record for `url`.
    async fn update_api_key(&self, url: &str, api_key: SecretString) -> Result<()> {
        let mut data = self.load(url).await?;
        data.api_key = Some(api_key);
        self.save(&data).await
    }
}
