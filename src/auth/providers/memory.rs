//! In-memory credentials store.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::auth::{CredentialsData, CredentialsProvider};
use crate::{Error, Result};

/// Credentials kept in process memory, keyed by server URL.
#[derive(Debug, Default)]
pub struct SimpleCredentialsProvider {
    credentials: DashMap<String, CredentialsData>,
}

impl SimpleCredentialsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with one record already saved.
    pub fn with_credentials(data: CredentialsData) -> Self {
        let provider = Self::new();
        provider.credentials.insert(data.machine.clone(), data);
        provider
    }
}

#[async_trait]
impl CredentialsProvider for SimpleCredentialsProvider {
    fn store_location(&self) -> String {
        "SimpleCredentialsProvider".to_string()
    }

    async fn load(&self, url: &str) -> Result<CredentialsData> {
        self.credentials
            .get(url)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::CredentialsNotFound {
                url: url.to_string(),
            })
    }

    async fn save(&self, data: &CredentialsData) -> Result<()> {
        self.credentials.insert(data.machine.clone(), data.clone());
        Ok(())
    }

    async fn exists(&self, url: &str) -> Result<bool> {
        Ok(self.credentials.contains_key(url))
    }

    async fn remove(&self, url: &str) -> Result<()> {
        self.credentials
            .remove(url)
            .map(|_| ())
            .ok_or_else(|| Error::CredentialsNotFound {
                url: url.to_string(),
            })
    }
}
