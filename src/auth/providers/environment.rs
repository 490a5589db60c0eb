//! Environment variable credentials source.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::auth::{CredentialsData, CredentialsProvider};
use crate::config::env::{ENV_AUTHN_API_KEY, ENV_AUTHN_LOGIN, ENV_AUTHN_PASSWORD, env_opt};
use crate::{Error, Result};

/// Read-only provider that builds a record from `CONJUR_AUTHN_*` variables.
///
/// The same record is returned for any server URL. Variables are read on every
/// `load`, so a rotated API key is picked up without rebuilding the client.
#[derive(Debug, Clone)]
pub struct EnvironmentProvider {
    login_var: String,
    password_var: String,
    api_key_var: String,
}

impl EnvironmentProvider {
    /// Provider using `CONJUR_AUTHN_LOGIN`, `CONJUR_AUTHN_PASSWORD` and `CONJUR_AUTHN_API_KEY`.
    pub fn new() -> Self {
        Self {
            login_var: ENV_AUTHN_LOGIN.to_string(),
            password_var: ENV_AUTHN_PASSWORD.to_string(),
            api_key_var: ENV_AUTHN_API_KEY.to_string(),
        }
    }

    /// Provider reading `{prefix}LOGIN`, `{prefix}PASSWORD` and `{prefix}API_KEY`.
    pub fn prefixed(prefix: &str) -> Self {
        Self {
            login_var: format!("{prefix}LOGIN"),
            password_var: format!("{prefix}PASSWORD"),
            api_key_var: format!("{prefix}API_KEY"),
        }
    }

    fn read(&self, url: &str) -> Option<CredentialsData> {
        let username = env_opt(&self.login_var);
        let password = env_opt(&self.password_var).map(SecretString::from);
        let api_key = env_opt(&self.api_key_var).map(SecretString::from);

        if username.is_none() && password.is_none() && api_key.is_none() {
            return None;
        }

        Some(CredentialsData {
            machine: url.to_string(),
            username,
            password,
            api_key,
            ..CredentialsData::default()
        })
    }
}

impl Default for EnvironmentProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialsProvider for EnvironmentProvider {
    fn store_location(&self) -> String {
        format!("environment ({})", self.login_var)
    }

    async fn load(&self, url: &str) -> Result<CredentialsData> {
        self.read(url).ok_or_else(|| Error::CredentialsNotFound {
            url: url.to_string(),
        })
    }

    async fn save(&self, _data: &CredentialsData) -> Result<()> {
        Err(Error::NotSupported {
            component: "environment credentials",
            operation: "save",
        })
    }

    async fn exists(&self, url: &str) -> Result<bool> {
        Ok(self.read(url).is_some())
    }

    async fn remove(&self, _url: &str) -> Result<()> {
        Err(Error::NotSupported {
            component: "environment credentials",
            operation: "remove",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[tokio::test]
    async fn test_environment_provider_missing() {
        let provider = EnvironmentProvider::prefixed("CONJUR_TEST_UNSET_");
        assert!(!provider.exists("https://conjur").await.unwrap());
        assert!(matches!(
            provider.load("https://conjur").await,
            Err(Error::CredentialsNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_environment_provider_set() {
        // SAFETY: Test-only environment setup with a prefix no other test uses
        unsafe {
            std::env::set_var("CONJUR_TEST_SET_LOGIN", "host/app");
            std::env::set_var("CONJUR_TEST_SET_API_KEY", "APIKEY123");
        }

        let provider = EnvironmentProvider::prefixed("CONJUR_TEST_SET_");
        let creds = provider.load("https://conjur").await.unwrap();
        assert_eq!(creds.machine, "https://conjur");
        assert_eq!(creds.username(), Some("host/app"));
        assert_eq!(creds.api_key().unwrap().expose_secret(), "APIKEY123");
        assert!(creds.password().is_none());

        unsafe {
            std::env::remove_var("CONJUR_TEST_SET_LOGIN");
            std::env::remove_var("CONJUR_TEST_SET_API_KEY");
        }
    }

    #[tokio::test]
    async fn test_environment_provider_is_read_only() {
        let provider = EnvironmentProvider::new();
        let data = CredentialsData::new("https://conjur");
        assert!(matches!(
            provider.save(&data).await,
            Err(Error::NotSupported { .. })
        ));
        assert!(matches!(
            provider.remove("https://conjur").await,
            Err(Error::NotSupported { .. })
        ));
    }
}
