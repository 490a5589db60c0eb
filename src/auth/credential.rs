//! Credential records kept per server.

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Evidence from an OIDC authorization-code exchange with PKCE.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcCodeBundle {
    pub code: String,
    pub code_verifier: String,
    pub nonce: String,
}

impl OidcCodeBundle {
    pub fn new(
        code: impl Into<String>,
        code_verifier: impl Into<String>,
        nonce: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            code_verifier: code_verifier.into(),
            nonce: nonce.into(),
        }
    }

    /// All three values are present.
    pub fn is_complete(&self) -> bool {
        !self.code.is_empty() && !self.code_verifier.is_empty() && !self.nonce.is_empty()
    }
}

impl fmt::Debug for OidcCodeBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OidcCodeBundle")
            .field("code", &mask(!self.code.is_empty()))
            .field("code_verifier", &mask(!self.code_verifier.is_empty()))
            .field("nonce", &self.nonce)
            .finish()
    }
}

/// Credentials for one server, keyed by `machine` (the server URL).
///
/// Strategies read this record on every call; nothing here is ever deleted by
/// the authentication code itself.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialsData {
    pub machine: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "secret_opt")]
    pub password: Option<SecretString>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "secret_opt")]
    pub api_key: Option<SecretString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc: Option<OidcCodeBundle>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "secret_opt")]
    pub cached_token: Option<SecretString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expiry: Option<DateTime<Utc>>,
}

impl CredentialsData {
    pub fn new(machine: impl Into<String>) -> Self {
        Self {
            machine: machine.into(),
            ..Self::default()
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn with_oidc_code(mut self, bundle: OidcCodeBundle) -> Self {
        self.oidc = Some(bundle);
        self
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref().filter(|u| !u.is_empty())
    }

    pub fn password(&self) -> Option<&SecretString> {
        self.password
            .as_ref()
            .filter(|p| !p.expose_secret().is_empty())
    }

    pub fn api_key(&self) -> Option<&SecretString> {
        self.api_key
            .as_ref()
            .filter(|k| !k.expose_secret().is_empty())
    }

    /// Username and password are both present, so a login can be attempted.
    pub fn can_login(&self) -> bool {
        self.username().is_some() && self.password().is_some()
    }

    /// Cached token that is still usable at `now`.
    pub fn valid_cached_token(&self, now: DateTime<Utc>) -> Option<(&SecretString, DateTime<Utc>)> {
        match (&self.cached_token, self.token_expiry) {
            (Some(token), Some(expiry)) if now < expiry => Some((token, expiry)),
            _ => None,
        }
    }
}

impl PartialEq for CredentialsData {
    fn eq(&self, other: &Self) -> bool {
        fn exposed(value: &Option<SecretString>) -> Option<&str> {
            value.as_ref().map(|s| s.expose_secret())
        }

        self.machine == other.machine
            && self.username == other.username
            && exposed(&self.password) == exposed(&other.password)
            && exposed(&self.api_key) == exposed(&other.api_key)
            && self.oidc == other.oidc
            && exposed(&self.cached_token) == exposed(&other.cached_token)
            && self.token_expiry == other.token_expiry
    }
}

impl fmt::Debug for CredentialsData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsData")
            .field("machine", &self.machine)
            .field("username", &self.username)
            .field("password", &mask(self.password.is_some()))
            .field("api_key", &mask(self.api_key.is_some()))
            .field("oidc", &self.oidc)
            .field("cached_token", &mask(self.cached_token.is_some()))
            .field("token_expiry", &self.token_expiry)
            .finish()
    }
}

fn mask(present: bool) -> Option<&'static str> {
    present.then_some("****")
}

mod secret_opt {
    use secrecy::{ExposeSecret, SecretString};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<SecretString>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(secret) => serializer.serialize_some(secret.expose_secret()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<SecretString>, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
    }
}
