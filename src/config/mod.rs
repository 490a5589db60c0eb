//! Connection and authentication configuration.
//!
//! ```rust
//! use conjur_api::{AuthnType, ConnectionInfo};
//!
//! let connection = ConnectionInfo::new("https://conjur.example.com/", "dev")
//!     .with_service_id("corp-ldap");
//! assert_eq!(connection.url(), "https://conjur.example.com");
//! assert_eq!("authn-ldap".parse::<AuthnType>().unwrap(), AuthnType::Ldap);
//! ```

pub mod env;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::http::EndpointParams;
use crate::{Error, Result};

use env::{
    ENV_ACCOUNT, ENV_APPLIANCE_URL, ENV_AUTHN_TYPE, ENV_CERT_FILE, ENV_PROXY, ENV_SERVICE_ID,
    env_opt,
};

/// Per-session connection data shared read-only by the client and every strategy call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionInfo {
    url: String,
    account: String,
    service_id: Option<String>,
    proxy: Option<ProxyConfig>,
    cert_file: Option<PathBuf>,
}

impl ConnectionInfo {
    pub fn new(url: impl Into<String>, account: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            account: account.into(),
            service_id: None,
            proxy: None,
            cert_file: None,
        }
    }

    /// Build from `CONJUR_*` environment variables.
    ///
    /// `CONJUR_APPLIANCE_URL` and `CONJUR_ACCOUNT` are required.
    pub fn from_env() -> Result<Self> {
        let url = env_opt(ENV_APPLIANCE_URL)
            .ok_or_else(|| Error::Config(format!("{ENV_APPLIANCE_URL} not set")))?;
        let account = env_opt(ENV_ACCOUNT)
            .ok_or_else(|| Error::Config(format!("{ENV_ACCOUNT} not set")))?;

        let mut info = Self::new(url, account);
        info.service_id = env_opt(ENV_SERVICE_ID);
        info.proxy = env_opt(ENV_PROXY).map(ProxyConfig::new);
        info.cert_file = env_opt(ENV_CERT_FILE).map(PathBuf::from);
        Ok(info)
    }

    pub fn with_service_id(mut self, service_id: impl Into<String>) -> Self {
        self.service_id = Some(service_id.into());
        self
    }

    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_cert_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cert_file = Some(path.into());
        self
    }

    /// Server base URL without a trailing slash. Also the credentials store key.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn service_id(&self) -> Option<&str> {
        self.service_id.as_deref().filter(|s| !s.is_empty())
    }

    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_ref()
    }

    pub fn cert_file(&self) -> Option<&Path> {
        self.cert_file.as_deref()
    }

    /// Endpoint parameters every request shares: `url` and `account`.
    pub fn base_params(&self) -> EndpointParams {
        EndpointParams::new()
            .with("url", &self.url)
            .with("account", &self.account)
    }

    /// Fails unless a service id is configured, naming the authenticator that needs it.
    pub fn require_service_id(&self, authenticator: &str) -> Result<&str> {
        self.service_id().ok_or_else(|| {
            Error::missing_parameter(format!("service_id is required for {authenticator}"))
        })
    }
}

/// Proxy server configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyConfig {
    pub url: String,
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Certificate validation strategy for the HTTPS transport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SslVerificationMode {
    /// Platform trust store.
    #[default]
    TrustStore,
    /// Trust the self-signed certificate in `cert_file`.
    SelfSigned,
    /// Trust the CA bundle in `cert_file` in addition to the platform roots.
    CaBundle,
    /// No certificate validation.
    Insecure,
}

impl SslVerificationMode {
    pub fn requires_cert_file(self) -> bool {
        matches!(self, Self::SelfSigned | Self::CaBundle)
    }
}

/// Authenticator kinds the server exposes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AuthnType {
    /// Username and API key (`authn`).
    #[default]
    Authn,
    /// LDAP bind through `authn-ldap/{service_id}`.
    Ldap,
    /// OIDC id token posted to `authn-oidc/{service_id}`.
    Oidc,
    /// OIDC authorization code with PKCE against `authn-oidc/{service_id}`.
    OidcCode,
}

impl AuthnType {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthnType::Authn => "authn",
            AuthnType::Ldap => "authn-ldap",
            AuthnType::Oidc => "authn-oidc",
            AuthnType::OidcCode => "authn-oidc-code",
        }
    }

    pub fn requires_service_id(self) -> bool {
        !matches!(self, AuthnType::Authn)
    }

    /// Read `CONJUR_AUTHN_TYPE`, defaulting to `authn`.
    pub fn from_env() -> Result<Self> {
        env_opt(ENV_AUTHN_TYPE)
            .map(|v| v.parse())
            .transpose()
            .map(Option::unwrap_or_default)
    }
}

impl fmt::Display for AuthnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthnType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "authn" => Ok(AuthnType::Authn),
            "authn-ldap" | "ldap" => Ok(AuthnType::Ldap),
            "authn-oidc" | "oidc" => Ok(AuthnType::Oidc),
            "authn-oidc-code" | "oidc-code" => Ok(AuthnType::OidcCode),
            other => Err(Error::Config(format!("Unknown authenticator type: {other}"))),
        }
    }
}
