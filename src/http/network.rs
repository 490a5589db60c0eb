//! Network configuration for proxy, TLS trust material and timeouts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{ConnectionInfo, ProxyConfig, SslVerificationMode};
use crate::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Network configuration for the HTTP transport.
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// Proxy configuration
    pub proxy: Option<ProxyConfig>,
    /// Certificate validation mode
    pub ssl_mode: SslVerificationMode,
    /// PEM certificate or bundle used by `SelfSigned` and `CaBundle`
    pub cert_file: Option<PathBuf>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            proxy: None,
            ssl_mode: SslVerificationMode::default(),
            cert_file: None,
        }
    }
}

impl NetworkConfig {
    /// Take proxy and trust material from the connection.
    pub fn for_connection(connection: &ConnectionInfo, ssl_mode: SslVerificationMode) -> Self {
        Self {
            proxy: connection.proxy().cloned(),
            cert_file: connection.cert_file().map(Path::to_path_buf),
            ssl_mode,
            ..Self::default()
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn ssl_mode(mut self, mode: SslVerificationMode) -> Self {
        self.ssl_mode = mode;
        self
    }

    pub fn cert_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cert_file = Some(path.into());
        self
    }

    /// Check the combination of settings before any I/O happens.
    pub fn validate(&self) -> Result<()> {
        if self.ssl_mode.requires_cert_file() && self.cert_file.is_none() {
            return Err(Error::BadInitialization(format!(
                "cert_file is required for {:?} ssl verification",
                self.ssl_mode
            )));
        }
        Ok(())
    }

    /// Apply configuration to reqwest ClientBuilder.
    pub fn apply_to_builder(
        &self,
        mut builder: reqwest::ClientBuilder,
    ) -> Result<reqwest::ClientBuilder> {
        self.validate()?;

        builder = builder.timeout(self.timeout);

        if let Some(ref proxy) = self.proxy {
            builder = builder.proxy(reqwest::Proxy::all(&proxy.url)?);
        }

        match self.ssl_mode {
            SslVerificationMode::TrustStore => {}
            SslVerificationMode::SelfSigned | SslVerificationMode::CaBundle => {
                if let Some(ref path) = self.cert_file {
                    let pem = std::fs::read(path)?;
                    for cert in reqwest::Certificate::from_pem_bundle(&pem)? {
                        builder = builder.add_root_certificate(cert);
                    }
                }
            }
            SslVerificationMode::Insecure => {
                tracing::warn!(
                    "Certificate verification is disabled; connections are vulnerable to interception"
                );
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        Ok(builder)
    }
}
