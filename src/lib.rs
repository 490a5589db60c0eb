//! # conjur-api
//!
//! Rust SDK for the Conjur secrets manager.
//!
//! The heart of the crate is the authentication lifecycle: pluggable
//! [`AuthenticationStrategy`] implementations exchange long-lived credentials for
//! short-lived API tokens, and the [`Client`] caches those tokens until they expire
//! so that every authenticated call costs at most one extra round-trip.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use conjur_api::{
//!     AuthnType, Client, ConnectionInfo, CredentialsData, CredentialsProvider,
//!     SimpleCredentialsProvider,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), conjur_api::Error> {
//!     let connection = ConnectionInfo::new("https://conjur.example.com", "dev");
//!
//!     let provider = Arc::new(SimpleCredentialsProvider::new());
//!     provider
//!         .save(
//!             &CredentialsData::new(connection.url())
//!                 .with_username("alice")
//!                 .with_password("s3cret"),
//!         )
//!         .await?;
//!
//!     let client = Client::builder()
//!         .connection(connection)
//!         .credentials_provider(provider)
//!         .authn_type(AuthnType::Authn)
//!         .build()?;
//!
//!     let value = client.get_variable("db/password", None).await?;
//!     println!("{} bytes", value.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Blocking usage
//!
//! [`ClientBuilder::build_blocking`] returns a [`BlockingClient`] that drives the same
//! operations on a private runtime. It refuses to run inside an existing tokio runtime.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod auth;
pub mod client;
pub mod config;
pub mod http;
pub mod observability;
pub mod prelude;

pub use auth::{
    ApiToken, AuthenticationStrategy, AuthnStrategy, CredentialsData, CredentialsProvider,
    DEFAULT_TOKEN_LIFETIME, EnvironmentProvider, FileCredentialsProvider, LdapStrategy,
    OidcCodeBundle, OidcCodeStrategy, OidcStrategy, SimpleCredentialsProvider,
    TOKEN_EXPIRY_BUFFER, TokenCache, TokenClaimError,
};
pub use client::{
    BlockingClient, Client, ClientBuilder, CreateHostData, CreateTokenData, CreatedRole,
    HostFactoryToken, ListMembersQuery, ListResourcesQuery, PolicyResult, Resource, WhoAmI,
};
pub use config::{AuthnType, ConnectionInfo, ProxyConfig, SslVerificationMode};
pub use http::{
    Endpoint, EndpointParams, HttpRequest, HttpResponse, HttpVerb, NetworkConfig,
    ReqwestTransport, TokenHeader, Transport,
};

/// Error type for conjur-api operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A precondition of the requested operation is unmet. Raised before any request is sent.
    #[error("Missing required parameter: {0}")]
    MissingRequiredParameter(String),

    /// An authenticated operation was attempted without an obtainable API token.
    #[error("{0}")]
    MissingApiToken(String),

    /// The server answered with a non-2xx status.
    #[error("{status} ({message}) for url: {url}")]
    HttpStatus {
        status: u16,
        message: String,
        url: String,
        response: String,
    },

    /// Network connectivity, TLS or request construction failed.
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// File system operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The credentials store holds no record for the server.
    #[error("No credentials stored for {url}")]
    CredentialsNotFound { url: String },

    /// A resource or endpoint does not exist on the server.
    #[error("Resource not found: {resource}{}", details.as_deref().map(|d| format!("\n{d}")).unwrap_or_default())]
    ResourceNotFound {
        resource: String,
        details: Option<String>,
    },

    /// The resource kind is not valid for the operation.
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// An object was constructed from an invalid combination of settings.
    #[error("Bad initialization: {0}")]
    BadInitialization(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation not available for the given strategy or store.
    #[error("{operation} is not supported by {component}")]
    NotSupported {
        component: &'static str,
        operation: &'static str,
    },

    /// The blocking client was used from inside a running tokio runtime.
    #[error("Client cannot be used inside an async runtime when built in blocking mode")]
    SyncInvocationInsideRuntime,
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Authentication or authorization failures (missing credentials, 401, 403)
    Authorization,
    /// Configuration, parameter or setup errors
    Configuration,
    /// Network, TLS and server-side failures
    Transport,
    /// Missing records or resources
    NotFound,
    /// Internal errors (IO, JSON, misuse)
    Internal,
}

pub const MISSING_API_TOKEN_MESSAGE: &str =
    "API token missing or expired. Please provide a valid one.";

impl Error {
    pub fn missing_parameter(message: impl Into<String>) -> Self {
        Error::MissingRequiredParameter(message.into())
    }

    pub fn missing_api_token() -> Self {
        Error::MissingApiToken(MISSING_API_TOKEN_MESSAGE.to_string())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MissingApiToken(_)
            | Error::HttpStatus {
                status: 401 | 403, ..
            } => ErrorCategory::Authorization,

            Error::MissingRequiredParameter(_)
            | Error::BadInitialization(_)
            | Error::Config(_)
            | Error::InvalidResource(_)
            | Error::NotSupported { .. } => ErrorCategory::Configuration,

            Error::HttpStatus { status: 404, .. }
            | Error::CredentialsNotFound { .. }
            | Error::ResourceNotFound { .. } => ErrorCategory::NotFound,

            Error::Network(_) | Error::HttpStatus { .. } => ErrorCategory::Transport,

            Error::Json(_) | Error::Io(_) | Error::SyncInvocationInsideRuntime => {
                ErrorCategory::Internal
            }
        }
    }

    /// HTTP status carried by the error, if it came from a server response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            Error::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Error::HttpStatus { status: 401, .. } | Error::MissingApiToken(_)
        )
    }

    pub fn is_missing_parameter(&self) -> bool {
        matches!(self, Error::MissingRequiredParameter(_))
    }
}

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_display() {
        let err = Error::HttpStatus {
            status: 401,
            message: "Unauthorized".into(),
            url: "https://conjur/authn/dev/login".into(),
            response: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "401 (Unauthorized) for url: https://conjur/authn/dev/login"
        );
        assert!(err.is_unauthorized());
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.category(), ErrorCategory::Authorization);
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            Error::missing_parameter("service_id").category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            Error::CredentialsNotFound { url: "u".into() }.category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            Error::HttpStatus {
                status: 502,
                message: "Bad Gateway".into(),
                url: "u".into(),
                response: String::new(),
            }
            .category(),
            ErrorCategory::Transport
        );
        assert_eq!(
            Error::SyncInvocationInsideRuntime.category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn test_missing_api_token_message() {
        let err = Error::missing_api_token();
        assert_eq!(err.to_string(), MISSING_API_TOKEN_MESSAGE);
        assert!(err.is_unauthorized());
    }

    #[test]
    fn test_resource_not_found_details() {
        let err = Error::ResourceNotFound {
            resource: "info".into(),
            details: Some("enterprise only".into()),
        };
        assert_eq!(err.to_string(), "Resource not found: info\nenterprise only");
    }
}
