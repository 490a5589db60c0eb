//! Authentication for the Conjur API.
//!
//! - **Credentials stores**: where per-server records live ([`CredentialsProvider`])
//! - **Strategies**: `authn`, `authn-ldap`, `authn-oidc` (ID token and code flows)
//! - **Tokens**: access tokens with claim-derived expiry and the [`TokenCache`]

mod cache;
mod credential;
mod provider;
mod providers;
mod strategy;
mod token;

pub use cache::TokenCache;
pub use credential::{CredentialsData, OidcCodeBundle};
pub use provider::CredentialsProvider;
pub use providers::{EnvironmentProvider, FileCredentialsProvider, SimpleCredentialsProvider};
pub use strategy::{
    AuthenticationStrategy, AuthnStrategy, LdapStrategy, OidcCodeStrategy, OidcStrategy,
};
pub use token::{
    ApiToken, DEFAULT_TOKEN_LIFETIME, TOKEN_EXPIRY_BUFFER, TokenClaimError, decode_expiration,
    token_expiry,
};
