//! Authentication strategy trait.

use std::fmt::Debug;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::Result;
use crate::auth::ApiToken;
use crate::config::ConnectionInfo;
use crate::http::Transport;

/// One authenticator protocol: how long-lived credentials become access tokens.
///
/// Connection details and the transport are passed on every call. A strategy
/// only keeps its credentials store and whatever API key an earlier `login`
/// produced.
#[async_trait]
pub trait AuthenticationStrategy: Send + Sync + Debug {
    /// Authenticator name as used in endpoint paths, e.g. `authn-ldap`.
    fn name(&self) -> &'static str;

    /// Exchange username and password for a long-lived API key.
    ///
    /// The key is remembered by the strategy; persisting it into the credentials
    /// store is left to the caller.
    async fn login(
        &self,
        connection: &ConnectionInfo,
        transport: &dyn Transport,
    ) -> Result<SecretString>;

    /// Obtain a fresh access token, logging in first when no API key is known yet.
    async fn authenticate(
        &self,
        connection: &ConnectionInfo,
        transport: &dyn Transport,
    ) -> Result<ApiToken>;
}
