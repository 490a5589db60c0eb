//! Authentication strategies for the Conjur authenticators.

mod authn;
mod flow;
mod ldap;
mod oidc;
mod traits;

use std::sync::Arc;

pub use authn::AuthnStrategy;
pub use ldap::LdapStrategy;
pub use oidc::{OidcCodeStrategy, OidcStrategy};
pub use traits::AuthenticationStrategy;

use crate::auth::CredentialsProvider;
use crate::config::AuthnType;

impl AuthnType {
    /// Strategy implementing this authenticator, reading from `provider`.
    pub fn strategy(
        self,
        provider: Arc<dyn CredentialsProvider>,
    ) -> Arc<dyn AuthenticationStrategy> {
        match self {
            AuthnType::Authn => Arc::new(AuthnStrategy::new(provider)),
            AuthnType::Ldap => Arc::new(LdapStrategy::new(provider)),
            AuthnType::Oidc => Arc::new(OidcStrategy::new(provider)),
            AuthnType::OidcCode => Arc::new(OidcCodeStrategy::new(provider)),
        }
    }
}
