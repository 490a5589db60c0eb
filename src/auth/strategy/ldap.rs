//! LDAP authenticator.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;

use super::AuthenticationStrategy;
use super::flow::{ApiKeyExchange, ExchangeEndpoints};
use crate::Result;
use crate::auth::{ApiToken, CredentialsProvider};
use crate::config::ConnectionInfo;
use crate::http::{Endpoint, EndpointParams, Transport};

const NAME: &str = "authn-ldap";

const ENDPOINTS: ExchangeEndpoints = ExchangeEndpoints {
    login: Endpoint::LoginLdap,
    authenticate: Endpoint::AuthenticateLdap,
};

/// Same exchange as [`super::AuthnStrategy`], routed through `authn-ldap/{service_id}`.
#[derive(Debug)]
pub struct LdapStrategy {
    exchange: ApiKeyExchange,
}

impl LdapStrategy {
    pub fn new(provider: Arc<dyn CredentialsProvider>) -> Self {
        Self {
            exchange: ApiKeyExchange::new(provider),
        }
    }

    fn params(connection: &ConnectionInfo) -> Result<EndpointParams> {
        let service_id = connection.require_service_id(NAME)?;
        Ok(connection.base_params().with("service_id", service_id))
    }
}

#[async_trait]
impl AuthenticationStrategy for LdapStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn login(
        &self,
        connection: &ConnectionInfo,
        transport: &dyn Transport,
    ) -> Result<SecretString> {
        let params = Self::params(connection)?;
        let creds = self.exchange.credentials(connection.url()).await?;
        self.exchange
            .login(&creds, ENDPOINTS.login, params, transport)
            .await
    }

    async fn authenticate(
        &self,
        connection: &ConnectionInfo,
        transport: &dyn Transport,
    ) -> Result<ApiToken> {
        let params = Self::params(connection)?;
        let creds = self.exchange.credentials(connection.url()).await?;
        self.exchange
            .authenticate(&creds, ENDPOINTS, params, transport)
            .await
    }
}
