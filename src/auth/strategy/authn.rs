//! Default `authn` authenticator.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;

use super::AuthenticationStrategy;
use super::flow::{ApiKeyExchange, ExchangeEndpoints};
use crate::Result;
use crate::auth::{ApiToken, CredentialsProvider};
use crate::config::ConnectionInfo;
use crate::http::{Endpoint, Transport};

const ENDPOINTS: ExchangeEndpoints = ExchangeEndpoints {
    login: Endpoint::Login,
    authenticate: Endpoint::Authenticate,
};

/// Username/password login and API key authentication against `authn`.
#[derive(Debug)]
pub struct AuthnStrategy {
    exchange: ApiKeyExchange,
}

impl AuthnStrategy {
    pub fn new(provider: Arc<dyn CredentialsProvider>) -> Self {
        Self {
            exchange: ApiKeyExchange::new(provider),
        }
    }
}

#[async_trait]
impl AuthenticationStrategy for AuthnStrategy {
    fn name(&self) -> &'static str {
        "authn"
    }

    async fn login(
        &self,
        connection: &ConnectionInfo,
        transport: &dyn Transport,
    ) -> Result<SecretString> {
        let creds = self.exchange.credentials(connection.url()).await?;
        self.exchange
            .login(&creds, ENDPOINTS.login, connection.base_params(), transport)
            .await
    }

    async fn authenticate(
        &self,
        connection: &ConnectionInfo,
        transport: &dyn Transport,
    ) -> Result<ApiToken> {
        let creds = self.exchange.credentials(connection.url()).await?;
        self.exchange
            .authenticate(&creds, ENDPOINTS, connection.base_params(), transport)
            .await
    }
}
