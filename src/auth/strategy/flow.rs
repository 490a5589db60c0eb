//! Login-then-authenticate exchange shared by the API key authenticators.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;

use crate::auth::{ApiToken, CredentialsData, CredentialsProvider};
use crate::http::{Endpoint, EndpointParams, HttpRequest, HttpVerb, Transport};
use crate::{Error, Result};

/// Endpoint pair of one API key authenticator.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExchangeEndpoints {
    pub login: Endpoint,
    pub authenticate: Endpoint,
}

pub(crate) struct ApiKeyExchange {
    provider: Arc<dyn CredentialsProvider>,
    api_key: RwLock<Option<SecretString>>,
}

impl ApiKeyExchange {
    pub fn new(provider: Arc<dyn CredentialsProvider>) -> Self {
        Self {
            provider,
            api_key: RwLock::new(None),
        }
    }

    pub async fn credentials(&self, url: &str) -> Result<CredentialsData> {
        tracing::debug!(location = %self.provider.store_location(), "Retrieving credentials");
        self.provider.load(url).await
    }

    pub async fn login(
        &self,
        creds: &CredentialsData,
        endpoint: Endpoint,
        params: EndpointParams,
        transport: &dyn Transport,
    ) -> Result<SecretString> {
        let password = creds
            .password()
            .ok_or_else(|| Error::missing_parameter("password is required when logging in"))?;
        let username = creds
            .username()
            .ok_or_else(|| Error::missing_parameter("username is required when logging in"))?;

        tracing::debug!(url = %creds.machine, %endpoint, "Logging in");
        let request =
            HttpRequest::new(HttpVerb::Get, endpoint, params).basic_auth(username, password.clone());
        let response = transport.invoke(request).await?;

        let api_key = SecretString::from(response.text());
        *self.api_key.write().await = Some(api_key.clone());
        Ok(api_key)
    }

    /// Key from the record, else the one learned by an earlier login.
    async fn known_api_key(&self, creds: &CredentialsData) -> Option<SecretString> {
        match creds.api_key() {
            Some(key) => Some(key.clone()),
            None => self.api_key.read().await.clone(),
        }
    }

    pub async fn authenticate(
        &self,
        creds: &CredentialsData,
        endpoints: ExchangeEndpoints,
        params: EndpointParams,
        transport: &dyn Transport,
    ) -> Result<ApiToken> {
        let mut api_key = self.known_api_key(creds).await;
        if api_key.is_none() && creds.can_login() {
            api_key = Some(
                self.login(creds, endpoints.login, params.clone(), transport)
                    .await?,
            );
        }

        let (Some(username), Some(api_key)) = (creds.username(), api_key) else {
            return Err(Error::missing_parameter(
                "Missing parameters in authentication invocation",
            ));
        };

        tracing::debug!(url = %creds.machine, endpoint = %endpoints.authenticate, "Authenticating");
        let request = HttpRequest::new(
            HttpVerb::Post,
            endpoints.authenticate,
            params.with("login", username),
        )
        .body(api_key.expose_secret());
        let response = transport.invoke(request).await?;

        Ok(ApiToken::from_response(response.text(), Utc::now()))
    }
}

impl fmt::Debug for ApiKeyExchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyExchange")
            .field("store", &self.provider.store_location())
            .finish_non_exhaustive()
    }
}
