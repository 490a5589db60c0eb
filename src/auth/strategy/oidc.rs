//! OIDC authenticators.
//!
//! Neither flavor has a login step: the evidence presented to the server is
//! either an ID token (kept in the record's password field) or the result of an
//! authorization-code exchange with PKCE.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};

use super::AuthenticationStrategy;
use crate::auth::{ApiToken, CredentialsData, CredentialsProvider, OidcCodeBundle};
use crate::config::ConnectionInfo;
use crate::http::{Endpoint, EndpointParams, HttpRequest, HttpVerb, Transport};
use crate::{Error, Result};

const SERVICE: &str = "authn-oidc";

fn oidc_params(connection: &ConnectionInfo) -> Result<EndpointParams> {
    let service_id = connection.require_service_id(SERVICE)?;
    Ok(connection.base_params().with("service_id", service_id))
}

async fn load_credentials(
    provider: &dyn CredentialsProvider,
    url: &str,
) -> Result<CredentialsData> {
    tracing::debug!(location = %provider.store_location(), "Retrieving credentials");
    provider.load(url).await
}

async fn send_id_token(
    params: EndpointParams,
    id_token: &SecretString,
    transport: &dyn Transport,
) -> Result<ApiToken> {
    tracing::debug!(flow = "id_token", "Authenticating with OIDC");
    let request = HttpRequest::new(HttpVerb::Post, Endpoint::AuthenticateOidc, params)
        .form([("id_token", id_token.expose_secret())]);
    let response = transport.invoke(request).await?;
    Ok(ApiToken::from_response(response.text(), Utc::now()))
}

async fn send_code(
    params: EndpointParams,
    bundle: &OidcCodeBundle,
    transport: &dyn Transport,
) -> Result<ApiToken> {
    tracing::debug!(flow = "code", "Authenticating with OIDC");
    let request = HttpRequest::new(HttpVerb::Get, Endpoint::AuthenticateOidc, params)
        .query("code", &bundle.code)
        .query("code_verifier", &bundle.code_verifier)
        .query("nonce", &bundle.nonce);
    let response = transport.invoke(request).await?;
    Ok(ApiToken::from_response(response.text(), Utc::now()))
}

fn login_not_supported(name: &'static str) -> Error {
    Error::NotSupported {
        component: name,
        operation: "login",
    }
}

/// Application flow: the record's password holds an ID token that is posted as
/// `id_token` form data.
pub struct OidcStrategy {
    provider: Arc<dyn CredentialsProvider>,
}

impl OidcStrategy {
    pub fn new(provider: Arc<dyn CredentialsProvider>) -> Self {
        Self { provider }
    }
}

impl std::fmt::Debug for OidcStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcStrategy")
            .field("store", &self.provider.store_location())
            .finish()
    }
}

#[async_trait]
impl AuthenticationStrategy for OidcStrategy {
    fn name(&self) -> &'static str {
        SERVICE
    }

    async fn login(&self, _: &ConnectionInfo, _: &dyn Transport) -> Result<SecretString> {
        Err(login_not_supported(SERVICE))
    }

    async fn authenticate(
        &self,
        connection: &ConnectionInfo,
        transport: &dyn Transport,
    ) -> Result<ApiToken> {
        let params = oidc_params(connection)?;
        let creds = load_credentials(self.provider.as_ref(), connection.url()).await?;

        let id_token = creds
            .password()
            .filter(|_| creds.username().is_some())
            .ok_or_else(|| {
                Error::missing_parameter("username and password are required for login")
            })?;
        send_id_token(params, id_token, transport).await
    }
}

/// Interactive flow: exchanges an authorization code bundle, falling back to
/// the ID token flow when the record carries no bundle.
pub struct OidcCodeStrategy {
    provider: Arc<dyn CredentialsProvider>,
}

impl OidcCodeStrategy {
    pub fn new(provider: Arc<dyn CredentialsProvider>) -> Self {
        Self { provider }
    }
}

impl std::fmt::Debug for OidcCodeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcCodeStrategy")
            .field("store", &self.provider.store_location())
            .finish()
    }
}

#[async_trait]
impl AuthenticationStrategy for OidcCodeStrategy {
    fn name(&self) -> &'static str {
        "authn-oidc-code"
    }

    async fn login(&self, _: &ConnectionInfo, _: &dyn Transport) -> Result<SecretString> {
        Err(login_not_supported("authn-oidc-code"))
    }

    async fn authenticate(
        &self,
        connection: &ConnectionInfo,
        transport: &dyn Transport,
    ) -> Result<ApiToken> {
        let params = oidc_params(connection)?;
        let creds = load_credentials(self.provider.as_ref(), connection.url()).await?;

        match &creds.oidc {
            Some(bundle) if bundle.is_complete() => send_code(params, bundle, transport).await,
            Some(_) => Err(Error::missing_parameter(
                "code, code_verifier and nonce are all required for the code flow",
            )),
            None => match (creds.username(), creds.password()) {
                (Some(_), Some(id_token)) => send_id_token(params, id_token, transport).await,
                _ => Err(Error::missing_parameter(
                    "code,code_verifier,nonce or username and password are required for login",
                )),
            },
        }
    }
}
