//! Request description and the transport that executes it.

use std::fmt;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::Instrument;

use super::{Endpoint, EndpointParams, NetworkConfig};
use crate::observability::RequestSpan;
use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpVerb {
    fn as_method(self) -> reqwest::Method {
        match self {
            HttpVerb::Get => reqwest::Method::GET,
            HttpVerb::Post => reqwest::Method::POST,
            HttpVerb::Put => reqwest::Method::PUT,
            HttpVerb::Patch => reqwest::Method::PATCH,
            HttpVerb::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_method().as_str())
    }
}

/// Token attached as `Authorization: Token token="..."`.
#[derive(Clone)]
pub enum TokenHeader {
    /// Access token returned by an authenticator, base64-encoded on the wire.
    Session(SecretString),
    /// Token that is already in wire form, such as a host factory token.
    Raw(SecretString),
}

impl TokenHeader {
    pub fn header_value(&self) -> String {
        match self {
            TokenHeader::Session(token) => {
                format!("Token token=\"{}\"", STANDARD.encode(token.expose_secret()))
            }
            TokenHeader::Raw(token) => format!("Token token=\"{}\"", token.expose_secret()),
        }
    }
}

impl fmt::Debug for TokenHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenHeader::Session(_) => f.write_str("Session([redacted])"),
            TokenHeader::Raw(_) => f.write_str("Raw([redacted])"),
        }
    }
}

#[derive(Clone)]
pub struct BasicAuth {
    pub username: String,
    pub password: SecretString,
}

/// Everything a transport needs to perform one call.
#[derive(Clone)]
pub struct HttpRequest {
    pub verb: HttpVerb,
    pub endpoint: Endpoint,
    pub params: EndpointParams,
    pub body: Option<String>,
    pub basic_auth: Option<BasicAuth>,
    pub api_token: Option<TokenHeader>,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn new(verb: HttpVerb, endpoint: Endpoint, params: EndpointParams) -> Self {
        Self {
            verb,
            endpoint,
            params,
            body: None,
            basic_auth: None,
            api_token: None,
            query: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Form-encoded body; also sets the matching content type.
    pub fn form<'a>(self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.body(body)
            .header("Content-Type", "application/x-www-form-urlencoded")
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.basic_auth = Some(BasicAuth {
            username: username.into(),
            password,
        });
        self
    }

    pub fn api_token(mut self, token: TokenHeader) -> Self {
        self.api_token = Some(token);
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Rendered endpoint plus query string.
    pub fn url(&self) -> Result<String> {
        let rendered = self.endpoint.render(&self.params)?;
        if self.query.is_empty() {
            return Ok(rendered);
        }

        let mut url = url::Url::parse(&rendered)
            .map_err(|e| Error::Config(format!("Invalid url '{rendered}': {e}")))?;
        url.query_pairs_mut().extend_pairs(&self.query);
        Ok(url.into())
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("verb", &self.verb)
            .field("endpoint", &self.endpoint)
            .field("params", &self.params)
            .field("body", &self.body.as_ref().map(|_| "[redacted]"))
            .field(
                "basic_auth",
                &self.basic_auth.as_ref().map(|a| a.username.as_str()),
            )
            .field("api_token", &self.api_token)
            .field("query", &self.query.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .finish()
    }
}

/// Successful response body and metadata.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub url: String,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            url: url.into(),
            body: body.into(),
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Executes requests against the server.
///
/// Implementations must report non-2xx answers as [`Error::HttpStatus`].
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn invoke(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Default transport backed by a pooled `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let http = config
            .apply_to_builder(reqwest::Client::builder())?
            .build()?;
        Ok(Self { http })
    }

    pub fn with_http(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn check_response(response: reqwest::Response) -> Result<HttpResponse> {
        let status = response.status();
        let url = response.url().to_string();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
                url,
                response: text,
            });
        }

        let body = response.bytes().await?;
        Ok(HttpResponse::new(status.as_u16(), url, body))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn invoke(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url()?;
        let span = RequestSpan::new(request.verb.as_method().as_str(), &request.endpoint.to_string());
        tracing::debug!(parent: span.span(), "Invoking endpoint");

        let mut req = self.http.request(request.verb.as_method(), &url);

        if let Some(ref auth) = request.basic_auth {
            req = req.basic_auth(&auth.username, Some(auth.password.expose_secret()));
        }
        if let Some(ref token) = request.api_token {
            req = req.header(reqwest::header::AUTHORIZATION, token.header_value());
        }
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            req = req.body(body);
        }

        let response = match req.send().instrument(span.span().clone()).await {
            Ok(response) => response,
            Err(e) => {
                span.fail(&e);
                return Err(e.into());
            }
        };
        span.record_status(response.status().as_u16());
        let result = Self::check_response(response).await;
        span.finish();
        result
    }
}
