//! Conjur API client with cached access tokens.

mod blocking;
pub mod models;

pub use blocking::BlockingClient;
pub use models::{
    CreateHostData, CreateTokenData, CreatedRole, HostFactoryToken, ListMembersQuery,
    ListResourcesQuery, PolicyResult, Resource, WhoAmI,
};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::auth::{
    ApiToken, AuthenticationStrategy, CredentialsProvider, TokenCache, token_expiry,
};
use crate::config::{AuthnType, ConnectionInfo, ProxyConfig, SslVerificationMode};
use crate::http::{
    Endpoint, HttpRequest, HttpResponse, HttpVerb, NetworkConfig, ReqwestTransport, TokenHeader,
    Transport,
};
use crate::{Error, Result};
use models::KIND_VARIABLE;

const ENTERPRISE_ONLY: &str = "get_server_info is a Conjur Enterprise feature only. Make sure the \
     Conjur url is valid and you are working against a Conjur Enterprise server";

/// Async client for one Conjur server and account.
///
/// Every authenticated operation attaches an access token from the shared
/// [`TokenCache`], authenticating only when the cached token is missing or
/// expired. Clones share the cache.
#[derive(Clone)]
pub struct Client {
    connection: Arc<ConnectionInfo>,
    transport: Arc<dyn Transport>,
    provider: Option<Arc<dyn CredentialsProvider>>,
    strategy: Option<Arc<dyn AuthenticationStrategy>>,
    cache: Arc<TokenCache>,
    persist_token: bool,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn connection(&self) -> &ConnectionInfo {
        &self.connection
    }

    pub fn strategy(&self) -> Option<&dyn AuthenticationStrategy> {
        self.strategy.as_deref()
    }

    fn require_strategy(&self) -> Result<&dyn AuthenticationStrategy> {
        self.strategy().ok_or_else(|| {
            Error::BadInitialization("no authentication strategy is configured".into())
        })
    }

    /// A valid access token, authenticating on a cache miss.
    ///
    /// Two callers racing on an expired token may both authenticate; the last
    /// token stored wins. A failed authentication leaves the cache untouched.
    pub async fn api_token(&self) -> Result<ApiToken> {
        if let Some(token) = self.cache.valid_token().await {
            tracing::debug!("Using cached API token");
            return Ok(token);
        }

        if self.persist_token
            && let Some(token) = self.stored_token().await?
        {
            tracing::debug!("Using API token from credentials store");
            self.cache.store(token.clone()).await;
            return Ok(token);
        }

        let Some(strategy) = self.strategy() else {
            tracing::debug!("API token missing or expired and no strategy to fetch one");
            return Err(Error::missing_api_token());
        };

        tracing::debug!(strategy = strategy.name(), "API token missing or expired, fetching a new one");
        let token = strategy
            .authenticate(&self.connection, self.transport.as_ref())
            .await?;
        self.remember(token.clone()).await?;
        Ok(token)
    }

    async fn stored_token(&self) -> Result<Option<ApiToken>> {
        let Some(provider) = &self.provider else {
            return Ok(None);
        };
        let creds = match provider.load(self.connection.url()).await {
            Ok(creds) => creds,
            Err(Error::CredentialsNotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(creds
            .valid_cached_token(Utc::now())
            .map(|(token, expiry)| ApiToken::new(token.expose_secret(), expiry)))
    }

    /// Persist `token` when enabled, then cache it. Nothing is cached when
    /// persisting fails.
    async fn remember(&self, token: ApiToken) -> Result<()> {
        if self.persist_token
            && let Some(provider) = &self.provider
        {
            let mut creds = provider.load(self.connection.url()).await?;
            creds.cached_token = Some(token.secret().clone());
            creds.token_expiry = Some(token.expires_at());
            provider.save(&creds).await?;
        }

        self.cache.store(token).await;
        Ok(())
    }

    /// Exchange the stored username and password for an API key.
    pub async fn login(&self) -> Result<SecretString> {
        self.require_strategy()?
            .login(&self.connection, self.transport.as_ref())
            .await
    }

    /// Fetch a fresh access token regardless of the cache, then cache it.
    pub async fn authenticate(&self) -> Result<ApiToken> {
        let token = self
            .require_strategy()?
            .authenticate(&self.connection, self.transport.as_ref())
            .await?;
        self.remember(token.clone()).await?;
        Ok(token)
    }

    /// Use an externally obtained access token.
    ///
    /// Without `expires_at` the expiry is derived from the token's claims.
    pub async fn set_api_token(&self, token: impl Into<String>, expires_at: Option<DateTime<Utc>>) {
        let token = token.into();
        let now = Utc::now();
        let expires_at = expires_at.unwrap_or_else(|| token_expiry(&token, now));
        self.cache.store(ApiToken::new(token, expires_at)).await;
    }

    pub async fn invalidate_token(&self) {
        self.cache.invalidate().await;
    }

    pub async fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.cache.expires_at().await
    }

    async fn invoke_authorized(&self, request: HttpRequest) -> Result<HttpResponse> {
        let token = self.api_token().await?;
        self.transport
            .invoke(request.api_token(TokenHeader::Session(token.secret().clone())))
            .await
    }

    pub async fn whoami(&self) -> Result<WhoAmI> {
        let request = HttpRequest::new(HttpVerb::Get, Endpoint::Whoami, self.connection.base_params());
        self.invoke_authorized(request).await?.json()
    }

    /// Node information. Only Conjur Enterprise serves this endpoint.
    pub async fn get_server_info(&self) -> Result<serde_json::Value> {
        let request = HttpRequest::new(HttpVerb::Get, Endpoint::Info, self.connection.base_params());
        match self.transport.invoke(request).await {
            Ok(response) => response.json(),
            Err(Error::HttpStatus {
                status: 404, url, ..
            }) => Err(Error::ResourceNotFound {
                resource: url,
                details: Some(ENTERPRISE_ONLY.to_string()),
            }),
            Err(e) => Err(e),
        }
    }

    /// Ids of the resources visible to the caller.
    pub async fn list_resources(&self, query: &ListResourcesQuery) -> Result<Vec<String>> {
        #[derive(serde::Deserialize)]
        struct Listed {
            id: String,
        }

        let listed: Vec<Listed> = self.list_resources_raw(query).await?.json()?;
        Ok(listed.into_iter().map(|r| r.id).collect())
    }

    /// Full resource documents, as returned by the server.
    pub async fn list_resources_detailed(
        &self,
        query: &ListResourcesQuery,
    ) -> Result<Vec<serde_json::Value>> {
        self.list_resources_raw(query).await?.json()
    }

    async fn list_resources_raw(&self, query: &ListResourcesQuery) -> Result<HttpResponse> {
        let request = query.pairs().into_iter().fold(
            HttpRequest::new(HttpVerb::Get, Endpoint::Resources, self.connection.base_params()),
            |request, (name, value)| request.query(name, value),
        );
        self.invoke_authorized(request).await
    }

    /// Resources whose identifier is exactly `identifier`, of any kind.
    pub async fn find_resources_by_identifier(&self, identifier: &str) -> Result<Vec<Resource>> {
        let ids = self
            .list_resources(&ListResourcesQuery::new().search(identifier))
            .await?;

        let mut found = Vec::new();
        for id in ids {
            let resource = Resource::from_full_id(&id)?;
            if resource.identifier == identifier {
                found.push(resource);
            }
        }
        Ok(found)
    }

    /// The single resource named `identifier`; ambiguity is an error.
    pub async fn find_resource_by_identifier(&self, identifier: &str) -> Result<Resource> {
        let mut resources = self.find_resources_by_identifier(identifier).await?;
        match resources.len() {
            0 => Err(Error::ResourceNotFound {
                resource: identifier.to_string(),
                details: None,
            }),
            1 => Ok(resources.remove(0)),
            _ => Err(Error::missing_parameter(format!(
                "Ambiguous resource identifier: {identifier}. There are multiple resources with this identifier: ({})",
                resources
                    .iter()
                    .map(Resource::full_id)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    /// Ids of the direct and indirect members of a role.
    pub async fn list_members_of_role(&self, query: &ListMembersQuery) -> Result<Vec<String>> {
        #[derive(serde::Deserialize)]
        struct Membership {
            member: String,
        }

        let members: Vec<Membership> = self.list_members_raw(query).await?.json()?;
        Ok(members.into_iter().map(|m| m.member).collect())
    }

    /// Full membership documents, including admin option and ownership.
    pub async fn list_members_of_role_detailed(
        &self,
        query: &ListMembersQuery,
    ) -> Result<Vec<serde_json::Value>> {
        self.list_members_raw(query).await?.json()
    }

    async fn list_members_raw(&self, query: &ListMembersQuery) -> Result<HttpResponse> {
        query.role.ensure_named()?;
        let params = self
            .connection
            .base_params()
            .with("kind", &query.role.kind)
            .with("identifier", &query.role.identifier);
        let request = query.pairs().into_iter().fold(
            HttpRequest::new(HttpVerb::Get, Endpoint::RoleMembers, params),
            |request, (name, value)| request.query(name, value),
        );
        self.invoke_authorized(request).await
    }

    /// Ids of the roles holding `privilege` on `resource`.
    pub async fn list_permitted_roles(
        &self,
        resource: &Resource,
        privilege: &str,
    ) -> Result<Vec<String>> {
        resource.ensure_named()?;
        if privilege.trim().is_empty() {
            return Err(Error::missing_parameter(
                "Missing required parameter, 'privilege'",
            ));
        }

        let params = self
            .connection
            .base_params()
            .with("kind", &resource.kind)
            .with("identifier", &resource.identifier);
        let request = HttpRequest::new(HttpVerb::Get, Endpoint::Resource, params)
            .query("permitted_roles", "true")
            .query("privilege", privilege);
        self.invoke_authorized(request).await?.json()
    }

    /// Raw secret value, optionally at a specific version.
    pub async fn get_variable(&self, variable_id: &str, version: Option<&str>) -> Result<Bytes> {
        let params = self
            .connection
            .base_params()
            .with("kind", KIND_VARIABLE)
            .with("identifier", variable_id);
        let mut request = HttpRequest::new(HttpVerb::Get, Endpoint::Secrets, params);
        if let Some(version) = version {
            request = request.query("version", version);
        }
        Ok(self.invoke_authorized(request).await?.body)
    }

    /// Several secrets in one call, keyed by the ids as given.
    pub async fn get_variables(&self, variable_ids: &[&str]) -> Result<BTreeMap<String, String>> {
        if variable_ids.is_empty() {
            return Err(Error::missing_parameter("variable ids must not be empty"));
        }

        let account = self.connection.account();
        let qualified = variable_ids
            .iter()
            .map(|id| format!("{account}:{KIND_VARIABLE}:{id}"))
            .collect::<Vec<_>>()
            .join(",");
        let request = HttpRequest::new(
            HttpVerb::Get,
            Endpoint::BatchSecrets,
            self.connection.base_params(),
        )
        .query("variable_ids", qualified);

        let values: BTreeMap<String, String> = self.invoke_authorized(request).await?.json()?;
        let prefix = format!("{account}:{KIND_VARIABLE}:");
        Ok(values
            .into_iter()
            .map(|(id, value)| match id.strip_prefix(&prefix) {
                Some(short) => (short.to_string(), value),
                None => (id, value),
            })
            .collect())
    }

    pub async fn set_variable(&self, variable_id: &str, value: &str) -> Result<()> {
        let params = self
            .connection
            .base_params()
            .with("kind", KIND_VARIABLE)
            .with("identifier", variable_id);
        let request = HttpRequest::new(HttpVerb::Post, Endpoint::Secrets, params).body(value);
        self.invoke_authorized(request).await?;
        Ok(())
    }

    /// Load a policy document into `policy_id`, adding to what is there.
    pub async fn load_policy(&self, policy_id: &str, policy: &str) -> Result<PolicyResult> {
        self.apply_policy(HttpVerb::Post, policy_id, policy).await
    }

    /// Replace the policy at `policy_id`, deleting anything it no longer declares.
    pub async fn replace_policy(&self, policy_id: &str, policy: &str) -> Result<PolicyResult> {
        self.apply_policy(HttpVerb::Put, policy_id, policy).await
    }

    /// Update the policy at `policy_id`, allowing explicit deletions.
    pub async fn update_policy(&self, policy_id: &str, policy: &str) -> Result<PolicyResult> {
        self.apply_policy(HttpVerb::Patch, policy_id, policy).await
    }

    async fn apply_policy(
        &self,
        verb: HttpVerb,
        policy_id: &str,
        policy: &str,
    ) -> Result<PolicyResult> {
        let params = self.connection.base_params().with("identifier", policy_id);
        let request = HttpRequest::new(verb, Endpoint::Policies, params).body(policy);
        self.invoke_authorized(request).await?.json()
    }

    /// Rotate the API key of another user or host.
    pub async fn rotate_other_api_key(&self, resource: &Resource) -> Result<SecretString> {
        if !matches!(resource.kind.as_str(), "user" | "host") {
            return Err(Error::InvalidResource(format!(
                "API keys can only be rotated for users and hosts, not '{}'",
                resource.kind
            )));
        }

        let request = HttpRequest::new(
            HttpVerb::Put,
            Endpoint::RotateApiKey,
            self.connection.base_params(),
        )
        .query("role", resource.full_id());
        let response = self.invoke_authorized(request).await?;
        Ok(SecretString::from(response.text()))
    }

    /// Rotate the caller's own API key using their password.
    ///
    /// When the credentials store holds a record for this user, its API key is
    /// replaced with the new one.
    pub async fn rotate_personal_api_key(
        &self,
        login: &str,
        current_password: SecretString,
    ) -> Result<SecretString> {
        let request = HttpRequest::new(
            HttpVerb::Put,
            Endpoint::RotateApiKey,
            self.connection.base_params(),
        )
        .basic_auth(login, current_password);
        let api_key = SecretString::from(self.transport.invoke(request).await?.text());

        if let Some(provider) = &self.provider {
            let stored = match provider.load(self.connection.url()).await {
                Ok(creds) => Some(creds),
                Err(Error::CredentialsNotFound { .. }) => None,
                Err(e) => return Err(e),
            };
            if stored.is_some_and(|creds| creds.username() == Some(login)) {
                provider
                    .update_api_key(self.connection.url(), api_key.clone())
                    .await?;
            }
        }
        Ok(api_key)
    }

    pub async fn change_personal_password(
        &self,
        login: &str,
        current_password: SecretString,
        new_password: SecretString,
    ) -> Result<()> {
        let request = HttpRequest::new(
            HttpVerb::Put,
            Endpoint::ChangePassword,
            self.connection.base_params(),
        )
        .basic_auth(login, current_password)
        .body(new_password.expose_secret());
        self.transport.invoke(request).await?;
        Ok(())
    }

    /// Issue host factory tokens.
    pub async fn create_token(&self, data: &CreateTokenData) -> Result<Vec<HostFactoryToken>> {
        let pairs = data.form_pairs(self.connection.account(), Utc::now());
        let request = HttpRequest::new(
            HttpVerb::Post,
            Endpoint::HostFactoryTokens,
            self.connection.base_params(),
        )
        .form(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        self.invoke_authorized(request).await?.json()
    }

    /// Revoke a host factory token; returns the response status.
    pub async fn revoke_token(&self, token: &str) -> Result<u16> {
        if token.is_empty() {
            return Err(Error::missing_parameter("token is empty"));
        }
        let params = self.connection.base_params().with("token", token);
        let request = HttpRequest::new(HttpVerb::Delete, Endpoint::HostFactoryRevokeToken, params);
        Ok(self.invoke_authorized(request).await?.status)
    }

    /// Enroll a host with a host factory token. No access token is used.
    pub async fn create_host(&self, data: &CreateHostData) -> Result<serde_json::Value> {
        let pairs = data.form_pairs();
        let request = HttpRequest::new(
            HttpVerb::Post,
            Endpoint::HostFactoryHosts,
            self.connection.base_params(),
        )
        .form(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .api_token(TokenHeader::Raw(data.token.clone()));
        self.transport.invoke(request).await?.json()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.connection.url())
            .field("account", &self.connection.account())
            .field("strategy", &self.strategy.as_ref().map(|s| s.name()))
            .finish()
    }
}

#[derive(Default)]
pub struct ClientBuilder {
    connection: Option<ConnectionInfo>,
    credentials_provider: Option<Arc<dyn CredentialsProvider>>,
    authn_type: Option<AuthnType>,
    strategy: Option<Arc<dyn AuthenticationStrategy>>,
    ssl_mode: SslVerificationMode,
    network: Option<NetworkConfig>,
    timeout: Option<Duration>,
    proxy: Option<ProxyConfig>,
    transport: Option<Arc<dyn Transport>>,
    persist_token: bool,
}

impl ClientBuilder {
    pub fn connection(mut self, connection: ConnectionInfo) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn credentials_provider(mut self, provider: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials_provider = Some(provider);
        self
    }

    /// Authenticator to build a strategy for. Defaults to `authn` when a
    /// credentials provider is set.
    pub fn authn_type(mut self, authn_type: AuthnType) -> Self {
        self.authn_type = Some(authn_type);
        self
    }

    /// Use a custom strategy instead of one derived from the authenticator type.
    pub fn strategy(mut self, strategy: Arc<dyn AuthenticationStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn ssl_mode(mut self, mode: SslVerificationMode) -> Self {
        self.ssl_mode = mode;
        self
    }

    pub fn network(mut self, network: NetworkConfig) -> Self {
        self.network = Some(network);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Send requests through `transport` instead of the default reqwest client.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Keep access tokens in the credentials record so they survive the client.
    pub fn persist_token(mut self, persist: bool) -> Self {
        self.persist_token = persist;
        self
    }

    pub fn build(self) -> Result<Client> {
        let connection = self.connection.ok_or_else(|| {
            Error::BadInitialization("connection info is required".into())
        })?;

        if self.persist_token && self.credentials_provider.is_none() {
            return Err(Error::BadInitialization(
                "persisting tokens requires a credentials provider".into(),
            ));
        }

        let strategy = match (self.strategy, &self.credentials_provider) {
            (Some(strategy), _) => Some(strategy),
            (None, Some(provider)) => {
                Some(self.authn_type.unwrap_or_default().strategy(Arc::clone(provider)))
            }
            (None, None) if self.authn_type.is_some() => {
                return Err(Error::BadInitialization(
                    "an authenticator type requires a credentials provider".into(),
                ));
            }
            (None, None) => None,
        };

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let mut network = self
                    .network
                    .unwrap_or_else(|| NetworkConfig::for_connection(&connection, self.ssl_mode));
                if let Some(timeout) = self.timeout {
                    network = network.timeout(timeout);
                }
                if let Some(proxy) = self.proxy {
                    network = network.proxy(proxy);
                }
                network.validate()?;
                Arc::new(ReqwestTransport::new(&network)?)
            }
        };

        tracing::debug!(
            url = %connection.url(),
            account = %connection.account(),
            strategy = strategy.as_ref().map(|s| s.name()),
            "Client initialized"
        );

        Ok(Client {
            connection: Arc::new(connection),
            transport,
            provider: self.credentials_provider,
            strategy,
            cache: Arc::new(TokenCache::new()),
            persist_token: self.persist_token,
        })
    }

    /// Build the blocking variant, which owns its own runtime.
    pub fn build_blocking(self) -> Result<BlockingClient> {
        BlockingClient::new(self.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialsData, SimpleCredentialsProvider};
    use crate::http::testing::RecordingTransport;
    use chrono::Duration as ChronoDuration;

    const URL: &str = "https://conjur.example.com";

    struct Fixture {
        client: Client,
        transport: Arc<RecordingTransport>,
        provider: Arc<SimpleCredentialsProvider>,
    }

    fn fixture(transport: RecordingTransport, creds: CredentialsData) -> Fixture {
        let transport = Arc::new(transport);
        let provider = Arc::new(SimpleCredentialsProvider::with_credentials(creds));
        let client = Client::builder()
            .connection(ConnectionInfo::new(URL, "dev"))
            .credentials_provider(provider.clone())
            .transport(transport.clone())
            .build()
            .unwrap();
        Fixture {
            client,
            transport,
            provider,
        }
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Failing {
        Load,
        Save,
    }

    /// Store whose `load` or `save` always fails with an IO error.
    struct FailingStore {
        inner: SimpleCredentialsProvider,
        failing: Failing,
    }

    impl FailingStore {
        fn new(creds: CredentialsData, failing: Failing) -> Self {
            Self {
                inner: SimpleCredentialsProvider::with_credentials(creds),
                failing,
            }
        }

        fn broken() -> Error {
            Error::Io(std::io::Error::other("disk unavailable"))
        }
    }

    #[async_trait::async_trait]
    impl CredentialsProvider for FailingStore {
        fn store_location(&self) -> String {
            "failing".to_string()
        }

        async fn load(&self, url: &str) -> Result<CredentialsData> {
            if self.failing == Failing::Load {
                return Err(Self::broken());
            }
            self.inner.load(url).await
        }

        async fn save(&self, data: &CredentialsData) -> Result<()> {
            if self.failing == Failing::Save {
                return Err(Self::broken());
            }
            self.inner.save(data).await
        }

        async fn exists(&self, url: &str) -> Result<bool> {
            self.inner.exists(url).await
        }

        async fn remove(&self, url: &str) -> Result<()> {
            self.inner.remove(url).await
        }
    }

    fn keyed() -> CredentialsData {
        CredentialsData::new(URL)
            .with_username("alice")
            .with_api_key("APIKEY123")
    }

    #[tokio::test]
    async fn test_token_cached_within_window() {
        let f = fixture(RecordingTransport::new().respond(200, "tok"), keyed());

        let first = f.client.api_token().await.unwrap();
        let second = f.client.api_token().await.unwrap();

        assert_eq!(first.expose(), "tok");
        assert_eq!(second.expose(), "tok");
        assert_eq!(f.transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_token_refreshed() {
        let f = fixture(
            RecordingTransport::new()
                .respond(200, "t1")
                .respond(200, "t2"),
            keyed(),
        );

        f.client.api_token().await.unwrap();
        f.client
            .set_api_token("t1", Some(Utc::now() - ChronoDuration::seconds(1)))
            .await;

        let refreshed = f.client.api_token().await.unwrap();
        assert_eq!(refreshed.expose(), "t2");
        assert_eq!(f.transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_authentication_leaves_cache() {
        let f = fixture(RecordingTransport::new().respond(401, ""), keyed());

        assert!(f.client.api_token().await.is_err());
        assert!(f.client.token_expires_at().await.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_cache() {
        let f = fixture(RecordingTransport::new().respond(200, "tok"), keyed());
        let clone = f.client.clone();

        f.client.api_token().await.unwrap();
        clone.api_token().await.unwrap();
        assert_eq!(f.transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_api_token_without_strategy() {
        let transport = Arc::new(RecordingTransport::new());
        let client = Client::builder()
            .connection(ConnectionInfo::new(URL, "dev"))
            .transport(transport.clone())
            .build()
            .unwrap();

        let err = client.whoami().await.unwrap_err();
        assert!(matches!(err, Error::MissingApiToken(_)));
        assert_eq!(transport.calls(), 0);

        client
            .set_api_token("external", Some(Utc::now() + ChronoDuration::minutes(5)))
            .await;
        assert_eq!(client.api_token().await.unwrap().expose(), "external");
    }

    #[tokio::test]
    async fn test_persist_token_round_trip() {
        let transport = Arc::new(RecordingTransport::new().respond(200, "tok"));
        let provider = Arc::new(SimpleCredentialsProvider::with_credentials(keyed()));
        let build = || {
            Client::builder()
                .connection(ConnectionInfo::new(URL, "dev"))
                .credentials_provider(provider.clone())
                .transport(transport.clone())
                .persist_token(true)
                .build()
                .unwrap()
        };

        build().api_token().await.unwrap();
        let stored = provider.load(URL).await.unwrap();
        assert_eq!(stored.cached_token.unwrap().expose_secret(), "tok");
        assert!(stored.token_expiry.is_some());

        let reused = build().api_token().await.unwrap();
        assert_eq!(reused.expose(), "tok");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_cache_empty() {
        let transport = Arc::new(
            RecordingTransport::new()
                .respond(200, "t1")
                .respond(200, "t2"),
        );
        let client = Client::builder()
            .connection(ConnectionInfo::new(URL, "dev"))
            .credentials_provider(Arc::new(FailingStore::new(keyed(), Failing::Save)))
            .transport(transport.clone())
            .persist_token(true)
            .build()
            .unwrap();

        let err = client.api_token().await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(client.token_expires_at().await.is_none());

        assert!(client.authenticate().await.is_err());
        assert!(client.token_expires_at().await.is_none());
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_authenticated_request_carries_token() {
        let f = fixture(
            RecordingTransport::new()
                .respond(200, "tok")
                .respond(200, "s3cret"),
            keyed(),
        );

        let value = f.client.get_variable("db/password", Some("2")).await.unwrap();
        assert_eq!(&value[..], b"s3cret");

        let requests = f.transport.requests();
        assert_eq!(
            requests[1].url().unwrap(),
            format!("{URL}/secrets/dev/variable/db%2Fpassword?version=2")
        );
        assert!(matches!(requests[1].api_token, Some(TokenHeader::Session(_))));
    }

    #[tokio::test]
    async fn test_get_variables_strips_prefix() {
        let f = fixture(
            RecordingTransport::new()
                .respond(200, "tok")
                .respond(200, r#"{"dev:variable:one":"1","dev:variable:two":"2"}"#),
            keyed(),
        );

        let values = f.client.get_variables(&["one", "two"]).await.unwrap();
        assert_eq!(values["one"], "1");
        assert_eq!(values["two"], "2");
        assert!(f.transport.urls()[1]
            .ends_with("/secrets?variable_ids=dev%3Avariable%3Aone%2Cdev%3Avariable%3Atwo"));

        assert!(f.client.get_variables(&[]).await.unwrap_err().is_missing_parameter());
    }

    #[tokio::test]
    async fn test_server_info_not_found_is_enterprise_hint() {
        let f = fixture(RecordingTransport::new().respond(404, ""), keyed());

        let err = f.client.get_server_info().await.unwrap_err();
        match err {
            Error::ResourceNotFound { details, .. } => {
                assert!(details.unwrap().contains("Conjur Enterprise feature"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(f.transport.requests()[0].api_token.is_none());
    }

    #[tokio::test]
    async fn test_rotate_other_api_key_kind_check() {
        let f = fixture(RecordingTransport::new(), keyed());
        let err = f
            .client
            .rotate_other_api_key(&Resource::new("variable", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResource(_)));
        assert_eq!(f.transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_rotate_personal_api_key_updates_store() {
        let f = fixture(RecordingTransport::new().respond(200, "NEWKEY"), keyed());

        let key = f
            .client
            .rotate_personal_api_key("alice", SecretString::from("pw"))
            .await
            .unwrap();
        assert_eq!(key.expose_secret(), "NEWKEY");

        let stored = f.provider.load(URL).await.unwrap();
        assert_eq!(stored.api_key().unwrap().expose_secret(), "NEWKEY");
        assert!(f.transport.requests()[0].api_token.is_none());
    }

    #[tokio::test]
    async fn test_rotate_personal_api_key_store_errors() {
        let transport = Arc::new(RecordingTransport::new().respond(200, "NEWKEY"));
        let client = Client::builder()
            .connection(ConnectionInfo::new(URL, "dev"))
            .credentials_provider(Arc::new(FailingStore::new(keyed(), Failing::Load)))
            .transport(transport.clone())
            .build()
            .unwrap();

        let err = client
            .rotate_personal_api_key("alice", SecretString::from("pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(transport.calls(), 1);

        // No record for this server is not an error
        let empty = Client::builder()
            .connection(ConnectionInfo::new(URL, "dev"))
            .credentials_provider(Arc::new(SimpleCredentialsProvider::new()))
            .transport(Arc::new(RecordingTransport::new().respond(200, "NEWKEY")))
            .build()
            .unwrap();
        let key = empty
            .rotate_personal_api_key("alice", SecretString::from("pw"))
            .await
            .unwrap();
        assert_eq!(key.expose_secret(), "NEWKEY");
    }

    #[tokio::test]
    async fn test_role_queries_validate_before_request() {
        let f = fixture(RecordingTransport::new(), keyed());

        let err = f
            .client
            .list_members_of_role(&ListMembersQuery::new(Resource::new("group", "")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("'identifier'"));

        let err = f
            .client
            .list_permitted_roles(&Resource::new("", "db"), "read")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("'kind'"));

        let err = f
            .client
            .list_permitted_roles(&Resource::new("variable", "db"), "")
            .await
            .unwrap_err();
        assert!(err.is_missing_parameter());
        assert!(err.to_string().contains("'privilege'"));

        assert_eq!(f.transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_list_members_of_role() {
        let body = r#"[{"admin_option":true,"ownership":true,"role":"dev:group:ops","member":"dev:user:admin"},{"admin_option":false,"ownership":false,"role":"dev:group:ops","member":"dev:user:alice"}]"#;
        let f = fixture(
            RecordingTransport::new()
                .respond(200, "tok")
                .respond(200, body)
                .respond(200, body),
            keyed(),
        );
        let query = ListMembersQuery::new(Resource::new("group", "ops")).limit(2);

        let members = f.client.list_members_of_role(&query).await.unwrap();
        assert_eq!(members, vec!["dev:user:admin", "dev:user:alice"]);
        assert_eq!(
            f.transport.urls()[1],
            format!("{URL}/roles/dev/group/ops?members&limit=2")
        );

        let detailed = f.client.list_members_of_role_detailed(&query).await.unwrap();
        assert_eq!(detailed[0]["admin_option"], true);
    }

    #[tokio::test]
    async fn test_list_permitted_roles() {
        let f = fixture(
            RecordingTransport::new()
                .respond(200, "tok")
                .respond(200, r#"["dev:policy:root","dev:user:alice"]"#),
            keyed(),
        );

        let roles = f
            .client
            .list_permitted_roles(&Resource::new("variable", "db/password"), "execute")
            .await
            .unwrap();
        assert_eq!(roles, vec!["dev:policy:root", "dev:user:alice"]);
        assert_eq!(
            f.transport.urls()[1],
            format!(
                "{URL}/resources/dev/variable/db%2Fpassword?permitted_roles=true&privilege=execute"
            )
        );
    }

    #[tokio::test]
    async fn test_find_resource_by_identifier() {
        let body = r#"[{"id":"dev:variable:db"},{"id":"dev:host:db"},{"id":"dev:variable:db/other"}]"#;
        let f = fixture(
            RecordingTransport::new()
                .respond(200, "tok")
                .respond(200, body)
                .respond(200, body),
            keyed(),
        );

        let found = f.client.find_resources_by_identifier("db").await.unwrap();
        assert_eq!(found.len(), 2);

        let err = f.client.find_resource_by_identifier("db").await.unwrap_err();
        assert!(err.to_string().contains("Ambiguous resource identifier: db"));
    }

    #[test]
    fn test_builder_requires_connection() {
        let err = Client::builder().build().unwrap_err();
        assert!(matches!(err, Error::BadInitialization(_)));
    }

    #[test]
    fn test_builder_rejects_authn_type_without_provider() {
        let err = Client::builder()
            .connection(ConnectionInfo::new(URL, "dev"))
            .authn_type(AuthnType::Ldap)
            .transport(Arc::new(RecordingTransport::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::BadInitialization(_)));
    }

    #[test]
    fn test_builder_validates_tls_material() {
        let err = Client::builder()
            .connection(ConnectionInfo::new(URL, "dev"))
            .ssl_mode(SslVerificationMode::SelfSigned)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::BadInitialization(_)));
    }
}
