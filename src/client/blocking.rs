//! Blocking facade over [`Client`].

use std::collections::BTreeMap;
use std::future::Future;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio::runtime::{Builder, Handle, Runtime};

use super::{
    Client, CreateHostData, CreateTokenData, HostFactoryToken, ListMembersQuery,
    ListResourcesQuery, PolicyResult, Resource, WhoAmI,
};
use crate::auth::ApiToken;
use crate::{Error, Result};

/// Runs [`Client`] operations to completion on a private current-thread runtime.
///
/// Every call fails with [`Error::SyncInvocationInsideRuntime`] when made from
/// inside a tokio runtime; use the async [`Client`] there instead.
#[derive(Debug)]
pub struct BlockingClient {
    inner: Client,
    runtime: Runtime,
}

impl BlockingClient {
    pub fn new(inner: Client) -> Result<Self> {
        ensure_outside_runtime()?;
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self { inner, runtime })
    }

    /// The async client sharing this client's token cache.
    pub fn client(&self) -> &Client {
        &self.inner
    }

    fn run<T>(&self, future: impl Future<Output = Result<T>>) -> Result<T> {
        ensure_outside_runtime()?;
        self.runtime.block_on(future)
    }

    pub fn api_token(&self) -> Result<ApiToken> {
        self.run(self.inner.api_token())
    }

    pub fn login(&self) -> Result<SecretString> {
        self.run(self.inner.login())
    }

    pub fn authenticate(&self) -> Result<ApiToken> {
        self.run(self.inner.authenticate())
    }

    pub fn set_api_token(
        &self,
        token: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.run(async {
            self.inner.set_api_token(token, expires_at).await;
            Ok(())
        })
    }

    pub fn invalidate_token(&self) -> Result<()> {
        self.run(async {
            self.inner.invalidate_token().await;
            Ok(())
        })
    }

    pub fn whoami(&self) -> Result<WhoAmI> {
        self.run(self.inner.whoami())
    }

    pub fn get_server_info(&self) -> Result<serde_json::Value> {
        self.run(self.inner.get_server_info())
    }

    pub fn list_resources(&self, query: &ListResourcesQuery) -> Result<Vec<String>> {
        self.run(self.inner.list_resources(query))
    }

    pub fn list_resources_detailed(
        &self,
        query: &ListResourcesQuery,
    ) -> Result<Vec<serde_json::Value>> {
        self.run(self.inner.list_resources_detailed(query))
    }

    pub fn find_resources_by_identifier(&self, identifier: &str) -> Result<Vec<Resource>> {
        self.run(self.inner.find_resources_by_identifier(identifier))
    }

    pub fn find_resource_by_identifier(&self, identifier: &str) -> Result<Resource> {
        self.run(self.inner.find_resource_by_identifier(identifier))
    }

    pub fn list_members_of_role(&self, query: &ListMembersQuery) -> Result<Vec<String>> {
        self.run(self.inner.list_members_of_role(query))
    }

    pub fn list_members_of_role_detailed(
        &self,
        query: &ListMembersQuery,
    ) -> Result<Vec<serde_json::Value>> {
        self.run(self.inner.list_members_of_role_detailed(query))
    }

    pub fn list_permitted_roles(
        &self,
        resource: &Resource,
        privilege: &str,
    ) -> Result<Vec<String>> {
        self.run(self.inner.list_permitted_roles(resource, privilege))
    }

    pub fn get_variable(&self, variable_id: &str, version: Option<&str>) -> Result<Bytes> {
        self.run(self.inner.get_variable(variable_id, version))
    }

    pub fn get_variables(&self, variable_ids: &[&str]) -> Result<BTreeMap<String, String>> {
        self.run(self.inner.get_variables(variable_ids))
    }

    pub fn set_variable(&self, variable_id: &str, value: &str) -> Result<()> {
        self.run(self.inner.set_variable(variable_id, value))
    }

    pub fn load_policy(&self, policy_id: &str, policy: &str) -> Result<PolicyResult> {
        self.run(self.inner.load_policy(policy_id, policy))
    }

    pub fn replace_policy(&self, policy_id: &str, policy: &str) -> Result<PolicyResult> {
        self.run(self.inner.replace_policy(policy_id, policy))
    }

    pub fn update_policy(&self, policy_id: &str, policy: &str) -> Result<PolicyResult> {
        self.run(self.inner.update_policy(policy_id, policy))
    }

    pub fn rotate_other_api_key(&self, resource: &Resource) -> Result<SecretString> {
        self.run(self.inner.rotate_other_api_key(resource))
    }

    pub fn rotate_personal_api_key(
        &self,
        login: &str,
        current_password: SecretString,
    ) -> Result<SecretString> {
        self.run(self.inner.rotate_personal_api_key(login, current_password))
    }

    pub fn change_personal_password(
        &self,
        login: &str,
        current_password: SecretString,
        new_password: SecretString,
    ) -> Result<()> {
        self.run(
            self.inner
                .change_personal_password(login, current_password, new_password),
        )
    }

    pub fn create_token(&self, data: &CreateTokenData) -> Result<Vec<HostFactoryToken>> {
        self.run(self.inner.create_token(data))
    }

    pub fn revoke_token(&self, token: &str) -> Result<u16> {
        self.run(self.inner.revoke_token(token))
    }

    pub fn create_host(&self, data: &CreateHostData) -> Result<serde_json::Value> {
        self.run(self.inner.create_host(data))
    }
}

fn ensure_outside_runtime() -> Result<()> {
    if Handle::try_current().is_ok() {
        tracing::error!("Blocking client used inside an async runtime");
        return Err(Error::SyncInvocationInsideRuntime);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::{CredentialsData, SimpleCredentialsProvider};
    use crate::config::ConnectionInfo;
    use crate::http::testing::RecordingTransport;

    const URL: &str = "https://conjur";

    fn blocking(transport: Arc<RecordingTransport>) -> BlockingClient {
        let provider = SimpleCredentialsProvider::with_credentials(
            CredentialsData::new(URL)
                .with_username("alice")
                .with_api_key("KEY"),
        );
        Client::builder()
            .connection(ConnectionInfo::new(URL, "dev"))
            .credentials_provider(Arc::new(provider))
            .transport(transport)
            .build_blocking()
            .unwrap()
    }

    #[test]
    fn test_blocking_calls_run_to_completion() {
        let transport = Arc::new(
            RecordingTransport::new()
                .respond(200, "tok")
                .respond(200, "value"),
        );
        let client = blocking(transport.clone());

        assert_eq!(client.api_token().unwrap().expose(), "tok");
        assert_eq!(&client.get_variable("x", None).unwrap()[..], b"value");
        assert_eq!(transport.calls(), 2);
    }

    #[test]
    fn test_blocking_inside_runtime_is_rejected() {
        let transport = Arc::new(RecordingTransport::new());
        let client = blocking(transport.clone());

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let err = runtime.block_on(async { client.api_token() }).unwrap_err();
        drop(runtime);

        assert!(matches!(err, Error::SyncInvocationInsideRuntime));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_blocking_construction_inside_runtime_is_rejected() {
        let client = Client::builder()
            .connection(ConnectionInfo::new(URL, "dev"))
            .transport(Arc::new(RecordingTransport::new()))
            .build()
            .unwrap();
        assert!(matches!(
            BlockingClient::new(client),
            Err(Error::SyncInvocationInsideRuntime)
        ));
    }
}
