//! Server endpoint templates.

use std::collections::BTreeMap;
use std::fmt;

use crate::{Error, Result};

/// Every endpoint the SDK talks to, with the placeholders its path needs.
///
/// `{url}` is substituted verbatim; all other placeholders are percent-encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Login,
    Authenticate,
    LoginLdap,
    AuthenticateLdap,
    AuthenticateOidc,
    Info,
    Whoami,
    Policies,
    Secrets,
    BatchSecrets,
    Resources,
    Resource,
    RoleMembers,
    RotateApiKey,
    ChangePassword,
    HostFactoryTokens,
    HostFactoryRevokeToken,
    HostFactoryHosts,
}

impl Endpoint {
    pub const fn template(self) -> &'static str {
        match self {
            Endpoint::Login => "{url}/authn/{account}/login",
            Endpoint::Authenticate => "{url}/authn/{account}/{login}/authenticate",
            Endpoint::LoginLdap => "{url}/authn-ldap/{service_id}/{account}/login",
            Endpoint::AuthenticateLdap => {
                "{url}/authn-ldap/{service_id}/{account}/{login}/authenticate"
            }
            Endpoint::AuthenticateOidc => "{url}/authn-oidc/{service_id}/{account}/authenticate",
            Endpoint::Info => "{url}/info",
            Endpoint::Whoami => "{url}/whoami",
            Endpoint::Policies => "{url}/policies/{account}/policy/{identifier}",
            Endpoint::Secrets => "{url}/secrets/{account}/{kind}/{identifier}",
            Endpoint::BatchSecrets => "{url}/secrets",
            Endpoint::Resources => "{url}/resources/{account}",
            Endpoint::Resource => "{url}/resources/{account}/{kind}/{identifier}",
            Endpoint::RoleMembers => "{url}/roles/{account}/{kind}/{identifier}?members",
            Endpoint::RotateApiKey => "{url}/authn/{account}/api_key",
            Endpoint::ChangePassword => "{url}/authn/{account}/password",
            Endpoint::HostFactoryTokens => "{url}/host_factory_tokens",
            Endpoint::HostFactoryRevokeToken => "{url}/host_factory_tokens/{token}",
            Endpoint::HostFactoryHosts => "{url}/host_factories/hosts",
        }
    }

    /// Substitute `params` into the template.
    pub fn render(self, params: &EndpointParams) -> Result<String> {
        let template = self.template();
        let mut rendered = String::with_capacity(template.len() + 64);
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            rendered.push_str(&rest[..start]);
            let end = rest[start..]
                .find('}')
                .map(|i| start + i)
                .ok_or_else(|| Error::Config(format!("Malformed endpoint template: {template}")))?;
            let name = &rest[start + 1..end];
            let value = params.get(name).ok_or_else(|| {
                Error::missing_parameter(format!("{name} is required for endpoint {self}"))
            })?;

            if name == "url" {
                rendered.push_str(value.trim_end_matches('/'));
            } else {
                rendered.push_str(&urlencoding::encode(value));
            }
            rest = &rest[end + 1..];
        }
        rendered.push_str(rest);

        Ok(rendered)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Named values for endpoint placeholders.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EndpointParams(BTreeMap<&'static str, String>);

impl EndpointParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.0.insert(name, value.into());
        self
    }

    pub fn insert(&mut self, name: &'static str, value: impl Into<String>) {
        self.0.insert(name, value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}
