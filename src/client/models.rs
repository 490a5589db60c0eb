//! Request and response shapes for the resource operations.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Deserialize;

use crate::{Error, Result};

pub const KIND_VARIABLE: &str = "variable";
pub const KIND_HOST_FACTORY: &str = "host_factory";

/// A resource reference: `kind` plus `identifier`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource {
    pub kind: String,
    pub identifier: String,
}

impl Resource {
    pub fn new(kind: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            identifier: identifier.into(),
        }
    }

    /// Parse `account:kind:identifier`; the identifier may itself contain `:`.
    pub fn from_full_id(full_id: &str) -> Result<Self> {
        let mut parts = full_id.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(_account), Some(kind), Some(identifier))
                if !kind.is_empty() && !identifier.is_empty() =>
            {
                Ok(Self::new(kind, identifier))
            }
            _ => Err(Error::InvalidResource(format!(
                "'{full_id}' is not of the form account:kind:identifier"
            ))),
        }
    }

    /// `kind:identifier`.
    pub fn full_id(&self) -> String {
        format!("{}:{}", self.kind, self.identifier)
    }

    pub fn qualified_id(&self, account: &str) -> String {
        format!("{account}:{}:{}", self.kind, self.identifier)
    }

    /// Fails unless both kind and identifier are set.
    pub(crate) fn ensure_named(&self) -> Result<()> {
        if self.kind.trim().is_empty() {
            return Err(Error::missing_parameter("Missing required parameter, 'kind'"));
        }
        if self.identifier.trim().is_empty() {
            return Err(Error::missing_parameter(
                "Missing required parameter, 'identifier'",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.identifier)
    }
}

/// Server-side filters for listing resources.
#[derive(Debug, Clone, Default)]
pub struct ListResourcesQuery {
    pub kind: Option<String>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub role: Option<String>,
}

impl ListResourcesQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub(crate) fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(ref kind) = self.kind {
            pairs.push(("kind", kind.clone()));
        }
        if let Some(ref search) = self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        if let Some(ref role) = self.role {
            pairs.push(("role", role.clone()));
        }
        pairs
    }
}

/// Paging and search over the members of a role.
#[derive(Debug, Clone)]
pub struct ListMembersQuery {
    pub role: Resource,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListMembersQuery {
    pub fn new(role: Resource) -> Self {
        Self {
            role,
            search: None,
            limit: None,
            offset: None,
        }
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub(crate) fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(ref search) = self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        pairs
    }
}

/// Host factory token request.
#[derive(Debug, Clone)]
pub struct CreateTokenData {
    pub host_factory: String,
    pub cidr: Vec<String>,
    pub count: Option<u32>,
    pub lifetime: Duration,
}

impl CreateTokenData {
    pub fn new(host_factory: impl Into<String>, lifetime: Duration) -> Result<Self> {
        let host_factory = host_factory.into();
        if host_factory.trim().is_empty() {
            return Err(Error::missing_parameter("host_factory is required"));
        }
        if lifetime <= Duration::zero() {
            return Err(Error::missing_parameter(
                "token lifetime (days, hours or minutes) must be positive",
            ));
        }
        Ok(Self {
            host_factory,
            cidr: Vec::new(),
            count: None,
            lifetime,
        })
    }

    pub fn cidr(mut self, cidr: impl Into<String>) -> Self {
        self.cidr.push(cidr.into());
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    /// Form fields, with the host factory qualified by `account` and the
    /// expiration computed from `now`.
    pub(crate) fn form_pairs(&self, account: &str, now: DateTime<Utc>) -> Vec<(String, String)> {
        let mut pairs = vec![
            (
                "expiration".to_string(),
                (now + self.lifetime).to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            (
                "host_factory".to_string(),
                format!("{account}:{KIND_HOST_FACTORY}:{}", self.host_factory),
            ),
        ];
        if let Some(count) = self.count {
            pairs.push(("count".to_string(), count.to_string()));
        }
        pairs.extend(self.cidr.iter().map(|c| ("cidr[]".to_string(), c.clone())));
        pairs
    }
}

/// Host enrollment through a host factory token.
#[derive(Clone)]
pub struct CreateHostData {
    pub host_id: String,
    pub token: secrecy::SecretString,
    pub annotations: BTreeMap<String, String>,
}

impl CreateHostData {
    pub fn new(host_id: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let host_id = host_id.into();
        let token = token.into();
        if host_id.trim().is_empty() {
            return Err(Error::missing_parameter("Missing required parameter, 'host_id'"));
        }
        if token.is_empty() {
            return Err(Error::missing_parameter("Missing required parameter, 'token'"));
        }
        Ok(Self {
            host_id,
            token: token.into(),
            annotations: BTreeMap::new(),
        })
    }

    pub fn annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub(crate) fn form_pairs(&self) -> Vec<(String, String)> {
        std::iter::once(("id".to_string(), self.host_id.clone()))
            .chain(
                self.annotations
                    .iter()
                    .map(|(k, v)| (format!("annotations[{k}]"), v.clone())),
            )
            .collect()
    }
}

impl fmt::Debug for CreateHostData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateHostData")
            .field("host_id", &self.host_id)
            .field("token", &"[redacted]")
            .field("annotations", &self.annotations)
            .finish()
    }
}

/// One host factory token as returned by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct HostFactoryToken {
    pub token: String,
    pub expiration: String,
    #[serde(default)]
    pub cidr: Vec<String>,
}

/// Identity of the caller as reported by `/whoami`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WhoAmI {
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub account: Option<String>,
    pub username: Option<String>,
    pub token_issued_at: Option<String>,
}

/// Outcome of loading a policy.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyResult {
    #[serde(default)]
    pub created_roles: BTreeMap<String, CreatedRole>,
    #[serde(default)]
    pub version: Option<u64>,
}

/// Role created by a policy load, with its initial API key.
#[derive(Clone, Deserialize)]
pub struct CreatedRole {
    pub id: String,
    pub api_key: String,
}

impl fmt::Debug for CreatedRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedRole")
            .field("id", &self.id)
            .field("api_key", &"[redacted]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_from_full_id() {
        let resource = Resource::from_full_id("dev:variable:db/pass:word").unwrap();
        assert_eq!(resource, Resource::new("variable", "db/pass:word"));
        assert_eq!(resource.full_id(), "variable:db/pass:word");
        assert_eq!(resource.qualified_id("dev"), "dev:variable:db/pass:word");

        assert!(Resource::from_full_id("variable:x").is_err());
        assert!(Resource::from_full_id("dev::x").is_err());
    }

    #[test]
    fn test_resource_ensure_named() {
        assert!(Resource::new("group", "ops").ensure_named().is_ok());

        let err = Resource::new("", "ops").ensure_named().unwrap_err();
        assert!(err.to_string().contains("'kind'"));
        let err = Resource::new("group", " ").ensure_named().unwrap_err();
        assert!(err.to_string().contains("'identifier'"));
    }

    #[test]
    fn test_members_query_pairs() {
        let query = ListMembersQuery::new(Resource::new("group", "ops"))
            .search("alice")
            .offset(20);
        assert_eq!(
            query.pairs(),
            vec![("search", "alice".to_string()), ("offset", "20".to_string())]
        );
    }

    #[test]
    fn test_list_query_pairs() {
        let query = ListResourcesQuery::new().kind("host").limit(10);
        assert_eq!(
            query.pairs(),
            vec![("kind", "host".to_string()), ("limit", "10".to_string())]
        );
        assert!(ListResourcesQuery::new().pairs().is_empty());
    }

    #[test]
    fn test_create_token_form() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let data = CreateTokenData::new("apps", Duration::hours(1))
            .unwrap()
            .cidr("10.0.0.0/24")
            .count(2);

        let pairs = data.form_pairs("dev", now);
        assert_eq!(pairs[0], ("expiration".into(), "2023-11-14T23:13:20Z".into()));
        assert_eq!(pairs[1], ("host_factory".into(), "dev:host_factory:apps".into()));
        assert_eq!(pairs[2], ("count".into(), "2".into()));
        assert_eq!(pairs[3], ("cidr[]".into(), "10.0.0.0/24".into()));
    }

    #[test]
    fn test_create_token_validation() {
        assert!(CreateTokenData::new(" ", Duration::hours(1)).is_err());
        assert!(CreateTokenData::new("apps", Duration::zero()).is_err());
    }

    #[test]
    fn test_policy_result_parse() {
        let result: PolicyResult = serde_json::from_str(
            r#"{"created_roles":{"dev:user:bob":{"id":"dev:user:bob","api_key":"k"}},"version":3}"#,
        )
        .unwrap();
        assert_eq!(result.version, Some(3));
        assert_eq!(result.created_roles["dev:user:bob"].api_key, "k");
        assert!(!format!("{result:?}").contains("\"k\""));
    }

    #[test]
    fn test_create_host_data() {
        assert!(CreateHostData::new("", "tok").is_err());
        assert!(CreateHostData::new("host-1", "").is_err());

        let data = CreateHostData::new("host-1", "tok")
            .unwrap()
            .annotation("team", "ops");
        assert_eq!(
            data.form_pairs(),
            vec![
                ("id".to_string(), "host-1".to_string()),
                ("annotations[team]".to_string(), "ops".to_string()),
            ]
        );
        assert!(!format!("{data:?}").contains("tok\""));
    }
}
