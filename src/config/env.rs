//! Environment variable helpers.
//!
//! Environment variables are read once when a configuration object is built and
//! treated as immutable afterwards.

pub const ENV_APPLIANCE_URL: &str = "CONJUR_APPLIANCE_URL";
pub const ENV_ACCOUNT: &str = "CONJUR_ACCOUNT";
pub const ENV_SERVICE_ID: &str = "CONJUR_AUTHN_SERVICE_ID";
pub const ENV_CERT_FILE: &str = "CONJUR_CERT_FILE";
pub const ENV_PROXY: &str = "CONJUR_PROXY";
pub const ENV_AUTHN_TYPE: &str = "CONJUR_AUTHN_TYPE";
pub const ENV_AUTHN_LOGIN: &str = "CONJUR_AUTHN_LOGIN";
pub const ENV_AUTHN_PASSWORD: &str = "CONJUR_AUTHN_PASSWORD";
pub const ENV_AUTHN_API_KEY: &str = "CONJUR_AUTHN_API_KEY";

/// Get an optional, non-empty environment variable.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
