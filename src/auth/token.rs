//! Short-lived access tokens and their expiry.
//!
//! The server signs access tokens as a JSON envelope whose `payload` field is a
//! base64 JSON claim set. When the `exp` claim can be read, the token is reused
//! until [`TOKEN_EXPIRY_BUFFER`] before that instant. Older servers issue tokens
//! without it; those get a fixed window of [`DEFAULT_TOKEN_LIFETIME`] minus the
//! buffer.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Margin subtracted from the server-asserted expiry.
pub const TOKEN_EXPIRY_BUFFER: Duration = Duration::minutes(3);

/// Nominal lifetime of an access token when no `exp` claim is readable.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::minutes(8);

/// Why the `exp` claim could not be read from a token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenClaimError {
    #[error("token is not a JSON envelope")]
    NotJson,
    #[error("token envelope has no payload")]
    MissingPayload,
    #[error("token payload is not valid base64")]
    PayloadEncoding,
    #[error("token payload is not a JSON object")]
    PayloadNotJson,
    #[error("token payload has no integer exp claim")]
    MissingExp,
    #[error("exp claim {0} is out of range")]
    ExpOutOfRange(i64),
}

#[derive(Deserialize)]
struct Envelope {
    payload: Option<String>,
}

#[derive(Deserialize)]
struct Claims {
    exp: Option<i64>,
}

/// Read the `exp` claim of a token envelope.
pub fn decode_expiration(token: &str) -> Result<DateTime<Utc>, TokenClaimError> {
    let envelope: Envelope =
        serde_json::from_str(token).map_err(|_| TokenClaimError::NotJson)?;
    let payload = envelope
        .payload
        .filter(|p| !p.is_empty())
        .ok_or(TokenClaimError::MissingPayload)?;

    let trimmed = payload.trim_end_matches('=');
    let raw = STANDARD_NO_PAD
        .decode(trimmed)
        .or_else(|_| URL_SAFE_NO_PAD.decode(trimmed))
        .map_err(|_| TokenClaimError::PayloadEncoding)?;

    let claims: Claims =
        serde_json::from_slice(&raw).map_err(|_| TokenClaimError::PayloadNotJson)?;
    let exp = claims.exp.ok_or(TokenClaimError::MissingExp)?;

    DateTime::from_timestamp(exp, 0).ok_or(TokenClaimError::ExpOutOfRange(exp))
}

/// When a token received at `now` stops being reused.
pub fn token_expiry(token: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    match decode_expiration(token) {
        Ok(exp) => exp - TOKEN_EXPIRY_BUFFER,
        Err(reason) => {
            tracing::debug!(%reason, "Token expiry claim unavailable, using default lifetime");
            now + DEFAULT_TOKEN_LIFETIME - TOKEN_EXPIRY_BUFFER
        }
    }
}

/// Access token plus the instant it stops being valid.
#[derive(Clone)]
pub struct ApiToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

impl ApiToken {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: SecretString::from(token.into()),
            expires_at,
        }
    }

    /// Token returned by an authenticator at `now`, expiry derived from its claims.
    pub fn from_response(token: impl Into<String>, now: DateTime<Utc>) -> Self {
        let token = token.into();
        let expires_at = token_expiry(&token, now);
        Self::new(token, expires_at)
    }

    pub fn secret(&self) -> &SecretString {
        &self.token
    }

    pub fn expose(&self) -> &str {
        self.token.expose_secret()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Valid strictly before the expiry instant.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        !self.is_valid_at(Utc::now())
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiToken")
            .field("token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
