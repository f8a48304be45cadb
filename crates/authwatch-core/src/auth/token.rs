//! Decoding of compact JWT payloads.
//!
//! Only the payload segment is read, to learn when the token expires.
//! The signature is never verified: the local expiry is a convenience that
//! logs the user out on time, not an authorization decision. The server that
//! receives the token remains the only party that can trust it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Number of dot-separated segments in a compact JWS.
const SEGMENT_COUNT: usize = 3;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Token payload is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Token payload is not valid claims JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expiration claim out of range: {0}")]
    InvalidExpiry(f64),
}

/// Claims read from the token payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenClaims {
    /// Expiration time (NumericDate: seconds since the epoch, fractions allowed).
    pub exp: f64,
    /// Subject, if the issuer includes one. Logged on login.
    #[serde(default)]
    pub sub: Option<String>,
}

impl TokenClaims {
    /// Expiration claim as a UTC timestamp.
    pub fn expires_at(&self) -> Result<DateTime<Utc>, TokenError> {
        if !self.exp.is_finite() {
            return Err(TokenError::InvalidExpiry(self.exp));
        }

        let whole = self.exp.floor();
        // `as` saturates, so huge values land on i64 bounds and fail below
        let mut secs = whole as i64;
        let mut nanos = ((self.exp - whole) * NANOS_PER_SEC).round() as u32;
        if nanos >= NANOS_PER_SEC as u32 {
            secs = secs.saturating_add(1);
            nanos = 0;
        }

        DateTime::from_timestamp(secs, nanos).ok_or(TokenError::InvalidExpiry(self.exp))
    }
}

/// Decode the payload claims of a `header.payload.signature` token.
pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != SEGMENT_COUNT {
        return Err(TokenError::Malformed(format!(
            "expected {} segments, found {}",
            SEGMENT_COUNT,
            segments.len()
        )));
    }

    let payload = segments[1].trim_end_matches('=');
    if payload.is_empty() {
        return Err(TokenError::Malformed("empty payload segment".to_string()));
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Decode the expiration timestamp carried by `token`.
pub fn expires_at(token: &str) -> Result<DateTime<Utc>, TokenError> {
    decode_claims(token)?.expires_at()
}

#[cfg(test)]
pub(crate) mod test_support {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    /// Build an unsigned test token whose payload carries `exp`.
    pub fn token_expiring_at(exp: i64) -> String {
        token_with_payload(&format!(r#"{{"sub":"1234567890","exp":{}}}"#, exp))
    }

    pub fn token_with_payload(payload: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(payload);
        format!("{}.{}.signature", header, payload)
    }
}
