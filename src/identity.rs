//! Caller identity resolution from bearer credentials.
//!
//! The bearer token is a JWT issued by the upstream identity provider. Its
//! signature is verified by the storage service on every scoped call, so this
//! module only decodes the payload segment and extracts the `sub` claim.
//!
//! # Example
//!
//! ```rust
//! use image_relay::identity::{resolve, Credential};
//!
//! // {"sub":"u1"}
//! let token = "eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiJ1MSJ9.c2ln";
//! let credential = Credential::from_authorization(Some(format!("Bearer {token}").as_str())).unwrap();
//!
//! let caller = resolve(&credential).unwrap();
//! assert_eq!(caller.user_id(), "u1");
//! ```

use std::fmt;

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::Deserialize;

use crate::error::IdentityError;

const BEARER_PREFIX: &str = "Bearer ";

// =============================================================================
// Credential
// =============================================================================

/// An opaque bearer token, valid for the lifetime of one request.
///
/// `Debug` is redacted so the token never reaches log output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Extract the bearer token from an `Authorization` header value.
    ///
    /// Fails with [`IdentityError::MissingBearer`] when the header is absent,
    /// lacks the `Bearer ` prefix, or the token is empty or contains whitespace.
    pub fn from_authorization(header: Option<&str>) -> Result<Self, IdentityError> {
        let token = header
            .and_then(|value| value.strip_prefix(BEARER_PREFIX))
            .filter(|token| !token.is_empty() && !token.contains(char::is_whitespace))
            .ok_or(IdentityError::MissingBearer)?;

        Ok(Self(token.to_string()))
    }

    /// The raw token.
    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&"[REDACTED]").finish()
    }
}

// =============================================================================
// Caller Identity
// =============================================================================

/// The authenticated user a request executes on behalf of.
///
/// The subject is always a single path segment, so it can prefix object
/// paths without reaching outside its own namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    user_id: String,
}

impl CallerIdentity {
    /// The subject identifier. Never empty.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
}

/// Resolve the caller identity from a credential.
///
/// Decodes the token payload without verifying its signature.
pub fn resolve(credential: &Credential) -> Result<CallerIdentity, IdentityError> {
    let mut segments = credential.token().split('.');
    let payload = match (segments.next(), segments.next()) {
        (Some(_header), Some(payload)) if !payload.is_empty() => payload,
        _ => {
            return Err(IdentityError::InvalidCredential(
                "token is not a JWT".to_string(),
            ))
        }
    };

    let decoded = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| URL_SAFE.decode(payload))
        .map_err(|e| IdentityError::InvalidCredential(format!("payload is not base64url: {e}")))?;

    let claims: Claims = serde_json::from_slice(&decoded)
        .map_err(|e| IdentityError::InvalidCredential(format!("payload is not JSON: {e}")))?;

    let sub = match claims.sub {
        Some(sub) if !sub.trim().is_empty() => sub,
        _ => {
            return Err(IdentityError::InvalidCredential(
                "User ID not found in token".to_string(),
            ))
        }
    };

    if !is_path_segment(&sub) {
        return Err(IdentityError::InvalidCredential(
            "User ID is not a valid path segment".to_string(),
        ));
    }

    Ok(CallerIdentity { user_id: sub })
}

fn is_path_segment(value: &str) -> bool {
    value != "."
        && value != ".."
        && !value.contains(|c: char| c == '/' || c == '\\' || c.is_control())
}
