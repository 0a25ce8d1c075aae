//! Bearer credential

use std::fmt;

use serde::{Deserialize, Serialize};

/// Request header the credential is sent under
pub const AUTH_HEADER: &str = "Authorization";

const BEARER_PREFIX: &str = "Bearer ";

/// Opaque bearer token granting authenticated API access
///
/// `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token. Returns `None` for an empty or blank token.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Parse an `Authorization` header value, with or without the `Bearer ` prefix
    pub fn from_header(value: &str) -> Option<Self> {
        let value = value.trim();
        let token = if value.len() >= BEARER_PREFIX.len()
            && value[..BEARER_PREFIX.len()].eq_ignore_ascii_case(BEARER_PREFIX)
        {
            &value[BEARER_PREFIX.len()..]
        } else {
            value
        };
        Self::new(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` request header
    pub fn header_value(&self) -> String {
        format!("{}{}", BEARER_PREFIX, self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}
