//! Service credentials: validation and masking.
//!
//! Validation never fails loudly. A credential set is either usable
//! (`true`) or not (`false`); callers decide what to tell the user.
//! Anything that ends up in logs or on screen goes through
//! [`sanitize_credentials`] first.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Replacement for secret values
pub const MASK: &str = "********";

/// Credentials for an external service (slskd, Plex, ...)
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked = sanitize_credentials(self);
        f.debug_struct("Credentials")
            .field("base_url", &masked.base_url)
            .field("api_key", &masked.api_key)
            .field("username", &masked.username)
            .field("password", &masked.password)
            .finish()
    }
}

/// Check that credentials are complete enough to talk to a service.
///
/// Requires an absolute `base_url` with a host and a non-empty `api_key`.
pub fn validate_credentials(credentials: &Credentials) -> bool {
    let url_ok = credentials
        .base_url
        .as_deref()
        .map(str::trim)
        .and_then(|url| reqwest::Url::parse(url).ok())
        .is_some_and(|url| url.host_str().is_some_and(|h| !h.is_empty()));

    let key_ok = credentials
        .api_key
        .as_deref()
        .is_some_and(|key| !key.trim().is_empty());

    url_ok && key_ok
}

/// Validate credentials that arrive as untyped JSON.
///
/// Anything that is not an object with the expected string fields is
/// simply invalid.
pub fn validate_credentials_json(value: &serde_json::Value) -> bool {
    match serde_json::from_value::<Credentials>(value.clone()) {
        Ok(credentials) => value.is_object() && validate_credentials(&credentials),
        Err(_) => false,
    }
}

/// Copy of `credentials` with secrets masked
pub fn sanitize_credentials(credentials: &Credentials) -> Credentials {
    let mask = |value: &Option<String>| value.as_ref().map(|_| MASK.to_string());
    Credentials {
        base_url: credentials.base_url.clone(),
        api_key: mask(&credentials.api_key),
        username: credentials.username.clone(),
        password: mask(&credentials.password),
    }
}
