//! Access-token augmentation for authenticated resource URLs.
//!
//! Appends an `access_token` query parameter while preserving all existing
//! query items and their order.
//!
//! Call exactly once per request: a second call appends a second
//! `access_token` parameter, and last-one-wins is not guaranteed by this
//! construction. That is a documented precondition, not something this
//! module deduplicates.

use std::sync::Arc;

use crate::error::{AuthError, AuthResult};

use super::identity::IdentityStore;

/// Append `access_token={token}` to a URL's query string.
///
/// Any fragment stays after the query, and prior query items keep their
/// position.
pub fn append_access_token(url: &str, token: &str) -> String {
    let (base, fragment) = match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    };

    let separator = if base.contains('?') { '&' } else { '?' };
    let mut result = format!(
        "{}{}access_token={}",
        base,
        separator,
        urlencoding::encode(token)
    );
    if let Some(fragment) = fragment {
        result.push('#');
        result.push_str(fragment);
    }
    result
}

/// Builds authenticated URLs from the token in the identity store.
#[derive(Debug, Clone)]
pub struct TokenUrlBuilder {
    identity: Arc<IdentityStore>,
}

impl TokenUrlBuilder {
    pub fn new(identity: Arc<IdentityStore>) -> Self {
        Self { identity }
    }

    /// Augment a URL with the currently stored access token.
    pub fn authorized_url(&self, url: &str) -> AuthResult<String> {
        let token = self
            .identity
            .token()
            .ok_or_else(|| AuthError::AuthenticationRejected("no access token stored".to_string()))?;
        Ok(append_access_token(url, &token))
    }
}
