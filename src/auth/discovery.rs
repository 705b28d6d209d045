//! Server capability discovery.
//!
//! Asks the remote server which authentication strategies it supports by
//! walking an ordered list of candidate endpoints until one responds with a
//! parseable strategy list.

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::{AuthError, AuthResult};

use super::strategy::ServerCapabilities;

/// Default per-candidate request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Candidate paths tried in order against the base URL.
const CANDIDATE_PATHS: &[&str] = &["/api", "/api/server"];

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(rename = "authenticationStrategies")]
    authentication_strategies: Vec<Value>,
}

/// Queries a server for its advertised authentication strategies.
///
/// Discovery never mutates the module registry; installing the result is a
/// separate step at the call site. Retry policy beyond the candidate list
/// belongs to the caller.
#[derive(Debug, Clone)]
pub struct CapabilityDiscovery {
    client: Client,
    timeout: Duration,
}

impl Default for CapabilityDiscovery {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl CapabilityDiscovery {
    /// Create a discovery client with the given per-candidate timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }

    /// Discover the strategies advertised by the server at `base_url`.
    ///
    /// Tries `{base}/api` then `{base}/api/server`; the first 2xx response
    /// whose body carries an `authenticationStrategies` array wins. Only if
    /// every candidate fails does the call fail, surfacing the last error
    /// encountered.
    pub async fn discover(&self, base_url: &str) -> AuthResult<ServerCapabilities> {
        let base = base_url.trim_end_matches('/');
        let mut last_error: Option<AuthError> = None;

        for path in CANDIDATE_PATHS {
            let url = format!("{}{}", base, path);
            match self.try_candidate(&url).await {
                Ok(capabilities) => return Ok(capabilities),
                Err(err) => {
                    tracing::debug!(%url, %err, "discovery candidate failed");
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AuthError::MalformedServerResponse("bad server response".to_string())
        }))
    }

    async fn try_candidate(&self, url: &str) -> AuthResult<ServerCapabilities> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::MalformedServerResponse(format!(
                "server returned {}",
                response.status()
            )));
        }

        let body: ApiResponse = response
            .json()
            .await
            .map_err(|err| AuthError::MalformedServerResponse(err.to_string()))?;

        Ok(build_capabilities(&body.authentication_strategies))
    }
}

/// Build the capability map from a raw strategy array, keyed by identifier.
///
/// Entries without an `identifier` are skipped. The map is rebuilt
/// wholesale; nothing is merged from prior responses.
fn build_capabilities(strategies: &[Value]) -> ServerCapabilities {
    strategies
        .iter()
        .filter_map(|entry| {
            let id = entry.get("identifier")?.as_str()?;
            Some((id.to_string(), entry.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_capabilities_keys_by_identifier() {
        let strategies = vec![
            json!({ "identifier": "local", "passwordMinLength": 14 }),
            json!({ "identifier": "oauth-google", "strategy": {} }),
        ];

        let capabilities = build_capabilities(&strategies);
        assert_eq!(capabilities.len(), 2);
        assert_eq!(capabilities["local"]["passwordMinLength"], 14);
        assert!(capabilities.contains_key("oauth-google"));
    }

    #[test]
    fn test_build_capabilities_skips_anonymous_entries() {
        let strategies = vec![json!({ "name": "nameless" }), json!({ "identifier": "ldap" })];
        let capabilities = build_capabilities(&strategies);
        assert_eq!(capabilities.len(), 1);
        assert!(capabilities.contains_key("ldap"));
    }

    #[test]
    fn test_response_shape_requires_strategy_array() {
        let parsed: Result<ApiResponse, _> =
            serde_json::from_value(json!({ "version": "6.0" }));
        assert!(parsed.is_err());

        let parsed: Result<ApiResponse, _> = serde_json::from_value(json!({
            "version": "6.0",
            "authenticationStrategies": [{ "identifier": "local" }]
        }));
        assert_eq!(parsed.unwrap().authentication_strategies.len(), 1);
    }
}
