//! Best-effort remote session invalidation.
//!
//! Logout always completes locally: any remote failure is logged and
//! swallowed, and clearing the session store stays the caller's job so a
//! dead server can never keep a user logged in.

use reqwest::Client;

/// Fire-and-forget logout against `{base}/api/logout`.
#[derive(Debug, Clone)]
pub struct LogoutService {
    client: Client,
    base_url: String,
}

impl LogoutService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Issue one POST to the logout endpoint. Never fails; no retry.
    pub async fn logout(&self) {
        let url = format!("{}/api/logout", self.base_url);
        let result = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(%url, "remote logout succeeded");
            }
            Ok(response) => {
                tracing::warn!(%url, status = %response.status(), "remote logout rejected");
            }
            Err(err) => {
                tracing::warn!(%url, %err, "remote logout unreachable");
            }
        }
    }
}
