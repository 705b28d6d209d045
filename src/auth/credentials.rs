//! Credential-exchange module for server-verified strategies.
//!
//! One module type covers both `local` and `ldap` strategies; the exchange
//! shape is identical, only the sign-in path differs by strategy id. The
//! protocol is two-phase: `login` posts the credentials and retains the
//! short-lived sign-in token, `finish_login` exchanges it for the session
//! token.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};

use crate::error::{AuthError, AuthResult};

use super::identity::IdentityStore;
use super::session::AuthSession;
use super::strategy::StrategyDescriptor;
use super::{AuthModule, AuthenticationStatus, FinishOutcome, LoginOutcome, ModuleLogin};
use async_trait::async_trait;

#[derive(Debug, Deserialize)]
struct SigninResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    device: Option<DeviceStatus>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeviceStatus {
    #[serde(default)]
    registered: bool,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
    #[serde(rename = "expirationDate", default)]
    expiration_date: Option<DateTime<Utc>>,
    #[serde(default)]
    user: Value,
}

/// Credentials carried between `login` and `finish_login`.
#[derive(Debug, Clone)]
struct PendingSignin {
    signin_token: String,
    username: String,
    password: String,
}

/// Username/password exchange against the server's sign-in endpoints.
pub struct CredentialsAuthModule {
    strategy_id: String,
    base_url: String,
    client: Client,
    identity: Arc<IdentityStore>,
    pending: Mutex<Option<PendingSignin>>,
}

impl CredentialsAuthModule {
    /// Create a module bound to one strategy id (`local`, `ldap`).
    pub fn new(
        strategy_id: impl Into<String>,
        base_url: impl Into<String>,
        identity: Arc<IdentityStore>,
    ) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            identity,
            pending: Mutex::new(None),
        }
    }

    fn param<'a>(
        params: &'a serde_json::Map<String, Value>,
        key: &str,
    ) -> AuthResult<&'a str> {
        params
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::AuthenticationRejected(format!("missing parameter: {}", key)))
    }
}

#[async_trait]
impl AuthModule for CredentialsAuthModule {
    fn strategy_id(&self) -> &str {
        &self.strategy_id
    }

    async fn login(
        &self,
        params: &serde_json::Map<String, Value>,
        _strategy: &StrategyDescriptor,
    ) -> AuthResult<ModuleLogin> {
        let username = Self::param(params, "username")?;
        let password = Self::param(params, "password")?;
        let uid = self.identity.retrieve_device_uuid();

        let mut body = serde_json::json!({
            "username": username,
            "password": password,
        });
        if let Some(uid) = uid {
            body["uid"] = Value::String(uid.to_string());
        }

        let url = format!("{}/auth/{}/signin", self.base_url, self.strategy_id);
        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            let message = response.text().await.unwrap_or_default();
            return Ok(ModuleLogin::Complete(LoginOutcome::unable(if message.is_empty() {
                "invalid credentials".to_string()
            } else {
                message
            })));
        }
        if !status.is_success() {
            return Err(AuthError::MalformedServerResponse(format!(
                "server returned {}",
                status
            )));
        }

        let signin: SigninResponse = response
            .json()
            .await
            .map_err(|err| AuthError::MalformedServerResponse(err.to_string()))?;

        if let Some(token) = signin.token {
            *self.pending.lock().expect("pending lock poisoned") = Some(PendingSignin {
                signin_token: token,
                username: username.to_string(),
                password: password.to_string(),
            });
            return Ok(ModuleLogin::NeedsCompletion {
                message: signin.message,
            });
        }

        // No sign-in token: the server registered this device and is
        // holding the account for approval.
        if matches!(signin.device, Some(DeviceStatus { registered: false })) {
            return Ok(ModuleLogin::Complete(LoginOutcome {
                status: AuthenticationStatus::RegistrationSuccess,
                message: signin
                    .message
                    .or_else(|| Some("device registered, awaiting approval".to_string())),
                session: None,
            }));
        }

        Err(AuthError::MalformedServerResponse(
            "sign-in response carried neither token nor device status".to_string(),
        ))
    }

    async fn finish_login(&self) -> AuthResult<FinishOutcome> {
        let Some(pending) = self.pending.lock().expect("pending lock poisoned").take() else {
            return Ok(FinishOutcome::unable("no sign-in in progress"));
        };

        let mut body = serde_json::json!({});
        if let Some(uid) = self.identity.retrieve_device_uuid() {
            body["uid"] = Value::String(uid.to_string());
        }

        let url = format!("{}/auth/token", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .bearer_auth(&pending.signin_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Ok(FinishOutcome::unable(if message.is_empty() {
                format!("token exchange failed ({})", status)
            } else {
                message
            }));
        }

        let exchange: TokenResponse = response
            .json()
            .await
            .map_err(|err| AuthError::MalformedServerResponse(err.to_string()))?;

        // Best-effort: a failure to persist only degrades offline login
        if let Err(err) = self.identity.store_token(Some(exchange.token.clone())) {
            tracing::warn!(%err, "could not persist access token");
        }
        if let Err(err) = self
            .identity
            .store_offline_credential(&pending.username, &pending.password)
        {
            tracing::warn!(%err, "could not persist offline credential");
        }

        let session = AuthSession {
            token: exchange.token.clone(),
            expiration: exchange.expiration_date,
            username: Some(pending.username),
            strategy_id: self.strategy_id.clone(),
            user: exchange.user,
        };

        Ok(FinishOutcome {
            status: AuthenticationStatus::Success,
            message: None,
            token: Some(exchange.token),
            session: Some(session),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn module_in(dir: &TempDir, base: &str) -> CredentialsAuthModule {
        let identity = Arc::new(IdentityStore::open_at(dir.path().join("identity.json")));
        CredentialsAuthModule::new("local", base, identity)
    }

    #[tokio::test]
    async fn test_finish_without_signin_is_unable() {
        let dir = TempDir::new().unwrap();
        let module = module_in(&dir, "http://server.test");

        let outcome = module.finish_login().await.unwrap();
        assert_eq!(outcome.status, AuthenticationStatus::Unable);
        assert_eq!(outcome.message.as_deref(), Some("no sign-in in progress"));
    }

    #[tokio::test]
    async fn test_login_requires_credentials() {
        let dir = TempDir::new().unwrap();
        let module = module_in(&dir, "http://server.test");
        let strategy = StrategyDescriptor::new("local", serde_json::Map::new());

        let err = module
            .login(&serde_json::Map::new(), &strategy)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::AuthenticationRejected("missing parameter: username".to_string())
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let dir = TempDir::new().unwrap();
        let module = module_in(&dir, "http://server.test/");
        assert_eq!(module.base_url, "http://server.test");
    }

    #[test]
    fn test_signin_response_shapes() {
        let with_token: SigninResponse =
            serde_json::from_str(r#"{ "token": "abc" }"#).unwrap();
        assert_eq!(with_token.token.as_deref(), Some("abc"));

        let unregistered: SigninResponse = serde_json::from_str(
            r#"{ "device": { "registered": false }, "message": "pending approval" }"#,
        )
        .unwrap();
        assert!(unregistered.token.is_none());
        assert!(!unregistered.device.unwrap().registered);
    }
}
