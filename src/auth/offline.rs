//! Offline fallback authentication.
//!
//! Verifies credentials against the salted digest recorded by the last
//! successful online login. Never performs network I/O; a session is
//! rebuilt from the stored access token when one exists.

use serde_json::Value;
use std::sync::Arc;

use crate::error::AuthResult;

use super::identity::IdentityStore;
use super::session::AuthSession;
use super::strategy::StrategyDescriptor;
use super::{
    AuthModule, AuthenticationStatus, FinishOutcome, LoginOutcome, ModuleLogin,
    OFFLINE_STRATEGY_ID,
};
use async_trait::async_trait;

/// Module registered under the reserved `offline` strategy id.
pub struct OfflineAuthModule {
    identity: Arc<IdentityStore>,
}

impl OfflineAuthModule {
    pub fn new(identity: Arc<IdentityStore>) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl AuthModule for OfflineAuthModule {
    fn strategy_id(&self) -> &str {
        OFFLINE_STRATEGY_ID
    }

    async fn login(
        &self,
        params: &serde_json::Map<String, Value>,
        _strategy: &StrategyDescriptor,
    ) -> AuthResult<ModuleLogin> {
        let username = params.get("username").and_then(Value::as_str).unwrap_or("");
        let password = params.get("password").and_then(Value::as_str).unwrap_or("");

        if !self.identity.verify_offline(username, password) {
            return Ok(ModuleLogin::Complete(LoginOutcome::unable(
                "stored credentials do not match",
            )));
        }

        let session = self.identity.token().map(|token| {
            let mut session = AuthSession::new(token, OFFLINE_STRATEGY_ID);
            session.username = Some(username.to_string());
            session
        });

        Ok(ModuleLogin::Complete(LoginOutcome {
            status: AuthenticationStatus::Success,
            message: None,
            session,
        }))
    }

    async fn finish_login(&self) -> AuthResult<FinishOutcome> {
        Ok(FinishOutcome::unable("offline login has no completion step"))
    }
}
