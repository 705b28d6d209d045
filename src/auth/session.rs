//! Process-wide session state.
//!
//! Exactly one authenticated session (or none) exists at any instant. The
//! store is constructed once at process start and handed by reference to
//! whatever needs it; there is no static global.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::RwLock;

/// Token/credential bundle plus derived metadata for a logged-in user.
///
/// Owned exclusively by the [`SessionStore`] once committed; readers get
/// cloned snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    /// Access token for authenticated API calls.
    pub token: String,
    /// When the token expires, if the server said.
    pub expiration: Option<DateTime<Utc>>,
    /// Username the session was established for.
    pub username: Option<String>,
    /// Strategy id the session was established through.
    pub strategy_id: String,
    /// Raw user object from the server, if any.
    #[serde(default)]
    pub user: Value,
}

impl AuthSession {
    /// Create a session with just a token and strategy id.
    pub fn new(token: impl Into<String>, strategy_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expiration: None,
            username: None,
            strategy_id: strategy_id.into(),
            user: Value::Null,
        }
    }

    /// Whether the session's token is past its expiration, when known.
    pub fn is_expired(&self) -> bool {
        self.expiration.map(|exp| exp < Utc::now()).unwrap_or(false)
    }
}

/// Single authoritative holder of the current session.
///
/// All reads and writes go through the interior lock; a reader never
/// observes a half-written session. Last writer wins across concurrent
/// successful logins; serializing distinct attempts is the coordinator's
/// job, not this store's.
#[derive(Debug, Default)]
pub struct SessionStore {
    current: RwLock<Option<AuthSession>>,
}

impl SessionStore {
    /// Create an empty store. Call once at process start.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current session, if any.
    pub fn current(&self) -> Option<AuthSession> {
        self.current.read().expect("session lock poisoned").clone()
    }

    /// Whether a session is present.
    pub fn is_authenticated(&self) -> bool {
        self.current.read().expect("session lock poisoned").is_some()
    }

    /// Install a new session, overwriting any previous one.
    pub fn set(&self, session: AuthSession) {
        *self.current.write().expect("session lock poisoned") = Some(session);
    }

    /// Remove the current session.
    ///
    /// Called on explicit logout or on an authentication-revoked signal
    /// (e.g. a 401 on an authenticated call).
    pub fn clear(&self) {
        *self.current.write().expect("session lock poisoned") = None;
    }
}
