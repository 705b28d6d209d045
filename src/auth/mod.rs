//! Authentication subsystem: strategy discovery, module registry, login
//! coordination, and session state.
//!
//! The pieces wire together at the composition root: discovery produces
//! [`strategy::ServerCapabilities`], the caller installs one [`AuthModule`]
//! per strategy into the [`registry::ModuleRegistry`], and the
//! [`coordinator::AuthCoordinator`] routes login attempts through the
//! matching module before committing the resulting session to the
//! [`session::SessionStore`].

pub mod cache;
pub mod coordinator;
pub mod credentials;
pub mod discovery;
pub mod identity;
pub mod logout;
pub mod offline;
pub mod registry;
pub mod session;
pub mod strategy;
pub mod token_url;

use async_trait::async_trait;

use crate::error::AuthResult;
use session::AuthSession;
use strategy::StrategyDescriptor;

/// Reserved strategy id for the offline fallback module.
pub const OFFLINE_STRATEGY_ID: &str = "offline";

/// Tagged result of a login or completion attempt.
///
/// Statuses are never silently coerced between kinds; a module-specific
/// status passes through as [`AuthenticationStatus::Module`] unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthenticationStatus {
    /// Login completed and produced an authenticated session.
    Success,
    /// First-time account or device registration completed as part of login.
    RegistrationSuccess,
    /// The attempt failed; the accompanying message says why.
    #[default]
    Unable,
    /// Module-specific status passed through unchanged.
    Module(String),
}

/// Terminal result of a module `login` or the coordinator's `login`.
#[derive(Debug, Clone, Default)]
pub struct LoginOutcome {
    pub status: AuthenticationStatus,
    pub message: Option<String>,
    pub session: Option<AuthSession>,
}

impl LoginOutcome {
    /// An `Unable` outcome carrying only a message.
    pub fn unable(message: impl Into<String>) -> Self {
        Self {
            status: AuthenticationStatus::Unable,
            message: Some(message.into()),
            session: None,
        }
    }
}

/// Result of a module `finish_login`, optionally carrying a follow-up token.
#[derive(Debug, Clone, Default)]
pub struct FinishOutcome {
    pub status: AuthenticationStatus,
    pub message: Option<String>,
    /// Follow-up token for subsequent authenticated calls, when the
    /// completion exchange issued one.
    pub token: Option<String>,
    pub session: Option<AuthSession>,
}

impl FinishOutcome {
    /// An `Unable` outcome carrying only a message.
    pub fn unable(message: impl Into<String>) -> Self {
        Self {
            status: AuthenticationStatus::Unable,
            message: Some(message.into()),
            token: None,
            session: None,
        }
    }
}

/// What a module's `login` produced: either a terminal outcome, or a request
/// for a second round-trip through [`AuthModule::finish_login`].
#[derive(Debug, Clone)]
pub enum ModuleLogin {
    /// Terminal result, no further step required.
    Complete(LoginOutcome),
    /// A completion exchange is required to produce a session.
    NeedsCompletion { message: Option<String> },
}

/// Pluggable handler implementing the login protocol for one strategy.
///
/// Every module family (credential exchange, offline verification, external
/// IDP redirect) sits behind this one trait with the one status vocabulary,
/// so the coordinator never branches on the concrete module type. A module
/// may hold its own internal protocol state between `login` and
/// `finish_login` (e.g. an in-flight sign-in token), but is stateless
/// between attempts from the coordinator's perspective.
#[async_trait]
pub trait AuthModule: Send + Sync {
    /// The strategy id this module is bound to, or
    /// [`OFFLINE_STRATEGY_ID`] for the offline fallback.
    fn strategy_id(&self) -> &str;

    /// Perform the protocol-specific login exchange.
    async fn login(
        &self,
        params: &serde_json::Map<String, serde_json::Value>,
        strategy: &StrategyDescriptor,
    ) -> AuthResult<ModuleLogin>;

    /// Complete a login that returned [`ModuleLogin::NeedsCompletion`].
    ///
    /// The default implementation reports `Unable`; modules whose protocol
    /// is single-step never need to override it.
    async fn finish_login(&self) -> AuthResult<FinishOutcome> {
        Ok(FinishOutcome::unable("login has no completion step"))
    }
}

impl std::fmt::Debug for dyn AuthModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthModule")
            .field("strategy_id", &self.strategy_id())
            .finish()
    }
}
