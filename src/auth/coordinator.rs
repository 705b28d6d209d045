//! Login routing and the end-to-end authentication protocol.
//!
//! The coordinator resolves the module for a strategy, runs its login
//! exchange under a deadline, and commits the resulting session to the
//! session store. Module errors never escape as raw transport errors; they
//! are normalized to `Unable` with the underlying message preserved for
//! diagnostics.
//!
//! Concurrent login attempts are serialized through a single-slot guard:
//! a second attempt started while one is in flight fails fast instead of
//! racing the session store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::registry::ModuleRegistry;
use super::session::SessionStore;
use super::strategy::StrategyDescriptor;
use super::{
    AuthModule, AuthenticationStatus, FinishOutcome, LoginOutcome, ModuleLogin,
    OFFLINE_STRATEGY_ID,
};

/// Default deadline for one module `login`/`finish_login` round-trip.
pub const DEFAULT_MODULE_TIMEOUT: Duration = Duration::from_secs(60);

const TIMEOUT_MESSAGE: &str = "authentication timed out";
const IN_PROGRESS_MESSAGE: &str = "another login attempt is already in progress";

/// Orchestrates module selection, login, completion, and session commit.
pub struct AuthCoordinator {
    registry: Arc<ModuleRegistry>,
    session_store: Arc<SessionStore>,
    module_timeout: Duration,
    /// Single-slot guard over login attempts.
    in_flight: tokio::sync::Mutex<()>,
    /// Modules retained between a NeedsCompletion login and its
    /// finish_login, keyed by strategy id.
    pending: Mutex<HashMap<String, Arc<dyn AuthModule>>>,
}

impl AuthCoordinator {
    pub fn new(registry: Arc<ModuleRegistry>, session_store: Arc<SessionStore>) -> Self {
        Self {
            registry,
            session_store,
            module_timeout: DEFAULT_MODULE_TIMEOUT,
            in_flight: tokio::sync::Mutex::new(()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Override the per-invocation module deadline.
    pub fn with_module_timeout(mut self, timeout: Duration) -> Self {
        self.module_timeout = timeout;
        self
    }

    /// Route a login attempt to the module matching the strategy.
    ///
    /// `Complete` outcomes with `Success`/`RegistrationSuccess` have already
    /// been committed to the session store when they carry a session;
    /// `Unable` leaves the store untouched. `NeedsCompletion` means the
    /// caller must follow up with [`finish_login`](Self::finish_login).
    pub async fn login(
        &self,
        strategy: &StrategyDescriptor,
        params: &serde_json::Map<String, serde_json::Value>,
    ) -> ModuleLogin {
        let Ok(_guard) = self.in_flight.try_lock() else {
            return ModuleLogin::Complete(LoginOutcome::unable(IN_PROGRESS_MESSAGE));
        };

        let module = match self.registry.resolve(&strategy.id) {
            Ok(module) => module,
            Err(err) => return ModuleLogin::Complete(LoginOutcome::unable(err.message())),
        };

        self.run_login(module, strategy, params).await
    }

    /// Authenticate against the offline module directly, bypassing
    /// capability discovery and registry id-matching.
    ///
    /// Absence of an offline module reports `Unable` with a distinguishable
    /// message so callers can hint differently than a generic failure.
    pub async fn login_offline(
        &self,
        params: &serde_json::Map<String, serde_json::Value>,
    ) -> ModuleLogin {
        let Ok(_guard) = self.in_flight.try_lock() else {
            return ModuleLogin::Complete(LoginOutcome::unable(IN_PROGRESS_MESSAGE));
        };

        let module = match self.registry.resolve_offline() {
            Ok(module) => module,
            Err(err) => return ModuleLogin::Complete(LoginOutcome::unable(err.message())),
        };

        let strategy = StrategyDescriptor::new(OFFLINE_STRATEGY_ID, serde_json::Map::new());
        self.run_login(module, &strategy, params).await
    }

    /// Complete a login that reached `NeedsCompletion`.
    ///
    /// Re-resolves the module retained for the strategy, falling back to the
    /// registry (exact-then-offline) when none was retained.
    pub async fn finish_login(&self, strategy_id: &str) -> FinishOutcome {
        let retained = self
            .pending
            .lock()
            .expect("pending lock poisoned")
            .remove(strategy_id);
        let module = match retained {
            Some(module) => module,
            None => match self.registry.resolve(strategy_id) {
                Ok(module) => module,
                Err(err) => return FinishOutcome::unable(err.message()),
            },
        };

        let outcome =
            match tokio::time::timeout(self.module_timeout, module.finish_login()).await {
                Err(_) => FinishOutcome::unable(TIMEOUT_MESSAGE),
                Ok(Err(err)) => FinishOutcome::unable(err.message()),
                Ok(Ok(outcome)) => outcome,
            };

        self.commit(&outcome.status, outcome.session.as_ref());
        outcome
    }

    async fn run_login(
        &self,
        module: Arc<dyn AuthModule>,
        strategy: &StrategyDescriptor,
        params: &serde_json::Map<String, serde_json::Value>,
    ) -> ModuleLogin {
        let result =
            tokio::time::timeout(self.module_timeout, module.login(params, strategy)).await;

        match result {
            Err(_) => ModuleLogin::Complete(LoginOutcome::unable(TIMEOUT_MESSAGE)),
            Ok(Err(err)) => {
                tracing::debug!(strategy = %strategy.id, %err, "module login failed");
                ModuleLogin::Complete(LoginOutcome::unable(err.message()))
            }
            Ok(Ok(ModuleLogin::NeedsCompletion { message })) => {
                self.pending
                    .lock()
                    .expect("pending lock poisoned")
                    .insert(strategy.id.clone(), module);
                ModuleLogin::NeedsCompletion { message }
            }
            Ok(Ok(ModuleLogin::Complete(outcome))) => {
                self.commit(&outcome.status, outcome.session.as_ref());
                ModuleLogin::Complete(outcome)
            }
        }
    }

    /// Commit rule: only successful outcomes ever touch the session store,
    /// so no partial session is committed on failure.
    fn commit(&self, status: &AuthenticationStatus, session: Option<&super::session::AuthSession>) {
        if matches!(
            status,
            AuthenticationStatus::Success | AuthenticationStatus::RegistrationSuccess
        ) {
            if let Some(session) = session {
                self.session_store.set(session.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::AuthSession;
    use crate::error::{AuthError, AuthResult};
    use async_trait::async_trait;
    use serde_json::Value;

    struct FixedModule {
        id: &'static str,
        login_result: ModuleLogin,
        finish_result: FinishOutcome,
    }

    impl FixedModule {
        fn completing(id: &'static str, outcome: LoginOutcome) -> Arc<dyn AuthModule> {
            Arc::new(Self {
                id,
                login_result: ModuleLogin::Complete(outcome),
                finish_result: FinishOutcome::default(),
            })
        }
    }

    #[async_trait]
    impl AuthModule for FixedModule {
        fn strategy_id(&self) -> &str {
            self.id
        }

        async fn login(
            &self,
            _params: &serde_json::Map<String, Value>,
            _strategy: &StrategyDescriptor,
        ) -> AuthResult<ModuleLogin> {
            Ok(self.login_result.clone())
        }

        async fn finish_login(&self) -> AuthResult<FinishOutcome> {
            Ok(self.finish_result.clone())
        }
    }

    struct FailingModule;

    #[async_trait]
    impl AuthModule for FailingModule {
        fn strategy_id(&self) -> &str {
            "local"
        }

        async fn login(
            &self,
            _params: &serde_json::Map<String, Value>,
            _strategy: &StrategyDescriptor,
        ) -> AuthResult<ModuleLogin> {
            Err(AuthError::NetworkUnavailable("connection reset".to_string()))
        }
    }

    fn harness(modules: Vec<Arc<dyn AuthModule>>) -> (AuthCoordinator, Arc<SessionStore>) {
        let registry = Arc::new(ModuleRegistry::new());
        registry.install(modules);
        let store = Arc::new(SessionStore::new());
        (AuthCoordinator::new(registry, Arc::clone(&store)), store)
    }

    fn local_strategy() -> StrategyDescriptor {
        StrategyDescriptor::new("local", serde_json::Map::new())
    }

    #[tokio::test]
    async fn test_success_commits_session() {
        let outcome = LoginOutcome {
            status: AuthenticationStatus::Success,
            message: None,
            session: Some(AuthSession::new("tok", "local")),
        };
        let (coordinator, store) = harness(vec![FixedModule::completing("local", outcome)]);

        let result = coordinator
            .login(&local_strategy(), &serde_json::Map::new())
            .await;
        assert!(matches!(
            result,
            ModuleLogin::Complete(LoginOutcome {
                status: AuthenticationStatus::Success,
                ..
            })
        ));
        assert_eq!(store.current().unwrap().token, "tok");
    }

    #[tokio::test]
    async fn test_unable_leaves_store_untouched() {
        let (coordinator, store) = harness(vec![FixedModule::completing(
            "local",
            LoginOutcome::unable("rejected"),
        )]);

        let result = coordinator
            .login(&local_strategy(), &serde_json::Map::new())
            .await;
        let ModuleLogin::Complete(outcome) = result else {
            panic!("expected terminal outcome");
        };
        assert_eq!(outcome.status, AuthenticationStatus::Unable);
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn test_module_error_normalized_to_unable() {
        let (coordinator, store) = harness(vec![Arc::new(FailingModule)]);

        let result = coordinator
            .login(&local_strategy(), &serde_json::Map::new())
            .await;
        let ModuleLogin::Complete(outcome) = result else {
            panic!("expected terminal outcome");
        };
        assert_eq!(outcome.status, AuthenticationStatus::Unable);
        assert_eq!(outcome.message.as_deref(), Some("connection reset"));
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn test_unknown_strategy_without_offline() {
        let (coordinator, _) = harness(vec![]);

        let result = coordinator
            .login(&local_strategy(), &serde_json::Map::new())
            .await;
        let ModuleLogin::Complete(outcome) = result else {
            panic!("expected terminal outcome");
        };
        assert_eq!(outcome.status, AuthenticationStatus::Unable);
        assert_eq!(
            outcome.message.as_deref(),
            Some("no module available for strategy")
        );
    }

    #[tokio::test]
    async fn test_offline_unavailable_message() {
        let (coordinator, _) = harness(vec![]);

        let result = coordinator.login_offline(&serde_json::Map::new()).await;
        let ModuleLogin::Complete(outcome) = result else {
            panic!("expected terminal outcome");
        };
        assert_eq!(
            outcome.message.as_deref(),
            Some("offline authentication is not available")
        );
    }

    #[tokio::test]
    async fn test_registration_success_reported_and_committed() {
        let outcome = LoginOutcome {
            status: AuthenticationStatus::RegistrationSuccess,
            message: Some("account created".to_string()),
            session: Some(AuthSession::new("fresh", "offline")),
        };
        let (coordinator, store) = harness(vec![FixedModule::completing("offline", outcome)]);

        let result = coordinator.login_offline(&serde_json::Map::new()).await;
        let ModuleLogin::Complete(outcome) = result else {
            panic!("expected terminal outcome");
        };
        assert_eq!(outcome.status, AuthenticationStatus::RegistrationSuccess);
        assert_eq!(store.current().unwrap().token, "fresh");
    }

    #[tokio::test]
    async fn test_needs_completion_then_finish() {
        let module = Arc::new(FixedModule {
            id: "oauth-idp",
            login_result: ModuleLogin::NeedsCompletion {
                message: Some("continue in browser".to_string()),
            },
            finish_result: FinishOutcome {
                status: AuthenticationStatus::Success,
                message: None,
                token: Some("follow-up".to_string()),
                session: Some(AuthSession::new("session-tok", "oauth-idp")),
            },
        });
        let (coordinator, store) = harness(vec![module]);
        let strategy = StrategyDescriptor::new("oauth-idp", serde_json::Map::new());

        let result = coordinator.login(&strategy, &serde_json::Map::new()).await;
        assert!(matches!(result, ModuleLogin::NeedsCompletion { .. }));
        assert!(store.current().is_none());

        let outcome = coordinator.finish_login("oauth-idp").await;
        assert_eq!(outcome.status, AuthenticationStatus::Success);
        assert_eq!(outcome.token.as_deref(), Some("follow-up"));
        assert_eq!(store.current().unwrap().token, "session-tok");
    }

    #[tokio::test]
    async fn test_finish_without_any_module() {
        let (coordinator, _) = harness(vec![]);
        let outcome = coordinator.finish_login("oauth-idp").await;
        assert_eq!(outcome.status, AuthenticationStatus::Unable);
        assert_eq!(
            outcome.message.as_deref(),
            Some("no module available for strategy")
        );
    }

    #[tokio::test]
    async fn test_login_timeout_is_unable() {
        struct SlowModule;

        #[async_trait]
        impl AuthModule for SlowModule {
            fn strategy_id(&self) -> &str {
                "local"
            }

            async fn login(
                &self,
                _params: &serde_json::Map<String, Value>,
                _strategy: &StrategyDescriptor,
            ) -> AuthResult<ModuleLogin> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(ModuleLogin::Complete(LoginOutcome::default()))
            }
        }

        let registry = Arc::new(ModuleRegistry::new());
        registry.install(vec![Arc::new(SlowModule)]);
        let store = Arc::new(SessionStore::new());
        let coordinator = AuthCoordinator::new(registry, store)
            .with_module_timeout(Duration::from_millis(20));

        let result = coordinator
            .login(&local_strategy(), &serde_json::Map::new())
            .await;
        let ModuleLogin::Complete(outcome) = result else {
            panic!("expected terminal outcome");
        };
        assert_eq!(outcome.message.as_deref(), Some("authentication timed out"));
    }

    #[tokio::test]
    async fn test_second_concurrent_attempt_rejected() {
        struct BlockingModule {
            release: Arc<tokio::sync::Notify>,
        }

        #[async_trait]
        impl AuthModule for BlockingModule {
            fn strategy_id(&self) -> &str {
                "local"
            }

            async fn login(
                &self,
                _params: &serde_json::Map<String, Value>,
                _strategy: &StrategyDescriptor,
            ) -> AuthResult<ModuleLogin> {
                self.release.notified().await;
                Ok(ModuleLogin::Complete(LoginOutcome {
                    status: AuthenticationStatus::Success,
                    message: None,
                    session: Some(AuthSession::new("tok", "local")),
                }))
            }
        }

        let release = Arc::new(tokio::sync::Notify::new());
        let registry = Arc::new(ModuleRegistry::new());
        registry.install(vec![Arc::new(BlockingModule {
            release: Arc::clone(&release),
        })]);
        let store = Arc::new(SessionStore::new());
        let coordinator = Arc::new(AuthCoordinator::new(registry, store));

        let first = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .login(&local_strategy(), &serde_json::Map::new())
                    .await
            })
        };
        // Let the first attempt reach the module and park on the notify
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = coordinator
            .login(&local_strategy(), &serde_json::Map::new())
            .await;
        let ModuleLogin::Complete(outcome) = second else {
            panic!("expected terminal outcome");
        };
        assert_eq!(
            outcome.message.as_deref(),
            Some("another login attempt is already in progress")
        );

        release.notify_one();
        let first = first.await.unwrap();
        assert!(matches!(
            first,
            ModuleLogin::Complete(LoginOutcome {
                status: AuthenticationStatus::Success,
                ..
            })
        ));
    }
}
