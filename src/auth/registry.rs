//! Registry of authentication modules, one per strategy id.
//!
//! Lookup is by exact id with a fallback to the reserved `offline` module.
//! Installation replaces the prior contents wholesale so strategies removed
//! or renamed on the server disappear immediately.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{AuthError, AuthResult};

use super::{AuthModule, OFFLINE_STRATEGY_ID};

/// Holds `{strategy id -> module}` behind an interior lock so a reader
/// never observes a half-updated map.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: RwLock<HashMap<String, Arc<dyn AuthModule>>>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registry contents wholesale.
    ///
    /// Each module is keyed by its own `strategy_id()`. Never merges with
    /// prior contents.
    pub fn install(&self, modules: Vec<Arc<dyn AuthModule>>) {
        let map = modules
            .into_iter()
            .map(|m| (m.strategy_id().to_string(), m))
            .collect();
        *self.modules.write().expect("registry lock poisoned") = map;
    }

    /// Strategy ids currently registered, in no particular order.
    pub fn strategy_ids(&self) -> Vec<String> {
        self.modules
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Resolve the module for a strategy id.
    ///
    /// Falls back to the module registered under the reserved `offline` id
    /// when no exact match exists; fails when neither is present.
    pub fn resolve(&self, strategy_id: &str) -> AuthResult<Arc<dyn AuthModule>> {
        let modules = self.modules.read().expect("registry lock poisoned");
        modules
            .get(strategy_id)
            .or_else(|| modules.get(OFFLINE_STRATEGY_ID))
            .cloned()
            .ok_or_else(|| {
                AuthError::NoMatchingModule("no module available for strategy".to_string())
            })
    }

    /// Resolve the offline fallback module directly.
    pub fn resolve_offline(&self) -> AuthResult<Arc<dyn AuthModule>> {
        self.modules
            .read()
            .expect("registry lock poisoned")
            .get(OFFLINE_STRATEGY_ID)
            .cloned()
            .ok_or(AuthError::OfflineUnavailable)
    }
}
