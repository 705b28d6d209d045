//! Strategy classification and server capability types.
//!
//! A strategy is a named authentication method advertised by the server
//! (local credentials, LDAP, an OAuth-based identity provider). The kind is
//! derived from the identifier alone; the server-sent configuration never
//! influences classification.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Raw server-supplied configuration per advertised strategy, keyed by
/// strategy id. Rebuilt wholesale on every successful discovery call.
pub type ServerCapabilities = HashMap<String, Value>;

/// Classified authentication strategy kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Server-local username/password accounts.
    Local,
    /// Directory-backed credentials (same exchange shape as local).
    Ldap,
    /// OAuth-based identity provider redirect.
    Idp,
    /// Anything this client does not recognize.
    Unknown,
}

/// Classify a strategy identifier.
///
/// Pure and total: exact `"local"` and `"ldap"` matches, any id starting
/// with `"oauth"` is an identity provider, everything else is unknown.
pub fn classify(id: &str) -> StrategyKind {
    match id {
        "local" => StrategyKind::Local,
        "ldap" => StrategyKind::Ldap,
        _ if id.starts_with("oauth") => StrategyKind::Idp,
        _ => StrategyKind::Unknown,
    }
}

/// A typed, immutable view of one advertised strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyDescriptor {
    /// Strategy identifier, unique within one discovery response.
    pub id: String,
    /// Kind derived from the id via [`classify`].
    pub kind: StrategyKind,
    /// Raw server-sent configuration for this strategy.
    pub parameters: serde_json::Map<String, Value>,
}

impl StrategyDescriptor {
    /// Build a descriptor from a strategy id and its raw configuration.
    pub fn new(id: impl Into<String>, parameters: serde_json::Map<String, Value>) -> Self {
        let id = id.into();
        let kind = classify(&id);
        Self {
            id,
            kind,
            parameters,
        }
    }

    /// Build a descriptor from a `{ "identifier": ..., "strategy": ... }`
    /// object, as found in discovery responses and the local settings cache.
    ///
    /// Returns `None` when `identifier` is absent. An absent `strategy`
    /// config defaults to an empty configuration rather than failing.
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = value.get("identifier")?.as_str()?;
        let parameters = value
            .get("strategy")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Some(Self::new(id, parameters))
    }
}
