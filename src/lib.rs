//! Fieldgate - authentication and session bridging for field-data servers.
//!
//! This library exposes the core modules for embedding and testing.

pub mod auth;
pub mod config;
pub mod error;

pub use auth::coordinator::AuthCoordinator;
pub use auth::registry::ModuleRegistry;
pub use auth::session::{AuthSession, SessionStore};
pub use auth::{AuthModule, AuthenticationStatus, FinishOutcome, LoginOutcome, ModuleLogin};
pub use error::{AuthError, AuthResult};
