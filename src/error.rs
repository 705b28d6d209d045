//! Error taxonomy for the authentication subsystem.
//!
//! Every terminal failure carries a human-readable message separate from its
//! kind, so callers can show a generic status with an optional details
//! expansion without this crate dictating presentation.

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur during discovery, login, and session handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The server could not be reached (connection failure, timeout).
    NetworkUnavailable(String),

    /// The server responded, but the body was not the expected shape.
    MalformedServerResponse(String),

    /// No authentication module is registered for the requested strategy.
    NoMatchingModule(String),

    /// A module performed the exchange and the server rejected it.
    AuthenticationRejected(String),

    /// Offline authentication was requested but no offline module exists.
    OfflineUnavailable,
}

impl AuthError {
    /// The human-readable message for this error, without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::NetworkUnavailable(msg)
            | Self::MalformedServerResponse(msg)
            | Self::NoMatchingModule(msg)
            | Self::AuthenticationRejected(msg) => msg,
            Self::OfflineUnavailable => "offline authentication is not available",
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkUnavailable(msg) => write!(f, "Network unavailable: {}", msg),
            Self::MalformedServerResponse(msg) => write!(f, "Malformed server response: {}", msg),
            Self::NoMatchingModule(msg) => write!(f, "No matching module: {}", msg),
            Self::AuthenticationRejected(msg) => write!(f, "Authentication rejected: {}", msg),
            Self::OfflineUnavailable => write!(f, "{}", self.message()),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::NetworkUnavailable("Request timed out".to_string())
        } else if err.is_connect() {
            Self::NetworkUnavailable(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            Self::MalformedServerResponse(err.to_string())
        } else {
            Self::NetworkUnavailable(err.to_string())
        }
    }
}
