//! Unified error handling for the ride-nav library.
//!
//! Every fallible operation returns [`NavError`]. An empty directions result
//! ("no route found") is not an error and is modelled as an empty `Route`;
//! corrupt recent-route history is recovered inside the store and never
//! surfaces here.

use thiserror::Error;

/// Unified error type for navigation operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavError {
    /// Malformed coordinates, an empty path, or a missing origin/destination.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// The directions service answered with a non-success status, could not be
    /// reached, or returned a body that does not parse.
    #[error("{}", format_request_failure(.status, .message))]
    RouteRequestFailed {
        status: Option<u16>,
        message: String,
        /// Raw response body, kept for diagnostics.
        body: String,
    },

    /// A user intent that the current navigation state does not accept.
    #[error("Cannot {action} while {state}")]
    InvalidTransition { action: String, state: String },

    /// Durable storage could not be read or written.
    #[error("Persistence error: {message}")]
    PersistenceError { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn format_request_failure(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Route request failed ({}): {}", code, message),
        None => format!("Route request failed: {}", message),
    }
}

impl NavError {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        NavError::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_transition(action: &str, state: impl std::fmt::Display) -> Self {
        NavError::InvalidTransition {
            action: action.to_string(),
            state: state.to_string(),
        }
    }

    pub(crate) fn persistence(message: impl Into<String>) -> Self {
        NavError::PersistenceError {
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        NavError::ConfigError {
            message: message.into(),
        }
    }
}

#[cfg(feature = "persistence")]
impl From<rusqlite::Error> for NavError {
    fn from(e: rusqlite::Error) -> Self {
        NavError::persistence(e.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for NavError {
    fn from(e: reqwest::Error) -> Self {
        NavError::RouteRequestFailed {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
            body: String::new(),
        }
    }
}

/// Result type alias for navigation operations.
pub type Result<T> = std::result::Result<T, NavError>;

/// Extension trait for converting Option to NavError.
pub trait OptionExt<T> {
    /// Convert Option to Result with an invalid input error.
    fn ok_or_invalid_input(self, message: &str) -> Result<T>;

    /// Convert Option to Result with generic internal error.
    fn ok_or_internal(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_invalid_input(self, message: &str) -> Result<T> {
        self.ok_or_else(|| NavError::invalid_input(message))
    }

    fn ok_or_internal(self, message: &str) -> Result<T> {
        self.ok_or_else(|| NavError::Internal {
            message: message.to_string(),
        })
    }
}
