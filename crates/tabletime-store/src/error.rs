//! # Store Error Types
//!
//! Error types for remote store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  HTTP status / reqwest::Error / MemoryStore rule                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Categorized, carries the remote reason     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  EngineError (tabletime-engine) ← Adds lifecycle context               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  user_message() shown inline by the host                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Status Mapping
//! ```text
//! 400, 422  → Validation
//! 401, 403  → Unauthorized
//! 404       → NotFound
//! 409       → Conflict
//! other     → Transport
//! ```

use tabletime_core::ValidationError;
use thiserror::Error;

/// Message used when the remote response carries no reason of its own.
pub const GENERIC_FAILURE: &str = "The request could not be completed";

/// Remote store errors.
///
/// Every variant carries a human-readable reason, taken from the remote
/// response when one was available.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store rejected the input.
    ///
    /// ## When This Occurs
    /// - Unknown payment type, negative price, malformed id
    /// - HTTP 400 / 422
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    /// The authoritative state changed underneath the caller.
    ///
    /// ## When This Occurs
    /// - Starting a session on a table that already has one open
    /// - Ending a session that was already closed by another client
    /// - Editing lines of a closed session
    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    /// Entity not found.
    #[error("Not found: {reason}")]
    NotFound { reason: String },

    /// Missing, expired or insufficient credentials.
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// Network unreachable, timeout or an unexpected server failure.
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    /// The response could not be understood.
    #[error("Could not decode response: {reason}")]
    Decode { reason: String },
}

impl StoreError {
    pub fn validation(reason: impl Into<String>) -> Self {
        StoreError::Validation {
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        StoreError::Conflict {
            reason: reason.into(),
        }
    }

    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: &str, id: &str) -> Self {
        StoreError::NotFound {
            reason: format!("{entity} {id} not found"),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        StoreError::Transport {
            reason: reason.into(),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        StoreError::Decode {
            reason: reason.into(),
        }
    }

    /// Maps an HTTP status and optional remote message to an error.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        let reason = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("{GENERIC_FAILURE} (HTTP {status})"));
        match status {
            400 | 422 => StoreError::Validation { reason },
            401 | 403 => StoreError::Unauthorized { reason },
            404 => StoreError::NotFound { reason },
            409 => StoreError::Conflict { reason },
            _ => StoreError::Transport { reason },
        }
    }

    /// Returns true if this error means the state changed concurrently.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Returns true if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Transport { .. })
    }

    /// The remote (or generated) reason without the category prefix.
    pub fn reason(&self) -> &str {
        match self {
            StoreError::Validation { reason }
            | StoreError::Conflict { reason }
            | StoreError::NotFound { reason }
            | StoreError::Unauthorized { reason }
            | StoreError::Transport { reason }
            | StoreError::Decode { reason } => reason,
        }
    }

    /// Text suitable for showing to the person at the counter.
    pub fn user_message(&self) -> String {
        match self {
            StoreError::Validation { reason } | StoreError::NotFound { reason } => reason.clone(),
            StoreError::Conflict { reason } => {
                format!("{reason}. Refresh to see the latest state.")
            }
            StoreError::Unauthorized { .. } => "Your sign-in has expired. Please sign in again.".to_string(),
            StoreError::Transport { reason } => {
                format!("{reason}. Check the connection and try again.")
            }
            StoreError::Decode { .. } => {
                "The server sent a response that could not be read.".to_string()
            }
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(err: ValidationError) -> Self {
        StoreError::Validation {
            reason: err.to_string(),
        }
    }
}

/// Convert reqwest errors to StoreError.
///
/// ## Error Mapping
/// ```text
/// status error         → from_status(code)
/// body decode failure  → Decode
/// connect / timeout    → Transport
/// ```
impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return StoreError::from_status(status.as_u16(), None);
        }
        if err.is_decode() {
            return StoreError::decode(err.to_string());
        }
        if err.is_timeout() {
            return StoreError::transport("The server did not answer in time");
        }
        if err.is_connect() {
            return StoreError::transport("The server could not be reached");
        }
        StoreError::transport(err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
