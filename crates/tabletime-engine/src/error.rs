//! # Engine Error Types
//!
//! Error types for lifecycle, ticker and report operations.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Remote         │  │  Local input    │  │  Lifecycle              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Store(..)      │  │  Validation     │  │  InvalidState           │ │
//! │  │  conflict,      │  │  Core           │  │  ContextClosed          │ │
//! │  │  transport, ... │  │                 │  │  Ticker                 │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │  Configuration  │                                                   │
//! │  │  InvalidConfig  │                                                   │
//! │  │  ConfigLoad     │                                                   │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tabletime_core::{CoreError, ValidationError};
use tabletime_store::StoreError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Remote
    // =========================================================================
    /// The remote store rejected or failed the request.
    #[error(transparent)]
    Store(#[from] StoreError),

    // =========================================================================
    // Local input
    // =========================================================================
    /// Bad input caught before any remote call was issued.
    ///
    /// ## When This Occurs
    /// - Report period needs a date that was not supplied
    /// - Start date after end date
    /// - Quantity above the per-line limit
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Lifecycle
    // =========================================================================
    /// The operation is not legal in the table's current state.
    ///
    /// ## When This Occurs
    /// - `start` on a table the engine already believes is active
    /// - `confirm_end` without a preceding `request_end`
    #[error("Cannot {operation} table {table} while it is {state}")]
    InvalidState {
        table: String,
        state: String,
        operation: String,
    },

    /// The session is not open in the engine's working copy.
    #[error("Session {0} is not open on any table")]
    UnknownSession(String),

    /// The view that issued the request was closed before it completed.
    #[error("The session view was closed; result ignored")]
    ContextClosed,

    /// The live ticker task is no longer running.
    #[error("Live ticker is not running")]
    TickerStopped,

    // =========================================================================
    // Configuration
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoad(String),
}

impl EngineError {
    pub fn invalid_state(table: &str, state: impl ToString, operation: &str) -> Self {
        EngineError::InvalidState {
            table: table.to_string(),
            state: state.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Returns true if the remote state changed underneath us.
    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Store(e) if e.is_conflict())
    }

    /// Text to show inline next to the control that failed.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::Store(e) => e.user_message(),
            EngineError::Validation(e) => e.to_string(),
            EngineError::Core(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ConfigLoad(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::ConfigLoad(err.to_string())
    }
}
