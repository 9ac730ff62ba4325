//! # Error Types
//!
//! Domain-specific error types for tabletime-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tabletime-core errors (this file)                                      │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Bad user input, caught before any remote call  │
//! │                                                                         │
//! │  tabletime-store errors (separate crate)                                │
//! │  └── StoreError       - Validation / Conflict / NotFound / Transport   │
//! │                                                                         │
//! │  tabletime-engine errors                                                │
//! │  └── EngineError      - What the host application surfaces             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError ← StoreError          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The billing functions never return these: impossible inputs (negative
//! durations, negative prices) are clamped instead of failing.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A final figure was requested for a session that has no end time yet.
    ///
    /// ## When This Occurs
    /// - Building a history row from a session the store still reports open
    /// - Calling `final_cost` instead of `cost_so_far` on an open session
    #[error("Session {session_id} is still open")]
    SessionStillOpen { session_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These are surfaced inline to the user; no remote call is issued when one
/// of these is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., non-numeric quantity, unparsable date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// A date range whose start lies after its end.
    #[error("Start date {start} cannot be after end date {end}")]
    InvalidRange { start: String, end: String },
}

impl ValidationError {
    /// Creates a Required error for a field.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
