//! # Validation Module
//!
//! Input validation for everything a user can type before a remote call.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Host UI                                                      │
//! │  └── Immediate feedback (empty fields, pickers)                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Engine (Rust)                                                │
//! │  └── THIS MODULE: quantities, prices, dates, paging                    │
//! │      A failure here means NO remote call is issued                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Remote store                                                 │
//! │  └── Authoritative rules (one open session per table, ...)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tabletime_core::validation::{parse_quantity, normalize_quantity};
//!
//! assert_eq!(parse_quantity(" 3 ").unwrap(), 3);
//! assert!(parse_quantity("three").is_err());
//! assert_eq!(normalize_quantity(-2).unwrap(), 0); // removal
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::money::Money;
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Largest page a caller may request from the store.
pub const MAX_PAGE_SIZE: u32 = 1000;

// =============================================================================
// Identifiers
// =============================================================================

/// Rejects empty or whitespace-only ids.
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(())
}

// =============================================================================
// Quantities
// =============================================================================

/// Parses a quantity typed by the user.
pub fn parse_quantity(input: &str) -> ValidationResult<i64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::required("quantity"));
    }
    trimmed
        .parse::<i64>()
        .map_err(|_| ValidationError::InvalidFormat {
            field: "quantity".to_string(),
            reason: format!("'{trimmed}' is not a whole number"),
        })
}

/// Normalizes a requested line quantity.
///
/// Anything at or below zero means "remove the line" and becomes 0.
/// Quantities above [`MAX_LINE_QUANTITY`] are rejected.
pub fn normalize_quantity(quantity: i64) -> ValidationResult<i64> {
    if quantity > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: MAX_LINE_QUANTITY,
        });
    }
    Ok(quantity.max(0))
}

// =============================================================================
// Prices
// =============================================================================

pub fn validate_price(field: &str, price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Dates & Paging
// =============================================================================

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(field: &str, input: &str) -> ValidationResult<NaiveDate> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::required(field));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|e| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: format!("expected YYYY-MM-DD ({e})"),
    })
}

/// Page numbers start at 1; sizes are 1..=[`MAX_PAGE_SIZE`].
pub fn validate_page(page_number: u32, page_size: u32) -> ValidationResult<()> {
    if page_number == 0 {
        return Err(ValidationError::OutOfRange {
            field: "pageNumber".to_string(),
            min: 1,
            max: u32::MAX as i64,
        });
    }
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(ValidationError::OutOfRange {
            field: "pageSize".to_string(),
            min: 1,
            max: MAX_PAGE_SIZE as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
