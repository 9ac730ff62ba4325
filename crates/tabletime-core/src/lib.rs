//! # tabletime-core: Pure Billing & Reporting Logic
//!
//! This crate is the **computational core** of Tabletime, a system that bills
//! tables rented by elapsed time plus itemized product orders, and reports on
//! the resulting revenue.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tabletime Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Host application (UI, CLI, ...)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   tabletime-engine: SessionLifecycle, LiveTicker, ReportEngine  │   │
//! │  └──────────────┬──────────────────────────────────┬───────────────┘   │
//! │                 │                                  │                    │
//! │  ┌──────────────▼───────────────────┐  ┌───────────▼───────────────┐   │
//! │  │  ★ tabletime-core (THIS CRATE) ★ │  │  tabletime-store          │   │
//! │  │                                  │  │  RemoteStore contract     │   │
//! │  │  money · time · types · billing  │  │  memory / http stores     │   │
//! │  │  period · report · validation    │  └───────────────────────────┘   │
//! │  └──────────────────────────────────┘                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Integer-cent `Money` and the single rounding point
//! - [`time`] - Elapsed-duration formatting and the injectable [`time::Clock`]
//! - [`types`] - Domain types (Table, TableSession, SessionProductLine, ...)
//! - [`billing`] - SessionBillingEngine: table, product and total cost
//! - [`period`] - Report period resolution on a business calendar
//! - [`report`] - Revenue aggregation and sortable view-models
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output, "now" is a parameter
//! 2. **Round Once**: money is accumulated unrounded and rounded to cents only
//!    when it is emitted to a caller
//! 3. **Frozen Prices**: hourly and unit prices are captured on the session,
//!    never re-read from the catalogue
//! 4. **Explicit Errors**: all errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use tabletime_core::billing::compute_cost;
//! use tabletime_core::{Money, TableSession};
//!
//! let start = Utc.with_ymd_and_hms(2026, 3, 1, 18, 0, 0).unwrap();
//! let session = TableSession::open("s-1", "t-1", "Masa 1", start, Money::from_major(10));
//!
//! let cost = compute_cost(&session, start + Duration::minutes(90));
//! assert_eq!(cost.table_cost, Money::from_cents(1500));
//! assert_eq!(cost.duration_formatted(), "01:30:00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod billing;
pub mod error;
pub mod money;
pub mod period;
pub mod report;
pub mod time;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use billing::{CostBreakdown, FrozenCost, RawCost};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use period::{BusinessCalendar, DateInputs, PeriodSelector, ReportRange};
pub use report::{ReportSorting, ReportViewModel, SortDirection};
pub use time::{Clock, FixedClock, SystemClock};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Milliseconds in one hour; table time is billed in fractional hours.
pub const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Largest quantity accepted for a single order line.
///
/// Guards against typos such as 1000 instead of 10 at the counter.
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Page size used when the full session history is pulled for a report.
pub const REPORT_PAGE_SIZE: u32 = 100;

/// Page size used when browsing history one page at a time.
pub const HISTORY_PAGE_SIZE: u32 = 10;
