//! # Session Billing
//!
//! Computes table-time cost, product cost and total cost for a session.
//!
//! ## Cost Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  hours        = clamp₀(effective_end − start_time) ms / 3 600 000       │
//! │  table_cost   = hours × hourly_price            (fractional, unrounded) │
//! │  products     = Σ quantity × unit_price   over lines with quantity > 0  │
//! │  total        = table_cost + products                                   │
//! │                                                                         │
//! │  Emission:  round2(table) · round2(products) · round2(table+products)   │
//! │             total is NOT round2(table) + round2(products)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Frozen Snapshot
//! While a close is awaiting the payment type, the table cost must stop
//! moving but product edits must still count. [`FrozenCost`] keeps the raw
//! table figure fixed and recomputes the rest on demand.
//!
//! Nothing here fails. Impossible inputs (end before start, negative prices)
//! are clamped to zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::time::{elapsed_ms, format_elapsed, Clock};
use crate::types::{SessionProductLine, TableSession};
use crate::MILLIS_PER_HOUR;

// =============================================================================
// Raw (unrounded) cost
// =============================================================================

/// Unrounded cost components in currency units.
///
/// Reports accumulate these and round only when the view-model is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawCost {
    pub table: f64,
    pub products: f64,
}

impl RawCost {
    #[inline]
    pub fn total(&self) -> f64 {
        self.table + self.products
    }
}

/// Table-time cost for a clamped elapsed duration.
pub fn raw_table_cost(elapsed_ms: i64, hourly_price: Money) -> f64 {
    let hours = elapsed_ms.max(0) as f64 / MILLIS_PER_HOUR as f64;
    hours * hourly_price.clamp_non_negative().to_decimal()
}

/// Σ quantity × unit price over lines with a positive quantity.
pub fn raw_products_cost(lines: &[SessionProductLine]) -> f64 {
    lines
        .iter()
        .filter(|l| l.quantity > 0)
        .map(|l| l.quantity as f64 * l.unit_price.clamp_non_negative().to_decimal())
        .sum()
}

/// Raw cost of a session billed up to `effective_end`.
pub fn raw_cost(session: &TableSession, effective_end: DateTime<Utc>) -> RawCost {
    RawCost {
        table: raw_table_cost(
            elapsed_ms(session.start_time, effective_end),
            session.hourly_price,
        ),
        products: raw_products_cost(&session.lines),
    }
}

// =============================================================================
// Cost Breakdown (emitted)
// =============================================================================

/// Cost figures as presented to a caller, rounded to cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CostBreakdown {
    pub table_cost: Money,
    pub products_cost: Money,
    /// round2(table + products), rounded once.
    pub total_cost: Money,
    /// Elapsed time rounded to the nearest minute.
    pub duration_minutes: i64,
    /// Clamped elapsed milliseconds.
    pub elapsed_ms: i64,
    #[ts(as = "String")]
    pub effective_end: DateTime<Utc>,
}

impl CostBreakdown {
    fn emit(raw: RawCost, elapsed: i64, effective_end: DateTime<Utc>) -> Self {
        Self {
            table_cost: Money::round_from_decimal(raw.table),
            products_cost: Money::round_from_decimal(raw.products),
            total_cost: Money::round_from_decimal(raw.total()),
            duration_minutes: (elapsed as f64 / 60_000.0).round() as i64,
            elapsed_ms: elapsed,
            effective_end,
        }
    }

    /// Elapsed time as `HH:MM:SS`.
    pub fn duration_formatted(&self) -> String {
        format_elapsed(self.elapsed_ms)
    }
}

/// Computes the cost of a session billed up to `effective_end`.
///
/// ```rust
/// use chrono::{Duration, TimeZone, Utc};
/// use tabletime_core::billing::compute_cost;
/// use tabletime_core::{Money, TableSession};
///
/// let start = Utc.with_ymd_and_hms(2026, 3, 1, 18, 0, 0).unwrap();
/// let session = TableSession::open("s", "t", "Masa 1", start, Money::from_major(8));
///
/// // Clock skew: end before start bills nothing.
/// let cost = compute_cost(&session, start - Duration::minutes(3));
/// assert!(cost.total_cost.is_zero());
/// assert_eq!(cost.duration_formatted(), "00:00:00");
/// ```
pub fn compute_cost(session: &TableSession, effective_end: DateTime<Utc>) -> CostBreakdown {
    let elapsed = elapsed_ms(session.start_time, effective_end);
    CostBreakdown::emit(raw_cost(session, effective_end), elapsed, effective_end)
}

/// The end time a session is billed to: its recorded end, or now while open.
pub fn effective_end_time(session: &TableSession, clock: &dyn Clock) -> DateTime<Utc> {
    session.end_time.unwrap_or_else(|| clock.now())
}

/// Cost so far for an open session, or the final cost for a closed one.
pub fn cost_so_far(session: &TableSession, clock: &dyn Clock) -> CostBreakdown {
    compute_cost(session, effective_end_time(session, clock))
}

/// Final cost of a closed session.
///
/// Historical rows must never be billed against "now".
pub fn final_cost(session: &TableSession) -> CoreResult<CostBreakdown> {
    let end = session.end_time.ok_or_else(|| CoreError::SessionStillOpen {
        session_id: session.id.clone(),
    })?;
    Ok(compute_cost(session, end))
}

// =============================================================================
// Frozen Cost
// =============================================================================

/// The cost snapshot a user confirms payment against.
///
/// Captured once when a close is requested. The table component is pinned to
/// `frozen_at`; product edits made afterwards go through [`FrozenCost::relined`].
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenCost {
    frozen_at: DateTime<Utc>,
    elapsed_ms: i64,
    raw_table: f64,
    raw_products: f64,
}

impl FrozenCost {
    /// Freezes the cost of `session` at `frozen_at`.
    pub fn capture(session: &TableSession, frozen_at: DateTime<Utc>) -> Self {
        let raw = raw_cost(session, frozen_at);
        Self {
            frozen_at,
            elapsed_ms: elapsed_ms(session.start_time, frozen_at),
            raw_table: raw.table,
            raw_products: raw.products,
        }
    }

    /// Same frozen table cost, products recomputed from `lines`.
    pub fn relined(&self, lines: &[SessionProductLine]) -> Self {
        Self {
            raw_products: raw_products_cost(lines),
            ..self.clone()
        }
    }

    pub fn frozen_at(&self) -> DateTime<Utc> {
        self.frozen_at
    }

    pub fn raw(&self) -> RawCost {
        RawCost {
            table: self.raw_table,
            products: self.raw_products,
        }
    }

    /// Rounded figures for display.
    pub fn breakdown(&self) -> CostBreakdown {
        CostBreakdown::emit(self.raw(), self.elapsed_ms, self.frozen_at)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
