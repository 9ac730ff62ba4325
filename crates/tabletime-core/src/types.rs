//! # Domain Types
//!
//! Core domain types used throughout Tabletime.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────────┐   ┌─────────────────┐  │
//! │  │     Table       │   │    TableSession      │   │    Product      │  │
//! │  │  ─────────────  │   │  ──────────────────  │   │  ─────────────  │  │
//! │  │  id             │◄──│  table_id            │   │  id             │  │
//! │  │  name           │   │  start_time (once)   │   │  name           │  │
//! │  │  table_type     │   │  end_time (once)     │   │  price          │  │
//! │  │  current_hourly │──►│  hourly_price (frozen│   │  stock          │  │
//! │  │  is_active      │   │  lines ─────────┐    │   └────────┬────────┘  │
//! │  └─────────────────┘   │  payment_type   │    │            │ price     │
//! │                        └─────────────────┼────┘            │ captured  │
//! │                                          ▼                 ▼ at add    │
//! │                              ┌──────────────────────────────────┐      │
//! │                              │  SessionProductLine              │      │
//! │                              │  product_id, quantity ≥ 0,       │      │
//! │                              │  unit_price (frozen)             │      │
//! │                              └──────────────────────────────────┘      │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                              │
//! │  │    Expense      │   │  PaymentType    │                              │
//! │  │  independent    │   │  Cash=0 Card=1  │                              │
//! │  │  ledger         │   │  Transfer=2     │                              │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! `TableSession::hourly_price` and `SessionProductLine::unit_price` are copied
//! at the moment the session starts and the line is added. Catalogue edits
//! afterwards never reach an open order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Table
// =============================================================================

/// A rentable table, as cached from the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Table {
    pub id: String,

    /// Display name, e.g. "Masa 3".
    pub name: String,

    /// Optional category (pool, snooker, ...).
    pub table_type: Option<String>,

    /// Price per hour for sessions started from now on.
    pub current_hourly_price: Money,

    /// True while exactly one session is open on this table.
    pub is_active: bool,
}

impl Table {
    /// Sort key giving "Masa 2" before "Masa 10".
    ///
    /// Names are ordered by the first run of digits they contain, then by the
    /// full name. Names without digits sort last.
    pub fn display_order_key(&self) -> (u64, String) {
        let digits: String = self
            .name
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        let number = digits.parse::<u64>().unwrap_or(u64::MAX);
        (number, self.name.clone())
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalogue product that can be ordered into a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Current catalogue price; copied into a line when ordered.
    pub price: Money,
    pub stock: i64,
}

// =============================================================================
// Session Product Line
// =============================================================================

/// One product's quantity/price entry within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionProductLine {
    pub id: String,
    pub session_id: String,
    pub product_id: String,
    /// Product name at time of ordering (frozen).
    pub product_name: String,
    /// Never stored as zero: a line reduced to zero is deleted.
    pub quantity: i64,
    /// Unit price at time of ordering (frozen).
    pub unit_price: Money,
}

impl SessionProductLine {
    /// quantity × unit price, in currency units, unrounded.
    pub fn raw_total(&self) -> f64 {
        if self.quantity <= 0 {
            return 0.0;
        }
        self.quantity as f64 * self.unit_price.to_decimal()
    }
}

// =============================================================================
// Payment Type
// =============================================================================

/// How a closed session was paid.
///
/// The remote system stores this as an integer. The mapping is explicit and
/// checked at the boundary: unknown codes are rejected, never trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(try_from = "i32", into = "i32")]
pub enum PaymentType {
    Cash,
    Card,
    Transfer,
}

impl PaymentType {
    pub const ALL: [PaymentType; 3] = [PaymentType::Cash, PaymentType::Card, PaymentType::Transfer];

    /// Integer representation shared with the remote store.
    pub const fn wire_code(self) -> i32 {
        match self {
            PaymentType::Cash => 0,
            PaymentType::Card => 1,
            PaymentType::Transfer => 2,
        }
    }

    /// Human-readable label used in history rows.
    pub const fn label(self) -> &'static str {
        match self {
            PaymentType::Cash => "Cash",
            PaymentType::Card => "Card",
            PaymentType::Transfer => "Transfer",
        }
    }
}

impl TryFrom<i32> for PaymentType {
    type Error = ValidationError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(PaymentType::Cash),
            1 => Ok(PaymentType::Card),
            2 => Ok(PaymentType::Transfer),
            _ => Err(ValidationError::NotAllowed {
                field: "paymentType".to_string(),
                allowed: PaymentType::ALL
                    .iter()
                    .map(|p| format!("{} ({})", p.wire_code(), p.label()))
                    .collect(),
            }),
        }
    }
}

impl From<PaymentType> for i32 {
    fn from(payment: PaymentType) -> i32 {
        payment.wire_code()
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Table Session
// =============================================================================

/// One continuous occupancy of a table, from start to close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TableSession {
    pub id: String,
    pub table_id: String,
    /// Table display name, denormalised by the store for history views.
    pub table_name: String,
    #[ts(as = "String")]
    pub start_time: DateTime<Utc>,
    /// `None` while open; set exactly once at close.
    #[ts(as = "Option<String>")]
    pub end_time: Option<DateTime<Utc>>,
    /// Hourly price captured at start (frozen).
    pub hourly_price: Money,
    pub lines: Vec<SessionProductLine>,
    /// `None` while open.
    pub payment_type: Option<PaymentType>,
}

impl TableSession {
    /// Builds an open session with no lines.
    pub fn open(
        id: impl Into<String>,
        table_id: impl Into<String>,
        table_name: impl Into<String>,
        start_time: DateTime<Utc>,
        hourly_price: Money,
    ) -> Self {
        Self {
            id: id.into(),
            table_id: table_id.into(),
            table_name: table_name.into(),
            start_time,
            end_time: None,
            hourly_price,
            lines: Vec::new(),
            payment_type: None,
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Line for a product, if one exists.
    pub fn line_for_product(&self, product_id: &str) -> Option<&SessionProductLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    /// Current quantity of a product in this session (zero when absent).
    pub fn quantity_of(&self, product_id: &str) -> i64 {
        self.line_for_product(product_id)
            .map(|l| l.quantity)
            .unwrap_or(0)
    }
}

// =============================================================================
// Expense
// =============================================================================

/// An entry in the independent expense ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Expense {
    pub id: String,
    pub name: String,
    pub amount: Money,
    #[ts(as = "String")]
    pub spent_at: DateTime<Utc>,
    pub description: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================
