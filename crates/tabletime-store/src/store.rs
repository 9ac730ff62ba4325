//! # RemoteStore Contract
//!
//! The narrow request/response contract the engine consumes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        RemoteStore                                      │
//! │                                                                         │
//! │   Catalogue            Sessions                        Ledger           │
//! │   ─────────            ────────                        ──────           │
//! │   list_tables          start_session                   list_expenses    │
//! │   list_products        get_current_session  (→ None)                    │
//! │                        end_session                                      │
//! │                        upsert_session_product                           │
//! │                        delete_session_product                           │
//! │                        list_past_sessions   (paged)                     │
//! │                        get_session_details                              │
//! │                                                                         │
//! │   Implementations:  MemoryStore (reference rules)  HttpStore (REST)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The store is the single owner of authoritative state. It enforces "one
//! open session per table" and "a session closes once"; callers never do.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use tabletime_core::validation::{validate_id, validate_page, validate_price};
use tabletime_core::{
    Expense, Money, PaymentType, Product, SessionProductLine, Table, TableSession,
};

use crate::error::StoreResult;

// =============================================================================
// Request Types
// =============================================================================

/// Absolute quantity for one (session, product) line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertLine {
    pub session_id: String,
    pub product_id: String,
    /// `<= 0` removes the line.
    pub quantity: i64,
    pub unit_price: Money,
}

impl UpsertLine {
    pub fn validate(&self) -> StoreResult<()> {
        validate_id("sessionId", &self.session_id)?;
        validate_id("productId", &self.product_id)?;
        validate_price("unitPrice", self.unit_price)?;
        Ok(())
    }
}

/// One page of closed sessions, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PastSessionQuery {
    /// Only sessions that ended on this day.
    pub date_filter: Option<NaiveDate>,
    /// Case-insensitive substring of the table name.
    pub table_name: Option<String>,
    /// 1-based.
    pub page_number: u32,
    pub page_size: u32,
}

impl PastSessionQuery {
    pub fn page(page_number: u32, page_size: u32) -> Self {
        Self {
            date_filter: None,
            table_name: None,
            page_number,
            page_size,
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        validate_page(self.page_number, self.page_size)?;
        Ok(())
    }

    /// Index of the first row of this page.
    pub fn offset(&self) -> usize {
        (self.page_number.saturating_sub(1) as usize) * self.page_size as usize
    }
}

// =============================================================================
// Trait
// =============================================================================

/// The system of record for tables, sessions, products and expenses.
///
/// Every method may fail with a transport or domain error. The one normal
/// "absence" outcome, no open session for a table, is `Ok(None)`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list_tables(&self) -> StoreResult<Vec<Table>>;

    async fn list_products(&self) -> StoreResult<Vec<Product>>;

    /// Opens a session with `hourly_price` frozen into it.
    ///
    /// Fails with `Conflict` when the table already has an open session.
    async fn start_session(&self, table_id: &str, hourly_price: Money)
        -> StoreResult<TableSession>;

    /// The open session of a table, `None` when the table is idle.
    async fn get_current_session(&self, table_id: &str) -> StoreResult<Option<TableSession>>;

    /// Closes a session. Fails with `Conflict` if it is already closed.
    async fn end_session(
        &self,
        session_id: &str,
        payment_type: PaymentType,
    ) -> StoreResult<TableSession>;

    /// Sets the absolute quantity of a line.
    ///
    /// Returns the stored line, or `None` when the quantity removed it.
    async fn upsert_session_product(
        &self,
        line: &UpsertLine,
    ) -> StoreResult<Option<SessionProductLine>>;

    /// Deletes a line. Unknown ids fail with `NotFound`.
    async fn delete_session_product(&self, line_id: &str) -> StoreResult<()>;

    /// One page of closed sessions, newest first.
    ///
    /// A page shorter than `page_size` is the last one.
    async fn list_past_sessions(&self, query: &PastSessionQuery)
        -> StoreResult<Vec<TableSession>>;

    async fn get_session_details(&self, session_id: &str) -> StoreResult<TableSession>;

    /// Expenses whose day falls inside the inclusive bounds.
    async fn list_expenses(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> StoreResult<Vec<Expense>>;
}

#[async_trait]
impl<S: RemoteStore + ?Sized> RemoteStore for Arc<S> {
    async fn list_tables(&self) -> StoreResult<Vec<Table>> {
        (**self).list_tables().await
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        (**self).list_products().await
    }

    async fn start_session(
        &self,
        table_id: &str,
        hourly_price: Money,
    ) -> StoreResult<TableSession> {
        (**self).start_session(table_id, hourly_price).await
    }

    async fn get_current_session(&self, table_id: &str) -> StoreResult<Option<TableSession>> {
        (**self).get_current_session(table_id).await
    }

    async fn end_session(
        &self,
        session_id: &str,
        payment_type: PaymentType,
    ) -> StoreResult<TableSession> {
        (**self).end_session(session_id, payment_type).await
    }

    async fn upsert_session_product(
        &self,
        line: &UpsertLine,
    ) -> StoreResult<Option<SessionProductLine>> {
        (**self).upsert_session_product(line).await
    }

    async fn delete_session_product(&self, line_id: &str) -> StoreResult<()> {
        (**self).delete_session_product(line_id).await
    }

    async fn list_past_sessions(
        &self,
        query: &PastSessionQuery,
    ) -> StoreResult<Vec<TableSession>> {
        (**self).list_past_sessions(query).await
    }

    async fn get_session_details(&self, session_id: &str) -> StoreResult<TableSession> {
        (**self).get_session_details(session_id).await
    }

    async fn list_expenses(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> StoreResult<Vec<Expense>> {
        (**self).list_expenses(start, end).await
    }
}
