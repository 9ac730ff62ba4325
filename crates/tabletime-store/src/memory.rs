//! # In-Memory Store
//!
//! A `RemoteStore` that keeps everything in process and enforces the same
//! authoritative rules as the real system of record.
//!
//! ## Rules Enforced
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  start_session   table unknown → NotFound                               │
//! │                  table already has an open session → Conflict           │
//! │  end_session     unknown → NotFound · already closed → Conflict         │
//! │  upsert line     session closed → Conflict · qty ≤ 0 deletes the line   │
//! │                  existing line keeps the unit price it was added with   │
//! │  delete line     unknown id → NotFound                                  │
//! │  past sessions   closed only, newest first, 1-based pages               │
//! │  expenses        inclusive day range on the store's calendar            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Used by the engine's tests and by the demo mode of the report binary.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use tabletime_core::validation::{validate_id, validate_price};
use tabletime_core::{
    BusinessCalendar, Clock, Expense, Money, PaymentType, Product, SessionProductLine,
    SystemClock, Table, TableSession,
};

use crate::error::{StoreError, StoreResult};
use crate::store::{PastSessionQuery, RemoteStore, UpsertLine};

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, Table>,
    products: BTreeMap<String, Product>,
    sessions: HashMap<String, TableSession>,
    expenses: Vec<Expense>,
}

impl State {
    fn open_session_for(&self, table_id: &str) -> Option<&TableSession> {
        self.sessions
            .values()
            .find(|s| s.table_id == table_id && s.is_open())
    }

    fn set_table_active(&mut self, table_id: &str, active: bool) {
        if let Some(table) = self.tables.get_mut(table_id) {
            table.is_active = active;
        }
    }
}

/// In-process reference implementation of [`RemoteStore`].
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    clock: Arc<dyn Clock>,
    calendar: BusinessCalendar,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store whose session timestamps come from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            clock,
            calendar: BusinessCalendar::utc(),
        }
    }

    /// Calendar used for the date filters.
    pub fn with_calendar(mut self, calendar: BusinessCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    // =========================================================================
    // Catalogue administration (not part of RemoteStore)
    // =========================================================================

    pub async fn add_table(
        &self,
        name: &str,
        table_type: Option<&str>,
        hourly_price: Money,
    ) -> Table {
        let table = Table {
            id: Self::new_id(),
            name: name.to_string(),
            table_type: table_type.map(String::from),
            current_hourly_price: hourly_price,
            is_active: false,
        };
        self.state
            .lock()
            .await
            .tables
            .insert(table.id.clone(), table.clone());
        table
    }

    /// Changes the price for sessions started from now on.
    pub async fn set_table_price(&self, table_id: &str, hourly_price: Money) -> StoreResult<()> {
        validate_price("hourlyPrice", hourly_price)?;
        let mut state = self.state.lock().await;
        let table = state
            .tables
            .get_mut(table_id)
            .ok_or_else(|| StoreError::not_found("Table", table_id))?;
        table.current_hourly_price = hourly_price;
        Ok(())
    }

    pub async fn add_product(&self, name: &str, price: Money, stock: i64) -> Product {
        let product = Product {
            id: Self::new_id(),
            name: name.to_string(),
            description: None,
            price,
            stock,
        };
        self.state
            .lock()
            .await
            .products
            .insert(product.id.clone(), product.clone());
        product
    }

    pub async fn set_product_price(&self, product_id: &str, price: Money) -> StoreResult<()> {
        validate_price("price", price)?;
        let mut state = self.state.lock().await;
        let product = state
            .products
            .get_mut(product_id)
            .ok_or_else(|| StoreError::not_found("Product", product_id))?;
        product.price = price;
        Ok(())
    }

    pub async fn add_expense(
        &self,
        name: &str,
        amount: Money,
        spent_at: DateTime<Utc>,
        description: Option<&str>,
    ) -> Expense {
        let expense = Expense {
            id: Self::new_id(),
            name: name.to_string(),
            amount,
            spent_at,
            description: description.map(String::from),
        };
        self.state.lock().await.expenses.push(expense.clone());
        expense
    }

    /// Inserts a session as-is, e.g. closed history for reports.
    ///
    /// An open session is rejected when its table already has one.
    pub async fn insert_session(&self, session: TableSession) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if session.is_open() {
            if state.open_session_for(&session.table_id).is_some() {
                return Err(StoreError::conflict("Table is already active"));
            }
            state.set_table_active(&session.table_id, true);
        }
        state.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// RemoteStore
// =============================================================================

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn list_tables(&self) -> StoreResult<Vec<Table>> {
        Ok(self.state.lock().await.tables.values().cloned().collect())
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        Ok(self.state.lock().await.products.values().cloned().collect())
    }

    async fn start_session(
        &self,
        table_id: &str,
        hourly_price: Money,
    ) -> StoreResult<TableSession> {
        validate_id("tableId", table_id)?;
        validate_price("hourlyPrice", hourly_price)?;

        let mut state = self.state.lock().await;
        let table_name = state
            .tables
            .get(table_id)
            .map(|t| t.name.clone())
            .ok_or_else(|| StoreError::not_found("Table", table_id))?;
        if state.open_session_for(table_id).is_some() {
            return Err(StoreError::conflict("Table is already active"));
        }

        let session = TableSession::open(
            Self::new_id(),
            table_id,
            table_name,
            self.clock.now(),
            hourly_price,
        );
        debug!(table_id, session_id = %session.id, "Session opened");
        state.sessions.insert(session.id.clone(), session.clone());
        state.set_table_active(table_id, true);
        Ok(session)
    }

    async fn get_current_session(&self, table_id: &str) -> StoreResult<Option<TableSession>> {
        Ok(self.state.lock().await.open_session_for(table_id).cloned())
    }

    async fn end_session(
        &self,
        session_id: &str,
        payment_type: PaymentType,
    ) -> StoreResult<TableSession> {
        let mut state = self.state.lock().await;
        let now = self.clock.now();
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::not_found("Session", session_id))?;
        if !session.is_open() {
            return Err(StoreError::conflict("Session is already closed"));
        }
        session.end_time = Some(now);
        session.payment_type = Some(payment_type);
        let closed = session.clone();

        state.set_table_active(&closed.table_id, false);
        debug!(session_id, payment = %payment_type, "Session closed");
        Ok(closed)
    }

    async fn upsert_session_product(
        &self,
        line: &UpsertLine,
    ) -> StoreResult<Option<SessionProductLine>> {
        line.validate()?;

        let mut state = self.state.lock().await;
        let product_name = state
            .products
            .get(&line.product_id)
            .map(|p| p.name.clone())
            .ok_or_else(|| StoreError::not_found("Product", &line.product_id))?;
        let session = state
            .sessions
            .get_mut(&line.session_id)
            .ok_or_else(|| StoreError::not_found("Session", &line.session_id))?;
        if !session.is_open() {
            return Err(StoreError::conflict("Session is already closed"));
        }

        let position = session
            .lines
            .iter()
            .position(|l| l.product_id == line.product_id);

        if line.quantity <= 0 {
            if let Some(index) = position {
                session.lines.remove(index);
            }
            return Ok(None);
        }

        let stored = match position {
            Some(index) => {
                let existing = &mut session.lines[index];
                existing.quantity = line.quantity;
                existing.clone()
            }
            None => {
                let created = SessionProductLine {
                    id: Self::new_id(),
                    session_id: line.session_id.clone(),
                    product_id: line.product_id.clone(),
                    product_name,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                };
                session.lines.push(created.clone());
                created
            }
        };
        Ok(Some(stored))
    }

    async fn delete_session_product(&self, line_id: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        for session in state.sessions.values_mut() {
            if let Some(index) = session.lines.iter().position(|l| l.id == line_id) {
                if !session.is_open() {
                    return Err(StoreError::conflict("Session is already closed"));
                }
                session.lines.remove(index);
                return Ok(());
            }
        }
        Err(StoreError::not_found("Session product", line_id))
    }

    async fn list_past_sessions(
        &self,
        query: &PastSessionQuery,
    ) -> StoreResult<Vec<TableSession>> {
        query.validate()?;
        let needle = query
            .table_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_lowercase);

        let state = self.state.lock().await;
        let mut closed: Vec<&TableSession> = state
            .sessions
            .values()
            .filter(|s| match s.end_time {
                Some(end) => query
                    .date_filter
                    .map(|day| self.calendar.day_of(end) == day)
                    .unwrap_or(true),
                None => false,
            })
            .filter(|s| {
                needle
                    .as_ref()
                    .map(|n| s.table_name.to_lowercase().contains(n))
                    .unwrap_or(true)
            })
            .collect();
        closed.sort_by(|a, b| b.end_time.cmp(&a.end_time).then_with(|| a.id.cmp(&b.id)));

        Ok(closed
            .into_iter()
            .skip(query.offset())
            .take(query.page_size as usize)
            .cloned()
            .collect())
    }

    async fn get_session_details(&self, session_id: &str) -> StoreResult<TableSession> {
        self.state
            .lock()
            .await
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Session", session_id))
    }

    async fn list_expenses(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> StoreResult<Vec<Expense>> {
        let state = self.state.lock().await;
        Ok(state
            .expenses
            .iter()
            .filter(|e| {
                let day = self.calendar.day_of(e.spent_at);
                start.map(|s| day >= s).unwrap_or(true) && end.map(|en| day <= en).unwrap_or(true)
            })
            .cloned()
            .collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tabletime_core::FixedClock;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 5, 18, 0, 0).unwrap()
    }

    async fn setup() -> (MemoryStore, FixedClock, Table, Product) {
        let clock = FixedClock::new(t0());
        let store = MemoryStore::with_clock(Arc::new(clock.clone()));
        let table = store.add_table("Masa 1", Some("Pool"), Money::from_major(10)).await;
        let product = store.add_product("Cola", Money::from_cents(250), 40).await;
        (store, clock, table, product)
    }

    #[tokio::test]
    async fn test_one_open_session_per_table() {
        let (store, _, table, _) = setup().await;
        let session = store
            .start_session(&table.id, table.current_hourly_price)
            .await
            .unwrap();
        assert_eq!(session.start_time, t0());
        assert!(store.list_tables().await.unwrap()[0].is_active);

        let err = store
            .start_session(&table.id, table.current_hourly_price)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_end_twice_is_conflict() {
        let (store, clock, table, _) = setup().await;
        let session = store.start_session(&table.id, Money::from_major(10)).await.unwrap();
        clock.advance(Duration::minutes(30));

        let closed = store.end_session(&session.id, PaymentType::Card).await.unwrap();
        assert_eq!(closed.end_time, Some(t0() + Duration::minutes(30)));
        assert_eq!(closed.payment_type, Some(PaymentType::Card));
        assert!(store.get_current_session(&table.id).await.unwrap().is_none());

        let err = store.end_session(&session.id, PaymentType::Cash).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_current_session_absent_is_none() {
        let (store, _, table, _) = setup().await;
        assert!(store.get_current_session(&table.id).await.unwrap().is_none());
        assert!(store.get_current_session("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_keeps_original_unit_price_and_zero_deletes() {
        let (store, _, table, product) = setup().await;
        let session = store.start_session(&table.id, Money::from_major(10)).await.unwrap();

        let line = UpsertLine {
            session_id: session.id.clone(),
            product_id: product.id.clone(),
            quantity: 1,
            unit_price: product.price,
        };
        let stored = store.upsert_session_product(&line).await.unwrap().unwrap();
        assert_eq!(stored.product_name, "Cola");

        let bumped = UpsertLine {
            quantity: 3,
            unit_price: Money::from_cents(999),
            ..line.clone()
        };
        let stored = store.upsert_session_product(&bumped).await.unwrap().unwrap();
        assert_eq!(stored.quantity, 3);
        assert_eq!(stored.unit_price, Money::from_cents(250));

        let removed = UpsertLine {
            quantity: 0,
            ..line
        };
        assert!(store.upsert_session_product(&removed).await.unwrap().is_none());
        let details = store.get_session_details(&session.id).await.unwrap();
        assert!(details.lines.is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_line_is_not_found() {
        let (store, _, _, _) = setup().await;
        let err = store.delete_session_product("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_past_sessions_paged_newest_first_with_filters() {
        let (store, clock, table, _) = setup().await;
        let other = store.add_table("Masa 2", None, Money::from_major(8)).await;

        let mut ids = Vec::new();
        for i in 0..5 {
            let t = if i % 2 == 0 { &table } else { &other };
            let s = store.start_session(&t.id, t.current_hourly_price).await.unwrap();
            clock.advance(Duration::minutes(10));
            store.end_session(&s.id, PaymentType::Cash).await.unwrap();
            ids.push(s.id);
        }

        let page1 = store.list_past_sessions(&PastSessionQuery::page(1, 2)).await.unwrap();
        let page3 = store.list_past_sessions(&PastSessionQuery::page(3, 2)).await.unwrap();
        assert_eq!(page1.len(), 2);
        assert_eq!(page1[0].id, ids[4]);
        assert_eq!(page3.len(), 1);
        assert_eq!(page3[0].id, ids[0]);

        let mut by_name = PastSessionQuery::page(1, 10);
        by_name.table_name = Some("masa 2".into());
        assert_eq!(store.list_past_sessions(&by_name).await.unwrap().len(), 2);

        let mut by_day = PastSessionQuery::page(1, 10);
        by_day.date_filter = Some(NaiveDate::from_ymd_opt(2026, 3, 4).unwrap());
        assert!(store.list_past_sessions(&by_day).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expenses_filtered_by_inclusive_days() {
        let (store, _, _, _) = setup().await;
        store.add_expense("Chalk", Money::from_cents(300), t0(), None).await;
        store
            .add_expense("Cloth", Money::from_major(40), t0() + Duration::days(2), Some("Table 3 felt"))
            .await;

        let day = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        let only_first = store.list_expenses(Some(day), Some(day)).await.unwrap();
        assert_eq!(only_first.len(), 1);
        assert_eq!(store.list_expenses(None, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_table_price_change_does_not_touch_open_session() {
        let (store, _, table, _) = setup().await;
        let session = store.start_session(&table.id, table.current_hourly_price).await.unwrap();
        store.set_table_price(&table.id, Money::from_major(20)).await.unwrap();

        let details = store.get_session_details(&session.id).await.unwrap();
        assert_eq!(details.hourly_price, Money::from_major(10));
    }
}
