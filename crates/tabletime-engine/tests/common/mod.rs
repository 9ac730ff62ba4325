//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tabletime_core::{
    Expense, FixedClock, Money, PaymentType, Product, SessionProductLine, Table, TableSession,
};
use tabletime_engine::SessionLifecycle;
use tabletime_store::{
    MemoryStore, PastSessionQuery, RemoteStore, StoreError, StoreResult, UpsertLine,
};

/// Thursday 2026-03-05 18:00 UTC.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 5, 18, 0, 0).unwrap()
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

/// A closed one-hour session ending at `end`.
pub fn closed_session(
    id: &str,
    table_name: &str,
    end: DateTime<Utc>,
    hourly: Money,
    payment: PaymentType,
) -> TableSession {
    let mut session = TableSession::open(
        id,
        format!("table-{table_name}"),
        table_name,
        end - ChronoDuration::hours(1),
        hourly,
    );
    session.end_time = Some(end);
    session.payment_type = Some(payment);
    session
}

// =============================================================================
// Instrumented store
// =============================================================================

/// Wraps a [`MemoryStore`], counting history requests and optionally failing
/// or delaying line upserts.
#[derive(Clone)]
pub struct InstrumentedStore {
    pub inner: MemoryStore,
    past_session_calls: Arc<AtomicUsize>,
    fail_upserts: Arc<AtomicBool>,
    upsert_delays: Arc<Mutex<VecDeque<Duration>>>,
    /// `(session_id, quantity)` in the order upserts reached the store.
    arrivals: Arc<Mutex<Vec<(String, i64)>>>,
    /// Closed by "another client" right after the next history page is served.
    closes_after_page: Arc<Mutex<Option<TableSession>>>,
}

impl InstrumentedStore {
    pub fn new(inner: MemoryStore) -> Self {
        InstrumentedStore {
            inner,
            past_session_calls: Arc::new(AtomicUsize::new(0)),
            fail_upserts: Arc::new(AtomicBool::new(false)),
            upsert_delays: Arc::new(Mutex::new(VecDeque::new())),
            arrivals: Arc::new(Mutex::new(Vec::new())),
            closes_after_page: Arc::new(Mutex::new(None)),
        }
    }

    pub fn past_session_calls(&self) -> usize {
        self.past_session_calls.load(Ordering::SeqCst)
    }

    pub fn fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    /// Delays for the next upserts, consumed in call order.
    pub fn delay_upserts(&self, delays: &[Duration]) {
        self.upsert_delays.lock().unwrap().extend(delays.iter().copied());
    }

    pub fn arrivals(&self) -> Vec<(String, i64)> {
        self.arrivals.lock().unwrap().clone()
    }

    /// Adds `session` to the history once the next page has been served,
    /// shifting every later page down by one.
    pub fn close_after_next_page(&self, session: TableSession) {
        *self.closes_after_page.lock().unwrap() = Some(session);
    }
}

#[async_trait]
impl RemoteStore for InstrumentedStore {
    async fn list_tables(&self) -> StoreResult<Vec<Table>> {
        self.inner.list_tables().await
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        self.inner.list_products().await
    }

    async fn start_session(&self, table_id: &str, hourly_price: Money) -> StoreResult<TableSession> {
        self.inner.start_session(table_id, hourly_price).await
    }

    async fn get_current_session(&self, table_id: &str) -> StoreResult<Option<TableSession>> {
        self.inner.get_current_session(table_id).await
    }

    async fn end_session(
        &self,
        session_id: &str,
        payment_type: PaymentType,
    ) -> StoreResult<TableSession> {
        self.inner.end_session(session_id, payment_type).await
    }

    async fn upsert_session_product(
        &self,
        line: &UpsertLine,
    ) -> StoreResult<Option<SessionProductLine>> {
        let delay = self.upsert_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(StoreError::transport("connection reset"));
        }
        self.arrivals
            .lock()
            .unwrap()
            .push((line.session_id.clone(), line.quantity));
        self.inner.upsert_session_product(line).await
    }

    async fn delete_session_product(&self, line_id: &str) -> StoreResult<()> {
        self.inner.delete_session_product(line_id).await
    }

    async fn list_past_sessions(&self, query: &PastSessionQuery) -> StoreResult<Vec<TableSession>> {
        self.past_session_calls.fetch_add(1, Ordering::SeqCst);
        let page = self.inner.list_past_sessions(query).await;
        let late = self.closes_after_page.lock().unwrap().take();
        if let Some(session) = late {
            self.inner.insert_session(session).await?;
        }
        page
    }

    async fn get_session_details(&self, session_id: &str) -> StoreResult<TableSession> {
        self.inner.get_session_details(session_id).await
    }

    async fn list_expenses(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> StoreResult<Vec<Expense>> {
        self.inner.list_expenses(start, end).await
    }
}

// =============================================================================
// Harness
// =============================================================================

/// A lifecycle wired to an instrumented memory store and a shared fixed clock.
pub struct Harness {
    pub clock: FixedClock,
    pub store: InstrumentedStore,
    pub lifecycle: SessionLifecycle,
}

impl Harness {
    pub async fn new() -> Self {
        let clock = FixedClock::new(t0());
        let store = InstrumentedStore::new(MemoryStore::with_clock(Arc::new(clock.clone())));
        let lifecycle = SessionLifecycle::new(Arc::new(store.clone()), Arc::new(clock.clone()));
        Harness {
            clock,
            store,
            lifecycle,
        }
    }

    pub async fn table(&self, name: &str, hourly: Money) -> Table {
        let table = self.store.inner.add_table(name, None, hourly).await;
        self.lifecycle.refresh_tables().await.unwrap();
        table
    }

    pub async fn product(&self, name: &str, price: Money) -> Product {
        self.store.inner.add_product(name, price, 100).await
    }

    /// Quantity of `product_id` in the engine's working copy.
    pub async fn local_quantity(&self, table_id: &str, product_id: &str) -> i64 {
        self.lifecycle
            .table(table_id)
            .await
            .and_then(|v| v.state.session().map(|s| s.quantity_of(product_id)))
            .unwrap_or(0)
    }

    /// Quantity of `product_id` on the store.
    pub async fn remote_quantity(&self, session_id: &str, product_id: &str) -> i64 {
        self.store
            .inner
            .get_session_details(session_id)
            .await
            .unwrap()
            .quantity_of(product_id)
    }
}
