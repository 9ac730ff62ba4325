//! # Session Lifecycle
//!
//! The state machine governing a table's occupancy, orchestrated against the
//! remote store.
//!
//! ## States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │           start                 request_end                             │
//! │   Idle ───────────► Active ────────────────► Ending { frozen }          │
//! │    ▲                 │  ▲                       │        │              │
//! │    │                 │  └────── cancel_end ─────┘        │              │
//! │    │     products    │                                   │ confirm_end  │
//! │    │   add / remove ─┘     (products may still change;   │              │
//! │    │                        table time stays frozen)     ▼              │
//! │    └───────────────────────────────────────────────── Closed            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - No transition is applied locally until the remote call succeeds. The one
//!   exception is a product quantity, applied tentatively and rolled back to
//!   the captured previous line if the store refuses it.
//! - Mutations of one session are serialized in issue order (tokio's mutex
//!   is fair). Different sessions never wait on each other.
//! - `close_view` bumps the table's view generation. Results of requests
//!   issued before that are dropped with [`EngineError::ContextClosed`].
//! - Every state change is published to the live ticker while the working
//!   copy is still locked: active sessions run live, ending ones show the
//!   frozen bill.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use tabletime_core::billing::cost_so_far;
use tabletime_core::validation::normalize_quantity;
use tabletime_core::{
    Clock, CostBreakdown, FrozenCost, Money, PaymentType, Product, SessionProductLine, Table,
    TableSession,
};
use tabletime_store::{RemoteStore, StoreError, UpsertLine};

use crate::error::{EngineError, EngineResult};
use crate::ticker::TickerHandle;

/// Id given to a line that exists only locally until the store confirms it.
const PENDING_LINE_PREFIX: &str = "pending:";

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum TableState {
    Idle,
    Active { session: TableSession },
    Ending { session: TableSession, frozen: FrozenCost },
}

impl TableState {
    pub fn session(&self) -> Option<&TableSession> {
        match self {
            TableState::Idle => None,
            TableState::Active { session } | TableState::Ending { session, .. } => Some(session),
        }
    }

    fn session_mut(&mut self) -> Option<&mut TableSession> {
        match self {
            TableState::Idle => None,
            TableState::Active { session } | TableState::Ending { session, .. } => Some(session),
        }
    }

    /// Re-derives the frozen products cost after a line change.
    fn reline(&mut self) {
        if let TableState::Ending { session, frozen } = self {
            *frozen = frozen.relined(&session.lines);
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, TableState::Idle)
    }
}

impl fmt::Display for TableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableState::Idle => write!(f, "Idle"),
            TableState::Active { .. } => write!(f, "Active"),
            TableState::Ending { .. } => write!(f, "Ending"),
        }
    }
}

/// A table as the engine currently sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct TableView {
    pub table: Table,
    pub state: TableState,
    generation: u64,
}

impl TableView {
    fn new(table: Table) -> Self {
        TableView {
            table,
            state: TableState::Idle,
            generation: 0,
        }
    }
}

/// How a `confirm_end` finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum EndOutcome {
    /// Closed by this call. `confirmed` is the figure the user agreed to.
    Closed {
        session: TableSession,
        confirmed: CostBreakdown,
    },
    /// Another client closed it first; local state was reconciled.
    AlreadyClosed { session: TableSession },
}

// =============================================================================
// Lifecycle
// =============================================================================

pub struct SessionLifecycle {
    store: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    ticker: Option<TickerHandle>,
    views: RwLock<BTreeMap<String, TableView>>,
    session_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionLifecycle {
    pub fn new(store: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>) -> Self {
        SessionLifecycle {
            store,
            clock,
            ticker: None,
            views: RwLock::new(BTreeMap::new()),
            session_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Keeps the live ticker in step with the active set.
    pub fn with_ticker(mut self, ticker: TickerHandle) -> Self {
        self.ticker = Some(ticker);
        self
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Tables in display order ("Masa 2" before "Masa 10").
    pub async fn tables(&self) -> Vec<TableView> {
        let mut views: Vec<TableView> = self.views.read().await.values().cloned().collect();
        views.sort_by_key(|v| v.table.display_order_key());
        views
    }

    pub async fn table(&self, table_id: &str) -> Option<TableView> {
        self.views.read().await.get(table_id).cloned()
    }

    /// Cost so far for an active session; the frozen figure while ending.
    pub async fn current_cost(&self, session_id: &str) -> EngineResult<CostBreakdown> {
        let views = self.views.read().await;
        let view = find_by_session(&views, session_id)
            .ok_or_else(|| EngineError::UnknownSession(session_id.to_string()))?;
        match &view.state {
            TableState::Active { session } => Ok(cost_so_far(session, self.clock.as_ref())),
            TableState::Ending { frozen, .. } => Ok(frozen.breakdown()),
            TableState::Idle => Err(EngineError::UnknownSession(session_id.to_string())),
        }
    }

    // =========================================================================
    // Table refresh
    // =========================================================================

    /// Reloads the tables and the open session of every active one.
    ///
    /// A table that is still `Ending` on the same session keeps its frozen
    /// snapshot.
    pub async fn refresh_tables(&self) -> EngineResult<Vec<TableView>> {
        let tables = self.store.list_tables().await.map_err(|e| {
            warn!(error = %e, "Failed to list tables");
            e
        })?;

        let mut fresh = BTreeMap::new();
        for table in tables {
            let session = if table.is_active {
                self.store.get_current_session(&table.id).await?
            } else {
                None
            };
            fresh.insert(table.id.clone(), (table, session));
        }

        let mut views = self.views.write().await;
        let mut vanished: HashSet<String> = views
            .values()
            .filter_map(|v| v.state.session().map(|s| s.id.clone()))
            .collect();
        let mut rebuilt = BTreeMap::new();
        for (table_id, (table, session)) in fresh {
            let previous = views.remove(&table_id);
            let generation = previous.as_ref().map(|v| v.generation).unwrap_or(0);
            let state = match (session, previous.map(|v| v.state)) {
                (Some(s), Some(TableState::Ending { session: old, frozen }))
                    if old.id == s.id =>
                {
                    let mut state = TableState::Ending { session: s, frozen };
                    state.reline();
                    state
                }
                (Some(s), _) => TableState::Active { session: s },
                (None, _) => TableState::Idle,
            };
            if let Some(s) = state.session() {
                vanished.remove(&s.id);
            }
            self.publish(&table_id, &state).await;
            rebuilt.insert(table_id, TableView { table, state, generation });
        }
        for table_id in views.keys() {
            self.publish(table_id, &TableState::Idle).await;
        }
        *views = rebuilt;
        drop(views);

        for session_id in &vanished {
            self.forget_session_lock(session_id);
        }

        debug!(closed = vanished.len(), "Tables refreshed");
        Ok(self.tables().await)
    }

    // =========================================================================
    // start
    // =========================================================================

    /// Opens a session at the table's current hourly price.
    ///
    /// A conflict means another client got there first: the table is
    /// re-read so the caller can show it as active, and the conflict is
    /// returned unchanged.
    pub async fn start(&self, table_id: &str) -> EngineResult<TableSession> {
        let (table, generation) = {
            let views = self.views.read().await;
            let view = views
                .get(table_id)
                .ok_or_else(|| StoreError::not_found("Table", table_id))?;
            if !view.state.is_idle() {
                return Err(EngineError::invalid_state(&view.table.name, &view.state, "start"));
            }
            (view.table.clone(), view.generation)
        };

        let session = match self
            .store
            .start_session(&table.id, table.current_hourly_price)
            .await
        {
            Ok(session) => session,
            Err(e) if e.is_conflict() => {
                warn!(table = %table.name, "Table already active on the remote store");
                self.reload_table(table_id).await?;
                return Err(e.into());
            }
            Err(e) => {
                warn!(table = %table.name, error = %e, "Failed to start session");
                return Err(e.into());
            }
        };

        {
            let mut views = self.views.write().await;
            let view = views
                .get_mut(table_id)
                .filter(|v| v.generation == generation)
                .ok_or(EngineError::ContextClosed)?;
            view.table.is_active = true;
            view.state = TableState::Active {
                session: session.clone(),
            };
            self.publish(table_id, &view.state).await;
        }

        info!(table = %table.name, session_id = %session.id, price = %session.hourly_price, "Session started");
        Ok(session)
    }

    // =========================================================================
    // Product lines
    // =========================================================================

    /// Sets the absolute quantity of a product in an open session.
    ///
    /// The new quantity shows locally at once. If the store refuses it the
    /// line goes back to what it was before this call and the error is
    /// returned. `new_quantity <= 0` removes the line.
    pub async fn add_or_update_product(
        &self,
        session_id: &str,
        product_id: &str,
        new_quantity: i64,
        unit_price: Money,
    ) -> EngineResult<Option<SessionProductLine>> {
        self.set_quantity(session_id, product_id, None, new_quantity, unit_price)
            .await
    }

    /// One more of `product`, the "tap a product" flow.
    ///
    /// A product already on the order keeps the unit price it was added at.
    pub async fn add_one(
        &self,
        session_id: &str,
        product: &Product,
    ) -> EngineResult<Option<SessionProductLine>> {
        let (current, unit_price) = {
            let views = self.views.read().await;
            let session = find_by_session(&views, session_id)
                .and_then(|v| v.state.session())
                .ok_or_else(|| EngineError::UnknownSession(session_id.to_string()))?;
            match session.line_for_product(&product.id) {
                Some(line) => (line.quantity, line.unit_price),
                None => (0, product.price),
            }
        };
        self.set_quantity(
            session_id,
            &product.id,
            Some(&product.name),
            current + 1,
            unit_price,
        )
        .await
    }

    async fn set_quantity(
        &self,
        session_id: &str,
        product_id: &str,
        product_name: Option<&str>,
        new_quantity: i64,
        unit_price: Money,
    ) -> EngineResult<Option<SessionProductLine>> {
        let quantity = normalize_quantity(new_quantity)?;
        let lock = self.session_lock(session_id);
        let _order = lock.lock().await;

        // Phase 1: tentative local state, previous line captured.
        let (table_id, generation, previous) = {
            let mut views = self.views.write().await;
            let view = find_by_session_mut(&mut views, session_id)
                .ok_or_else(|| EngineError::UnknownSession(session_id.to_string()))?;
            let session = view
                .state
                .session_mut()
                .ok_or_else(|| EngineError::UnknownSession(session_id.to_string()))?;
            let previous = session.line_for_product(product_id).cloned();
            let tentative = match &previous {
                _ if quantity == 0 => None,
                Some(line) => Some(SessionProductLine {
                    quantity,
                    ..line.clone()
                }),
                None => Some(SessionProductLine {
                    id: format!("{PENDING_LINE_PREFIX}{product_id}"),
                    session_id: session_id.to_string(),
                    product_id: product_id.to_string(),
                    product_name: product_name.unwrap_or_default().to_string(),
                    quantity,
                    unit_price,
                }),
            };
            put_line(session, product_id, tentative);
            view.state.reline();
            (view.table.id.clone(), view.generation, previous)
        };

        // Phase 2: remote confirmation.
        let request = UpsertLine {
            session_id: session_id.to_string(),
            product_id: product_id.to_string(),
            quantity,
            unit_price,
        };
        let result = self.store.upsert_session_product(&request).await;

        // Phase 3: reconcile or roll back.
        let mut views = self.views.write().await;
        let view = views
            .get_mut(&table_id)
            .filter(|v| v.generation == generation)
            .ok_or(EngineError::ContextClosed)?;
        let Some(session) = view.state.session_mut().filter(|s| s.id == session_id) else {
            return Err(EngineError::ContextClosed);
        };

        let outcome = match result {
            Ok(stored) => {
                put_line(session, product_id, stored.clone());
                debug!(session_id, product_id, quantity, "Line confirmed");
                Ok(stored)
            }
            Err(e) => {
                put_line(session, product_id, previous);
                warn!(session_id, product_id, error = %e, "Line update refused, rolled back");
                Err(e.into())
            }
        };
        view.state.reline();
        self.publish(&table_id, &view.state).await;
        outcome
    }

    /// Deletes a line. Repeated deletes surface the store's not-found.
    pub async fn remove_product(&self, line_id: &str) -> EngineResult<()> {
        let owner = {
            let views = self.views.read().await;
            views.values().find_map(|v| {
                v.state
                    .session()
                    .filter(|s| s.lines.iter().any(|l| l.id == line_id))
                    .map(|s| (v.table.id.clone(), s.id.clone(), v.generation))
            })
        };

        let Some((table_id, session_id, generation)) = owner else {
            self.store.delete_session_product(line_id).await?;
            return Ok(());
        };

        let lock = self.session_lock(&session_id);
        let _order = lock.lock().await;

        self.store
            .delete_session_product(line_id)
            .await
            .map_err(|e| {
                warn!(line_id, error = %e, "Failed to delete line");
                e
            })?;

        let mut views = self.views.write().await;
        let view = views
            .get_mut(&table_id)
            .filter(|v| v.generation == generation)
            .ok_or(EngineError::ContextClosed)?;
        if let Some(session) = view.state.session_mut() {
            session.lines.retain(|l| l.id != line_id);
        }
        view.state.reline();
        self.publish(&table_id, &view.state).await;
        debug!(line_id, session_id = %session_id, "Line deleted");
        Ok(())
    }

    // =========================================================================
    // Ending
    // =========================================================================

    /// Freezes the bill of an active session for payment confirmation.
    ///
    /// The session is re-read from the store first; the frozen figure never
    /// comes from the local working copy.
    pub async fn request_end(&self, session_id: &str) -> EngineResult<CostBreakdown> {
        let (table_id, generation) = {
            let views = self.views.read().await;
            let view = find_by_session(&views, session_id)
                .ok_or_else(|| EngineError::UnknownSession(session_id.to_string()))?;
            if !matches!(view.state, TableState::Active { .. }) {
                return Err(EngineError::invalid_state(
                    &view.table.name,
                    &view.state,
                    "request the end of",
                ));
            }
            (view.table.id.clone(), view.generation)
        };

        let authoritative = self.store.get_session_details(session_id).await?;
        if !authoritative.is_open() {
            warn!(session_id, "Session was closed elsewhere");
            self.settle_closed(&table_id).await;
            return Err(StoreError::conflict("Session is already closed").into());
        }

        let frozen = FrozenCost::capture(&authoritative, self.clock.now());
        let breakdown = frozen.breakdown();

        let mut views = self.views.write().await;
        let view = views
            .get_mut(&table_id)
            .filter(|v| v.generation == generation)
            .ok_or(EngineError::ContextClosed)?;
        view.state = TableState::Ending {
            session: authoritative,
            frozen,
        };
        self.publish(&table_id, &view.state).await;

        info!(session_id, total = %breakdown.total_cost, "End requested, bill frozen");
        Ok(breakdown)
    }

    /// Back to `Active`, discarding the frozen bill.
    pub async fn cancel_end(&self, session_id: &str) -> EngineResult<()> {
        let mut views = self.views.write().await;
        let view = find_by_session_mut(&mut views, session_id)
            .ok_or_else(|| EngineError::UnknownSession(session_id.to_string()))?;
        match std::mem::replace(&mut view.state, TableState::Idle) {
            TableState::Ending { session, .. } => {
                view.state = TableState::Active { session };
                self.publish(&view.table.id, &view.state).await;
                debug!(session_id, "End cancelled");
                Ok(())
            }
            other => {
                let err = EngineError::invalid_state(&view.table.name, &other, "cancel the end of");
                view.state = other;
                Err(err)
            }
        }
    }

    /// Closes the session with `payment_type`.
    ///
    /// On failure the session stays `Ending`. A conflict caused by another
    /// client closing it first is reconciled and reported as
    /// [`EndOutcome::AlreadyClosed`].
    pub async fn confirm_end(
        &self,
        session_id: &str,
        payment_type: PaymentType,
    ) -> EngineResult<EndOutcome> {
        let lock = self.session_lock(session_id);
        let _order = lock.lock().await;

        let (table_id, generation, confirmed) = {
            let views = self.views.read().await;
            let view = find_by_session(&views, session_id)
                .ok_or_else(|| EngineError::UnknownSession(session_id.to_string()))?;
            match &view.state {
                TableState::Ending { frozen, .. } => {
                    (view.table.id.clone(), view.generation, frozen.breakdown())
                }
                other => {
                    return Err(EngineError::invalid_state(&view.table.name, other, "confirm the end of"))
                }
            }
        };

        let outcome = match self.store.end_session(session_id, payment_type).await {
            Ok(session) => EndOutcome::Closed { session, confirmed },
            Err(e) if e.is_conflict() => {
                warn!(session_id, "Close rejected as already closed, reconciling");
                let session = self.store.get_session_details(session_id).await?;
                if session.is_open() {
                    return Err(e.into());
                }
                EndOutcome::AlreadyClosed { session }
            }
            Err(e) => {
                warn!(session_id, error = %e, "Failed to close session");
                return Err(e.into());
            }
        };

        let current = self
            .views
            .read()
            .await
            .get(&table_id)
            .map(|v| v.generation);
        self.settle_closed(&table_id).await;
        if current != Some(generation) {
            return Err(EngineError::ContextClosed);
        }

        if let EndOutcome::Closed { confirmed, .. } = &outcome {
            info!(session_id, payment = %payment_type, total = %confirmed.total_cost, "Session closed");
        }
        Ok(outcome)
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Re-reads the table's session from the store and resumes its display.
    pub async fn open_view(&self, table_id: &str) -> EngineResult<TableView> {
        self.reload_table(table_id).await?;
        self.table(table_id)
            .await
            .ok_or_else(|| StoreError::not_found("Table", table_id).into())
    }

    /// Tears down the view of a table.
    ///
    /// Requests still in flight complete on the store but their results are
    /// not applied here. The live display of the table stops.
    pub async fn close_view(&self, table_id: &str) {
        let mut views = self.views.write().await;
        if let Some(view) = views.get_mut(table_id) {
            view.generation += 1;
            debug!(table_id, generation = view.generation, "View closed");
        }
        self.publish(table_id, &TableState::Idle).await;
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Re-reads one table's open session from the store.
    async fn reload_table(&self, table_id: &str) -> EngineResult<()> {
        let session = self.store.get_current_session(table_id).await?;
        let mut views = self.views.write().await;
        let view = views
            .get_mut(table_id)
            .ok_or_else(|| StoreError::not_found("Table", table_id))?;
        view.table.is_active = session.is_some();
        view.state = match (session, std::mem::replace(&mut view.state, TableState::Idle)) {
            (Some(s), TableState::Ending { session: old, frozen }) if old.id == s.id => {
                let mut state = TableState::Ending { session: s, frozen };
                state.reline();
                state
            }
            (Some(s), _) => TableState::Active { session: s },
            (None, _) => TableState::Idle,
        };
        self.publish(table_id, &view.state).await;
        Ok(())
    }

    /// Marks the table idle and releases everything held for its session.
    async fn settle_closed(&self, table_id: &str) {
        let mut views = self.views.write().await;
        let closed = views.get_mut(table_id).and_then(|view| {
            view.table.is_active = false;
            std::mem::replace(&mut view.state, TableState::Idle)
                .session()
                .map(|s| s.id.clone())
        });
        self.publish(table_id, &TableState::Idle).await;
        drop(views);

        if let Some(session_id) = closed {
            self.forget_session_lock(&session_id);
        }
    }

    fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn forget_session_lock(&self, session_id: &str) {
        let mut locks = self.session_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.remove(session_id);
    }

    /// Mirrors `state` on the live ticker.
    async fn publish(&self, table_id: &str, state: &TableState) {
        let Some(ticker) = &self.ticker else {
            return;
        };
        let sent = match state {
            TableState::Idle => ticker.untrack(table_id).await,
            TableState::Active { session } => ticker.track(session.clone()).await,
            TableState::Ending { session, frozen } => {
                ticker.freeze(table_id, &session.id, frozen.clone()).await
            }
        };
        if let Err(e) = sent {
            warn!(table_id, error = %e, "Live ticker unavailable");
        }
    }

    #[cfg(test)]
    fn session_lock_count(&self) -> usize {
        self.session_locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Seeds the working copy with tables without touching the store.
    #[cfg(test)]
    async fn seed_tables(&self, tables: Vec<Table>) {
        let mut views = self.views.write().await;
        for table in tables {
            views.insert(table.id.clone(), TableView::new(table));
        }
    }
}

fn find_by_session<'a>(
    views: &'a BTreeMap<String, TableView>,
    session_id: &str,
) -> Option<&'a TableView> {
    views
        .values()
        .find(|v| v.state.session().map(|s| s.id == session_id).unwrap_or(false))
}

fn find_by_session_mut<'a>(
    views: &'a mut BTreeMap<String, TableView>,
    session_id: &str,
) -> Option<&'a mut TableView> {
    views
        .values_mut()
        .find(|v| v.state.session().map(|s| s.id == session_id).unwrap_or(false))
}

/// Replaces, inserts or (with `None`) removes the line of `product_id`.
fn put_line(session: &mut TableSession, product_id: &str, line: Option<SessionProductLine>) {
    let position = session.lines.iter().position(|l| l.product_id == product_id);
    match (position, line) {
        (Some(i), Some(line)) => session.lines[i] = line,
        (None, Some(line)) => session.lines.push(line),
        (Some(i), None) => {
            session.lines.remove(i);
        }
        (None, None) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tabletime_core::FixedClock;
    use tabletime_store::MemoryStore;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 5, 18, 0, 0).unwrap()
    }

    async fn setup() -> (SessionLifecycle, MemoryStore, FixedClock, Table, Product) {
        let clock = FixedClock::new(t0());
        let store = MemoryStore::with_clock(Arc::new(clock.clone()));
        let table = store.add_table("Masa 1", None, Money::from_major(10)).await;
        let product = store.add_product("Cola", Money::from_cents(500), 10).await;
        let lifecycle = SessionLifecycle::new(Arc::new(store.clone()), Arc::new(clock.clone()));
        lifecycle.refresh_tables().await.unwrap();
        (lifecycle, store, clock, table, product)
    }

    #[tokio::test]
    async fn test_start_requires_idle() {
        let (lifecycle, _, _, table, _) = setup().await;
        lifecycle.start(&table.id).await.unwrap();

        let err = lifecycle.start(&table.id).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_add_one_uses_existing_unit_price() {
        let (lifecycle, store, _, table, product) = setup().await;
        let session = lifecycle.start(&table.id).await.unwrap();

        lifecycle.add_one(&session.id, &product).await.unwrap();
        store.set_product_price(&product.id, Money::from_cents(900)).await.unwrap();
        let repriced = Product {
            price: Money::from_cents(900),
            ..product.clone()
        };
        let line = lifecycle.add_one(&session.id, &repriced).await.unwrap().unwrap();

        assert_eq!(line.quantity, 2);
        assert_eq!(line.unit_price, Money::from_cents(500));
        assert!(!line.id.starts_with(PENDING_LINE_PREFIX));
    }

    #[tokio::test]
    async fn test_quantity_above_limit_is_rejected_before_any_call() {
        let (lifecycle, store, _, table, product) = setup().await;
        let session = lifecycle.start(&table.id).await.unwrap();

        let err = lifecycle
            .add_or_update_product(&session.id, &product.id, 1000, product.price)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        let details = store.get_session_details(&session.id).await.unwrap();
        assert!(details.lines.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_end_returns_to_active() {
        let (lifecycle, _, clock, table, _) = setup().await;
        let session = lifecycle.start(&table.id).await.unwrap();
        clock.advance(Duration::minutes(30));

        lifecycle.request_end(&session.id).await.unwrap();
        lifecycle.cancel_end(&session.id).await.unwrap();
        assert!(matches!(
            lifecycle.table(&table.id).await.unwrap().state,
            TableState::Active { .. }
        ));

        clock.advance(Duration::minutes(30));
        let cost = lifecycle.current_cost(&session.id).await.unwrap();
        assert_eq!(cost.table_cost, Money::from_major(10));

        let err = lifecycle.cancel_end(&session.id).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_confirm_without_request_is_invalid() {
        let (lifecycle, _, _, table, _) = setup().await;
        let session = lifecycle.start(&table.id).await.unwrap();
        let err = lifecycle
            .confirm_end(&session.id, PaymentType::Cash)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_reopened_view_reloads_session() {
        let (lifecycle, store, _, table, product) = setup().await;
        let session = lifecycle.start(&table.id).await.unwrap();

        lifecycle.close_view(&table.id).await;
        assert_eq!(lifecycle.table(&table.id).await.unwrap().generation, 1);

        // A fresh view sees the store's state.
        let view = lifecycle.open_view(&table.id).await.unwrap();
        assert_eq!(view.state.session().unwrap().id, session.id);

        lifecycle.add_one(&session.id, &product).await.unwrap();
        assert_eq!(
            store.get_session_details(&session.id).await.unwrap().quantity_of(&product.id),
            1
        );
    }

    #[tokio::test]
    async fn test_unknown_table_in_working_copy() {
        let store = MemoryStore::new();
        let lifecycle = SessionLifecycle::new(Arc::new(store), Arc::new(FixedClock::new(t0())));
        lifecycle
            .seed_tables(vec![Table {
                id: "ghost".into(),
                name: "Masa 9".into(),
                table_type: None,
                current_hourly_price: Money::from_major(5),
                is_active: false,
            }])
            .await;

        let err = lifecycle.start("ghost").await.unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::NotFound { .. })));
        assert!(lifecycle.table("ghost").await.unwrap().state.is_idle());
    }

    #[tokio::test]
    async fn test_session_locks_released_when_sessions_close() {
        let (lifecycle, store, _, table, product) = setup().await;

        // Closed here.
        let session = lifecycle.start(&table.id).await.unwrap();
        lifecycle.add_one(&session.id, &product).await.unwrap();
        assert_eq!(lifecycle.session_lock_count(), 1);
        lifecycle.request_end(&session.id).await.unwrap();
        lifecycle.confirm_end(&session.id, PaymentType::Cash).await.unwrap();
        assert_eq!(lifecycle.session_lock_count(), 0);

        // Closed elsewhere, noticed by request_end.
        let session = lifecycle.start(&table.id).await.unwrap();
        lifecycle.add_one(&session.id, &product).await.unwrap();
        store.end_session(&session.id, PaymentType::Card).await.unwrap();
        lifecycle.request_end(&session.id).await.unwrap_err();
        assert_eq!(lifecycle.session_lock_count(), 0);

        // Closed elsewhere, noticed by a refresh.
        let session = lifecycle.start(&table.id).await.unwrap();
        lifecycle.add_one(&session.id, &product).await.unwrap();
        store.end_session(&session.id, PaymentType::Card).await.unwrap();
        lifecycle.refresh_tables().await.unwrap();
        assert!(lifecycle.table(&table.id).await.unwrap().state.is_idle());
        assert_eq!(lifecycle.session_lock_count(), 0);
    }

    #[test]
    fn test_put_line_variants() {
        let mut session = TableSession::open("s", "t", "Masa 1", t0(), Money::from_major(1));
        let line = SessionProductLine {
            id: "l1".into(),
            session_id: "s".into(),
            product_id: "p".into(),
            product_name: "Cola".into(),
            quantity: 1,
            unit_price: Money::from_cents(100),
        };
        put_line(&mut session, "p", Some(line.clone()));
        put_line(&mut session, "p", Some(SessionProductLine { quantity: 4, ..line }));
        assert_eq!(session.quantity_of("p"), 4);
        put_line(&mut session, "p", None);
        assert!(session.lines.is_empty());
    }
}
