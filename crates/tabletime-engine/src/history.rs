//! # History Browser
//!
//! One page at a time through past sessions, each row already priced and
//! formatted for display.
//!
//! Sellers only ever see the current business day: whatever date filter they
//! pass is replaced with today's.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use tabletime_core::billing::cost_so_far;
use tabletime_core::{
    BusinessCalendar, Clock, Money, PaymentType, SessionProductLine, TableSession,
    HISTORY_PAGE_SIZE,
};
use tabletime_store::{PastSessionQuery, RemoteStore, Role};

use crate::error::EngineResult;

/// One past session as the history list shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    pub session_id: String,
    pub table_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// `HH:MM:SS`
    pub duration: String,
    pub table_cost: Money,
    pub products_cost: Money,
    pub total_cost: Money,
    pub payment_type: Option<PaymentType>,
    /// Empty while the session is open.
    pub payment_label: String,
    pub lines: Vec<SessionProductLine>,
}

impl HistoryRow {
    pub fn from_session(session: TableSession, clock: &dyn Clock) -> Self {
        let cost = cost_so_far(&session, clock);
        HistoryRow {
            duration: cost.duration_formatted(),
            table_cost: cost.table_cost,
            products_cost: cost.products_cost,
            total_cost: cost.total_cost,
            payment_label: session
                .payment_type
                .map(|p| p.label().to_string())
                .unwrap_or_default(),
            payment_type: session.payment_type,
            session_id: session.id,
            table_name: session.table_name,
            start_time: session.start_time,
            end_time: session.end_time,
            lines: session.lines,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub page_number: u32,
    pub rows: Vec<HistoryRow>,
    /// The page was full, so a next one may exist.
    pub has_more: bool,
}

/// Filters the user can set on the history list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub date: Option<NaiveDate>,
    pub table_name: Option<String>,
}

pub struct HistoryBrowser {
    store: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    calendar: BusinessCalendar,
    page_size: u32,
}

impl HistoryBrowser {
    pub fn new(store: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>, calendar: BusinessCalendar) -> Self {
        HistoryBrowser {
            store,
            clock,
            calendar,
            page_size: HISTORY_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Fetches page `page_number` (1-based) for a user with `role`.
    pub async fn page(
        &self,
        role: &Role,
        filter: &HistoryFilter,
        page_number: u32,
    ) -> EngineResult<HistoryPage> {
        let date_filter = match role {
            Role::Seller => Some(self.calendar.day_of(self.clock.now())),
            _ => filter.date,
        };
        let query = PastSessionQuery {
            date_filter,
            table_name: filter
                .table_name
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            page_number,
            page_size: self.page_size,
        };

        let sessions = self.store.list_past_sessions(&query).await.map_err(|e| {
            warn!(page = page_number, error = %e, "Failed to fetch history");
            e
        })?;
        let has_more = sessions.len() == self.page_size as usize;
        let rows: Vec<HistoryRow> = sessions
            .into_iter()
            .map(|s| HistoryRow::from_session(s, self.clock.as_ref()))
            .collect();

        debug!(page = page_number, rows = rows.len(), has_more, "History page ready");
        Ok(HistoryPage {
            page_number,
            rows,
            has_more,
        })
    }

    pub async fn session_details(&self, session_id: &str) -> EngineResult<HistoryRow> {
        let session = self.store.get_session_details(session_id).await?;
        Ok(HistoryRow::from_session(session, self.clock.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tabletime_core::FixedClock;
    use tabletime_store::MemoryStore;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 5, 22, 0, 0).unwrap()
    }

    async fn store_with(count: usize) -> MemoryStore {
        let store = MemoryStore::new();
        for i in 0..count {
            let end = now() - Duration::hours(i as i64 + 1);
            let mut session =
                TableSession::open(format!("s{i:02}"), "t1", "Masa 1", end - Duration::minutes(90), Money::from_major(10));
            session.end_time = Some(end);
            session.payment_type = Some(PaymentType::Card);
            store.insert_session(session).await.unwrap();
        }
        store
    }

    fn browser(store: &MemoryStore) -> HistoryBrowser {
        HistoryBrowser::new(
            Arc::new(store.clone()),
            Arc::new(FixedClock::new(now())),
            BusinessCalendar::utc(),
        )
    }

    #[tokio::test]
    async fn test_rows_are_priced_and_labelled() {
        let store = store_with(1).await;
        let page = browser(&store)
            .page(&Role::Admin, &HistoryFilter::default(), 1)
            .await
            .unwrap();

        let row = &page.rows[0];
        assert_eq!(row.duration, "01:30:00");
        assert_eq!(row.total_cost, Money::from_major(15));
        assert_eq!(row.payment_label, PaymentType::Card.label());
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_full_page_has_more() {
        let store = store_with(12).await;
        let browser = browser(&store);

        let first = browser.page(&Role::Admin, &HistoryFilter::default(), 1).await.unwrap();
        assert_eq!(first.rows.len(), 10);
        assert!(first.has_more);
        assert_eq!(first.rows[0].session_id, "s00");

        let second = browser.page(&Role::Admin, &HistoryFilter::default(), 2).await.unwrap();
        assert_eq!(second.rows.len(), 2);
        assert!(!second.has_more);
    }

    #[tokio::test]
    async fn test_session_details_row() {
        let store = store_with(1).await;
        let row = browser(&store).session_details("s00").await.unwrap();
        assert_eq!(row.table_name, "Masa 1");
        assert!(browser(&store).session_details("missing").await.is_err());
    }
}
