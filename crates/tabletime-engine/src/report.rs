//! # Report Engine
//!
//! Pulls the complete closed-session history from the remote store and turns
//! it into a [`ReportViewModel`].
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        build_report                                     │
//! │                                                                         │
//! │  1. PeriodSelector::resolve   ── ValidationError? stop, nothing sent    │
//! │                                                                         │
//! │  2. fetch_all_sessions        page 1, 2, ... (page_size each)           │
//! │        │                      until a page comes back short or empty    │
//! │        ▼                                                                │
//! │  3. list_expenses(start_date, end_date)                                 │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  4. aggregate(..)             filter by end day, sum raw, round once    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pages are requested one after another. A report is never built from a
//! partial history: any page failure fails the whole report. A session that
//! shows up on two pages, because a close pushed the history down between
//! requests, is counted once.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use tabletime_core::report::aggregate;
use tabletime_core::{
    BusinessCalendar, Clock, DateInputs, Money, PeriodSelector, ReportRange, ReportSorting,
    ReportViewModel, TableSession, REPORT_PAGE_SIZE,
};
use tabletime_store::{PastSessionQuery, RemoteStore};

use crate::error::EngineResult;

/// The figures a seller sees for the current business day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub range: ReportRange,
    pub session_count: usize,
    pub total_cash_revenue: Money,
    pub total_card_revenue: Money,
    pub total_transfer_revenue: Money,
    pub overall_total_revenue: Money,
}

impl From<&ReportViewModel> for DailySummary {
    fn from(report: &ReportViewModel) -> Self {
        DailySummary {
            range: report.range,
            session_count: report.session_count,
            total_cash_revenue: report.total_cash_revenue,
            total_card_revenue: report.total_card_revenue,
            total_transfer_revenue: report.total_transfer_revenue,
            overall_total_revenue: report.overall_total_revenue,
        }
    }
}

pub struct ReportEngine {
    store: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    calendar: BusinessCalendar,
    page_size: u32,
}

impl ReportEngine {
    pub fn new(store: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>, calendar: BusinessCalendar) -> Self {
        ReportEngine {
            store,
            clock,
            calendar,
            page_size: REPORT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn calendar(&self) -> &BusinessCalendar {
        &self.calendar
    }

    /// Builds the report for a period.
    ///
    /// Missing or inverted dates are rejected before any remote call.
    pub async fn build_report(
        &self,
        selector: PeriodSelector,
        inputs: &DateInputs,
        sorting: &ReportSorting,
    ) -> EngineResult<ReportViewModel> {
        let range = selector.resolve(inputs, &self.calendar, self.clock.now())?;
        debug!(?selector, start = %range.start_date, end = %range.end_date, "Building report");

        let sessions = self.fetch_all_sessions().await?;
        let expenses = self
            .store
            .list_expenses(Some(range.start_date), Some(range.end_date))
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to fetch expenses");
                e
            })?;

        let report = aggregate(&sessions, &expenses, &range, &self.calendar, sorting);

        info!(
            start = %range.start_date,
            end = %range.end_date,
            sessions = report.session_count,
            overall = %report.overall_total_revenue,
            expenses = %report.total_expenses,
            "Report built"
        );
        Ok(report)
    }

    /// Today's payment-type totals.
    pub async fn daily_summary(&self) -> EngineResult<DailySummary> {
        let report = self
            .build_report(
                PeriodSelector::Today,
                &DateInputs::default(),
                &ReportSorting::default(),
            )
            .await?;
        Ok(DailySummary::from(&report))
    }

    /// Every closed session the store holds.
    ///
    /// Keeps asking for the next page while the previous one was full.
    /// Repeated session ids keep their first occurrence.
    pub async fn fetch_all_sessions(&self) -> EngineResult<Vec<TableSession>> {
        let mut sessions = Vec::new();
        let mut seen = HashSet::new();
        let mut repeated = 0usize;
        let mut page_number = 1;

        loop {
            let query = PastSessionQuery::page(page_number, self.page_size);
            let chunk = self.store.list_past_sessions(&query).await.map_err(|e| {
                warn!(page = page_number, error = %e, "Failed to fetch history page");
                e
            })?;
            let full = chunk.len() == self.page_size as usize;
            debug!(page = page_number, rows = chunk.len(), "History page fetched");
            for session in chunk {
                if seen.insert(session.id.clone()) {
                    sessions.push(session);
                } else {
                    repeated += 1;
                }
            }

            if !full {
                break;
            }
            page_number += 1;
        }

        if repeated > 0 {
            warn!(repeated, "History shifted while paging, repeated sessions skipped");
        }
        debug!(pages = page_number, sessions = sessions.len(), "History fetched");
        Ok(sessions)
    }
}
