//! # tabletime-engine: Session Lifecycle, Live Ticker & Reports
//!
//! The asynchronous half of Tabletime. It keeps a working copy of every
//! table's state, drives transitions against the remote store, refreshes the
//! live duration display and builds revenue reports from the full history.
//!
//! ## Components
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SessionLifecycle ── track/untrack ──► LiveTicker ──► watch<LiveBoard>  │
//! │        │                                                                │
//! │        │            ReportEngine          HistoryBrowser                │
//! │        │                 │                      │                       │
//! │        └─────────────────┴──── dyn RemoteStore ─┘                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tabletime_core::{ReportSorting, PeriodSelector, DateInputs, SystemClock};
//! use tabletime_engine::{EngineConfig, ReportEngine};
//! use tabletime_store::MemoryStore;
//!
//! # async fn run() -> tabletime_engine::EngineResult<()> {
//! let config = EngineConfig::load_or_default(None);
//! let engine = ReportEngine::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock), config.calendar()?)
//!     .with_page_size(config.report.page_size);
//!
//! let report = engine
//!     .build_report(PeriodSelector::ThisWeek, &DateInputs::default(), &ReportSorting::default())
//!     .await?;
//! println!("{}", report.overall_total_revenue);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod history;
pub mod lifecycle;
pub mod report;
pub mod telemetry;
pub mod ticker;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use history::{HistoryBrowser, HistoryFilter, HistoryPage, HistoryRow};
pub use lifecycle::{EndOutcome, SessionLifecycle, TableState, TableView};
pub use report::{DailySummary, ReportEngine};
pub use telemetry::init_tracing;
pub use ticker::{LiveBoard, LiveDisplay, LiveTicker, TickerHandle};
