//! # Live Ticker
//!
//! Refreshes the elapsed duration and running cost of every active table on a
//! fixed cadence.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Live Ticker                                    │
//! │                                                                         │
//! │   SessionLifecycle ── track / freeze / untrack ──► cmd channel          │
//! │                                               │                         │
//! │                                               ▼                         │
//! │                          ┌─────────────────────────────────────┐        │
//! │   interval (1s) ───────► │  run loop                           │        │
//! │                          │                                     │        │
//! │                          │  for each tracked session:          │        │
//! │                          │    elapsed = clock.now() - start    │        │
//! │                          │    cost    = compute_cost(..)       │        │
//! │                          └──────────────────┬──────────────────┘        │
//! │                                             │ send_replace              │
//! │                                             ▼                           │
//! │                          watch::Receiver<LiveBoard>  ──► views          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every tick recomputes from the session's immutable start time. Nothing is
//! incremented per tick, so late or skipped ticks never make the display
//! drift; the next tick simply shows the right value again.
//!
//! A session whose end was requested is frozen: its display shows the frozen
//! bill until it is tracked live again or untracked.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use tabletime_core::billing::compute_cost;
use tabletime_core::{Clock, CostBreakdown, FrozenCost, Money, TableSession};

use crate::error::{EngineError, EngineResult};

/// What a table card shows while its session is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveDisplay {
    pub table_id: String,
    pub session_id: String,
    pub elapsed_ms: i64,
    /// `HH:MM:SS`
    pub elapsed: String,
    pub running_total: Money,
    pub refreshed_at: DateTime<Utc>,
}

/// Displays of all tracked tables, keyed by table id.
pub type LiveBoard = BTreeMap<String, LiveDisplay>;

#[derive(Debug)]
enum TickerCommand {
    Track(Box<TableSession>),
    Freeze {
        table_id: String,
        session_id: String,
        frozen: Box<FrozenCost>,
    },
    Untrack { table_id: String },
    Shutdown,
}

/// What the ticker holds for one table.
#[derive(Debug)]
enum Tracked {
    Live(TableSession),
    Frozen { session_id: String, frozen: FrozenCost },
}

impl Tracked {
    fn session_id(&self) -> &str {
        match self {
            Tracked::Live(session) => &session.id,
            Tracked::Frozen { session_id, .. } => session_id,
        }
    }

    fn cost(&self, now: DateTime<Utc>) -> CostBreakdown {
        match self {
            Tracked::Live(session) => compute_cost(session, now),
            Tracked::Frozen { frozen, .. } => frozen.breakdown(),
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Handle for controlling a running ticker. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TickerHandle {
    cmd_tx: mpsc::Sender<TickerCommand>,
    board_rx: watch::Receiver<LiveBoard>,
}

impl TickerHandle {
    /// Starts (or refreshes) the display of an open session.
    pub async fn track(&self, session: TableSession) -> EngineResult<()> {
        self.send(TickerCommand::Track(Box::new(session))).await
    }

    /// Pins the display of a table to a frozen bill.
    ///
    /// Sending it again with a relined bill replaces the figure shown.
    pub async fn freeze(
        &self,
        table_id: &str,
        session_id: &str,
        frozen: FrozenCost,
    ) -> EngineResult<()> {
        self.send(TickerCommand::Freeze {
            table_id: table_id.to_string(),
            session_id: session_id.to_string(),
            frozen: Box::new(frozen),
        })
        .await
    }

    /// Stops the display of a table. No further updates are published for it.
    pub async fn untrack(&self, table_id: &str) -> EngineResult<()> {
        self.send(TickerCommand::Untrack {
            table_id: table_id.to_string(),
        })
        .await
    }

    pub async fn shutdown(&self) -> EngineResult<()> {
        self.send(TickerCommand::Shutdown).await
    }

    /// Resolves once the ticker task has exited.
    pub async fn stopped(&self) {
        self.cmd_tx.closed().await
    }

    pub fn is_running(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    pub fn board(&self) -> LiveBoard {
        self.board_rx.borrow().clone()
    }

    pub fn display(&self, table_id: &str) -> Option<LiveDisplay> {
        self.board_rx.borrow().get(table_id).cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<LiveBoard> {
        self.board_rx.clone()
    }

    async fn send(&self, cmd: TickerCommand) -> EngineResult<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| EngineError::TickerStopped)
    }
}

// =============================================================================
// Ticker
// =============================================================================

pub struct LiveTicker {
    cadence: Duration,
    clock: Arc<dyn Clock>,
    tracked: BTreeMap<String, Tracked>,
}

impl LiveTicker {
    pub fn new(cadence: Duration, clock: Arc<dyn Clock>) -> Self {
        LiveTicker {
            cadence,
            clock,
            tracked: BTreeMap::new(),
        }
    }

    /// Spawns the ticker task and returns its handle.
    ///
    /// The task ends on `shutdown` or when every handle has been dropped.
    pub fn start(self) -> TickerHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (board_tx, board_rx) = watch::channel(LiveBoard::new());

        tokio::spawn(async move {
            self.run(cmd_rx, board_tx).await;
        });

        TickerHandle { cmd_tx, board_rx }
    }

    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<TickerCommand>,
        board_tx: watch::Sender<LiveBoard>,
    ) {
        info!(cadence_ms = self.cadence.as_millis() as u64, "Live ticker started");

        let mut ticks = interval(self.cadence);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(TickerCommand::Track(session)) => {
                            debug!(table_id = %session.table_id, session_id = %session.id, "Tracking session");
                            self.tracked.insert(session.table_id.clone(), Tracked::Live(*session));
                            board_tx.send_replace(self.render());
                        }
                        Some(TickerCommand::Freeze { table_id, session_id, frozen }) => {
                            debug!(table_id = %table_id, session_id = %session_id, "Display frozen");
                            self.tracked.insert(table_id, Tracked::Frozen { session_id, frozen: *frozen });
                            board_tx.send_replace(self.render());
                        }
                        Some(TickerCommand::Untrack { table_id }) => {
                            if self.tracked.remove(&table_id).is_some() {
                                debug!(table_id = %table_id, "Untracked session");
                                board_tx.send_replace(self.render());
                            }
                        }
                        Some(TickerCommand::Shutdown) | None => break,
                    }
                }
                _ = ticks.tick() => {
                    if !self.tracked.is_empty() {
                        board_tx.send_replace(self.render());
                    }
                }
            }
        }

        board_tx.send_replace(LiveBoard::new());
        info!("Live ticker stopped");
    }

    fn render(&self) -> LiveBoard {
        let now = self.clock.now();
        self.tracked
            .iter()
            .map(|(table_id, tracked)| {
                let cost = tracked.cost(now);
                let display = LiveDisplay {
                    table_id: table_id.clone(),
                    session_id: tracked.session_id().to_string(),
                    elapsed_ms: cost.elapsed_ms,
                    elapsed: cost.duration_formatted(),
                    running_total: cost.total_cost,
                    refreshed_at: now,
                };
                (table_id.clone(), display)
            })
            .collect()
    }
}
