//! # tabletime-report
//!
//! Prints revenue reports and session history from the command line.
//!
//! ```text
//! tabletime-report report this-week
//! tabletime-report report range --start 2026-03-01 --end 2026-03-07 --json
//! tabletime-report summary
//! tabletime-report history --page 2 --table "Masa 1"
//! tabletime-report --demo report month
//! ```
//!
//! Against the REST API the bearer token is read from `TABLETIME_TOKEN`.
//! `--demo` runs against a seeded in-process store instead.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

use tabletime_core::{
    Clock, DateInputs, PeriodSelector, ReportSorting, ReportViewModel, SystemClock,
};
use tabletime_engine::{
    init_tracing, DailySummary, EngineConfig, EngineResult, HistoryBrowser, HistoryFilter,
    HistoryPage, ReportEngine,
};
use tabletime_store::demo::{self, DemoShape};
use tabletime_store::{Credentials, HttpStore, MemoryStore, RemoteStore, Role};

#[derive(Parser)]
#[command(name = "tabletime-report")]
#[command(about = "Revenue reports and session history for Tabletime")]
#[command(version)]
struct Cli {
    /// Engine config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use a seeded in-process store instead of the REST API
    #[arg(long)]
    demo: bool,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    /// Bearer token for the REST API
    #[arg(long, env = "TABLETIME_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Revenue report for a period
    Report {
        /// today, this-week, this-month, date or range
        #[arg(default_value = "today")]
        period: PeriodSelector,

        /// Day for `date`
        #[arg(long)]
        date: Option<NaiveDate>,

        /// First day for `range`
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last day for `range`
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Today's totals by payment type
    Summary,

    /// One page of past sessions
    History {
        #[arg(long, default_value = "1")]
        page: u32,

        /// Only sessions that ended on this day
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Only tables whose name contains this text
        #[arg(long)]
        table: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("{}", e.user_message());
        process::exit(1);
    }
}

async fn run(cli: Cli) -> EngineResult<()> {
    let config = EngineConfig::load(cli.config.clone())?;
    let calendar = config.calendar()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (store, role): (Arc<dyn RemoteStore>, Role) = if cli.demo {
        let store = MemoryStore::new().with_calendar(calendar);
        demo::seed(&store, DemoShape::default(), clock.now()).await?;
        info!("Using seeded demo store");
        (Arc::new(store), Role::Admin)
    } else {
        let credentials = Credentials::new();
        let role = match cli.token.as_deref() {
            Some(token) => credentials.login(token)?,
            None => credentials.require().map(|ctx| ctx.role().clone())?,
        };
        let store = HttpStore::new(config.http_store_config()?, credentials)?;
        info!(url = %config.store.base_url, role = %role, "Using REST store");
        (Arc::new(store), role)
    };

    match cli.command {
        Command::Report {
            period,
            date,
            start,
            end,
        } => {
            let inputs = DateInputs {
                specific_date: date,
                start_date: start,
                end_date: end,
            };
            let report = ReportEngine::new(store, clock, calendar)
                .with_page_size(config.report.page_size)
                .build_report(period, &inputs, &ReportSorting::default())
                .await?;
            emit(cli.json, &report, print_report);
        }
        Command::Summary => {
            let summary = ReportEngine::new(store, clock, calendar)
                .with_page_size(config.report.page_size)
                .daily_summary()
                .await?;
            emit(cli.json, &summary, print_summary);
        }
        Command::History { page, date, table } => {
            let filter = HistoryFilter {
                date,
                table_name: table,
            };
            let page = HistoryBrowser::new(store, clock, calendar)
                .with_page_size(config.report.history_page_size)
                .page(&role, &filter, page)
                .await?;
            emit(cli.json, &page, print_history);
        }
    }

    Ok(())
}

fn emit<T: Serialize>(json: bool, value: &T, text: fn(&T)) {
    if !json {
        text(value);
        return;
    }
    match serde_json::to_string_pretty(value) {
        Ok(out) => println!("{out}"),
        Err(e) => error!(error = %e, "Failed to serialize output"),
    }
}

fn print_report(report: &ReportViewModel) {
    println!(
        "Report {} .. {} ({} sessions)",
        report.range.start_date, report.range.end_date, report.session_count
    );
    println!("  Cash      {:>12}", report.total_cash_revenue);
    println!("  Card      {:>12}", report.total_card_revenue);
    println!("  Transfer  {:>12}", report.total_transfer_revenue);
    println!("  Overall   {:>12}", report.overall_total_revenue);
    println!("  Expenses  {:>12}", report.total_expenses);

    println!("\nBy table");
    for row in &report.table_revenues {
        println!("  {:<20} {:>12}", row.table_name, row.revenue);
    }
    println!("\nBy day");
    for row in &report.daily_revenues {
        println!("  {:<20} {:>12}", row.date.to_string(), row.revenue);
    }
    println!("\nTop products");
    for row in &report.top_selling_products {
        println!(
            "  {:<20} {:>6} {:>12}",
            row.product_name, row.total_quantity_sold, row.total_revenue
        );
    }
}

fn print_summary(summary: &DailySummary) {
    println!("Today {} ({} sessions)", summary.range.start_date, summary.session_count);
    println!("  Cash      {:>12}", summary.total_cash_revenue);
    println!("  Card      {:>12}", summary.total_card_revenue);
    println!("  Transfer  {:>12}", summary.total_transfer_revenue);
    println!("  Overall   {:>12}", summary.overall_total_revenue);
}

fn print_history(page: &HistoryPage) {
    println!("Page {}", page.page_number);
    for row in &page.rows {
        println!(
            "  {:<12} {} {} {:>10} {}",
            row.table_name,
            row.start_time.format("%Y-%m-%d %H:%M"),
            row.duration,
            row.total_cost,
            row.payment_label
        );
    }
    if page.has_more {
        println!("  (more on page {})", page.page_number + 1);
    }
}
