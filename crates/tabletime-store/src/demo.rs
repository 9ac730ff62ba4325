//! # Demo Data
//!
//! Populates a [`MemoryStore`] with a small club: tables, a snack bar, a few
//! days of closed sessions and some expenses.
//!
//! Used by `tabletime-report --demo` and by tests that want realistic
//! volume without hand-building every session.
//!
//! ## Generated Data
//! - 6 tables "Masa 1" … "Masa 6" (pool and snooker, 8 - 15 per hour)
//! - 8 products from the snack bar
//! - `days` × `sessions_per_day` closed sessions ending on consecutive days,
//!   payment types cycling Cash → Card → Transfer
//! - one expense per day

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use tabletime_core::{Money, PaymentType, SessionProductLine, TableSession};

use crate::error::StoreResult;
use crate::memory::MemoryStore;

const TABLES: &[(&str, &str, i64)] = &[
    ("Masa 1", "Pool", 800),
    ("Masa 2", "Pool", 800),
    ("Masa 3", "Pool", 1000),
    ("Masa 4", "Snooker", 1200),
    ("Masa 5", "Snooker", 1200),
    ("Masa 6", "VIP", 1500),
];

const PRODUCTS: &[(&str, i64)] = &[
    ("Cola", 250),
    ("Fanta", 250),
    ("Water", 100),
    ("Tea", 150),
    ("Coffee", 300),
    ("Chips", 200),
    ("Sandwich", 450),
    ("Energy Drink", 400),
];

const EXPENSES: &[(&str, i64)] = &[
    ("Chalk", 1200),
    ("Cleaning", 3000),
    ("Cue tips", 2500),
    ("Electricity", 9000),
];

/// Shape of the generated history.
#[derive(Debug, Clone, Copy)]
pub struct DemoShape {
    /// Number of days, ending the day before `until`.
    pub days: u32,
    pub sessions_per_day: u32,
}

impl Default for DemoShape {
    fn default() -> Self {
        Self {
            days: 14,
            sessions_per_day: 12,
        }
    }
}

/// Seeds `store` with history ending before `until`.
///
/// Deterministic: the same shape and `until` produce the same figures.
pub async fn seed(store: &MemoryStore, shape: DemoShape, until: DateTime<Utc>) -> StoreResult<()> {
    let mut tables = Vec::with_capacity(TABLES.len());
    for (name, kind, cents) in TABLES {
        tables.push(store.add_table(name, Some(kind), Money::from_cents(*cents)).await);
    }
    let mut products = Vec::with_capacity(PRODUCTS.len());
    for (name, cents) in PRODUCTS {
        products.push(store.add_product(name, Money::from_cents(*cents), 100).await);
    }

    let mut sequence: u64 = 0;
    for day in 0..shape.days {
        let day_start = until - Duration::days(i64::from(shape.days - day));

        for slot in 0..shape.sessions_per_day {
            sequence += 1;
            let table = &tables[(sequence as usize) % tables.len()];
            let start = day_start + Duration::minutes(i64::from(slot) * 50 + 10);
            let minutes = 20 + ((sequence * 37) % 140) as i64;

            let mut session = TableSession::open(
                format!("demo-{sequence:05}"),
                &table.id,
                &table.name,
                start,
                table.current_hourly_price,
            );
            for offset in 0..(sequence % 3) {
                let product = &products[((sequence + offset) as usize) % products.len()];
                session.lines.push(SessionProductLine {
                    id: format!("demo-line-{sequence:05}-{offset}"),
                    session_id: session.id.clone(),
                    product_id: product.id.clone(),
                    product_name: product.name.clone(),
                    quantity: 1 + (offset as i64),
                    unit_price: product.price,
                });
            }
            session.end_time = Some(start + Duration::minutes(minutes));
            session.payment_type = Some(PaymentType::ALL[(sequence % 3) as usize]);
            store.insert_session(session).await?;
        }

        let (name, cents) = EXPENSES[(day as usize) % EXPENSES.len()];
        store
            .add_expense(name, Money::from_cents(cents), day_start + Duration::hours(9), None)
            .await;
    }

    info!(
        tables = tables.len(),
        products = products.len(),
        sessions = sequence,
        "Demo data seeded"
    );
    Ok(())
}
