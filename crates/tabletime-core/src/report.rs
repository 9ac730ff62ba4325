//! # Revenue Aggregation
//!
//! Turns a session history into the revenue report view-model.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  all sessions ──► filter: closed, end day ∈ [start, end]               │
//! │                        │                                                │
//! │                        ▼  (ordered by session id)                       │
//! │                 RevenueAccumulator  (f64, unrounded)                    │
//! │                 ├── cash / card / transfer / overall                    │
//! │                 ├── per table name                                      │
//! │                 ├── per end day                                         │
//! │                 └── per product name (quantity, revenue)                │
//! │                        │                                                │
//! │                        ▼  emit: round to cents ONCE                     │
//! │                 ReportViewModel ──► sort (per list, toggleable)         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Accumulation runs in session-id order, so the result does not depend on
//! the order pages arrived in. Expenses are summed alongside revenue and
//! never subtracted from it.
//!
//! `overall_total_revenue` covers every included session whatever its
//! payment type, so it always equals the sum of the per-table (and per-day)
//! figures before rounding. Transfer payments get their own bucket.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use ts_rs::TS;

use crate::billing::raw_cost;
use crate::money::Money;
use crate::period::{BusinessCalendar, ReportRange};
use crate::types::{Expense, PaymentType, TableSession};

// =============================================================================
// Sorting
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum SortDirection {
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// A column a report list can be sorted by.
pub trait SortKey: Copy + Eq {
    /// Direction picked the first time this list is sorted by a new key.
    fn default_direction() -> SortDirection;
}

/// Active key and direction for one list.
///
/// Selecting the active key again flips the direction; selecting another key
/// switches to it with the list's default direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState<K> {
    pub key: K,
    pub direction: SortDirection,
}

impl<K: SortKey> SortState<K> {
    pub fn new(key: K) -> Self {
        Self {
            key,
            direction: K::default_direction(),
        }
    }

    pub fn with_direction(key: K, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    pub fn toggle(&mut self, key: K) {
        if self.key == key {
            self.direction = self.direction.flipped();
        } else {
            self.key = key;
            self.direction = K::default_direction();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub enum DailySortKey {
    Date,
    Revenue,
}

impl SortKey for DailySortKey {
    fn default_direction() -> SortDirection {
        SortDirection::Ascending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub enum ProductSortKey {
    ProductName,
    TotalQuantitySold,
    TotalRevenue,
}

impl SortKey for ProductSortKey {
    fn default_direction() -> SortDirection {
        SortDirection::Descending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub enum TableSortKey {
    TableName,
    Revenue,
}

impl SortKey for TableSortKey {
    fn default_direction() -> SortDirection {
        SortDirection::Descending
    }
}

/// Sort state of every list in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSorting {
    pub daily: SortState<DailySortKey>,
    pub products: SortState<ProductSortKey>,
    pub tables: SortState<TableSortKey>,
}

impl Default for ReportSorting {
    fn default() -> Self {
        Self {
            daily: SortState::new(DailySortKey::Date),
            products: SortState::new(ProductSortKey::TotalQuantitySold),
            tables: SortState::new(TableSortKey::Revenue),
        }
    }
}

// =============================================================================
// View-model
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TableRevenue {
    pub table_name: String,
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DailyRevenue {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub product_name: String,
    pub total_quantity_sold: i64,
    pub total_revenue: Money,
}

/// The revenue report for one period. Derived and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReportViewModel {
    pub range: ReportRange,
    pub session_count: usize,
    pub total_cash_revenue: Money,
    pub total_card_revenue: Money,
    pub total_transfer_revenue: Money,
    pub overall_total_revenue: Money,
    pub total_expenses: Money,
    pub table_revenues: Vec<TableRevenue>,
    pub daily_revenues: Vec<DailyRevenue>,
    pub top_selling_products: Vec<ProductSales>,
}

impl ReportViewModel {
    /// Re-sorts every list; no refetch, no re-aggregation.
    pub fn apply_sorting(&mut self, sorting: &ReportSorting) {
        self.sort_tables(sorting.tables);
        self.sort_daily(sorting.daily);
        self.sort_products(sorting.products);
    }

    pub fn sort_tables(&mut self, state: SortState<TableSortKey>) {
        self.table_revenues.sort_by(|a, b| {
            let primary = match state.key {
                TableSortKey::TableName => a.table_name.cmp(&b.table_name),
                TableSortKey::Revenue => a.revenue.cmp(&b.revenue),
            };
            state
                .direction
                .apply(primary)
                .then_with(|| a.table_name.cmp(&b.table_name))
        });
    }

    pub fn sort_daily(&mut self, state: SortState<DailySortKey>) {
        self.daily_revenues.sort_by(|a, b| {
            let primary = match state.key {
                DailySortKey::Date => a.date.cmp(&b.date),
                DailySortKey::Revenue => a.revenue.cmp(&b.revenue),
            };
            state
                .direction
                .apply(primary)
                .then_with(|| a.date.cmp(&b.date))
        });
    }

    pub fn sort_products(&mut self, state: SortState<ProductSortKey>) {
        self.top_selling_products.sort_by(|a, b| {
            let primary = match state.key {
                ProductSortKey::ProductName => compare_names(&a.product_name, &b.product_name),
                ProductSortKey::TotalQuantitySold => {
                    a.total_quantity_sold.cmp(&b.total_quantity_sold)
                }
                ProductSortKey::TotalRevenue => a.total_revenue.cmp(&b.total_revenue),
            };
            state
                .direction
                .apply(primary)
                .then_with(|| a.product_name.cmp(&b.product_name))
        });
    }
}

/// Case-insensitive name order, ties broken by the raw string.
fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

// =============================================================================
// Accumulator
// =============================================================================

/// Unrounded running totals.
#[derive(Debug, Clone, Default)]
pub struct RevenueAccumulator {
    cash: f64,
    card: f64,
    transfer: f64,
    overall: f64,
    sessions: usize,
    tables: HashMap<String, f64>,
    daily: BTreeMap<NaiveDate, f64>,
    products: HashMap<String, (i64, f64)>,
}

impl RevenueAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one closed session. Open sessions are ignored.
    pub fn add_session(&mut self, session: &TableSession, calendar: &BusinessCalendar) {
        let Some(end) = session.end_time else {
            return;
        };
        let total = raw_cost(session, end).total();

        match session.payment_type {
            Some(PaymentType::Cash) => self.cash += total,
            Some(PaymentType::Card) => self.card += total,
            Some(PaymentType::Transfer) => self.transfer += total,
            None => {}
        }
        self.overall += total;
        self.sessions += 1;

        *self.tables.entry(session.table_name.clone()).or_insert(0.0) += total;
        *self.daily.entry(calendar.day_of(end)).or_insert(0.0) += total;

        for line in session.lines.iter().filter(|l| l.quantity > 0) {
            let entry = self
                .products
                .entry(line.product_name.clone())
                .or_insert((0, 0.0));
            entry.0 += line.quantity;
            entry.1 += line.raw_total();
        }
    }

    /// Rounds everything to cents and sorts the lists.
    pub fn emit(
        &self,
        range: ReportRange,
        total_expenses: Money,
        sorting: &ReportSorting,
    ) -> ReportViewModel {
        let mut view = ReportViewModel {
            range,
            session_count: self.sessions,
            total_cash_revenue: Money::round_from_decimal(self.cash),
            total_card_revenue: Money::round_from_decimal(self.card),
            total_transfer_revenue: Money::round_from_decimal(self.transfer),
            overall_total_revenue: Money::round_from_decimal(self.overall),
            total_expenses,
            table_revenues: self
                .tables
                .iter()
                .map(|(name, revenue)| TableRevenue {
                    table_name: name.clone(),
                    revenue: Money::round_from_decimal(*revenue),
                })
                .collect(),
            daily_revenues: self
                .daily
                .iter()
                .map(|(date, revenue)| DailyRevenue {
                    date: *date,
                    revenue: Money::round_from_decimal(*revenue),
                })
                .collect(),
            top_selling_products: self
                .products
                .iter()
                .map(|(name, (quantity, revenue))| ProductSales {
                    product_name: name.clone(),
                    total_quantity_sold: *quantity,
                    total_revenue: Money::round_from_decimal(*revenue),
                })
                .collect(),
        };
        view.apply_sorting(sorting);
        view
    }
}

/// Builds the report for `range` from a complete session history.
///
/// `sessions` may contain anything the store returned; filtering happens
/// here. `expenses` are assumed to be already limited to the range.
pub fn aggregate(
    sessions: &[TableSession],
    expenses: &[Expense],
    range: &ReportRange,
    calendar: &BusinessCalendar,
    sorting: &ReportSorting,
) -> ReportViewModel {
    let mut included: Vec<&TableSession> = sessions
        .iter()
        .filter(|s| range.includes(s, calendar))
        .collect();
    included.sort_by(|a, b| a.id.cmp(&b.id));

    let mut acc = RevenueAccumulator::new();
    for session in included {
        acc.add_session(session, calendar);
    }

    let total_expenses: Money = expenses.iter().map(|e| e.amount).sum();
    acc.emit(*range, total_expenses, sorting)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionProductLine;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, d, h, 0, 0).unwrap()
    }

    fn closed(
        id: &str,
        table: &str,
        end: DateTime<Utc>,
        hours: i64,
        hourly_major: i64,
        payment: PaymentType,
    ) -> TableSession {
        let mut s = TableSession::open(
            id,
            table,
            table,
            end - Duration::hours(hours),
            Money::from_major(hourly_major),
        );
        s.end_time = Some(end);
        s.payment_type = Some(payment);
        s
    }

    fn with_line(mut s: TableSession, product: &str, qty: i64, cents: i64) -> TableSession {
        s.lines.push(SessionProductLine {
            id: format!("{}-{}", s.id, product),
            session_id: s.id.clone(),
            product_id: product.to_string(),
            product_name: product.to_string(),
            quantity: qty,
            unit_price: Money::from_cents(cents),
        });
        s
    }

    fn range(start: u32, end: u32) -> ReportRange {
        ReportRange::new(day(start), day(end), &BusinessCalendar::utc()).unwrap()
    }

    fn report(sessions: &[TableSession], r: &ReportRange) -> ReportViewModel {
        aggregate(
            sessions,
            &[],
            r,
            &BusinessCalendar::utc(),
            &ReportSorting::default(),
        )
    }

    #[test]
    fn test_ninety_minute_cash_session() {
        let mut s = TableSession::open("s1", "t1", "Masa 1", at(5, 18), Money::from_major(10));
        s = with_line(s, "Cola", 2, 500);
        s.end_time = Some(at(5, 18) + Duration::minutes(90));
        s.payment_type = Some(PaymentType::Cash);

        let view = report(&[s], &range(5, 5));
        assert_eq!(view.total_cash_revenue, Money::from_cents(2500));
        assert_eq!(view.total_card_revenue, Money::zero());
        assert_eq!(view.overall_total_revenue, Money::from_cents(2500));
        assert_eq!(view.session_count, 1);
    }

    #[test]
    fn test_transfer_counts_toward_overall_and_tables() {
        let sessions = vec![
            closed("a", "A", at(5, 20), 1, 10, PaymentType::Cash),
            closed("b", "B", at(5, 21), 2, 10, PaymentType::Transfer),
        ];
        let view = report(&sessions, &range(5, 5));

        assert_eq!(view.total_cash_revenue, Money::from_major(10));
        assert_eq!(view.total_transfer_revenue, Money::from_major(20));
        assert_eq!(view.overall_total_revenue, Money::from_major(30));
        let table_sum: Money = view.table_revenues.iter().map(|t| t.revenue).sum();
        assert_eq!(table_sum, view.overall_total_revenue);
    }

    #[test]
    fn test_filter_excludes_open_and_out_of_range_sessions() {
        let open = TableSession::open("o", "A", "A", at(5, 10), Money::from_major(10));
        let sessions = vec![
            open,
            closed("in", "A", at(5, 23), 1, 10, PaymentType::Card),
            closed("before", "A", at(4, 23), 1, 10, PaymentType::Card),
            closed("after", "A", at(6, 1), 1, 10, PaymentType::Card),
        ];
        let view = report(&sessions, &range(5, 5));
        assert_eq!(view.session_count, 1);
        assert_eq!(view.total_card_revenue, Money::from_major(10));
    }

    #[test]
    fn test_table_revenues_sorted_descending_then_toggled() {
        let sessions = vec![
            closed("b", "B", at(5, 20), 1, 10, PaymentType::Cash),
            closed("a", "A", at(5, 21), 3, 10, PaymentType::Card),
        ];
        let mut view = report(&sessions, &range(5, 5));
        let names: Vec<_> = view
            .table_revenues
            .iter()
            .map(|t| (t.table_name.as_str(), t.revenue.cents()))
            .collect();
        assert_eq!(names, vec![("A", 3000), ("B", 1000)]);

        let mut sorting = ReportSorting::default();
        sorting.tables.toggle(TableSortKey::Revenue);
        view.apply_sorting(&sorting);
        let names: Vec<_> = view
            .table_revenues
            .iter()
            .map(|t| t.table_name.as_str())
            .collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_daily_revenues_keyed_by_end_day() {
        let sessions = vec![
            closed("1", "A", at(3, 12), 1, 10, PaymentType::Cash),
            closed("2", "A", at(5, 12), 2, 10, PaymentType::Cash),
            closed("3", "B", at(3, 15), 1, 5, PaymentType::Card),
        ];
        let mut view = report(&sessions, &range(1, 7));
        let days: Vec<_> = view
            .daily_revenues
            .iter()
            .map(|d| (d.date, d.revenue.cents()))
            .collect();
        assert_eq!(days, vec![(day(3), 1500), (day(5), 2000)]);

        view.sort_daily(SortState::with_direction(
            DailySortKey::Revenue,
            SortDirection::Descending,
        ));
        assert_eq!(view.daily_revenues[0].date, day(5));
    }

    #[test]
    fn test_top_products_aggregate_quantity_and_revenue() {
        let sessions = vec![
            with_line(closed("1", "A", at(5, 12), 1, 0, PaymentType::Cash), "Tea", 3, 150),
            with_line(closed("2", "B", at(5, 13), 1, 0, PaymentType::Card), "Tea", 1, 200),
            with_line(closed("3", "B", at(5, 14), 1, 0, PaymentType::Card), "Cola", 2, 300),
        ];
        let view = report(&sessions, &range(5, 5));
        let products: Vec<_> = view
            .top_selling_products
            .iter()
            .map(|p| (p.product_name.as_str(), p.total_quantity_sold, p.total_revenue.cents()))
            .collect();
        assert_eq!(products, vec![("Tea", 4, 650), ("Cola", 2, 600)]);
    }

    #[test]
    fn test_aggregation_is_order_independent() {
        let sessions = vec![
            with_line(closed("1", "A", at(5, 12), 1, 7, PaymentType::Cash), "Tea", 3, 150),
            closed("2", "B", at(5, 13), 2, 9, PaymentType::Card),
            with_line(closed("3", "C", at(6, 14), 1, 4, PaymentType::Transfer), "Cola", 2, 300),
            closed("4", "A", at(6, 18), 3, 7, PaymentType::Cash),
        ];
        let r = range(1, 7);
        let forward = report(&sessions, &r);

        let mut reversed = sessions.clone();
        reversed.reverse();
        assert_eq!(report(&reversed, &r), forward);

        let mut rotated = sessions.clone();
        rotated.rotate_left(2);
        assert_eq!(report(&rotated, &r), forward);
    }

    #[test]
    fn test_rounding_happens_at_emission() {
        // Three 1-minute sessions at 0.20/h: 0.00333.. each.
        // Per-session rounding would give 0.00; accumulated it is 0.01.
        let mut sessions = Vec::new();
        for id in ["x", "y", "z"] {
            let mut s = TableSession::open(id, "A", "A", at(5, 12), Money::from_cents(20));
            s.end_time = Some(at(5, 12) + Duration::minutes(1));
            s.payment_type = Some(PaymentType::Cash);
            sessions.push(s);
        }
        let view = report(&sessions, &range(5, 5));
        assert_eq!(view.total_cash_revenue.cents(), 1);
        assert_eq!(view.table_revenues[0].revenue.cents(), 1);
    }

    #[test]
    fn test_expenses_reported_side_by_side() {
        let sessions = vec![closed("1", "A", at(5, 12), 1, 10, PaymentType::Cash)];
        let expenses = vec![Expense {
            id: "e1".into(),
            name: "Chalk".into(),
            amount: Money::from_cents(450),
            spent_at: at(5, 9),
            description: None,
        }];
        let view = aggregate(
            &sessions,
            &expenses,
            &range(5, 5),
            &BusinessCalendar::utc(),
            &ReportSorting::default(),
        );
        assert_eq!(view.total_expenses, Money::from_cents(450));
        assert_eq!(view.overall_total_revenue, Money::from_major(10));
    }

    #[test]
    fn test_sort_state_toggle_rules() {
        let mut daily = SortState::new(DailySortKey::Date);
        assert_eq!(daily.direction, SortDirection::Ascending);
        daily.toggle(DailySortKey::Date);
        assert_eq!(daily.direction, SortDirection::Descending);
        daily.toggle(DailySortKey::Revenue);
        assert_eq!(daily.key, DailySortKey::Revenue);
        assert_eq!(daily.direction, SortDirection::Ascending);

        let mut products = SortState::new(ProductSortKey::TotalQuantitySold);
        products.toggle(ProductSortKey::ProductName);
        assert_eq!(products.direction, SortDirection::Descending);
        products.toggle(ProductSortKey::ProductName);
        assert_eq!(products.direction, SortDirection::Ascending);
    }

    #[test]
    fn test_empty_history_yields_empty_report() {
        let view = report(&[], &range(5, 5));
        assert_eq!(view.session_count, 0);
        assert!(view.overall_total_revenue.is_zero());
        assert!(view.table_revenues.is_empty());
        assert!(view.daily_revenues.is_empty());
        assert!(view.top_selling_products.is_empty());
    }
}
