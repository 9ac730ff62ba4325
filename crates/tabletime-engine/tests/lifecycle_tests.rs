mod common;

use chrono::Duration;
use std::sync::Arc;

use tabletime_core::{BusinessCalendar, DateInputs, Money, PaymentType, PeriodSelector, ReportSorting};
use tabletime_engine::{EndOutcome, EngineError, ReportEngine, TableState};
use tabletime_store::RemoteStore;

use common::Harness;

#[tokio::test]
async fn test_ninety_minute_session_reaches_cash_report() {
    let h = Harness::new().await;
    let table = h.table("Masa 1", Money::from_major(10)).await;
    let cola = h.product("Cola", Money::from_major(5)).await;

    let session = h.lifecycle.start(&table.id).await.unwrap();
    h.lifecycle
        .add_or_update_product(&session.id, &cola.id, 2, cola.price)
        .await
        .unwrap();
    h.clock.advance(Duration::minutes(90));

    let frozen = h.lifecycle.request_end(&session.id).await.unwrap();
    assert_eq!(frozen.table_cost, Money::from_cents(1500));
    assert_eq!(frozen.products_cost, Money::from_cents(1000));
    assert_eq!(frozen.total_cost, Money::from_cents(2500));
    assert_eq!(frozen.duration_formatted(), "01:30:00");

    let outcome = h
        .lifecycle
        .confirm_end(&session.id, PaymentType::Cash)
        .await
        .unwrap();
    assert!(matches!(outcome, EndOutcome::Closed { .. }));
    assert!(h.lifecycle.table(&table.id).await.unwrap().state.is_idle());

    let report = ReportEngine::new(
        Arc::new(h.store.clone()),
        Arc::new(h.clock.clone()),
        BusinessCalendar::utc(),
    )
    .build_report(PeriodSelector::Today, &DateInputs::default(), &ReportSorting::default())
    .await
    .unwrap();
    assert_eq!(report.total_cash_revenue, Money::from_cents(2500));
    assert_eq!(report.total_card_revenue, Money::zero());
    assert_eq!(report.overall_total_revenue, Money::from_cents(2500));
}

#[tokio::test]
async fn test_frozen_table_cost_survives_late_products() {
    let h = Harness::new().await;
    let table = h.table("Masa 1", Money::from_major(10)).await;
    let tea = h.product("Tea", Money::from_cents(150)).await;

    let session = h.lifecycle.start(&table.id).await.unwrap();
    h.clock.advance(Duration::minutes(30));
    let frozen = h.lifecycle.request_end(&session.id).await.unwrap();
    assert_eq!(frozen.table_cost, Money::from_major(5));

    h.lifecycle.add_one(&session.id, &tea).await.unwrap();
    h.clock.advance(Duration::minutes(45));

    let cost = h.lifecycle.current_cost(&session.id).await.unwrap();
    assert_eq!(cost.table_cost, Money::from_major(5));
    assert_eq!(cost.products_cost, Money::from_cents(150));
    assert_eq!(cost.total_cost, Money::from_cents(650));

    match h.lifecycle.confirm_end(&session.id, PaymentType::Card).await.unwrap() {
        EndOutcome::Closed { confirmed, .. } => {
            assert_eq!(confirmed.table_cost, Money::from_major(5));
            assert_eq!(confirmed.total_cost, Money::from_cents(650));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_hourly_price_is_captured_at_start() {
    let h = Harness::new().await;
    let table = h.table("Masa 1", Money::from_major(10)).await;

    let session = h.lifecycle.start(&table.id).await.unwrap();
    h.store
        .inner
        .set_table_price(&table.id, Money::from_major(40))
        .await
        .unwrap();
    h.lifecycle.refresh_tables().await.unwrap();
    h.clock.advance(Duration::hours(1));

    let cost = h.lifecycle.current_cost(&session.id).await.unwrap();
    assert_eq!(cost.table_cost, Money::from_major(10));
}

#[tokio::test]
async fn test_zero_quantity_and_delete_end_in_same_state() {
    let h = Harness::new().await;
    let t1 = h.table("Masa 1", Money::from_major(10)).await;
    let t2 = h.table("Masa 2", Money::from_major(10)).await;
    let cola = h.product("Cola", Money::from_major(5)).await;

    let s1 = h.lifecycle.start(&t1.id).await.unwrap();
    let s2 = h.lifecycle.start(&t2.id).await.unwrap();
    h.lifecycle.add_or_update_product(&s1.id, &cola.id, 3, cola.price).await.unwrap();
    let line = h
        .lifecycle
        .add_or_update_product(&s2.id, &cola.id, 3, cola.price)
        .await
        .unwrap()
        .unwrap();

    let removed = h
        .lifecycle
        .add_or_update_product(&s1.id, &cola.id, 0, cola.price)
        .await
        .unwrap();
    assert!(removed.is_none());
    h.lifecycle.remove_product(&line.id).await.unwrap();

    for (table, session) in [(&t1, &s1), (&t2, &s2)] {
        assert_eq!(h.local_quantity(&table.id, &cola.id).await, 0);
        assert!(h.store.inner.get_session_details(&session.id).await.unwrap().lines.is_empty());
        let cost = h.lifecycle.current_cost(&session.id).await.unwrap();
        assert_eq!(cost.products_cost, Money::zero());
    }

    let again = h.lifecycle.remove_product(&line.id).await.unwrap_err();
    assert!(matches!(again, EngineError::Store(ref e) if e.is_not_found()));
}

#[tokio::test]
async fn test_failed_upsert_rolls_back_to_previous_line() {
    let h = Harness::new().await;
    let table = h.table("Masa 1", Money::from_major(10)).await;
    let cola = h.product("Cola", Money::from_major(5)).await;
    let chips = h.product("Chips", Money::from_major(3)).await;

    let session = h.lifecycle.start(&table.id).await.unwrap();
    h.lifecycle.add_or_update_product(&session.id, &cola.id, 1, cola.price).await.unwrap();

    h.store.fail_upserts(true);
    let err = h
        .lifecycle
        .add_or_update_product(&session.id, &cola.id, 3, cola.price)
        .await
        .unwrap_err();
    assert!(err.user_message().contains("connection reset"));
    assert_eq!(h.local_quantity(&table.id, &cola.id).await, 1);
    assert_eq!(h.remote_quantity(&session.id, &cola.id).await, 1);

    h.lifecycle.add_one(&session.id, &chips).await.unwrap_err();
    assert_eq!(h.local_quantity(&table.id, &chips.id).await, 0);

    let view = h.lifecycle.table(&table.id).await.unwrap();
    assert_eq!(view.state.session().unwrap().lines.len(), 1);
}

#[tokio::test]
async fn test_start_conflict_reconciles_to_active() {
    let h = Harness::new().await;
    let table = h.table("Masa 1", Money::from_major(10)).await;

    // Another client opens the table behind the engine's back.
    let other = h
        .store
        .inner
        .start_session(&table.id, table.current_hourly_price)
        .await
        .unwrap();

    let err = h.lifecycle.start(&table.id).await.unwrap_err();
    assert!(err.is_conflict());

    let view = h.lifecycle.table(&table.id).await.unwrap();
    assert_eq!(view.state.session().unwrap().id, other.id);
    assert_eq!(h.store.inner.session_count().await, 1);
}

#[tokio::test]
async fn test_confirm_after_remote_close_is_handled() {
    let h = Harness::new().await;
    let table = h.table("Masa 1", Money::from_major(10)).await;
    let session = h.lifecycle.start(&table.id).await.unwrap();
    h.clock.advance(Duration::minutes(20));
    h.lifecycle.request_end(&session.id).await.unwrap();

    h.store.inner.end_session(&session.id, PaymentType::Card).await.unwrap();

    let outcome = h
        .lifecycle
        .confirm_end(&session.id, PaymentType::Cash)
        .await
        .unwrap();
    match outcome {
        EndOutcome::AlreadyClosed { session } => {
            assert_eq!(session.payment_type, Some(PaymentType::Card));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(h.lifecycle.table(&table.id).await.unwrap().state.is_idle());
}

#[tokio::test]
async fn test_request_end_on_remotely_closed_session() {
    let h = Harness::new().await;
    let table = h.table("Masa 1", Money::from_major(10)).await;
    let session = h.lifecycle.start(&table.id).await.unwrap();

    h.store.inner.end_session(&session.id, PaymentType::Cash).await.unwrap();

    let err = h.lifecycle.request_end(&session.id).await.unwrap_err();
    assert!(err.is_conflict());
    assert!(h.lifecycle.table(&table.id).await.unwrap().state.is_idle());
}

#[tokio::test]
async fn test_confirm_unknown_session_leaves_ending_untouched() {
    let h = Harness::new().await;
    let table = h.table("Masa 1", Money::from_major(10)).await;
    let session = h.lifecycle.start(&table.id).await.unwrap();
    h.lifecycle.request_end(&session.id).await.unwrap();

    let err = h
        .lifecycle
        .confirm_end("not-a-session", PaymentType::Cash)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownSession(_)));
    assert!(matches!(
        h.lifecycle.table(&table.id).await.unwrap().state,
        TableState::Ending { .. }
    ));
}

#[tokio::test]
async fn test_tables_listed_in_natural_order() {
    let h = Harness::new().await;
    for name in ["Masa 10", "Masa 2", "Masa 1"] {
        h.table(name, Money::from_major(10)).await;
    }
    let names: Vec<String> = h
        .lifecycle
        .refresh_tables()
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.table.name)
        .collect();
    assert_eq!(names, ["Masa 1", "Masa 2", "Masa 10"]);
}

#[tokio::test]
async fn test_refresh_keeps_frozen_bill() {
    let h = Harness::new().await;
    let table = h.table("Masa 1", Money::from_major(10)).await;
    let session = h.lifecycle.start(&table.id).await.unwrap();
    h.clock.advance(Duration::minutes(60));
    h.lifecycle.request_end(&session.id).await.unwrap();

    h.clock.advance(Duration::minutes(60));
    h.lifecycle.refresh_tables().await.unwrap();

    let cost = h.lifecycle.current_cost(&session.id).await.unwrap();
    assert_eq!(cost.table_cost, Money::from_major(10));
}
