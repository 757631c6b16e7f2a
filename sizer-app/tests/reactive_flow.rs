//! E2E test: field edits flow through the debounced graph.
//!
//! Flow:
//! 1. Start the app on an empty in-memory store
//! 2. Edit fields in bursts
//! 3. Verify: derived values change only after the compute quiet period,
//!    and only once per burst

use std::sync::Arc;
use std::time::Duration;

use sizer_app::{App, AppEvent, Config};
use sizer_domain::{DerivedValue, FieldId, Trend};
use sizer_engine::DerivedNode;
use sizer_store::MemoryStore;

const SETTLE: Duration = Duration::from_millis(300);

async fn start() -> App {
    App::start(Config::test(), Arc::new(MemoryStore::new())).await.unwrap()
}

// =============================================================================
// Test: Scenarios
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_bullish_scenario() {
    let app = start().await;

    app.fields().write(FieldId::EntryPrice, "100");
    app.fields().write(FieldId::Stoploss, "90");
    tokio::time::sleep(SETTLE).await;

    let derived = app.derived();
    assert_eq!(derived.number(DerivedNode::RiskInUsd), 20.0);
    assert_eq!(derived.get(DerivedNode::Trend), DerivedValue::Trend(Trend::Bullish));
    assert!((derived.number(DerivedNode::PositionSizeUsd) - 168.067).abs() < 0.001);
    assert!((derived.number(DerivedNode::PositionSizeCrypto) - 1.68067).abs() < 0.00001);

    app.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_bearish_scenario() {
    let app = start().await;

    app.fields().write(FieldId::EntryPrice, "100");
    app.fields().write(FieldId::Stoploss, "110");
    tokio::time::sleep(SETTLE).await;

    let derived = app.derived();
    assert_eq!(derived.get(DerivedNode::Trend), DerivedValue::Trend(Trend::Bearish));
    assert!((derived.number(DerivedNode::EntryOverStoplossRatio) - 0.0909).abs() < 0.0001);

    app.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_trend_undefined_without_entry() {
    let app = start().await;

    app.fields().write(FieldId::Stoploss, "90");
    tokio::time::sleep(SETTLE).await;

    let derived = app.derived();
    assert!(derived.get(DerivedNode::Trend).is_undefined());
    assert!(derived.number(DerivedNode::PositionSizeUsd).is_nan());

    app.shutdown().await.unwrap();
}

// =============================================================================
// Test: Debounce
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_burst_recomputes_once() {
    let app = start().await;
    let mut risk = app.on_derived(DerivedNode::RiskInUsd);
    let mut settled = app.fields().on_change(FieldId::RiskPercent);
    let mut events = app.events();

    for value in ["3", "4", "5"] {
        app.fields().write(FieldId::RiskPercent, value);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // Raw reads are immediate, the graph still sees the old value
    assert_eq!(app.fields().read(FieldId::RiskPercent).as_str(), "5");
    assert!(!risk.has_changed().unwrap());

    tokio::time::sleep(SETTLE).await;

    assert!(settled.has_changed().unwrap());
    assert_eq!(settled.borrow_and_update().as_str(), "5");
    assert_eq!(*risk.borrow_and_update(), DerivedValue::Number(50.0));

    let mut propagations = 0;
    while let Some(event) = events.try_recv() {
        if matches!(event, Ok(AppEvent::DerivedUpdated { field: FieldId::RiskPercent, .. })) {
            propagations += 1;
        }
    }
    assert_eq!(propagations, 1);

    app.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_derived_updated_event() {
    let app = start().await;
    let mut events = app.events();

    app.fields().write(FieldId::AccountBalance, "2000");
    tokio::time::sleep(SETTLE).await;

    let mut updated = None;
    while let Some(event) = events.try_recv() {
        if let Ok(AppEvent::DerivedUpdated {
            field,
            recomputed,
            snapshot,
        }) = event
        {
            updated = Some((field, recomputed, snapshot));
        }
    }

    let (field, recomputed, snapshot) = updated.expect("no DerivedUpdated event");
    assert_eq!(field, FieldId::AccountBalance);
    assert!(recomputed.contains(&DerivedNode::RiskInUsd));
    assert!(recomputed.contains(&DerivedNode::RealProfitPercent));
    assert!(!recomputed.contains(&DerivedNode::Trend));
    assert_eq!(snapshot.number(DerivedNode::RiskInUsd), 40.0);

    app.shutdown().await.unwrap();
}

// =============================================================================
// Test: Reset
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_reset_is_idempotent() {
    let app = start().await;

    app.fields().write(FieldId::AccountBalance, "5000");
    app.fields().write(FieldId::EntryPrice, "95000");
    app.locks().toggle(FieldId::StopFee).unwrap();
    app.fields().write(FieldId::StopFee, "0.5");

    app.reset_all();
    let once: Vec<_> = FieldId::ALL.iter().map(|f| app.fields().read(*f)).collect();
    app.reset_all();
    let twice: Vec<_> = FieldId::ALL.iter().map(|f| app.fields().read(*f)).collect();

    assert_eq!(once, twice);
    assert_eq!(app.fields().read(FieldId::AccountBalance).as_str(), "1000");
    assert!(app.fields().read(FieldId::EntryPrice).is_empty());
    assert_eq!(app.fields().read(FieldId::StopFee).as_str(), "0.5");

    tokio::time::sleep(SETTLE).await;
    assert!(app.derived().get(DerivedNode::Trend).is_undefined());

    app.shutdown().await.unwrap();
}
