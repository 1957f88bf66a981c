//! End-to-end checkout behavior over in-memory ports.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tally_core::{CheckoutState, ManualMethod, Money, PaymentMethod, PaymentStatus, ReconciliationPolicy};
use tally_register::{CheckoutService, ErrorCode, PaymentLedgerState, SessionQueueState};

use common::{notification, GatedOrderStore, Harness, InMemoryCatalog};

#[tokio::test]
async fn test_line_totals_with_tax() {
    let h = Harness::new().await;
    h.ring_up("tea", 3).await;

    let summary = h.checkout.summary(&h.active_id()).unwrap();

    assert_eq!(summary.subtotal, Money::from_cents(750));
    assert_eq!(summary.tax, Money::from_cents(60));
    assert_eq!(summary.total, Money::from_cents(810));
    assert!(!summary.is_fully_covered);
}

#[tokio::test]
async fn test_mobile_overpayment_gives_change() {
    let h = Harness::new().await;
    h.ring_up("tea", 3).await;
    let session = h.active_id();
    let payment = h.ledger.ingest(notification("QJL2X3KK9A", 1000)).unwrap();

    h.checkout.open(&session).unwrap();
    let summary = h.checkout.apply_mobile(&session, &payment).unwrap();

    assert_eq!(summary.remaining, Money::from_cents(-190));
    assert!(summary.is_fully_covered);
    assert_eq!(summary.change, Money::from_cents(190));

    let receipt = h.checkout.confirm(&session).await.unwrap();
    assert_eq!(receipt.change, Money::from_cents(190));
    assert_eq!(receipt.total, Money::from_cents(810));

    let orders = h.store.orders().await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order.payment_method, PaymentMethod::Mobile);
    assert_eq!(orders[0].payments[0].incoming_payment_id.as_deref(), Some(payment.as_str()));
}

#[tokio::test]
async fn test_partial_cash_is_rejected_before_persisting() {
    let h = Harness::new().await;
    h.ring_up("tea", 3).await;
    let session = h.active_id();

    h.checkout.open(&session).unwrap();
    h.checkout
        .add_manual(&session, ManualMethod::Cash, Money::from_cents(500))
        .unwrap();
    let summary = h.checkout.summary(&session).unwrap();
    assert_eq!(summary.remaining, Money::from_cents(310));
    assert!(!summary.is_fully_covered);

    let err = h.checkout.confirm(&session).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::InsufficientPayment);
    assert_eq!(err.message, "still owed $3.10");
    assert!(h.store.orders().await.is_empty());
    assert_eq!(h.checkout.state(&session), Some(CheckoutState::Idle));
}

#[tokio::test]
async fn test_one_cent_short_counts_as_covered() {
    let h = Harness::new().await;
    h.ring_up("tea", 3).await;
    let session = h.active_id();

    h.checkout.open(&session).unwrap();
    h.checkout
        .add_manual(&session, ManualMethod::Card, Money::from_cents(809))
        .unwrap();

    let receipt = h.checkout.confirm(&session).await.unwrap();
    assert_eq!(receipt.change, Money::zero());
}

#[tokio::test]
async fn test_committing_only_session_leaves_fresh_active_session() {
    let h = Harness::new().await;
    h.ring_up("bun", 1).await;
    let session = h.active_id();

    h.checkout.open(&session).unwrap();
    h.checkout
        .add_manual(&session, ManualMethod::Cash, Money::from_cents(200))
        .unwrap();
    h.checkout.confirm(&session).await.unwrap();

    let snapshot = h.sessions.snapshot();
    assert_eq!(snapshot.sessions.len(), 1);
    assert_ne!(snapshot.sessions[0].id, session);
    assert_eq!(snapshot.active_session_id, snapshot.sessions[0].id);
    assert!(snapshot.sessions[0].lines.is_empty());
}

#[tokio::test]
async fn test_only_applied_payment_changes_status() {
    let h = Harness::new().await;
    h.ring_up("tea", 3).await;
    let session = h.active_id();
    let p1 = h.ledger.ingest(notification("QJL2X3KK9A", 1000)).unwrap();
    let p2 = h.ledger.ingest(notification("QJL2X3KK9B", 500)).unwrap();

    h.checkout.open(&session).unwrap();
    h.checkout.apply_mobile(&session, &p1).unwrap();
    let receipt = h.checkout.confirm(&session).await.unwrap();

    let (first, second) = h.ledger.with_ledger(|l| (l.get(&p1).cloned(), l.get(&p2).cloned()));
    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(first.status, PaymentStatus::Applied);
    assert_eq!(first.applied_order_id.as_deref(), Some(receipt.order_id.as_str()));
    assert_eq!(second.status, PaymentStatus::Pending);
    assert!(second.applied_order_id.is_none());
}

#[tokio::test]
async fn test_failed_commit_changes_nothing_and_can_be_retried() {
    let h = Harness::new().await;
    h.ring_up("tea", 3).await;
    let other = h.sessions.create_session(Some("Table 2".into()));
    h.sessions.activate_session(&other);
    h.ring_up("bun", 2).await;
    let session = h.sessions.with_queue(|q| q.sessions()[0].id.clone());

    let payment = h.ledger.ingest(notification("QJL2X3KK9A", 500)).unwrap();
    h.checkout.open(&session).unwrap();
    h.checkout.apply_mobile(&session, &payment).unwrap();
    h.checkout
        .add_manual(&session, ManualMethod::Cash, Money::from_cents(400))
        .unwrap();

    let queue_before = h.sessions.snapshot();
    let ledger_before = h.ledger.snapshot();
    let composition_before = h.checkout.composition(&session);

    h.store.set_failing(true);
    let err = h.checkout.confirm(&session).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::CommitFailed);
    assert!(err.retryable);
    assert_eq!(h.sessions.snapshot(), queue_before);
    assert_eq!(h.ledger.snapshot(), ledger_before);
    assert_eq!(h.checkout.composition(&session), composition_before);
    assert!(matches!(h.checkout.state(&session), Some(CheckoutState::Failed { .. })));

    h.store.set_failing(false);
    let receipt = h.checkout.confirm(&session).await.unwrap();
    assert_eq!(receipt.change, Money::from_cents(90));
    assert!(h.ledger.with_ledger(|l| !l.is_pending(&payment)));
    assert_eq!(h.sessions.with_queue(|q| q.active_session_id().to_string()), other);
}

#[tokio::test]
async fn test_committed_order_matches_session() {
    let h = Harness::new().await;
    h.ring_up("tea", 2).await;
    h.ring_up("bun", 3).await;
    let session = h.active_id();

    let expected = h.checkout.open(&session).unwrap();
    h.checkout
        .add_manual(&session, ManualMethod::Cash, Money::from_cents(1000))
        .unwrap();
    h.checkout.confirm(&session).await.unwrap();

    let orders = h.store.orders().await;
    let order = &orders[0];
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.order.total_cents, expected.total.cents());
    assert_eq!(order.order.cashier_id, "cashier-01");
    assert_eq!(order.order.payment_method, PaymentMethod::Cash);
}

#[tokio::test]
async fn test_price_is_captured_at_add_time() {
    let h = Harness::new().await;
    h.ring_up("tea", 1).await;
    h.catalog.insert(common::product("tea", 999)).await;
    h.ring_up("tea", 1).await;

    let summary = h.checkout.summary(&h.active_id()).unwrap();
    assert_eq!(summary.subtotal, Money::from_cents(500));
}

// =============================================================================
// Payment claims
// =============================================================================

#[tokio::test]
async fn test_payment_cannot_be_applied_to_two_sessions() {
    let h = Harness::new().await;
    h.ring_up("tea", 1).await;
    let first = h.active_id();
    let second = h.sessions.create_session(None);
    h.ring_up("bun", 1).await;
    let payment = h.ledger.ingest(notification("QJL2X3KK9A", 1000)).unwrap();

    h.checkout.open(&first).unwrap();
    h.checkout.open(&second).unwrap();
    h.checkout.apply_mobile(&first, &payment).unwrap();

    let err = h.checkout.apply_mobile(&second, &payment).unwrap_err();
    assert_eq!(err.code, ErrorCode::PaymentUnavailable);

    h.checkout.confirm(&first).await.unwrap();
    let err = h.checkout.apply_mobile(&second, &payment).unwrap_err();
    assert_eq!(err.code, ErrorCode::PaymentUnavailable);
}

#[tokio::test]
async fn test_cancel_releases_payments_without_touching_ledger() {
    let h = Harness::new().await;
    h.ring_up("tea", 1).await;
    let session = h.active_id();
    let other = h.sessions.create_session(None);
    h.ring_up("bun", 1).await;
    let payment = h.ledger.ingest(notification("QJL2X3KK9A", 1000)).unwrap();

    h.checkout.open(&session).unwrap();
    h.checkout.apply_mobile(&session, &payment).unwrap();
    h.checkout
        .add_manual(&session, ManualMethod::Cash, Money::from_cents(100))
        .unwrap();
    let ledger_before = h.ledger.snapshot();
    let queue_before = h.sessions.snapshot();

    h.checkout.cancel(&session).unwrap();

    assert!(h.checkout.composition(&session).is_none());
    assert_eq!(h.ledger.snapshot(), ledger_before);
    assert_eq!(h.sessions.snapshot(), queue_before);

    h.checkout.open(&other).unwrap();
    h.checkout.apply_mobile(&other, &payment).unwrap();
}

#[tokio::test]
async fn test_expired_payment_cannot_be_applied() {
    let h = Harness::new().await;
    h.ring_up("tea", 1).await;
    let session = h.active_id();
    let old = chrono::Utc::now() - chrono::Duration::hours(1);
    let payment = h.ledger.ingest_at(notification("QJL2X3KK9A", 1000), old).unwrap();

    h.ledger.expire_stale(chrono::Duration::minutes(30));
    h.checkout.open(&session).unwrap();

    let err = h.checkout.apply_mobile(&session, &payment).unwrap_err();
    assert_eq!(err.code, ErrorCode::PaymentUnavailable);
}

#[tokio::test]
async fn test_oversized_cash_entry_is_rejected_and_summary_still_works() {
    let h = Harness::new().await;
    h.ring_up("tea", 3).await;
    let session = h.active_id();
    h.checkout.open(&session).unwrap();

    let huge = Money::from_cents(i64::MAX / 2 + 1);
    let err = h.checkout.add_manual(&session, ManualMethod::Cash, huge).unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);
    let err = h.checkout.add_manual(&session, ManualMethod::Cash, huge).unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);

    let summary = h.checkout.summary(&session).unwrap();
    assert_eq!(summary.total_paid, Money::zero());
    assert_eq!(summary.remaining.cents(), 810);
}

#[tokio::test]
async fn test_note_can_be_set_on_an_idle_session() {
    let h = Harness::new().await;
    let session = h.active_id();

    h.checkout.set_note(&session, Some("no onions".into())).unwrap();
    h.checkout.set_customer_label(&session, Some("Walk-in".into())).unwrap();

    let (note, label) = h.sessions.with_queue(|q| {
        let s = q.session(&session).unwrap();
        (s.note.clone(), s.customer_label.clone())
    });
    assert_eq!(note.as_deref(), Some("no onions"));
    assert_eq!(label.as_deref(), Some("Walk-in"));
}

#[tokio::test]
async fn test_removed_payment_cannot_be_reapplied() {
    let h = Harness::new().await;
    h.ring_up("tea", 1).await;
    let session = h.active_id();
    let payment = h.ledger.ingest(notification("QJL2X3KK9A", 1000)).unwrap();

    h.checkout.open(&session).unwrap();
    h.checkout.apply_mobile(&session, &payment).unwrap();
    h.checkout.detach_mobile(&session, &payment).unwrap();
    assert!(h.ledger.remove(&payment).is_some());

    let summary = h.checkout.summary(&session).unwrap();
    assert!(!summary.is_fully_covered);
    let err = h.checkout.apply_mobile(&session, &payment).unwrap_err();
    assert_eq!(err.code, ErrorCode::PaymentUnavailable);
}

// =============================================================================
// In-flight guard
// =============================================================================

#[tokio::test]
async fn test_second_confirm_rejected_while_first_in_flight() {
    let sessions = SessionQueueState::new();
    let ledger = PaymentLedgerState::new();
    let catalog = InMemoryCatalog::default();
    catalog.insert(common::product("tea", 250)).await;
    let store = GatedOrderStore::default();
    let checkout = CheckoutService::new(
        sessions.clone(),
        ledger,
        Arc::new(catalog),
        Arc::new(store.clone()),
        ReconciliationPolicy::default(),
        "cashier-01",
    );

    checkout.add_item("tea").await.unwrap();
    let session = sessions.with_queue(|q| q.active_session_id().to_string());
    checkout.open(&session).unwrap();
    checkout
        .add_manual(&session, ManualMethod::Cash, Money::from_cents(300))
        .unwrap();

    let first = {
        let checkout = checkout.clone();
        let session = session.clone();
        tokio::spawn(async move { checkout.confirm(&session).await })
    };
    tokio::time::timeout(Duration::from_secs(5), store.entered.notified())
        .await
        .unwrap();

    assert_eq!(checkout.state(&session), Some(CheckoutState::Confirming));
    let err = checkout.confirm(&session).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::CheckoutInProgress);

    let err = checkout
        .add_manual(&session, ManualMethod::Cash, Money::from_cents(100))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::CheckoutInProgress);
    let err = checkout.add_item("tea").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::CheckoutInProgress);
    assert_eq!(checkout.cancel(&session).unwrap_err().code, ErrorCode::CheckoutInProgress);
    assert_eq!(
        checkout.remove_session(&session).unwrap_err().code,
        ErrorCode::CheckoutInProgress
    );
    let err = checkout
        .set_note(&session, Some("deliver to table 9".into()))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::CheckoutInProgress);
    let err = checkout
        .set_customer_label(&session, Some("Table 9".into()))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::CheckoutInProgress);
    let note = sessions.with_queue(|q| q.session(&session).and_then(|s| s.note.clone()));
    assert_eq!(note, None);

    store.release.notify_one();
    let receipt = first.await.unwrap().unwrap();
    assert_eq!(receipt.change, Money::from_cents(30));
    assert!(!sessions.with_queue(|q| q.contains(&session)));
}

#[tokio::test]
async fn test_other_sessions_stay_editable_during_commit() {
    let sessions = SessionQueueState::new();
    let catalog = InMemoryCatalog::default();
    catalog.insert(common::product("tea", 250)).await;
    let store = GatedOrderStore::default();
    let checkout = CheckoutService::new(
        sessions.clone(),
        PaymentLedgerState::new(),
        Arc::new(catalog),
        Arc::new(store.clone()),
        ReconciliationPolicy::default(),
        "cashier-01",
    );

    checkout.add_item("tea").await.unwrap();
    let session = sessions.with_queue(|q| q.active_session_id().to_string());
    checkout.open(&session).unwrap();
    checkout
        .add_manual(&session, ManualMethod::Cash, Money::from_cents(300))
        .unwrap();

    let first = {
        let checkout = checkout.clone();
        let session = session.clone();
        tokio::spawn(async move { checkout.confirm(&session).await })
    };
    tokio::time::timeout(Duration::from_secs(5), store.entered.notified())
        .await
        .unwrap();

    let next = sessions.create_session(None);
    checkout.add_item("tea").await.unwrap();
    assert_eq!(sessions.with_queue(|q| q.session(&next).map(|s| s.line_count())), Some(1));

    store.release.notify_one();
    first.await.unwrap().unwrap();
    assert_eq!(sessions.with_queue(|q| q.active_session_id().to_string()), next);
}
