//! Register wired to a real (in-memory) SQLite store.

mod common;

use std::sync::Arc;

use tally_core::{ManualMethod, Money, MovementReason, PaymentMethod, PaymentStatus};
use tally_db::{Database, DbConfig};
use tally_register::{ErrorCode, Register, RegisterConfig, SessionQueueState, SqliteStore};

use common::{notification, product};

async fn setup(stock: i64) -> (Register, Database, String) {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let store = Arc::new(SqliteStore::open(db.clone(), None).await.unwrap());

    let tea = product("tea", 250);
    db.products().insert(&tea).await.unwrap();
    db.inventory()
        .restock(&tea.id, store.warehouse_id(), stock)
        .await
        .unwrap();

    let warehouse_id = store.warehouse_id().to_string();
    let register = Register::with_ports(
        RegisterConfig::default(),
        SessionQueueState::new(),
        store.clone(),
        store,
    );
    (register, db, warehouse_id)
}

#[tokio::test]
async fn test_commit_persists_order_items_payments_and_stock() {
    let (register, db, warehouse_id) = setup(10).await;
    let checkout = register.checkout();
    for _ in 0..3 {
        checkout.add_item("tea").await.unwrap();
    }
    let session = register.sessions().with_queue(|q| q.active_session_id().to_string());
    let payment = register.ledger().ingest(notification("QJL2X3KK9A", 1000)).unwrap();

    checkout.open(&session).unwrap();
    checkout.apply_mobile(&session, &payment).unwrap();
    let receipt = checkout.confirm(&session).await.unwrap();

    let order = db.orders().get_by_id(&receipt.order_id).await.unwrap().unwrap();
    assert_eq!(order.total_cents, 810);
    assert_eq!(order.paid_cents, 1000);
    assert_eq!(order.change_cents, 190);
    assert_eq!(order.payment_method, PaymentMethod::Mobile);
    assert_eq!(order.order_number, receipt.order_number);

    let items = db.orders().get_items(&receipt.order_id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 3);
    assert_eq!(items[0].unit_price_cents, 250);

    let payments = db.orders().get_payments(&receipt.order_id).await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].incoming_payment_id.as_deref(), Some(payment.as_str()));

    let level = db.inventory().stock_level("tea", &warehouse_id).await.unwrap().unwrap();
    assert_eq!(level.quantity, 7);
    let movements = db.inventory().movements_for_reference(&receipt.order_id).await.unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].quantity_change, -3);
    assert_eq!(movements[0].reason, MovementReason::Sale);

    let applied = register.ledger().with_ledger(|l| l.get(&payment).cloned()).unwrap();
    assert_eq!(applied.status, PaymentStatus::Applied);
    assert_eq!(applied.applied_order_id.as_deref(), Some(receipt.order_id.as_str()));
}

#[tokio::test]
async fn test_stock_shortfall_rolls_back_and_keeps_state() {
    let (register, db, warehouse_id) = setup(2).await;
    let checkout = register.checkout();
    for _ in 0..3 {
        checkout.add_item("tea").await.unwrap();
    }
    let session = register.sessions().with_queue(|q| q.active_session_id().to_string());
    let payment = register.ledger().ingest(notification("QJL2X3KK9A", 500)).unwrap();

    checkout.open(&session).unwrap();
    checkout.apply_mobile(&session, &payment).unwrap();
    checkout
        .add_manual(&session, ManualMethod::Cash, Money::from_cents(400))
        .unwrap();
    let queue_before = register.sessions().snapshot();

    let err = checkout.confirm(&session).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::CommitFailed);
    assert!(err.retryable);
    assert_eq!(db.orders().count().await.unwrap(), 0);
    let level = db.inventory().stock_level("tea", &warehouse_id).await.unwrap().unwrap();
    assert_eq!(level.quantity, 2);
    assert_eq!(register.sessions().snapshot(), queue_before);
    assert!(register.ledger().with_ledger(|l| l.is_pending(&payment)));
}

#[tokio::test]
async fn test_sold_out_product_cannot_be_added() {
    let (register, _db, _) = setup(0).await;

    let err = register.checkout().add_item("tea").await.unwrap_err();

    assert_eq!(err.code, ErrorCode::ProductUnavailable);
    assert!(register.sessions().with_queue(|q| q.active_session().is_empty()));
}
