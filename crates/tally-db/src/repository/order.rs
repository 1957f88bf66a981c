//! # Order Repository
//!
//! Persists a checked-out session as an immutable order and reads it back.
//!
//! ## Commit Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  commit(new_order, warehouse): ONE transaction          │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   ├── INSERT orders            (header: totals, method, cashier)       │
//! │   ├── INSERT order_items × N   (sku / name / price snapshots)          │
//! │   ├── INSERT order_payments    (full composition; incoming id UNIQUE)  │
//! │   └── for each line:                                                   │
//! │         ├── tracked? check quantity (unless negative stock allowed)    │
//! │         ├── UPDATE stock SET quantity = quantity - qty                 │
//! │         └── INSERT stock_movements (-qty, 'sale', order id)            │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any error → the transaction is dropped and rolled back: no reader     │
//! │  ever sees an order without its items, or a decrement without order.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::{MovementReason, NewOrder, Order, OrderItem, OrderPayment};

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Writes the order, its items and payments, and the stock decrements
    /// for every line, all or nothing. Returns the order id.
    pub async fn commit(&self, new_order: &NewOrder, warehouse_id: &str) -> DbResult<String> {
        let order = &new_order.order;
        debug!(
            order_id = %order.id,
            order_number = %order.order_number,
            items = new_order.items.len(),
            payments = new_order.payments.len(),
            "Committing order"
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        insert_order(&mut tx, order).await?;
        for item in &new_order.items {
            insert_item(&mut tx, item).await?;
        }
        for payment in &new_order.payments {
            insert_payment(&mut tx, payment).await?;
        }
        for item in &new_order.items {
            record_sale(&mut tx, item, warehouse_id, order.completed_at).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total_cents = order.total_cents,
            "Order committed"
        );
        Ok(order.id.clone())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT
                id, tenant_id, order_number, status,
                subtotal_cents, tax_cents, total_cents, paid_cents, change_cents,
                payment_method, cashier_id, customer_label, note,
                created_at, completed_at
            FROM orders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT
                id, order_id, product_id, sku_snapshot, name_snapshot,
                unit_price_cents, quantity, line_total_cents, created_at
            FROM order_items
            WHERE order_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    pub async fn get_payments(&self, order_id: &str) -> DbResult<Vec<OrderPayment>> {
        let payments = sqlx::query_as::<_, OrderPayment>(
            r#"
            SELECT
                id, order_id, method, provider, amount_cents,
                incoming_payment_id, reference, created_at
            FROM order_payments
            WHERE order_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Most recently completed orders first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT
                id, tenant_id, order_number, status,
                subtotal_cents, tax_cents, total_cents, paid_cents, change_cents,
                payment_method, cashier_id, customer_label, note,
                created_at, completed_at
            FROM orders
            ORDER BY completed_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Transaction Steps
// =============================================================================

async fn insert_order(tx: &mut Transaction<'_, Sqlite>, order: &Order) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, tenant_id, order_number, status,
            subtotal_cents, tax_cents, total_cents, paid_cents, change_cents,
            payment_method, cashier_id, customer_label, note,
            created_at, completed_at
        ) VALUES (
            ?1, ?2, ?3, ?4,
            ?5, ?6, ?7, ?8, ?9,
            ?10, ?11, ?12, ?13,
            ?14, ?15
        )
        "#,
    )
    .bind(&order.id)
    .bind(&order.tenant_id)
    .bind(&order.order_number)
    .bind(order.status)
    .bind(order.subtotal_cents)
    .bind(order.tax_cents)
    .bind(order.total_cents)
    .bind(order.paid_cents)
    .bind(order.change_cents)
    .bind(order.payment_method)
    .bind(&order.cashier_id)
    .bind(&order.customer_label)
    .bind(&order.note)
    .bind(order.created_at)
    .bind(order.completed_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn insert_item(tx: &mut Transaction<'_, Sqlite>, item: &OrderItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (
            id, order_id, product_id, sku_snapshot, name_snapshot,
            unit_price_cents, quantity, line_total_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&item.id)
    .bind(&item.order_id)
    .bind(&item.product_id)
    .bind(&item.sku_snapshot)
    .bind(&item.name_snapshot)
    .bind(item.unit_price_cents)
    .bind(item.quantity)
    .bind(item.line_total_cents)
    .bind(item.created_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn insert_payment(tx: &mut Transaction<'_, Sqlite>, payment: &OrderPayment) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO order_payments (
            id, order_id, method, provider, amount_cents,
            incoming_payment_id, reference, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.order_id)
    .bind(payment.method)
    .bind(payment.provider)
    .bind(payment.amount_cents)
    .bind(&payment.incoming_payment_id)
    .bind(&payment.reference)
    .bind(payment.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
            field,
            value: payment.incoming_payment_id.clone().unwrap_or_default(),
        },
        other => other,
    })?;

    Ok(())
}

/// Decrements tracked stock for one line and logs a negative movement.
/// Untracked products get the movement only.
async fn record_sale(
    tx: &mut Transaction<'_, Sqlite>,
    item: &OrderItem,
    warehouse_id: &str,
    at: DateTime<Utc>,
) -> DbResult<()> {
    let tracked: Option<(i64, bool)> = sqlx::query_as(
        r#"
        SELECT s.quantity, p.allow_negative_stock
        FROM stock s
        JOIN products p ON p.id = s.product_id
        WHERE s.product_id = ?1 AND s.warehouse_id = ?2
        "#,
    )
    .bind(&item.product_id)
    .bind(warehouse_id)
    .fetch_optional(&mut **tx)
    .await?;

    if let Some((available, allow_negative)) = tracked {
        if available < item.quantity && !allow_negative {
            return Err(DbError::InsufficientStock {
                product_id: item.product_id.clone(),
                available,
                requested: item.quantity,
            });
        }

        sqlx::query(
            "UPDATE stock SET quantity = quantity - ?3, updated_at = ?4 WHERE product_id = ?1 AND warehouse_id = ?2",
        )
        .bind(&item.product_id)
        .bind(warehouse_id)
        .bind(item.quantity)
        .bind(at)
        .execute(&mut **tx)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, product_id, warehouse_id, quantity_change, reason, reference_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&item.product_id)
    .bind(warehouse_id)
    .bind(-item.quantity)
    .bind(MovementReason::Sale)
    .bind(&item.order_id)
    .bind(at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
