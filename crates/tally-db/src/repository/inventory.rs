//! # Inventory Repository
//!
//! Warehouses, per-warehouse stock levels and the append-only movement log.
//!
//! ## Stock Model
//! ```text
//! stock (product, warehouse) ── quantity ──► current level
//!        ▲
//!        │ every change is paired with
//!        │
//! stock_movements ── signed quantity_change, reason, reference_id
//!
//!   restock   +N   reference = None
//!   sale      -N   reference = order id  (written by OrderRepository::commit)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::{MovementReason, StockMovement, StockStatus};

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Warehouse {
    pub id: String,
    pub name: String,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StockLevel {
    pub product_id: String,
    pub warehouse_id: String,
    pub quantity: i64,
    pub low_stock_threshold: i64,
    pub updated_at: DateTime<Utc>,
}

impl StockLevel {
    pub fn status(&self) -> StockStatus {
        StockStatus::classify(self.quantity, self.low_stock_threshold)
    }
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Creates a warehouse. At most one warehouse is primary; creating a new
    /// primary demotes the old one.
    pub async fn create_warehouse(&self, name: &str, is_primary: bool) -> DbResult<Warehouse> {
        let warehouse = Warehouse {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            is_primary,
            created_at: Utc::now(),
        };
        debug!(id = %warehouse.id, name = %name, is_primary, "Creating warehouse");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        if is_primary {
            sqlx::query("UPDATE warehouses SET is_primary = 0 WHERE is_primary = 1")
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("INSERT INTO warehouses (id, name, is_primary, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&warehouse.id)
            .bind(&warehouse.name)
            .bind(warehouse.is_primary)
            .bind(warehouse.created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(warehouse)
    }

    pub async fn primary_warehouse(&self) -> DbResult<Option<Warehouse>> {
        let warehouse = sqlx::query_as::<_, Warehouse>(
            "SELECT id, name, is_primary, created_at FROM warehouses WHERE is_primary = 1 LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(warehouse)
    }

    pub async fn get_warehouse(&self, id: &str) -> DbResult<Option<Warehouse>> {
        let warehouse = sqlx::query_as::<_, Warehouse>(
            "SELECT id, name, is_primary, created_at FROM warehouses WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(warehouse)
    }

    /// Stock row for a product, or `None` if the product is not tracked in
    /// that warehouse.
    pub async fn stock_level(&self, product_id: &str, warehouse_id: &str) -> DbResult<Option<StockLevel>> {
        let level = sqlx::query_as::<_, StockLevel>(
            r#"
            SELECT product_id, warehouse_id, quantity, low_stock_threshold, updated_at
            FROM stock
            WHERE product_id = ?1 AND warehouse_id = ?2
            "#,
        )
        .bind(product_id)
        .bind(warehouse_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(level)
    }

    /// Receives `quantity` units, starting tracking if needed.
    pub async fn restock(&self, product_id: &str, warehouse_id: &str, quantity: i64) -> DbResult<()> {
        self.adjust(product_id, warehouse_id, quantity, MovementReason::Restock, None)
            .await
    }

    /// Applies a signed stock change and logs the movement in one
    /// transaction.
    pub async fn adjust(
        &self,
        product_id: &str,
        warehouse_id: &str,
        quantity_change: i64,
        reason: MovementReason,
        reference_id: Option<&str>,
    ) -> DbResult<()> {
        debug!(product_id = %product_id, quantity_change, ?reason, "Adjusting stock");
        let now = Utc::now();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO stock (product_id, warehouse_id, quantity, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (product_id, warehouse_id)
            DO UPDATE SET quantity = quantity + excluded.quantity, updated_at = excluded.updated_at
            "#,
        )
        .bind(product_id)
        .bind(warehouse_id)
        .bind(quantity_change)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, product_id, warehouse_id, quantity_change, reason, reference_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(product_id)
        .bind(warehouse_id)
        .bind(quantity_change)
        .bind(reason)
        .bind(reference_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(())
    }

    /// Movements tied to a reference, e.g. every sale line of one order.
    pub async fn movements_for_reference(&self, reference_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, warehouse_id, quantity_change, reason, reference_id, created_at
            FROM stock_movements
            WHERE reference_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(reference_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }

    /// Most recent movements for a product.
    pub async fn movements_for_product(&self, product_id: &str, limit: u32) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, warehouse_id, quantity_change, reason, reference_id, created_at
            FROM stock_movements
            WHERE product_id = ?1
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(movements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{product, setup};

    #[tokio::test]
    async fn test_single_primary_warehouse() {
        let (db, first) = setup().await;
        let second = db.inventory().create_warehouse("Back Store", true).await.unwrap();

        let primary = db.inventory().primary_warehouse().await.unwrap().unwrap();
        assert_eq!(primary.id, second.id);
        let first = db.inventory().get_warehouse(&first).await.unwrap().unwrap();
        assert!(!first.is_primary);
    }

    #[tokio::test]
    async fn test_restock_and_adjust_log_movements() {
        let (db, warehouse) = setup().await;
        let tea = product("TEA-01", 250);
        db.products().insert(&tea).await.unwrap();

        db.inventory().restock(&tea.id, &warehouse, 10).await.unwrap();
        db.inventory()
            .adjust(&tea.id, &warehouse, -4, MovementReason::Adjustment, Some("count-7"))
            .await
            .unwrap();

        let level = db.inventory().stock_level(&tea.id, &warehouse).await.unwrap().unwrap();
        assert_eq!(level.quantity, 6);
        assert_eq!(level.status(), StockStatus::InStock);

        let movements = db.inventory().movements_for_product(&tea.id, 10).await.unwrap();
        assert_eq!(movements.len(), 2);
        let total: i64 = movements.iter().map(|m| m.quantity_change).sum();
        assert_eq!(total, 6);

        let counted = db.inventory().movements_for_reference("count-7").await.unwrap();
        assert_eq!(counted.len(), 1);
        assert_eq!(counted[0].reason, MovementReason::Adjustment);
    }

    #[tokio::test]
    async fn test_movement_for_unknown_product_rolls_back() {
        let (db, warehouse) = setup().await;
        let err = db.inventory().restock("missing", &warehouse, 5).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
        assert!(db.inventory().stock_level("missing", &warehouse).await.unwrap().is_none());
    }
}
