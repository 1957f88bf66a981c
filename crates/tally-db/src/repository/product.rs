//! # Product Repository
//!
//! The catalog lookup the register consults when a cashier adds a product:
//! current name, price and stock status in the register's warehouse.
//!
//! ## Lookup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  products p  LEFT JOIN  stock s ON (p.id, warehouse)                   │
//! │                                                                         │
//! │  p.id, p.sku, p.name, p.price_cents ─────────► Product                 │
//! │  s.quantity (NULL = not tracked)   ──────────► stock_quantity          │
//! │  s.low_stock_threshold (NULL → 5)  ──────────► low_stock_threshold     │
//! │                                                                         │
//! │  Product::stock_status() → in_stock / low / out                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::{Product, DEFAULT_TENANT_ID};

const SELECT_PRODUCT: &str = r#"
    SELECT
        p.id,
        p.sku,
        p.name,
        p.price_cents,
        s.quantity AS stock_quantity,
        COALESCE(s.low_stock_threshold, 5) AS low_stock_threshold,
        p.allow_negative_stock,
        p.is_active
    FROM products p
    LEFT JOIN stock s ON s.product_id = p.id AND s.warehouse_id = ?1
"#;

/// Repository for catalog reads and writes.
///
/// ## Usage
/// ```rust,ignore
/// let product = db.products().get("uuid-here", &warehouse_id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Looks up a product with its stock in `warehouse_id`.
    pub async fn get(&self, id: &str, warehouse_id: &str) -> DbResult<Option<Product>> {
        let sql = format!("{} WHERE p.id = ?2", SELECT_PRODUCT);
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(warehouse_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Looks up a product by SKU (scanner input).
    pub async fn get_by_sku(&self, sku: &str, warehouse_id: &str) -> DbResult<Option<Product>> {
        let sql = format!("{} WHERE p.sku = ?2", SELECT_PRODUCT);
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(warehouse_id)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Active products by name, for the register's product grid.
    pub async fn list_active(&self, warehouse_id: &str, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!(
            "{} WHERE p.is_active = 1 ORDER BY p.name LIMIT ?2",
            SELECT_PRODUCT
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(warehouse_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Listed active products");
        Ok(products)
    }

    /// Inserts a catalog row. Stock is managed separately through
    /// [`InventoryRepository`](crate::InventoryRepository).
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO products (
                id, tenant_id, sku, name, price_cents,
                allow_negative_stock, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(DEFAULT_TENANT_ID)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.allow_negative_stock)
        .bind(product.is_active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Changes the catalog price. Lines already in a session and committed
    /// orders keep the price they captured.
    pub async fn set_price(&self, id: &str, price_cents: i64) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET price_cents = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(price_cents)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Counts catalog rows.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
