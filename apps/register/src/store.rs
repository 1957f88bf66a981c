//! # SQLite Store
//!
//! [`Catalog`] and [`OrderStore`] backed by `tally-db`, bound to the
//! warehouse this register sells from.

use async_trait::async_trait;
use tracing::info;

use tally_core::{NewOrder, Product};
use tally_db::Database;

use crate::error::{ApiError, ApiResult};
use crate::ports::{Catalog, OrderStore};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
    warehouse_id: String,
}

impl SqliteStore {
    /// Binds to `warehouse_id`, or to the primary warehouse when `None`.
    /// A database with no warehouse yet gets a primary "Main Store".
    pub async fn open(db: Database, warehouse_id: Option<&str>) -> ApiResult<Self> {
        let warehouse = match warehouse_id {
            Some(id) => db
                .inventory()
                .get_warehouse(id)
                .await?
                .ok_or_else(|| ApiError::not_found("Warehouse", id))?,
            None => match db.inventory().primary_warehouse().await? {
                Some(w) => w,
                None => {
                    info!("No warehouse found, creating primary warehouse");
                    db.inventory().create_warehouse("Main Store", true).await?
                }
            },
        };

        info!(warehouse_id = %warehouse.id, name = %warehouse.name, "Register bound to warehouse");
        Ok(SqliteStore {
            db,
            warehouse_id: warehouse.id,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn warehouse_id(&self) -> &str {
        &self.warehouse_id
    }
}

#[async_trait]
impl Catalog for SqliteStore {
    async fn product(&self, product_id: &str) -> ApiResult<Option<Product>> {
        Ok(self.db.products().get(product_id, &self.warehouse_id).await?)
    }
}

#[async_trait]
impl OrderStore for SqliteStore {
    async fn commit(&self, order: &NewOrder) -> ApiResult<String> {
        Ok(self.db.orders().commit(order, &self.warehouse_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_db::DbConfig;

    #[tokio::test]
    async fn test_open_creates_primary_warehouse_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let first = SqliteStore::open(db.clone(), None).await.unwrap();
        let second = SqliteStore::open(db, None).await.unwrap();

        assert_eq!(first.warehouse_id(), second.warehouse_id());
    }

    #[tokio::test]
    async fn test_open_unknown_warehouse_is_not_found() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = SqliteStore::open(db, Some("missing")).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_catalog_lookup_unknown_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = SqliteStore::open(db, None).await.unwrap();
        assert!(store.product("missing").await.unwrap().is_none());
    }
}
