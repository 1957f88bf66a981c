//! # External Interfaces
//!
//! The two services the register consumes, as object-safe async traits so
//! checkout can run against SQLite in production and fakes in tests.
//!
//! ```text
//!   CheckoutService ──add_item──► Catalog      product id → name/price/stock
//!         │
//!         └────────confirm──────► OrderStore   NewOrder → order id | failure
//! ```

use async_trait::async_trait;
use tally_core::{NewOrder, Product};

use crate::error::ApiResult;

/// Catalog lookup, read only when an item is added. The price returned is
/// captured into the session line and never re-read.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn product(&self, product_id: &str) -> ApiResult<Option<Product>>;
}

/// Order + inventory commit. Implementations must persist the order header,
/// its line items, its payment rows and every stock decrement in one
/// transaction, or nothing at all.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn commit(&self, order: &NewOrder) -> ApiResult<String>;
}
