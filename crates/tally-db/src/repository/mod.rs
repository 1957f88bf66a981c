//! # Repository Module
//!
//! Database repository implementations for Tally POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Register service                                                      │
//! │       │                                                                 │
//! │       │  db.products().get(id, warehouse)                              │
//! │       │  db.orders().commit(&new_order, warehouse)                     │
//! │       ▼                                                                 │
//! │  ProductRepository / OrderRepository / InventoryRepository             │
//! │       │                                                                 │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog lookup
//! - [`OrderRepository`](order::OrderRepository) - Atomic order commit and reads
//! - [`InventoryRepository`](inventory::InventoryRepository) - Stock and movements

pub mod inventory;
pub mod order;
pub mod product;
