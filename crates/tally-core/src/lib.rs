//! # tally-core: Pure Business Logic for Tally POS
//!
//! The register's order-session queue, payment ledger and reconciliation
//! engine, as plain data structures and pure functions with no I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Cashier UI (external)                           │   │
//! │  │   Session tabs ──► Product grid ──► Checkout ──► Receipt       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              tally-register (service layer)                     │   │
//! │  │   queue state, ledger state, payment feed, checkout service    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌───────────┐ ┌──────────────┐    │   │
//! │  │   │ session  │ │  ledger  │ │ reconcile │ │   checkout   │    │   │
//! │  │   │  Queue   │ │ Incoming │ │  compute  │ │ state machine│    │   │
//! │  │   │  Lines   │ │ Payments │ │  Summary  │ │  NewOrder    │    │   │
//! │  │   └──────────┘ └──────────┘ └───────────┘ └──────────────┘    │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-db (Database Layer)                    │   │
//! │  │        catalog lookup, atomic order + inventory commit          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`session`] - Session queue: concurrent draft orders, active pointer
//! - [`ledger`] - Incoming payment notifications and their lifecycle
//! - [`reconcile`] - Due / paid / remaining / change computation
//! - [`checkout`] - Checkout state machine and order snapshot
//! - [`money`] - Money type with integer arithmetic
//! - [`types`] - Catalog and persisted order types
//! - [`error`] - Domain error types
//! - [`validation`] - Input rules
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::reconcile::{compute, ManualMethod, PaymentComposition, ReconciliationPolicy};
//! use tally_core::{Money, Product, SessionQueue};
//!
//! let tea = Product {
//!     id: "tea".into(),
//!     sku: "TEA-01".into(),
//!     name: "Masala Tea".into(),
//!     price_cents: 250,
//!     stock_quantity: None,
//!     low_stock_threshold: 5,
//!     allow_negative_stock: false,
//!     is_active: true,
//! };
//!
//! let mut queue = SessionQueue::new();
//! queue.add_item(&tea).unwrap();
//! queue.update_quantity("tea", 3).unwrap();
//!
//! let mut funds = PaymentComposition::new();
//! funds.add_manual(ManualMethod::Cash, Money::from_cents(500)).unwrap();
//!
//! let summary = compute(&queue.active_session().lines, &funds, &ReconciliationPolicy::default());
//! assert_eq!(summary.total.cents(), 810);
//! assert_eq!(summary.still_owed().to_string(), "$3.10");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod ledger;
pub mod money;
pub mod reconcile;
pub mod session;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use checkout::{Checkout, CheckoutState, NewOrder};
pub use error::{CoreError, CoreResult, ValidationError};
pub use ledger::{IncomingPayment, PaymentLedger, PaymentNotification, PaymentStatus};
pub use money::Money;
pub use reconcile::{
    classify_method, compute, ManualEntry, ManualMethod, PaymentComposition,
    ReconciliationPolicy, ReconciliationSummary,
};
pub use session::{CartLine, QueueSnapshot, RepairReport, Session, SessionQueue};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Tenant id written on every order (single-store register).
pub const DEFAULT_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Maximum distinct lines in one session.
pub const MAX_SESSION_LINES: usize = 100;

/// Maximum quantity of a single line.
///
/// Catches fat-finger entries such as 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest single payment, in cents ($10,000,000.00), for an incoming
/// notification or a manual entry.
pub const MAX_PAYMENT_CENTS: i64 = 1_000_000_000;

/// Fixed register tax rate: 8%.
pub const DEFAULT_TAX_RATE_BPS: u32 = 800;

/// Largest shortfall, in cents, that still counts as fully covered.
pub const DEFAULT_COVERAGE_TOLERANCE_CENTS: i64 = 1;
