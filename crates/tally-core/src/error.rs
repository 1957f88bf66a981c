//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Checkout and reconciliation rule violations    │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  Register errors (in app)                                              │
//! │  └── ApiError         - What the cashier UI sees (serialized)          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → UI           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stale ids and corrupted queue state are NOT errors here: the session
//! queue repairs itself and the ledger treats unknown ids as no-ops.

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// Commit attempted while the order is not yet covered.
    ///
    /// ## User Workflow
    /// ```text
    /// Total $8.10, cash $5.00 entered
    ///      │
    ///      ▼
    /// confirm()
    ///      │
    ///      ▼
    /// InsufficientPayment { remaining: $3.10 }
    ///      │
    ///      ▼
    /// UI keeps the live readout: "still owed $3.10"
    /// ```
    #[error("still owed {remaining}")]
    InsufficientPayment { remaining: Money },

    /// Checkout opened on a session with no lines.
    #[error("Session {session_id} has no items")]
    EmptySession { session_id: String },

    /// Session not present in the queue (checkout-level lookups only).
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// A commit for this session is already in flight.
    #[error("Checkout already in progress for session {session_id}")]
    CheckoutInProgress { session_id: String },

    /// The incoming payment is not pending (applied, expired or removed).
    #[error("Payment {payment_id} is not available")]
    PaymentUnavailable { payment_id: String },

    /// The incoming payment is attached to another session's checkout.
    #[error("Payment {payment_id} is already attached to session {session_id}")]
    PaymentAlreadyClaimed {
        payment_id: String,
        session_id: String,
    },

    /// Session has reached the maximum number of distinct lines.
    #[error("Session cannot have more than {max} lines")]
    SessionTooLarge { max: usize },

    /// Line quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Product cannot be sold (inactive, or out of stock without backorder).
    #[error("Product {product_id} is not available for sale")]
    ProductUnavailable { product_id: String },

    /// Manual entry or incoming amount is invalid.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
