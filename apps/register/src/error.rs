//! # API Error Type
//!
//! Unified error envelope for register operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Tally POS                              │
//! │                                                                         │
//! │  Cashier UI                  Register service                           │
//! │  ──────────                  ────────────────                           │
//! │                                                                         │
//! │  confirm(session)                                                       │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  CheckoutService::confirm → Result<Receipt, ApiError>            │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Not covered? ── CoreError::InsufficientPayment ──┐              │  │
//! │  │         │                                         ▼              │  │
//! │  │         ▼                                   INSUFFICIENT_PAYMENT │  │
//! │  │  Store failed? ── DbError::TransactionFailed ──► COMMIT_FAILED   │  │
//! │  │         │                                     (retryable)        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Structural inconsistencies in the queue are repaired without surfacing an
//! error, and unknown ids in queue or ledger operations are no-ops, so
//! neither has an error code here.

use std::fmt;

use serde::Serialize;
use tally_core::{CoreError, ValidationError};
use tally_db::DbError;

use crate::config::ConfigError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Error returned from register operations.
///
/// ```json
/// {
///   "code": "COMMIT_FAILED",
///   "message": "Order could not be saved: Database transaction failed",
///   "retryable": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable message for display
    pub message: String,

    /// Whether the same request may succeed if resubmitted unchanged
    pub retryable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Session, checkout, product or order not found
    NotFound,

    /// Input validation failed
    ValidationError,

    /// Funds do not cover the order yet ("still owed $X")
    InsufficientPayment,

    /// Checkout attempted on a session with no lines
    EmptySession,

    /// A commit for the session is already in flight
    CheckoutInProgress,

    /// Incoming payment is applied, expired, removed or claimed elsewhere
    PaymentUnavailable,

    /// Product inactive or out of stock
    ProductUnavailable,

    /// Line or session size limit reached
    LimitExceeded,

    /// Stock decrement would go below zero
    InsufficientStock,

    /// The order store rejected the commit; nothing was applied
    CommitFailed,

    /// Database operation failed
    DatabaseError,

    /// Configuration could not be loaded or is invalid
    ConfigError,

    /// Internal error
    Internal,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    /// The store failed to persist an order. Always retryable: the queue and
    /// ledger were left exactly as they were before the attempt.
    pub fn commit_failed(cause: &ApiError) -> Self {
        ApiError {
            code: ErrorCode::CommitFailed,
            message: format!("Order could not be saved: {}", cause.message),
            retryable: true,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// =============================================================================
// Conversions
// =============================================================================

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::ValidationError,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::InsufficientStock {
                product_id,
                available,
                requested,
            } => ApiError::new(
                ErrorCode::InsufficientStock,
                format!(
                    "Insufficient stock for {}: {} available, {} requested",
                    product_id, available, requested
                ),
            ),
            DbError::ConnectionFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        let code = match err {
            CoreError::InsufficientPayment { .. } => ErrorCode::InsufficientPayment,
            CoreError::EmptySession { .. } => ErrorCode::EmptySession,
            CoreError::SessionNotFound(_) => ErrorCode::NotFound,
            CoreError::CheckoutInProgress { .. } => ErrorCode::CheckoutInProgress,
            CoreError::PaymentUnavailable { .. } | CoreError::PaymentAlreadyClaimed { .. } => {
                ErrorCode::PaymentUnavailable
            }
            CoreError::SessionTooLarge { .. } | CoreError::QuantityTooLarge { .. } => {
                ErrorCode::LimitExceeded
            }
            CoreError::ProductUnavailable { .. } => ErrorCode::ProductUnavailable,
            CoreError::InvalidPaymentAmount { .. } | CoreError::Validation(_) => {
                ErrorCode::ValidationError
            }
        };
        ApiError::new(code, message)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::new(ErrorCode::ConfigError, err.to_string())
    }
}
