//! # Domain Types
//!
//! Shared domain types: the catalog view of a product, the persisted order
//! snapshot and the enums that classify payments and stock movements.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Order      │   │  OrderPayment   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id             │   │  order_id (FK)  │       │
//! │  │  name, price    │   │  order_number   │   │  method         │       │
//! │  │  stock status   │   │  totals         │   │  provider       │       │
//! │  └─────────────────┘   │  payment_method │   │  incoming id    │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   OrderItem     │   │ StockMovement   │   │ PaymentMethod   │       │
//! │  │  (snapshot of   │   │  signed delta   │   │  Cash           │       │
//! │  │   name, price)  │   │  per warehouse  │   │  Card, Mobile   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Persisted types keep amounts as `*_cents: i64` columns; use the accessor
//! methods to get a [`Money`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (1 bps = 0.01%).
///
/// The register applies one fixed rate to a session's subtotal; 800 bps is
/// the 8% default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage, e.g. `8.0` → 800 bps.
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate(crate::DEFAULT_TAX_RATE_BPS)
    }
}

// =============================================================================
// Catalog Product
// =============================================================================

/// Stock status reported by the catalog at add-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    Low,
    Out,
}

impl StockStatus {
    /// Classifies a stock level against its low-stock threshold.
    ///
    /// ```rust
    /// use tally_core::StockStatus;
    ///
    /// assert_eq!(StockStatus::classify(0, 5), StockStatus::Out);
    /// assert_eq!(StockStatus::classify(5, 5), StockStatus::Low);
    /// assert_eq!(StockStatus::classify(6, 5), StockStatus::InStock);
    /// ```
    pub fn classify(quantity: i64, low_threshold: i64) -> Self {
        if quantity <= 0 {
            StockStatus::Out
        } else if quantity <= low_threshold {
            StockStatus::Low
        } else {
            StockStatus::InStock
        }
    }
}

/// A product as seen by the register: current name, price and stock status.
///
/// Read only when a cashier adds it to a session; the price is captured into
/// the session line and never tracked afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    /// Quantity on hand in the register's warehouse. `None` when the product
    /// is not inventory-tracked.
    pub stock_quantity: Option<i64>,
    pub low_stock_threshold: i64,
    /// Allow selling when stock is zero or negative.
    pub allow_negative_stock: bool,
    pub is_active: bool,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Untracked products always report `InStock`.
    pub fn stock_status(&self) -> StockStatus {
        match self.stock_quantity {
            Some(qty) => StockStatus::classify(qty, self.low_stock_threshold),
            None => StockStatus::InStock,
        }
    }

    /// Checks if the product may be added to a session.
    pub fn can_sell(&self) -> bool {
        self.is_active && (self.stock_status() != StockStatus::Out || self.allow_negative_stock)
    }
}

// =============================================================================
// Payment Classification
// =============================================================================

/// Mobile-money networks that push incoming payment notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum MobileProvider {
    Mpesa,
    Airtel,
    Tigo,
}

impl MobileProvider {
    /// Length of the reference code the network issues.
    pub const fn reference_len(&self) -> usize {
        match self {
            MobileProvider::Mpesa => 10,
            MobileProvider::Airtel | MobileProvider::Tigo => 8,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            MobileProvider::Mpesa => "mpesa",
            MobileProvider::Airtel => "airtel",
            MobileProvider::Tigo => "tigo",
        }
    }
}

impl fmt::Display for MobileProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MobileProvider {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mpesa" | "m-pesa" => Ok(MobileProvider::Mpesa),
            "airtel" => Ok(MobileProvider::Airtel),
            "tigo" => Ok(MobileProvider::Tigo),
            _ => Err(ValidationError::NotAllowed {
                field: "provider".to_string(),
                allowed: vec!["mpesa".into(), "airtel".into(), "tigo".into()],
            }),
        }
    }
}

/// Coarse payment-method tag stored on an order.
///
/// The full breakdown lives in [`OrderPayment`] rows next to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Mobile,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Mobile => "mobile",
        })
    }
}

// =============================================================================
// Order
// =============================================================================

/// The status of a persisted order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Completed,
    Pending,
    Refunded,
    Cancelled,
}

/// An immutable order snapshot written by checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub tenant_id: String,
    pub order_number: String,
    pub status: OrderStatus,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    /// Sum of every payment that went into the order.
    pub paid_cents: i64,
    pub change_cents: i64,
    pub payment_method: PaymentMethod,
    pub cashier_id: String,
    pub customer_label: Option<String>,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub completed_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn change(&self) -> Money {
        Money::from_cents(self.change_cents)
    }
}

/// A line item on an order.
/// Name and unit price are frozen at commit time; later catalog changes
/// never touch them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub sku_snapshot: String,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// One contribution to an order's payment composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderPayment {
    pub id: String,
    pub order_id: String,
    pub method: PaymentMethod,
    pub provider: Option<MobileProvider>,
    pub amount_cents: i64,
    /// Ledger id of the incoming payment, for mobile contributions.
    pub incoming_payment_id: Option<String>,
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Why a stock level changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum MovementReason {
    Sale,
    Restock,
    Return,
    Adjustment,
}

/// Append-only signed stock delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub warehouse_id: String,
    pub quantity_change: i64,
    pub reason: MovementReason,
    /// Order id for sales, adjustment id otherwise.
    pub reference_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
