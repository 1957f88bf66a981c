//! # Reconciliation Engine
//!
//! Pure computation from a session's lines and the funds attached to it to
//! the figures the cashier sees: due, paid, still owed, change.
//!
//! ## Computation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  lines ──► subtotal = Σ(unit price × qty)                              │
//! │                │                                                        │
//! │                ▼                                                        │
//! │            tax = round_half_up(subtotal × bps / 10000)                 │
//! │            total = subtotal + tax                                      │
//! │                                                                         │
//! │  composition ──► total_paid = Σ mobile + Σ manual (cash, card)         │
//! │                                                                         │
//! │  remaining = total − total_paid         (negative when overpaid)       │
//! │  covered   = remaining ≤ tolerance                                     │
//! │  change    = max(0, total_paid − total) once covered, else 0           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here is cached: summaries are recomputed from the current lines
//! and composition on every read.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::ledger::IncomingPayment;
use crate::money::Money;
use crate::session::CartLine;
use crate::types::{MobileProvider, PaymentMethod, TaxRate};
use crate::validation::validate_payment_amount;

// =============================================================================
// Payment Composition
// =============================================================================

/// Manually keyed tender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ManualMethod {
    Cash,
    Card,
}

impl From<ManualMethod> for PaymentMethod {
    fn from(method: ManualMethod) -> Self {
        match method {
            ManualMethod::Cash => PaymentMethod::Cash,
            ManualMethod::Card => PaymentMethod::Card,
        }
    }
}

/// A cash or card amount entered by the cashier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ManualEntry {
    pub id: String,
    pub method: ManualMethod,
    pub amount_cents: i64,
}

/// An incoming mobile payment attached to the checkout, copied from the
/// ledger at attach time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AppliedMobile {
    pub payment_id: String,
    pub provider: MobileProvider,
    pub sender_name: String,
    pub reference: String,
    pub amount_cents: i64,
}

impl From<&IncomingPayment> for AppliedMobile {
    fn from(payment: &IncomingPayment) -> Self {
        AppliedMobile {
            payment_id: payment.id.clone(),
            provider: payment.provider,
            sender_name: payment.sender_name.clone(),
            reference: payment.reference.clone(),
            amount_cents: payment.amount_cents,
        }
    }
}

/// The funds a cashier has put against one session during checkout.
///
/// Ephemeral: nothing in here touches the ledger until commit succeeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentComposition {
    pub mobile: Vec<AppliedMobile>,
    pub manual: Vec<ManualEntry>,
}

impl PaymentComposition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a mobile payment. Returns `false` if it is already attached.
    pub fn attach_mobile(&mut self, payment: &IncomingPayment) -> bool {
        if self.has_mobile(&payment.id) {
            return false;
        }
        self.mobile.push(AppliedMobile::from(payment));
        true
    }

    /// Detaches a mobile payment; the ledger entry was never touched, so it
    /// is simply pending again.
    pub fn detach_mobile(&mut self, payment_id: &str) -> Option<AppliedMobile> {
        let idx = self.mobile.iter().position(|m| m.payment_id == payment_id)?;
        Some(self.mobile.remove(idx))
    }

    pub fn has_mobile(&self, payment_id: &str) -> bool {
        self.mobile.iter().any(|m| m.payment_id == payment_id)
    }

    /// Adds a cash or card entry. Returns the entry id.
    pub fn add_manual(&mut self, method: ManualMethod, amount: Money) -> CoreResult<String> {
        validate_payment_amount(amount.cents()).map_err(|e| CoreError::InvalidPaymentAmount {
            reason: format!("{} entry of {}: {}", PaymentMethod::from(method), amount, e),
        })?;

        let entry = ManualEntry {
            id: Uuid::new_v4().to_string(),
            method,
            amount_cents: amount.cents(),
        };
        let id = entry.id.clone();
        self.manual.push(entry);
        Ok(id)
    }

    pub fn remove_manual(&mut self, entry_id: &str) -> Option<ManualEntry> {
        let idx = self.manual.iter().position(|e| e.id == entry_id)?;
        Some(self.manual.remove(idx))
    }

    pub fn mobile_total(&self) -> Money {
        self.mobile
            .iter()
            .fold(Money::zero(), |acc, m| acc.saturating_add(Money::from_cents(m.amount_cents)))
    }

    pub fn manual_total(&self) -> Money {
        self.manual
            .iter()
            .fold(Money::zero(), |acc, e| acc.saturating_add(Money::from_cents(e.amount_cents)))
    }

    /// Saturates at `i64::MAX` cents instead of overflowing.
    pub fn total_paid(&self) -> Money {
        self.mobile_total().saturating_add(self.manual_total())
    }

    pub fn is_empty(&self) -> bool {
        self.mobile.is_empty() && self.manual.is_empty()
    }

    /// Ids of every attached mobile payment, in attach order.
    pub fn mobile_ids(&self) -> impl Iterator<Item = &str> {
        self.mobile.iter().map(|m| m.payment_id.as_str())
    }
}

/// Coarse method tag for the persisted order.
///
/// ```text
/// any mobile payment          → mobile
/// else only card entries      → card
/// else (cash entries or none) → cash
/// ```
///
/// A zero-total order settled with no funds is tagged cash. The full
/// breakdown is persisted separately, so mixed tenders are not lost.
pub fn classify_method(composition: &PaymentComposition) -> PaymentMethod {
    let card_only = !composition.manual.is_empty()
        && composition.manual.iter().all(|e| e.method == ManualMethod::Card);

    if !composition.mobile.is_empty() {
        PaymentMethod::Mobile
    } else if card_only {
        PaymentMethod::Card
    } else {
        PaymentMethod::Cash
    }
}

// =============================================================================
// Policy & Summary
// =============================================================================

/// Fixed parameters for one register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationPolicy {
    pub tax_rate: TaxRate,
    /// Largest shortfall still treated as covered.
    pub tolerance: Money,
}

impl ReconciliationPolicy {
    pub fn new(tax_rate: TaxRate, tolerance: Money) -> Self {
        ReconciliationPolicy {
            tax_rate,
            tolerance: tolerance.non_negative(),
        }
    }
}

impl Default for ReconciliationPolicy {
    fn default() -> Self {
        ReconciliationPolicy {
            tax_rate: TaxRate::default(),
            tolerance: Money::from_cents(crate::DEFAULT_COVERAGE_TOLERANCE_CENTS),
        }
    }
}

/// Everything the checkout screen shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReconciliationSummary {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub total_paid: Money,
    /// `total − total_paid`; negative when overpaid.
    pub remaining: Money,
    pub change: Money,
    pub is_fully_covered: bool,
}

impl ReconciliationSummary {
    /// Amount still owed, never negative.
    pub fn still_owed(&self) -> Money {
        self.remaining.non_negative()
    }

    /// The rejection a commit gets while not covered.
    pub fn ensure_covered(&self) -> CoreResult<()> {
        if self.is_fully_covered {
            Ok(())
        } else {
            Err(CoreError::InsufficientPayment {
                remaining: self.still_owed(),
            })
        }
    }
}

/// Subtotal, tax and total for a set of lines.
pub fn order_totals(lines: &[CartLine], tax_rate: TaxRate) -> (Money, Money, Money) {
    let subtotal: Money = lines.iter().map(CartLine::line_total).sum();
    let tax = subtotal.calculate_tax(tax_rate);
    (subtotal, tax, subtotal + tax)
}

/// Reconciles a session's lines against the attached funds.
///
/// ```rust
/// use tally_core::reconcile::{compute, ManualMethod, PaymentComposition, ReconciliationPolicy};
/// use tally_core::Money;
///
/// let mut funds = PaymentComposition::new();
/// funds.add_manual(ManualMethod::Cash, Money::from_cents(500)).unwrap();
///
/// let summary = compute(&[], &funds, &ReconciliationPolicy::default());
/// assert!(summary.is_fully_covered);
/// assert_eq!(summary.change.cents(), 500);
/// ```
pub fn compute(
    lines: &[CartLine],
    composition: &PaymentComposition,
    policy: &ReconciliationPolicy,
) -> ReconciliationSummary {
    let (subtotal, tax, total) = order_totals(lines, policy.tax_rate);
    let total_paid = composition.total_paid();
    let remaining = total - total_paid;
    let is_fully_covered = remaining <= policy.tolerance;
    let change = if is_fully_covered {
        (total_paid - total).non_negative()
    } else {
        Money::zero()
    };

    ReconciliationSummary {
        subtotal,
        tax,
        total,
        total_paid,
        remaining,
        change,
        is_fully_covered,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
