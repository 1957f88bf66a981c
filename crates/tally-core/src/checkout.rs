//! # Checkout State Machine
//!
//! Per-session checkout: the funds the cashier attaches, the state of the
//! commit attempt, and the immutable order snapshot handed to the store.
//!
//! ## States
//! ```text
//!                      begin_confirm()
//!   ┌──────┐  covered, ≥1 line   ┌────────────┐  store ok   ┌───────────┐
//!   │ Idle │ ──────────────────► │ Confirming │ ──────────► │ Committed │
//!   └──────┘                     └─────┬──────┘             └───────────┘
//!      ▲                               │ store error
//!      │                               ▼
//!      │                         ┌────────────┐
//!      └──── retry allowed ───── │   Failed   │
//!                                └────────────┘
//! ```
//!
//! While `Confirming`, the composition is frozen and a second
//! `begin_confirm` is rejected with [`CoreError::CheckoutInProgress`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::reconcile::{classify_method, compute, PaymentComposition, ReconciliationPolicy, ReconciliationSummary};
use crate::session::Session;
use crate::types::{Order, OrderItem, OrderPayment, OrderStatus, PaymentMethod};
use crate::DEFAULT_TENANT_ID;

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "state", rename_all = "snake_case")]
#[ts(export)]
pub enum CheckoutState {
    Idle,
    Confirming,
    Committed { order_id: String, change: Money },
    Failed { reason: String },
}

// =============================================================================
// Order Snapshot
// =============================================================================

/// Everything the store persists for one commit, built from a session and
/// its composition. Values are copied, so later catalog or queue changes do
/// not reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<OrderPayment>,
}

impl NewOrder {
    /// Builds the snapshot, refusing empty or uncovered sessions.
    pub fn build(
        session: &Session,
        composition: &PaymentComposition,
        policy: &ReconciliationPolicy,
        cashier_id: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<(NewOrder, ReconciliationSummary)> {
        if session.is_empty() {
            return Err(CoreError::EmptySession {
                session_id: session.id.clone(),
            });
        }

        let summary = compute(&session.lines, composition, policy);
        summary.ensure_covered()?;

        let order_id = Uuid::new_v4().to_string();

        let items = session
            .lines
            .iter()
            .map(|line| OrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: order_id.clone(),
                product_id: line.product_id.clone(),
                sku_snapshot: line.sku.clone(),
                name_snapshot: line.name.clone(),
                unit_price_cents: line.unit_price_cents,
                quantity: line.quantity,
                line_total_cents: line.line_total().cents(),
                created_at: now,
            })
            .collect();

        let mobile = composition.mobile.iter().map(|m| OrderPayment {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.clone(),
            method: PaymentMethod::Mobile,
            provider: Some(m.provider),
            amount_cents: m.amount_cents,
            incoming_payment_id: Some(m.payment_id.clone()),
            reference: Some(m.reference.clone()),
            created_at: now,
        });
        let manual = composition.manual.iter().map(|e| OrderPayment {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.clone(),
            method: e.method.into(),
            provider: None,
            amount_cents: e.amount_cents,
            incoming_payment_id: None,
            reference: None,
            created_at: now,
        });
        let payments = mobile.chain(manual).collect();

        let order = Order {
            id: order_id,
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            order_number: session.order_number.clone(),
            status: OrderStatus::Completed,
            subtotal_cents: summary.subtotal.cents(),
            tax_cents: summary.tax.cents(),
            total_cents: summary.total.cents(),
            paid_cents: summary.total_paid.cents(),
            change_cents: summary.change.cents(),
            payment_method: classify_method(composition),
            cashier_id: cashier_id.to_string(),
            customer_label: session.customer_label.clone(),
            note: session.note.clone(),
            created_at: session.created_at,
            completed_at: now,
        };

        Ok((
            NewOrder {
                order,
                items,
                payments,
            },
            summary,
        ))
    }

    pub fn order_id(&self) -> &str {
        &self.order.id
    }
}

// =============================================================================
// Checkout
// =============================================================================

/// Checkout for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkout {
    session_id: String,
    composition: PaymentComposition,
    state: CheckoutState,
}

impl Checkout {
    pub fn new(session_id: impl Into<String>) -> Self {
        Checkout {
            session_id: session_id.into(),
            composition: PaymentComposition::new(),
            state: CheckoutState::Idle,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> &CheckoutState {
        &self.state
    }

    pub fn is_confirming(&self) -> bool {
        self.state == CheckoutState::Confirming
    }

    pub fn composition(&self) -> &PaymentComposition {
        &self.composition
    }

    /// Mutable access to the funds; refused while a commit is in flight.
    pub fn composition_mut(&mut self) -> CoreResult<&mut PaymentComposition> {
        if self.is_confirming() {
            return Err(CoreError::CheckoutInProgress {
                session_id: self.session_id.clone(),
            });
        }
        Ok(&mut self.composition)
    }

    /// Live summary against the session's current lines.
    pub fn summary(&self, session: &Session, policy: &ReconciliationPolicy) -> ReconciliationSummary {
        compute(&session.lines, &self.composition, policy)
    }

    /// Enters `Confirming` and returns the snapshot to persist.
    ///
    /// On a guard failure the state is left unchanged.
    pub fn begin_confirm(
        &mut self,
        session: &Session,
        policy: &ReconciliationPolicy,
        cashier_id: &str,
    ) -> CoreResult<(NewOrder, ReconciliationSummary)> {
        match self.state {
            CheckoutState::Confirming => {
                return Err(CoreError::CheckoutInProgress {
                    session_id: self.session_id.clone(),
                })
            }
            CheckoutState::Committed { .. } => {
                return Err(CoreError::SessionNotFound(self.session_id.clone()))
            }
            CheckoutState::Idle | CheckoutState::Failed { .. } => {}
        }

        let built = NewOrder::build(session, &self.composition, policy, cashier_id, Utc::now())?;
        self.state = CheckoutState::Confirming;
        Ok(built)
    }

    pub fn mark_committed(&mut self, order_id: impl Into<String>, change: Money) {
        self.state = CheckoutState::Committed {
            order_id: order_id.into(),
            change,
        };
    }

    /// Back to a retryable state; the composition is kept as entered.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.state = CheckoutState::Failed {
            reason: reason.into(),
        };
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
