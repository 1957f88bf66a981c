//! # Checkout Service
//!
//! Turns a draft session plus the funds gathered for it into a committed
//! order, and keeps the session queue and payment ledger consistent with
//! what the store actually persisted.
//!
//! ## Confirm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  confirm(session)                                                       │
//! │                                                                         │
//! │  [locked]  already Confirming? ─────────────► CHECKOUT_IN_PROGRESS      │
//! │            attached payment not pending? ───► PAYMENT_UNAVAILABLE       │
//! │            empty / not covered? ────────────► EMPTY_SESSION /           │
//! │                                               INSUFFICIENT_PAYMENT      │
//! │            state = Confirming, NewOrder built                           │
//! │                                                                         │
//! │  [unlocked] store.commit(NewOrder).await                                │
//! │                                                                         │
//! │  [locked]  Ok(order_id)                     Err(cause)                  │
//! │              remove session from queue        state = Failed            │
//! │              mark each payment applied        nothing else touched      │
//! │              ──► Receipt { order_id, change } ──► COMMIT_FAILED         │
//! │                                                   (retryable)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! While a session is `Confirming`, its funds, its lines (when active) and
//! its removal are all refused with `CHECKOUT_IN_PROGRESS`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use tally_core::reconcile::compute;
use tally_core::{
    Checkout, CheckoutState, CoreError, CoreResult, ManualMethod, Money, PaymentComposition,
    ReconciliationPolicy, ReconciliationSummary, Session, SessionQueue,
};

use crate::error::{ApiError, ApiResult};
use crate::ports::{Catalog, OrderStore};
use crate::state::{PaymentLedgerState, SessionQueueState};

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub order_id: String,
    pub order_number: String,
    pub total: Money,
    /// Cash to hand back; zero unless the order was overpaid.
    pub change: Money,
}

#[derive(Clone)]
pub struct CheckoutService {
    sessions: SessionQueueState,
    ledger: PaymentLedgerState,
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn OrderStore>,
    policy: ReconciliationPolicy,
    cashier_id: String,
    checkouts: Arc<Mutex<HashMap<String, Checkout>>>,
}

impl CheckoutService {
    pub fn new(
        sessions: SessionQueueState,
        ledger: PaymentLedgerState,
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn OrderStore>,
        policy: ReconciliationPolicy,
        cashier_id: impl Into<String>,
    ) -> Self {
        CheckoutService {
            sessions,
            ledger,
            catalog,
            store,
            policy,
            cashier_id: cashier_id.into(),
            checkouts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn policy(&self) -> &ReconciliationPolicy {
        &self.policy
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Checkout>> {
        self.checkouts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session(&self, session_id: &str) -> ApiResult<Session> {
        self.sessions
            .with_queue(|q| q.session(session_id).cloned())
            .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()).into())
    }

    // =========================================================================
    // Session Editing
    // =========================================================================

    /// Adds one unit of a catalog product to the active session, capturing
    /// its current price.
    pub async fn add_item(&self, product_id: &str) -> ApiResult<()> {
        let product = self
            .catalog
            .product(product_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Product", product_id))?;

        if !product.can_sell() {
            return Err(CoreError::ProductUnavailable {
                product_id: product.id,
            }
            .into());
        }

        self.edit_active(|q| q.add_item(&product))?;
        debug!(product_id = %product.id, sku = %product.sku, "Item added");
        Ok(())
    }

    /// Sets a line quantity in the active session; `qty ≤ 0` removes it.
    pub fn update_quantity(&self, product_id: &str, qty: i64) -> ApiResult<()> {
        self.edit_active(|q| q.update_quantity(product_id, qty))
    }

    pub fn remove_item(&self, product_id: &str) -> ApiResult<()> {
        self.edit_active(|q| {
            q.remove_item(product_id);
            Ok(())
        })
    }

    pub fn clear_active_session(&self) -> ApiResult<()> {
        self.edit_active(|q| {
            q.clear_active_session();
            Ok(())
        })
    }

    /// Removes a session, dropping any open checkout for it. Unknown ids are
    /// a no-op.
    pub fn remove_session(&self, session_id: &str) -> ApiResult<Option<Session>> {
        let mut checkouts = self.lock();
        if checkouts.get(session_id).is_some_and(Checkout::is_confirming) {
            return Err(CoreError::CheckoutInProgress {
                session_id: session_id.to_string(),
            }
            .into());
        }
        if let Some(checkout) = checkouts.remove(session_id) {
            self.ledger.release(checkout.composition().mobile_ids());
        }

        let removed = self.sessions.with_queue_mut(|q| q.remove_session(session_id));
        if removed.is_some() {
            info!(session_id = %session_id, "Session removed");
        }
        Ok(removed)
    }

    /// Sets or clears a session's customer label. Unknown ids are a no-op.
    pub fn set_customer_label(&self, session_id: &str, label: Option<String>) -> ApiResult<()> {
        self.edit_session(session_id, |q| q.set_customer_label(session_id, label))
    }

    /// Sets or clears a session's note. Unknown ids are a no-op.
    pub fn set_note(&self, session_id: &str, note: Option<String>) -> ApiResult<()> {
        self.edit_session(session_id, |q| q.set_note(session_id, note))
    }

    fn edit_session(&self, session_id: &str, f: impl FnOnce(&mut SessionQueue)) -> ApiResult<()> {
        let checkouts = self.lock();
        if checkouts.get(session_id).is_some_and(Checkout::is_confirming) {
            return Err(CoreError::CheckoutInProgress {
                session_id: session_id.to_string(),
            }
            .into());
        }
        self.sessions.with_queue_mut(f);
        Ok(())
    }

    fn edit_active<R>(&self, f: impl FnOnce(&mut SessionQueue) -> CoreResult<R>) -> ApiResult<R> {
        let checkouts = self.lock();
        self.sessions
            .with_queue_mut(|q| {
                let active = q.active_session_id().to_string();
                if checkouts.get(&active).is_some_and(Checkout::is_confirming) {
                    return Err(CoreError::CheckoutInProgress { session_id: active });
                }
                f(q)
            })
            .map_err(ApiError::from)
    }

    // =========================================================================
    // Payment Composition
    // =========================================================================

    /// Opens checkout for a session, or returns the live summary of the one
    /// already open.
    pub fn open(&self, session_id: &str) -> ApiResult<ReconciliationSummary> {
        let mut checkouts = self.lock();
        let session = self.session(session_id)?;
        if session.is_empty() {
            return Err(CoreError::EmptySession {
                session_id: session_id.to_string(),
            }
            .into());
        }

        let checkout = checkouts.entry(session_id.to_string()).or_insert_with(|| {
            info!(session_id = %session_id, "Checkout opened");
            Checkout::new(session_id)
        });
        Ok(checkout.summary(&session, &self.policy))
    }

    /// Applies a pending mobile payment to the session's order.
    ///
    /// A payment can be attached to one checkout at a time; attaching it
    /// again to the same checkout is a no-op.
    pub fn apply_mobile(&self, session_id: &str, payment_id: &str) -> ApiResult<ReconciliationSummary> {
        let mut checkouts = self.lock();
        let session = self.session(session_id)?;

        if let Some((holder, _)) = checkouts
            .iter()
            .find(|(sid, c)| sid.as_str() != session_id && c.composition().has_mobile(payment_id))
        {
            return Err(CoreError::PaymentAlreadyClaimed {
                payment_id: payment_id.to_string(),
                session_id: holder.clone(),
            }
            .into());
        }

        let checkout = checkouts
            .get_mut(session_id)
            .ok_or_else(|| ApiError::not_found("Checkout", session_id))?;
        let composition = checkout.composition_mut()?;

        if !composition.has_mobile(payment_id) {
            let payment = self
                .ledger
                .hold(payment_id)
                .ok_or_else(|| CoreError::PaymentUnavailable {
                    payment_id: payment_id.to_string(),
                })?;
            composition.attach_mobile(&payment);
            info!(
                session_id = %session_id,
                payment_id = %payment_id,
                amount = %payment.amount(),
                "Mobile payment attached"
            );
        }

        Ok(checkout.summary(&session, &self.policy))
    }

    /// Returns an attached mobile payment to the pending pool.
    pub fn detach_mobile(&self, session_id: &str, payment_id: &str) -> ApiResult<ReconciliationSummary> {
        let mut checkouts = self.lock();
        let session = self.session(session_id)?;
        let checkout = checkouts
            .get_mut(session_id)
            .ok_or_else(|| ApiError::not_found("Checkout", session_id))?;

        if checkout.composition_mut()?.detach_mobile(payment_id).is_some() {
            self.ledger.release([payment_id]);
            debug!(session_id = %session_id, payment_id = %payment_id, "Mobile payment detached");
        }
        Ok(checkout.summary(&session, &self.policy))
    }

    /// Records cash or card tendered. Returns the entry id.
    pub fn add_manual(&self, session_id: &str, method: ManualMethod, amount: Money) -> ApiResult<String> {
        let mut checkouts = self.lock();
        let checkout = checkouts
            .get_mut(session_id)
            .ok_or_else(|| ApiError::not_found("Checkout", session_id))?;

        let entry_id = checkout.composition_mut()?.add_manual(method, amount)?;
        debug!(session_id = %session_id, ?method, %amount, "Manual payment entered");
        Ok(entry_id)
    }

    pub fn remove_manual(&self, session_id: &str, entry_id: &str) -> ApiResult<()> {
        let mut checkouts = self.lock();
        if let Some(checkout) = checkouts.get_mut(session_id) {
            checkout.composition_mut()?.remove_manual(entry_id);
        }
        Ok(())
    }

    /// Live reconciliation for a session, with or without an open checkout.
    pub fn summary(&self, session_id: &str) -> ApiResult<ReconciliationSummary> {
        let checkouts = self.lock();
        let session = self.session(session_id)?;
        Ok(match checkouts.get(session_id) {
            Some(checkout) => checkout.summary(&session, &self.policy),
            None => compute(&session.lines, &PaymentComposition::new(), &self.policy),
        })
    }

    pub fn state(&self, session_id: &str) -> Option<CheckoutState> {
        self.lock().get(session_id).map(|c| c.state().clone())
    }

    pub fn composition(&self, session_id: &str) -> Option<PaymentComposition> {
        self.lock().get(session_id).map(|c| c.composition().clone())
    }

    /// Closes checkout without confirming: attached payments go back to the
    /// pending pool and manual entries are dropped. The ledger and queue are
    /// not otherwise touched.
    pub fn cancel(&self, session_id: &str) -> ApiResult<()> {
        let mut checkouts = self.lock();
        if checkouts.get(session_id).is_some_and(Checkout::is_confirming) {
            return Err(CoreError::CheckoutInProgress {
                session_id: session_id.to_string(),
            }
            .into());
        }
        if let Some(checkout) = checkouts.remove(session_id) {
            self.ledger.release(checkout.composition().mobile_ids());
            info!(session_id = %session_id, "Checkout cancelled");
        }
        Ok(())
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Commits the session as an order.
    ///
    /// Either every attached payment is marked applied and the session is
    /// removed, or (on any failure) nothing changes but the checkout state.
    pub async fn confirm(&self, session_id: &str) -> ApiResult<Receipt> {
        let (new_order, summary, payment_ids) = {
            let mut checkouts = self.lock();
            let session = self.session(session_id)?;
            let checkout = checkouts
                .get_mut(session_id)
                .ok_or_else(|| ApiError::not_found("Checkout", session_id))?;

            if checkout.is_confirming() {
                warn!(session_id = %session_id, "Rejected duplicate confirm");
                return Err(CoreError::CheckoutInProgress {
                    session_id: session_id.to_string(),
                }
                .into());
            }

            if let Err(payment_id) = self.ledger.all_pending(checkout.composition().mobile_ids()) {
                warn!(session_id = %session_id, payment_id = %payment_id, "Attached payment no longer pending");
                return Err(CoreError::PaymentUnavailable { payment_id }.into());
            }

            let (new_order, summary) = checkout
                .begin_confirm(&session, &self.policy, &self.cashier_id)
                .map_err(|e| {
                    warn!(session_id = %session_id, error = %e, "Checkout rejected");
                    ApiError::from(e)
                })?;

            let payment_ids: Vec<String> = checkout.composition().mobile_ids().map(str::to_string).collect();
            (new_order, summary, payment_ids)
        };

        info!(
            session_id = %session_id,
            order_number = %new_order.order.order_number,
            total = %summary.total,
            payments = new_order.payments.len(),
            "Committing order"
        );

        match self.store.commit(&new_order).await {
            Ok(order_id) => {
                let mut checkouts = self.lock();
                self.sessions.with_queue_mut(|q| q.remove_session(session_id));
                let missed = self.ledger.apply_committed(&payment_ids, &order_id);
                if !missed.is_empty() {
                    error!(order_id = %order_id, ?missed, "Committed order references payments that were not pending");
                }

                if let Some(mut checkout) = checkouts.remove(session_id) {
                    checkout.mark_committed(&order_id, summary.change);
                    debug!(state = ?checkout.state(), "Checkout closed");
                }

                info!(order_id = %order_id, change = %summary.change, "Order committed");
                Ok(Receipt {
                    order_id,
                    order_number: new_order.order.order_number,
                    total: summary.total,
                    change: summary.change,
                })
            }
            Err(cause) => {
                let mut checkouts = self.lock();
                if let Some(checkout) = checkouts.get_mut(session_id) {
                    checkout.mark_failed(&cause.message);
                }
                error!(session_id = %session_id, error = %cause, "Order commit failed");
                Err(ApiError::commit_failed(&cause))
            }
        }
    }
}
