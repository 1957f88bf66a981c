//! # Payment Ledger State
//!
//! Incoming mobile-money payments, shared between the feed task (writer)
//! and checkout (reader, and writer on commit).
//!
//! Besides the ledger itself this tracks which pending payments are *held*:
//! attached to some open checkout. Held payments are skipped by the expiry
//! sweep so a payment cannot expire out from under an order being confirmed.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use tally_core::{IncomingPayment, PaymentLedger, PaymentNotification};

use crate::error::ApiResult;

/// What observers of the ledger see.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    /// Every payment, newest first.
    pub payments: Vec<IncomingPayment>,
    pub selected_id: Option<String>,
}

impl LedgerSnapshot {
    fn of(ledger: &PaymentLedger) -> Self {
        LedgerSnapshot {
            payments: ledger.payments().to_vec(),
            selected_id: ledger.selected().map(|p| p.id.clone()),
        }
    }

    pub fn pending(&self) -> impl Iterator<Item = &IncomingPayment> {
        self.payments.iter().filter(|p| p.is_pending())
    }
}

#[derive(Debug, Default)]
struct Inner {
    ledger: PaymentLedger,
    held: HashSet<String>,
}

/// Shared payment ledger with change notification.
#[derive(Debug, Clone)]
pub struct PaymentLedgerState {
    inner: Arc<Mutex<Inner>>,
    changes: Arc<watch::Sender<LedgerSnapshot>>,
}

impl PaymentLedgerState {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(LedgerSnapshot::default());
        PaymentLedgerState {
            inner: Arc::new(Mutex::new(Inner::default())),
            changes: Arc::new(changes),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Access
    // =========================================================================

    pub fn with_ledger<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&PaymentLedger) -> R,
    {
        f(&self.lock().ledger)
    }

    /// Write access to the ledger. Observers are notified afterwards.
    ///
    /// Bypasses payment holds, so it stays inside the crate.
    pub(crate) fn with_ledger_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut PaymentLedger) -> R,
    {
        let mut inner = self.lock();
        let result = f(&mut inner.ledger);
        self.changes.send_replace(LedgerSnapshot::of(&inner.ledger));
        result
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.with_ledger(LedgerSnapshot::of)
    }

    pub fn subscribe(&self) -> watch::Receiver<LedgerSnapshot> {
        self.changes.subscribe()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Records an incoming payment as pending. Never applies it to a session.
    pub fn ingest(&self, notification: PaymentNotification) -> ApiResult<String> {
        self.ingest_at(notification, Utc::now())
    }

    /// Like [`ingest`](Self::ingest) with an explicit receive time, for
    /// notifications replayed from a provider backlog.
    pub fn ingest_at(&self, notification: PaymentNotification, received_at: DateTime<Utc>) -> ApiResult<String> {
        let provider = notification.provider;
        let amount = notification.amount_cents;
        let id = self.with_ledger_mut(|l| l.ingest_at(notification, received_at))?;
        info!(payment_id = %id, %provider, amount_cents = amount, "Payment ingested");
        Ok(id)
    }

    /// Selects a pending payment as the cashier's candidate, or clears it.
    pub fn select(&self, id: Option<&str>) {
        self.with_ledger_mut(|l| l.select(id));
    }

    /// Deletes a payment (e.g. a mistaken notification).
    pub fn remove(&self, id: &str) -> Option<IncomingPayment> {
        let mut inner = self.lock();
        if inner.held.contains(id) {
            warn!(payment_id = %id, "Refusing to remove a payment attached to a checkout");
            return None;
        }
        let removed = inner.ledger.remove(id);
        self.changes.send_replace(LedgerSnapshot::of(&inner.ledger));
        removed
    }

    /// Expires pending payments older than `max_age`, except held ones.
    pub fn expire_stale(&self, max_age: Duration) -> Vec<String> {
        let mut inner = self.lock();
        let Inner { ledger, held } = &mut *inner;
        let expired = ledger.expire_stale_except(Utc::now(), max_age, held);
        if !expired.is_empty() {
            info!(count = expired.len(), "Expired stale payments");
            self.changes.send_replace(LedgerSnapshot::of(ledger));
        }
        expired
    }

    // =========================================================================
    // Checkout Support
    // =========================================================================

    /// Holds a pending payment for a checkout. Returns the payment, or `None`
    /// if it is unknown or no longer pending.
    pub(crate) fn hold(&self, id: &str) -> Option<IncomingPayment> {
        let mut inner = self.lock();
        let payment = inner.ledger.get(id).filter(|p| p.is_pending()).cloned()?;
        inner.held.insert(id.to_string());
        debug!(payment_id = %id, "Payment held");
        Some(payment)
    }

    pub(crate) fn release<'a>(&self, ids: impl IntoIterator<Item = &'a str>) {
        let mut inner = self.lock();
        for id in ids {
            inner.held.remove(id);
        }
    }

    pub(crate) fn all_pending<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Result<(), String> {
        let inner = self.lock();
        ids.into_iter()
            .find(|id| !inner.ledger.is_pending(id))
            .map_or(Ok(()), |id| Err(id.to_string()))
    }

    /// Marks every id applied to `order_id` and releases the holds, under
    /// one lock. Returns the ids that could not be marked.
    pub(crate) fn apply_committed(&self, ids: &[String], order_id: &str) -> Vec<String> {
        let mut inner = self.lock();
        let mut missed = Vec::new();
        for id in ids {
            inner.held.remove(id);
            if inner.ledger.mark_applied(id, order_id) {
                info!(payment_id = %id, order_id = %order_id, "Payment applied");
            } else {
                missed.push(id.clone());
            }
        }
        self.changes.send_replace(LedgerSnapshot::of(&inner.ledger));
        missed
    }

    #[cfg(test)]
    pub(crate) fn is_held(&self, id: &str) -> bool {
        self.lock().held.contains(id)
    }
}

impl Default for PaymentLedgerState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{MobileProvider, PaymentStatus};

    fn notification(reference: &str, amount_cents: i64) -> PaymentNotification {
        PaymentNotification {
            amount_cents,
            sender_name: "Amina Njeri".into(),
            sender_phone: "+254712345678".into(),
            provider: MobileProvider::Mpesa,
            reference: reference.into(),
        }
    }

    #[test]
    fn test_ingest_notifies_observers() {
        let state = PaymentLedgerState::new();
        let rx = state.subscribe();

        let id = state.ingest(notification("QJL2X3KK9A", 1000)).unwrap();

        let snapshot = rx.borrow();
        assert_eq!(snapshot.payments.len(), 1);
        assert_eq!(snapshot.payments[0].id, id);
        assert_eq!(snapshot.pending().count(), 1);
    }

    #[test]
    fn test_ingest_rejects_non_positive_amount() {
        let state = PaymentLedgerState::new();
        let err = state.ingest(notification("QJL2X3KK9A", 0)).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ValidationError);
        assert!(state.snapshot().payments.is_empty());
    }

    #[test]
    fn test_held_payment_survives_expiry_and_removal() {
        let state = PaymentLedgerState::new();
        let old = Utc::now() - Duration::hours(1);
        let held = state.ingest_at(notification("QJL2X3KK9A", 1000), old).unwrap();
        let loose = state.ingest_at(notification("QJL2X3KK9B", 1000), old).unwrap();

        assert!(state.hold(&held).is_some());
        assert!(state.remove(&held).is_none());

        let expired = state.expire_stale(Duration::minutes(30));
        assert_eq!(expired, vec![loose.clone()]);
        assert!(state.with_ledger(|l| l.is_pending(&held)));
        assert!(state.hold(&loose).is_none());
    }

    #[test]
    fn test_apply_committed_releases_and_marks() {
        let state = PaymentLedgerState::new();
        let id = state.ingest(notification("QJL2X3KK9A", 1000)).unwrap();
        state.hold(&id).unwrap();

        let missed = state.apply_committed(&[id.clone(), "missing".into()], "order-1");

        assert_eq!(missed, vec!["missing".to_string()]);
        assert!(!state.is_held(&id));
        let payment = state.with_ledger(|l| l.get(&id).cloned()).unwrap();
        assert_eq!(payment.status, PaymentStatus::Applied);
        assert_eq!(payment.applied_order_id.as_deref(), Some("order-1"));
    }
}
