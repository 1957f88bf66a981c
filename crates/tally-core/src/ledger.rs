//! # Payment Ledger
//!
//! Local cache of incoming mobile-money notifications and their lifecycle.
//!
//! ## Payment Lifecycle
//! ```text
//!                 ingest()
//!                    │
//!                    ▼
//!             ┌─────────────┐   mark_applied(id, order)   ┌─────────────┐
//!             │   Pending   │ ──────────────────────────► │   Applied   │
//!             └──────┬──────┘                             │ (immutable) │
//!                    │ expire_stale(now, max_age)         └─────────────┘
//!                    ▼
//!             ┌─────────────┐
//!             │   Expired   │
//!             └─────────────┘
//!
//!   remove(id) deletes a payment in any state.
//! ```
//!
//! The feed is asynchronous and may deliver late or duplicate events, so
//! every operation on an unknown id is a no-op rather than an error.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::MobileProvider;
use crate::validation::validate_payment_amount;

// =============================================================================
// Incoming Payment
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Applied,
    Expired,
}

/// A record of money received externally, awaiting matching to an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct IncomingPayment {
    pub id: String,
    pub amount_cents: i64,
    pub sender_name: String,
    pub sender_phone: String,
    pub provider: MobileProvider,
    pub reference: String,
    #[ts(as = "String")]
    pub received_at: DateTime<Utc>,
    pub status: PaymentStatus,
    /// Set exactly once, when the payment is applied.
    pub applied_order_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub applied_at: Option<DateTime<Utc>>,
}

impl IncomingPayment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }
}

/// Fields carried by a notification from the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentNotification {
    pub amount_cents: i64,
    pub sender_name: String,
    pub sender_phone: String,
    pub provider: MobileProvider,
    pub reference: String,
}

// =============================================================================
// Ledger
// =============================================================================

/// Owns incoming payments and the single "selected" pointer.
///
/// Payments are kept newest first, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct PaymentLedger {
    payments: Vec<IncomingPayment>,
    selected_id: Option<String>,
}

impl PaymentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Mutators
    // =========================================================================

    /// Records a pending payment received now. Returns its id.
    pub fn ingest(&mut self, notification: PaymentNotification) -> CoreResult<String> {
        self.ingest_at(notification, Utc::now())
    }

    /// Records a pending payment with an explicit receipt time.
    ///
    /// A redelivered notification (same provider and reference as a payment
    /// already in the ledger) is not duplicated; the existing id is returned.
    pub fn ingest_at(
        &mut self,
        notification: PaymentNotification,
        received_at: DateTime<Utc>,
    ) -> CoreResult<String> {
        validate_payment_amount(notification.amount_cents).map_err(|e| {
            CoreError::InvalidPaymentAmount {
                reason: format!(
                    "incoming {} payment {}: {}",
                    notification.provider, notification.reference, e
                ),
            }
        })?;

        if let Some(existing) = self.payments.iter().find(|p| {
            p.provider == notification.provider && p.reference == notification.reference
        }) {
            return Ok(existing.id.clone());
        }

        let payment = IncomingPayment {
            id: Uuid::new_v4().to_string(),
            amount_cents: notification.amount_cents,
            sender_name: notification.sender_name,
            sender_phone: notification.sender_phone,
            provider: notification.provider,
            reference: notification.reference,
            received_at,
            status: PaymentStatus::Pending,
            applied_order_id: None,
            applied_at: None,
        };
        let id = payment.id.clone();
        self.payments.insert(0, payment);
        Ok(id)
    }

    /// Marks a single pending payment as the chosen candidate, or clears the
    /// selection with `None`. Unknown or non-pending ids are ignored.
    pub fn select(&mut self, id: Option<&str>) {
        match id {
            None => self.selected_id = None,
            Some(id) => {
                if self.get(id).is_some_and(IncomingPayment::is_pending) {
                    self.selected_id = Some(id.to_string());
                }
            }
        }
    }

    /// Transitions a pending payment to applied and records the order id.
    ///
    /// Returns `false` (and changes nothing) if the id is unknown or the
    /// payment is not pending.
    pub fn mark_applied(&mut self, id: &str, order_id: &str) -> bool {
        let Some(payment) = self.payments.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        if payment.status != PaymentStatus::Pending {
            return false;
        }

        payment.status = PaymentStatus::Applied;
        payment.applied_order_id = Some(order_id.to_string());
        payment.applied_at = Some(Utc::now());
        self.clear_selection_of(id);
        true
    }

    /// Deletes a payment in any status.
    pub fn remove(&mut self, id: &str) -> Option<IncomingPayment> {
        let idx = self.payments.iter().position(|p| p.id == id)?;
        self.clear_selection_of(id);
        Some(self.payments.remove(idx))
    }

    /// Moves pending payments received more than `max_age` before `now` to
    /// expired. Returns the ids that changed.
    pub fn expire_stale(&mut self, now: DateTime<Utc>, max_age: Duration) -> Vec<String> {
        self.expire_stale_except(now, max_age, &HashSet::new())
    }

    /// Like [`expire_stale`](Self::expire_stale), but leaves the `held` ids
    /// pending (payments attached to an open checkout).
    pub fn expire_stale_except(
        &mut self,
        now: DateTime<Utc>,
        max_age: Duration,
        held: &HashSet<String>,
    ) -> Vec<String> {
        let cutoff = now - max_age;
        let mut expired = Vec::new();

        for payment in self.payments.iter_mut() {
            if payment.status == PaymentStatus::Pending
                && payment.received_at < cutoff
                && !held.contains(&payment.id)
            {
                payment.status = PaymentStatus::Expired;
                expired.push(payment.id.clone());
            }
        }

        if let Some(selected) = self.selected_id.as_deref() {
            if expired.iter().any(|id| id == selected) {
                self.selected_id = None;
            }
        }
        expired
    }

    fn clear_selection_of(&mut self, id: &str) {
        if self.selected_id.as_deref() == Some(id) {
            self.selected_id = None;
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get(&self, id: &str) -> Option<&IncomingPayment> {
        self.payments.iter().find(|p| p.id == id)
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.get(id).is_some_and(IncomingPayment::is_pending)
    }

    /// Every payment, newest first.
    pub fn payments(&self) -> &[IncomingPayment] {
        &self.payments
    }

    /// Pending payments, most recently received first.
    pub fn pending(&self) -> Vec<&IncomingPayment> {
        let mut pending: Vec<_> = self.payments.iter().filter(|p| p.is_pending()).collect();
        pending.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        pending
    }

    pub fn selected(&self) -> Option<&IncomingPayment> {
        self.selected_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.payments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payments.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_ingest_adds_pending_newest_first() {
        let mut ledger = PaymentLedger::new();
        let t0 = Utc::now();
        let first = ledger.ingest_at(notification("QJL2X3KK9A", 1000), t0).unwrap();
        let second = ledger
            .ingest_at(notification("QJL2X3KK9B", 500), t0 + Duration::seconds(5))
            .unwrap();

        let pending: Vec<_> = ledger.pending().iter().map(|p| p.id.clone()).collect();
        assert_eq!(pending, vec![second, first]);
        assert!(ledger.payments().iter().all(|p| p.status == PaymentStatus::Pending));
    }

    #[test]
    fn test_ingest_rejects_non_positive_amount() {
        let mut ledger = PaymentLedger::new();
        let err = ledger.ingest(notification("QJL2X3KK9A", 0)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidPaymentAmount { .. }));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_ingest_rejects_oversized_amount() {
        let mut ledger = PaymentLedger::new();
        let err = ledger
            .ingest(notification("QJL2X3KK9A", crate::MAX_PAYMENT_CENTS + 1))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidPaymentAmount { .. }));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_redelivered_notification_is_not_duplicated() {
        let mut ledger = PaymentLedger::new();
        let a = ledger.ingest(notification("QJL2X3KK9A", 1000)).unwrap();
        let b = ledger.ingest(notification("QJL2X3KK9A", 1000)).unwrap();
        assert_eq!(a, b);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_select_does_not_change_status() {
        let mut ledger = PaymentLedger::new();
        let id = ledger.ingest(notification("QJL2X3KK9A", 1000)).unwrap();

        ledger.select(Some(&id));
        assert_eq!(ledger.selected().map(|p| p.id.as_str()), Some(id.as_str()));
        assert!(ledger.is_pending(&id));

        ledger.select(Some("missing"));
        assert_eq!(ledger.selected().map(|p| p.id.as_str()), Some(id.as_str()));

        ledger.select(None);
        assert!(ledger.selected().is_none());
    }

    #[test]
    fn test_mark_applied_once_and_clears_selection() {
        let mut ledger = PaymentLedger::new();
        let id = ledger.ingest(notification("QJL2X3KK9A", 1000)).unwrap();
        ledger.select(Some(&id));

        assert!(ledger.mark_applied(&id, "order-1"));
        let payment = ledger.get(&id).unwrap();
        assert_eq!(payment.status, PaymentStatus::Applied);
        assert_eq!(payment.applied_order_id.as_deref(), Some("order-1"));
        assert!(ledger.selected().is_none());

        // Applied payments are immutable.
        assert!(!ledger.mark_applied(&id, "order-2"));
        assert_eq!(ledger.get(&id).unwrap().applied_order_id.as_deref(), Some("order-1"));
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let mut ledger = PaymentLedger::new();
        ledger.ingest(notification("QJL2X3KK9A", 1000)).unwrap();

        assert!(!ledger.mark_applied("missing", "order-1"));
        assert!(ledger.remove("missing").is_none());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_remove_clears_matching_selection_only() {
        let mut ledger = PaymentLedger::new();
        let a = ledger.ingest(notification("QJL2X3KK9A", 1000)).unwrap();
        let b = ledger.ingest(notification("QJL2X3KK9B", 1000)).unwrap();
        ledger.select(Some(&a));

        ledger.remove(&b);
        assert_eq!(ledger.selected().map(|p| p.id.as_str()), Some(a.as_str()));

        ledger.remove(&a);
        assert!(ledger.selected().is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_expire_stale_skips_applied() {
        let mut ledger = PaymentLedger::new();
        let t0 = Utc::now() - Duration::hours(2);
        let old = ledger.ingest_at(notification("QJL2X3KK9A", 1000), t0).unwrap();
        let applied = ledger.ingest_at(notification("QJL2X3KK9B", 1000), t0).unwrap();
        let fresh = ledger.ingest(notification("QJL2X3KK9C", 1000)).unwrap();
        ledger.mark_applied(&applied, "order-1");
        ledger.select(Some(&old));

        let expired = ledger.expire_stale(Utc::now(), Duration::minutes(30));

        assert_eq!(expired, vec![old.clone()]);
        assert_eq!(ledger.get(&old).unwrap().status, PaymentStatus::Expired);
        assert_eq!(ledger.get(&applied).unwrap().status, PaymentStatus::Applied);
        assert!(ledger.is_pending(&fresh));
        assert!(ledger.selected().is_none());
        assert!(!ledger.mark_applied(&old, "order-2"));
    }

    #[test]
    fn test_expire_stale_leaves_held_payments_pending() {
        let mut ledger = PaymentLedger::new();
        let t0 = Utc::now() - Duration::hours(2);
        let held = ledger.ingest_at(notification("QJL2X3KK9A", 1000), t0).unwrap();
        let loose = ledger.ingest_at(notification("QJL2X3KK9B", 1000), t0).unwrap();

        let keep: HashSet<String> = [held.clone()].into_iter().collect();
        let expired = ledger.expire_stale_except(Utc::now(), Duration::minutes(30), &keep);

        assert_eq!(expired, vec![loose]);
        assert!(ledger.is_pending(&held));
    }
}
