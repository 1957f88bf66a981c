//! # Session Queue
//!
//! Holds every open draft order ("session") on the register and the single
//! active-session pointer the cashier edits.
//!
//! ## Queue Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Session Queue Operations                             │
//! │                                                                         │
//! │  Cashier Action           Queue Method             Effect               │
//! │  ──────────────           ────────────             ──────               │
//! │                                                                         │
//! │  "New order" ────────────► create_session() ─────► push + activate     │
//! │                                                                         │
//! │  Click order tab ────────► activate_session() ───► move pointer        │
//! │                                                                         │
//! │  Close order tab ────────► remove_session() ─────► drop, fall back,    │
//! │                                                    replenish if empty   │
//! │                                                                         │
//! │  Click product ──────────► add_item() ───────────► qty+1 or new line   │
//! │                                                                         │
//! │  Change quantity ────────► update_quantity() ────► qty ≤ 0 removes     │
//! │                                                                         │
//! │  Clear ──────────────────► clear_active_session() ► lines.clear()      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - The queue never holds zero sessions.
//! - The active id always resolves to a session in the queue.
//! - No line has a quantity below 1, and product ids are unique per session.
//!
//! Every mutator runs [`SessionQueue::repair`] first, so a queue whose state
//! was corrupted is reset to one fresh session instead of failing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::Product;
use crate::validation::{validate_quantity, validate_session_size};
use crate::MAX_ITEM_QUANTITY;

// =============================================================================
// Cart Line
// =============================================================================

/// A product line in a session.
///
/// Name, SKU and unit price are captured from the catalog when the product is
/// first added; later catalog changes do not reach the line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    fn from_product(product: &Product) -> Self {
        CartLine {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            unit_price_cents: product.price_cents,
            quantity: 1,
            added_at: Utc::now(),
        }
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Unit price × quantity.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Session
// =============================================================================

/// A draft, unpaid order occupying one slot in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Session {
    pub id: String,
    pub order_number: String,
    pub lines: Vec<CartLine>,
    pub customer_label: Option<String>,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Creates an empty session with a fresh id and order number.
    pub fn new(customer_label: Option<String>) -> Self {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4().to_string(),
            order_number: generate_order_number(now),
            lines: Vec::new(),
            customer_label,
            note: None,
            created_at: now,
        }
    }

    /// Σ(unit price × quantity) over the current lines.
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn line(&self, product_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Order numbers look like `ORD-483920`.
fn generate_order_number(now: DateTime<Utc>) -> String {
    format!("ORD-{:06}", now.timestamp_millis().rem_euclid(1_000_000))
}

// =============================================================================
// Snapshot
// =============================================================================

/// Serializable form of the queue, as written to disk between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct QueueSnapshot {
    pub sessions: Vec<Session>,
    pub active_session_id: String,
}

/// What [`SessionQueue::from_snapshot`] had to fix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// The snapshot had no sessions; a fresh one was created.
    pub replenished: bool,
    /// The active id did not resolve and was re-pointed.
    pub reactivated: bool,
    /// Lines with quantity ≤ 0 that were dropped.
    pub dropped_lines: usize,
    /// Duplicate product lines folded into the first occurrence.
    pub merged_lines: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        *self == RepairReport::default()
    }
}

// =============================================================================
// Session Queue
// =============================================================================

/// The set of concurrently open draft orders plus the active pointer.
///
/// Fields are private: every change goes through the methods below, which
/// keep the queue non-empty and the active id valid.
#[derive(Debug, Clone)]
pub struct SessionQueue {
    sessions: Vec<Session>,
    active_session_id: String,
}

impl SessionQueue {
    /// Creates a queue holding one fresh, active, empty session.
    pub fn new() -> Self {
        let fresh = Session::new(None);
        SessionQueue {
            active_session_id: fresh.id.clone(),
            sessions: vec![fresh],
        }
    }

    /// Builds a guaranteed-valid queue from a deserialized snapshot.
    ///
    /// ## Repair Pass
    /// ```text
    /// snapshot ──► drop lines with qty ≤ 0
    ///          ──► merge duplicate product lines (quantities summed)
    ///          ──► no sessions?        → one fresh session, active
    ///          ──► active id stale?    → most recently added session
    ///          ──► SessionQueue (valid)
    /// ```
    pub fn from_snapshot(snapshot: QueueSnapshot) -> (Self, RepairReport) {
        let mut report = RepairReport::default();
        let QueueSnapshot {
            mut sessions,
            mut active_session_id,
        } = snapshot;

        for session in &mut sessions {
            let before = session.lines.len();
            session.lines.retain(|l| l.quantity > 0);
            report.dropped_lines += before - session.lines.len();

            let mut merged: Vec<CartLine> = Vec::with_capacity(session.lines.len());
            for line in session.lines.drain(..) {
                match merged.iter_mut().find(|m| m.product_id == line.product_id) {
                    Some(existing) => {
                        existing.quantity = (existing.quantity + line.quantity).min(MAX_ITEM_QUANTITY);
                        report.merged_lines += 1;
                    }
                    None => merged.push(line),
                }
            }
            session.lines = merged;
        }

        if sessions.is_empty() {
            let fresh = Session::new(None);
            active_session_id = fresh.id.clone();
            sessions.push(fresh);
            report.replenished = true;
        } else if !sessions.iter().any(|s| s.id == active_session_id) {
            if let Some(last) = sessions.last() {
                active_session_id = last.id.clone();
            }
            report.reactivated = true;
        }

        (
            SessionQueue {
                sessions,
                active_session_id,
            },
            report,
        )
    }

    /// Serializable copy of the queue.
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            sessions: self.sessions.clone(),
            active_session_id: self.active_session_id.clone(),
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn active_session_id(&self) -> &str {
        &self.active_session_id
    }

    /// The session the cashier is editing.
    pub fn active_session(&self) -> &Session {
        &self.sessions[self.active_index()]
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.session(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    // =========================================================================
    // Structural Repair
    // =========================================================================

    /// Resets the queue to one fresh session if the active id no longer
    /// resolves. Returns `true` when a reset happened.
    pub fn repair(&mut self) -> bool {
        if !self.sessions.is_empty() && self.contains(&self.active_session_id) {
            return false;
        }
        *self = SessionQueue::new();
        true
    }

    fn active_index(&self) -> usize {
        self.sessions
            .iter()
            .position(|s| s.id == self.active_session_id)
            .unwrap_or(self.sessions.len().saturating_sub(1))
    }

    fn active_mut(&mut self) -> &mut Session {
        let idx = self.active_index();
        &mut self.sessions[idx]
    }

    // =========================================================================
    // Session Mutators
    // =========================================================================

    /// Appends a new empty session and makes it active. Returns its id.
    pub fn create_session(&mut self, customer_label: Option<String>) -> String {
        self.repair();
        let session = Session::new(customer_label);
        let id = session.id.clone();
        self.sessions.push(session);
        self.active_session_id = id.clone();
        id
    }

    /// Switches the active pointer. Unknown ids are ignored.
    ///
    /// Returns `true` if `id` is now active.
    pub fn activate_session(&mut self, id: &str) -> bool {
        self.repair();
        if !self.contains(id) {
            return false;
        }
        self.active_session_id = id.to_string();
        true
    }

    /// Removes a session.
    ///
    /// If it was active, the most recently added remaining session becomes
    /// active; if none remain, a fresh empty session is created and
    /// activated. Unknown ids are ignored.
    pub fn remove_session(&mut self, id: &str) -> Option<Session> {
        self.repair();
        let idx = self.sessions.iter().position(|s| s.id == id)?;
        let removed = self.sessions.remove(idx);

        match self.sessions.last() {
            None => {
                let fresh = Session::new(None);
                self.active_session_id = fresh.id.clone();
                self.sessions.push(fresh);
            }
            Some(last) if self.active_session_id == removed.id => {
                self.active_session_id = last.id.clone();
            }
            Some(_) => {}
        }

        Some(removed)
    }

    /// Sets or clears the customer label of a session. Unknown ids are ignored.
    pub fn set_customer_label(&mut self, id: &str, label: Option<String>) {
        self.repair();
        if let Some(session) = self.sessions.iter_mut().find(|s| s.id == id) {
            session.customer_label = label;
        }
    }

    /// Sets or clears the note of a session. Unknown ids are ignored.
    pub fn set_note(&mut self, id: &str, note: Option<String>) {
        self.repair();
        if let Some(session) = self.sessions.iter_mut().find(|s| s.id == id) {
            session.note = note;
        }
    }

    // =========================================================================
    // Line Mutators (active session)
    // =========================================================================

    /// Adds one unit of `product` to the active session.
    ///
    /// Increments the matching line, or appends a new line with quantity 1
    /// and the product's current price captured.
    pub fn add_item(&mut self, product: &Product) -> CoreResult<()> {
        self.repair();
        let session = self.active_mut();

        if let Some(line) = session.lines.iter_mut().find(|l| l.product_id == product.id) {
            let new_qty = line.quantity + 1;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            line.quantity = new_qty;
            return Ok(());
        }

        validate_session_size(session.lines.len()).map_err(|_| CoreError::SessionTooLarge {
            max: crate::MAX_SESSION_LINES,
        })?;
        session.lines.push(CartLine::from_product(product));
        Ok(())
    }

    /// Removes a product line from the active session. Unknown products are
    /// ignored.
    pub fn remove_item(&mut self, product_id: &str) {
        self.repair();
        self.active_mut().lines.retain(|l| l.product_id != product_id);
    }

    /// Sets a line's quantity in the active session; `qty ≤ 0` removes it.
    pub fn update_quantity(&mut self, product_id: &str, qty: i64) -> CoreResult<()> {
        if qty <= 0 {
            self.remove_item(product_id);
            return Ok(());
        }
        validate_quantity(qty).map_err(|_| CoreError::QuantityTooLarge {
            requested: qty,
            max: MAX_ITEM_QUANTITY,
        })?;

        self.repair();
        if let Some(line) = self
            .active_mut()
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id)
        {
            line.quantity = qty;
        }
        Ok(())
    }

    /// Empties the active session's lines without removing the session.
    pub fn clear_active_session(&mut self) {
        self.repair();
        self.active_mut().lines.clear();
    }
}

impl Default for SessionQueue {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
