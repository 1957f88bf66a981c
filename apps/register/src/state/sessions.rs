//! # Session Queue State
//!
//! The open draft orders, shared between the cashier UI and checkout.
//!
//! ## Persistence
//! ```text
//! startup ──► load(path) ──► QueueSnapshot (JSON) ──► from_snapshot + repair
//!                 │                                        │
//!                 │ missing/corrupt file                   ▼
//!                 └────────► fresh queue            SessionQueueState
//!
//! shutdown ─► save(path) ──► QueueSnapshot (JSON, pretty)
//! ```

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use tally_core::{QueueSnapshot, SessionQueue};

use crate::error::{ApiError, ApiResult};

/// Shared session queue with change notification.
#[derive(Debug, Clone)]
pub struct SessionQueueState {
    queue: Arc<Mutex<SessionQueue>>,
    changes: Arc<watch::Sender<QueueSnapshot>>,
}

impl SessionQueueState {
    pub fn new() -> Self {
        Self::from_queue(SessionQueue::new())
    }

    fn from_queue(queue: SessionQueue) -> Self {
        let (changes, _) = watch::channel(queue.snapshot());
        SessionQueueState {
            queue: Arc::new(Mutex::new(queue)),
            changes: Arc::new(changes),
        }
    }

    /// Builds state from a snapshot, running the repair pass once.
    pub fn from_snapshot(snapshot: QueueSnapshot) -> Self {
        let (queue, report) = SessionQueue::from_snapshot(snapshot);
        if !report.is_clean() {
            warn!(
                replenished = report.replenished,
                reactivated = report.reactivated,
                dropped_lines = report.dropped_lines,
                merged_lines = report.merged_lines,
                "Repaired session snapshot"
            );
        }
        Self::from_queue(queue)
    }

    /// Loads the queue saved at `path`. A missing, unreadable or corrupt
    /// file yields a fresh queue.
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(?path, "No session snapshot, starting fresh");
                return Self::new();
            }
            Err(e) => {
                warn!(?path, error = %e, "Could not read session snapshot, starting fresh");
                return Self::new();
            }
        };

        match serde_json::from_str::<QueueSnapshot>(&contents) {
            Ok(snapshot) => {
                info!(?path, sessions = snapshot.sessions.len(), "Session snapshot loaded");
                Self::from_snapshot(snapshot)
            }
            Err(e) => {
                warn!(?path, error = %e, "Corrupt session snapshot, starting fresh");
                Self::new()
            }
        }
    }

    /// Writes the current queue to `path` as JSON.
    pub fn save(&self, path: &Path) -> ApiResult<()> {
        let snapshot = self.snapshot();
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| ApiError::internal(format!("Failed to encode sessions: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ApiError::internal(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
        std::fs::write(path, json)
            .map_err(|e| ApiError::internal(format!("Failed to write {}: {}", path.display(), e)))?;

        debug!(?path, sessions = snapshot.sessions.len(), "Session snapshot saved");
        Ok(())
    }

    // =========================================================================
    // Access
    // =========================================================================

    /// Read access to the queue.
    pub fn with_queue<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SessionQueue) -> R,
    {
        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        f(&queue)
    }

    /// Write access to the queue. Observers are notified afterwards.
    ///
    /// Skips the in-flight checkout guard, so edits from outside the crate
    /// go through `CheckoutService`.
    pub(crate) fn with_queue_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut SessionQueue) -> R,
    {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let result = f(&mut queue);
        self.changes.send_replace(queue.snapshot());
        result
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.with_queue(SessionQueue::snapshot)
    }

    /// Receiver that always holds the latest queue snapshot.
    pub fn subscribe(&self) -> watch::Receiver<QueueSnapshot> {
        self.changes.subscribe()
    }

    // =========================================================================
    // Session Lifecycle
    // =========================================================================

    pub fn create_session(&self, customer_label: Option<String>) -> String {
        let id = self.with_queue_mut(|q| q.create_session(customer_label));
        info!(session_id = %id, "Session created");
        id
    }

    pub fn activate_session(&self, id: &str) -> bool {
        let activated = self.with_queue_mut(|q| q.activate_session(id));
        debug!(session_id = %id, activated, "Activate session");
        activated
    }
}

impl Default for SessionQueueState {
    fn default() -> Self {
        Self::new()
    }
}
