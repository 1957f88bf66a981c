//! # Payment Feed
//!
//! Background task that moves incoming mobile-money notifications into the
//! payment ledger. Notifications arrive at any time, including mid-checkout;
//! they are only ever enqueued as pending, never applied to a session.
//!
//! ## Task Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         PaymentFeed::run                                │
//! │                                                                         │
//! │   PaymentFeedHandle::submit ──mpsc──┐                                   │
//! │                                      ▼                                  │
//! │   simulator tick (optional) ──► ledger.ingest() ──► watch observers     │
//! │                                                                         │
//! │   sweep tick ──► ledger.expire_stale(payment_expiry)                    │
//! │                                                                         │
//! │   shutdown / handle dropped ──► break                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use tally_core::validation::{validate_phone, validate_reference};
use tally_core::{MobileProvider, PaymentNotification};

use crate::config::RegisterConfig;
use crate::error::{ApiError, ApiResult};
use crate::state::PaymentLedgerState;

const CHANNEL_CAPACITY: usize = 64;
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Pending payments older than this are expired on each sweep
    pub payment_expiry: chrono::Duration,
    pub sweep_interval: Duration,
    /// `Some` to ingest simulated notifications at this interval
    pub simulate_interval: Option<Duration>,
}

impl FeedConfig {
    pub fn from_register(config: &RegisterConfig) -> Self {
        FeedConfig {
            payment_expiry: config.payment_expiry(),
            sweep_interval: SWEEP_INTERVAL,
            simulate_interval: config.simulate_interval(),
        }
    }
}

// =============================================================================
// Feed Task
// =============================================================================

pub struct PaymentFeed {
    ledger: PaymentLedgerState,
    config: FeedConfig,
    simulator: PaymentSimulator,
    rx: mpsc::Receiver<PaymentNotification>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for submitting notifications to, and stopping, a running feed.
#[derive(Debug, Clone)]
pub struct PaymentFeedHandle {
    tx: mpsc::Sender<PaymentNotification>,
    shutdown_tx: mpsc::Sender<()>,
}

impl PaymentFeedHandle {
    /// Queues a notification for ingestion. Malformed references and phone
    /// numbers are rejected here, before they reach the ledger.
    pub async fn submit(&self, notification: PaymentNotification) -> ApiResult<()> {
        validate_reference(&notification.reference)?;
        validate_phone(&notification.sender_phone)?;

        self.tx
            .send(notification)
            .await
            .map_err(|_| ApiError::internal("Payment feed is not running"))
    }

    pub async fn shutdown(&self) -> ApiResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| ApiError::internal("Payment feed already stopped"))
    }
}

impl PaymentFeed {
    pub fn new(ledger: PaymentLedgerState, config: FeedConfig) -> (Self, PaymentFeedHandle) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let feed = PaymentFeed {
            ledger,
            config,
            simulator: PaymentSimulator::new(),
            rx,
            shutdown_rx,
        };
        (feed, PaymentFeedHandle { tx, shutdown_tx })
    }

    /// Replaces the simulator (e.g. with a seeded one).
    pub fn with_simulator(mut self, simulator: PaymentSimulator) -> Self {
        self.simulator = simulator;
        self
    }

    /// Runs until [`PaymentFeedHandle::shutdown`] is called or every handle
    /// is dropped.
    pub async fn run(mut self) {
        info!(
            simulate = self.config.simulate_interval.is_some(),
            "Payment feed starting"
        );

        let mut sweep = interval(self.config.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let simulate_period = self.config.simulate_interval.unwrap_or(Duration::from_secs(3600));
        let mut simulate = interval_at(Instant::now() + simulate_period, simulate_period);
        simulate.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                Some(notification) = self.rx.recv() => {
                    self.ingest(notification);
                }

                _ = simulate.tick(), if self.config.simulate_interval.is_some() => {
                    let notification = self.simulator.next_notification();
                    debug!(reference = %notification.reference, "Simulated payment notification");
                    self.ingest(notification);
                }

                _ = sweep.tick() => {
                    self.ledger.expire_stale(self.config.payment_expiry);
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Payment feed shutting down");
                    break;
                }
            }
        }

        info!("Payment feed stopped");
    }

    fn ingest(&self, notification: PaymentNotification) {
        if let Err(e) = self.ledger.ingest(notification) {
            warn!(error = %e, "Dropped payment notification");
        }
    }
}

// =============================================================================
// Simulator
// =============================================================================

const DEMO_SENDERS: &[&str] = &[
    "Amina Njeri",
    "Baraka Ochieng",
    "Chebet Langat",
    "Daudi Mwangi",
    "Esther Akinyi",
    "Faraji Said",
];

const DEMO_AMOUNTS_CENTS: &[i64] = &[150, 250, 420, 500, 810, 975, 1000, 1250, 1500, 2000];

const PROVIDERS: &[MobileProvider] = &[MobileProvider::Mpesa, MobileProvider::Airtel, MobileProvider::Tigo];

const REFERENCE_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ0123456789";

/// Produces plausible demo notifications.
pub struct PaymentSimulator {
    rng: StdRng,
}

impl PaymentSimulator {
    pub fn new() -> Self {
        PaymentSimulator {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sequence for tests and demos.
    pub fn seeded(seed: u64) -> Self {
        PaymentSimulator {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_notification(&mut self) -> PaymentNotification {
        let provider = PROVIDERS
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(MobileProvider::Mpesa);
        let sender_name = DEMO_SENDERS.choose(&mut self.rng).copied().unwrap_or("Walk-in");
        let amount_cents = DEMO_AMOUNTS_CENTS.choose(&mut self.rng).copied().unwrap_or(500);
        let sender_phone = format!("+2547{:08}", self.rng.gen_range(0..100_000_000u32));

        let reference = (0..provider.reference_len())
            .map(|_| REFERENCE_CHARS[self.rng.gen_range(0..REFERENCE_CHARS.len())] as char)
            .collect();

        PaymentNotification {
            amount_cents,
            sender_name: sender_name.to_string(),
            sender_phone,
            provider,
            reference,
        }
    }
}

impl Default for PaymentSimulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LedgerSnapshot;
    use tokio::sync::watch;

    fn config(simulate: Option<Duration>) -> FeedConfig {
        FeedConfig {
            payment_expiry: chrono::Duration::minutes(30),
            sweep_interval: Duration::from_secs(60),
            simulate_interval: simulate,
        }
    }

    async fn wait_for(rx: &mut watch::Receiver<LedgerSnapshot>, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while rx.borrow_and_update().payments.len() < count {
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("ledger did not reach expected size");
    }

    fn notification(reference: &str) -> PaymentNotification {
        PaymentNotification {
            amount_cents: 1000,
            sender_name: "Amina Njeri".into(),
            sender_phone: "+254712345678".into(),
            provider: MobileProvider::Mpesa,
            reference: reference.into(),
        }
    }

    #[test]
    fn test_simulated_references_match_provider() {
        let mut sim = PaymentSimulator::seeded(7);
        for _ in 0..50 {
            let n = sim.next_notification();
            assert_eq!(n.reference.len(), n.provider.reference_len());
            assert!(validate_reference(&n.reference).is_ok());
            assert!(validate_phone(&n.sender_phone).is_ok());
            assert!(n.amount_cents > 0);
        }
    }

    #[tokio::test]
    async fn test_submitted_notification_lands_as_pending() {
        let ledger = PaymentLedgerState::new();
        let mut rx = ledger.subscribe();
        let (feed, handle) = PaymentFeed::new(ledger.clone(), config(None));
        let task = tokio::spawn(feed.run());

        handle.submit(notification("QJL2X3KK9A")).await.unwrap();
        wait_for(&mut rx, 1).await;

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.pending().count(), 1);
        assert!(snapshot.selected_id.is_none());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_rejects_malformed_reference() {
        let ledger = PaymentLedgerState::new();
        let (_feed, handle) = PaymentFeed::new(ledger, config(None));

        let err = handle.submit(notification("bad ref")).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_simulator_ingests_on_interval() {
        let ledger = PaymentLedgerState::new();
        let mut rx = ledger.subscribe();
        let (feed, handle) = PaymentFeed::new(ledger.clone(), config(Some(Duration::from_millis(10))));
        let task = tokio::spawn(feed.with_simulator(PaymentSimulator::seeded(1)).run());

        wait_for(&mut rx, 2).await;

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(ledger.snapshot().payments.len() >= 2);
    }

    #[tokio::test]
    async fn test_feed_stops_when_handle_dropped() {
        let ledger = PaymentLedgerState::new();
        let (feed, handle) = PaymentFeed::new(ledger, config(None));
        let task = tokio::spawn(feed.run());

        drop(handle);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("feed did not stop")
            .unwrap();
    }
}
