//! # State Module
//!
//! Shared, owned state for the register. Each state type wraps its core
//! model in `Arc<Mutex<T>>`, mutates it only through the model's own API,
//! and publishes a fresh snapshot to observers after every mutation.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    State Architecture                                   │
//! │                                                                         │
//! │  ┌──────────────────────────┐      ┌──────────────────────────┐        │
//! │  │   SessionQueueState      │      │   PaymentLedgerState     │        │
//! │  │                          │      │                          │        │
//! │  │  Arc<Mutex<SessionQueue>>│      │  Arc<Mutex<PaymentLedger │        │
//! │  │  watch<QueueSnapshot>    │      │    + held ids>>          │        │
//! │  │                          │      │  watch<LedgerSnapshot>   │        │
//! │  └────────────┬─────────────┘      └────────────┬─────────────┘        │
//! │               │                                 │                       │
//! │               │      ┌──────────────────┐       │◄── PaymentFeed        │
//! │               └─────►│ CheckoutService  │◄──────┘    (ingest, expiry)   │
//! │                      └──────────────────┘                               │
//! │                                                                         │
//! │  subscribe() ──► tokio::sync::watch::Receiver (latest snapshot only)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lock order, where more than one is taken: checkouts, then sessions, then
//! ledger.

mod ledger;
mod sessions;

pub use ledger::{LedgerSnapshot, PaymentLedgerState};
pub use sessions::SessionQueueState;
