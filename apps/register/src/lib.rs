//! # tally-register: Register Service Layer
//!
//! Assembles one register: the session queue, the payment ledger fed by the
//! incoming payment feed, and the checkout service committing orders to the
//! store.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Register                               │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      Cashier UI (not in this crate)              │  │
//! │  │   subscribe() to sessions + ledger, call checkout operations     │  │
//! │  └──────────────────────────────┬───────────────────────────────────┘  │
//! │                                 ▼                                       │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                    Register (this crate)                         │  │
//! │  │                                                                  │  │
//! │  │  config.rs ───► RegisterConfig (defaults → TOML → TALLY_*)       │  │
//! │  │  state/ ──────► SessionQueueState, PaymentLedgerState            │  │
//! │  │  feed.rs ─────► PaymentFeed task (ingest, expiry, simulator)     │  │
//! │  │  checkout.rs ─► CheckoutService (compose funds, confirm)         │  │
//! │  │  store.rs ────► SqliteStore: Catalog + OrderStore over tally-db  │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                 │                                       │
//! │                                 ▼                                       │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                         SQLite Database                          │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod checkout;
pub mod config;
pub mod error;
pub mod feed;
pub mod ports;
pub mod state;
pub mod store;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tally_db::{Database, DbConfig};

pub use checkout::{CheckoutService, Receipt};
pub use config::{ConfigError, RegisterConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use feed::{FeedConfig, PaymentFeed, PaymentFeedHandle, PaymentSimulator};
pub use ports::{Catalog, OrderStore};
pub use state::{LedgerSnapshot, PaymentLedgerState, SessionQueueState};
pub use store::SqliteStore;

/// A fully wired register.
pub struct Register {
    config: RegisterConfig,
    sessions: SessionQueueState,
    ledger: PaymentLedgerState,
    checkout: CheckoutService,
    database: Option<Database>,
}

impl Register {
    /// Opens the database, binds the warehouse and restores the session
    /// queue saved by the previous run.
    pub async fn open(config: RegisterConfig) -> ApiResult<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ApiError::internal(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let db = Database::new(DbConfig::new(&config.database_path)).await?;
        info!(path = %config.database_path.display(), "Database connected and migrations applied");

        let store = Arc::new(SqliteStore::open(db.clone(), config.warehouse_id.as_deref()).await?);
        let sessions = SessionQueueState::load(&config.session_snapshot_path);

        let mut register = Self::with_ports(config, sessions, store.clone(), store);
        register.database = Some(db);
        Ok(register)
    }

    /// Wires a register around arbitrary ports.
    pub fn with_ports(
        config: RegisterConfig,
        sessions: SessionQueueState,
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn OrderStore>,
    ) -> Self {
        let ledger = PaymentLedgerState::new();
        let checkout = CheckoutService::new(
            sessions.clone(),
            ledger.clone(),
            catalog,
            store,
            config.policy(),
            config.cashier_id.clone(),
        );

        Register {
            config,
            sessions,
            ledger,
            checkout,
            database: None,
        }
    }

    pub fn config(&self) -> &RegisterConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionQueueState {
        &self.sessions
    }

    pub fn ledger(&self) -> &PaymentLedgerState {
        &self.ledger
    }

    pub fn checkout(&self) -> &CheckoutService {
        &self.checkout
    }

    /// Starts the payment feed task.
    pub fn spawn_feed(&self) -> (PaymentFeedHandle, JoinHandle<()>) {
        let (feed, handle) = PaymentFeed::new(self.ledger.clone(), FeedConfig::from_register(&self.config));
        (handle, tokio::spawn(feed.run()))
    }

    pub fn save_sessions(&self) -> ApiResult<()> {
        self.sessions.save(&self.config.session_snapshot_path)
    }

    /// Saves the session queue and closes the database.
    pub async fn close(self) -> ApiResult<()> {
        self.save_sessions()?;
        if let Some(db) = self.database {
            db.close().await;
        }
        info!("Register closed");
        Ok(())
    }
}

/// Initializes `tracing` with `RUST_LOG`, defaulting to
/// `info,tally=debug,sqlx=warn`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tally=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();
}
