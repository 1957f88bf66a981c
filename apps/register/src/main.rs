//! # Tally Register Entry Point
//!
//! Runs the register service headless: restores the session queue, starts
//! the payment feed, logs queue and ledger changes, and saves state on
//! ctrl-c.
//!
//! ## Startup Sequence
//! 1. Initialize tracing (logging)
//! 2. Load config (defaults → register.toml → TALLY_* env)
//! 3. Connect to database & run migrations, bind warehouse
//! 4. Restore the session queue snapshot (repairing it if needed)
//! 5. Spawn the payment feed
//! 6. Wait for ctrl-c, then stop the feed and save the queue
//!
//! ```bash
//! # Simulated mobile-money notifications every 5 seconds
//! TALLY_SIMULATE_FEED=1 TALLY_SIMULATE_INTERVAL_SECS=5 cargo run -p tally-register
//!
//! # Explicit config file
//! cargo run -p tally-register -- ./register.toml
//! ```

use std::path::PathBuf;

use tracing::{debug, info, warn};

use tally_register::{Register, RegisterConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tally_register::init_tracing();

    info!("Starting Tally POS register");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = RegisterConfig::load_or_default(config_path);
    info!(store = %config.store_name, cashier = %config.cashier_id, "Config loaded");

    let register = Register::open(config).await?;
    let (feed, feed_task) = register.spawn_feed();

    let mut ledger_rx = register.ledger().subscribe();
    let mut queue_rx = register.sessions().subscribe();
    let watcher = tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = ledger_rx.changed() => {
                    if changed.is_err() { break; }
                    let snapshot = ledger_rx.borrow_and_update().clone();
                    info!(pending = snapshot.pending().count(), total = snapshot.payments.len(), "Ledger updated");
                }
                changed = queue_rx.changed() => {
                    if changed.is_err() { break; }
                    let snapshot = queue_rx.borrow_and_update().clone();
                    debug!(sessions = snapshot.sessions.len(), active = %snapshot.active_session_id, "Queue updated");
                }
            }
        }
    });

    info!("Register ready, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    if let Err(e) = feed.shutdown().await {
        warn!(error = %e, "Payment feed did not acknowledge shutdown");
    }
    feed_task.await?;
    watcher.abort();

    register.close().await?;
    Ok(())
}
