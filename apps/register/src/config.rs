//! # Register Configuration
//!
//! Settings for one register: who is ringing up, how money is reconciled,
//! where state lives and how the payment feed behaves.
//!
//! ## Load Order
//! ```text
//! RegisterConfig::default()
//!        │
//!        ▼
//! register.toml  (platform config dir, or an explicit path)
//!        │
//!        ▼
//! TALLY_* environment variables
//!        │
//!        ▼
//! validate()
//! ```
//!
//! ## Example `register.toml`
//! ```toml
//! store_name = "Corner Shop"
//! cashier_id = "cashier-07"
//! tax_rate_bps = 800
//! coverage_tolerance_cents = 1
//! payment_expiry_secs = 1800
//! simulate_feed = true
//! simulate_interval_secs = 20
//! ```

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use tally_core::validation::validate_tax_rate_bps;
use tally_core::{
    Money, ReconciliationPolicy, TaxRate, DEFAULT_COVERAGE_TOLERANCE_CENTS, DEFAULT_TAX_RATE_BPS,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Register Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterConfig {
    /// Display name printed on receipts
    pub store_name: String,

    /// Cashier recorded on every committed order
    pub cashier_id: String,

    /// Fixed tax rate in basis points (800 = 8%)
    pub tax_rate_bps: u32,

    /// ε: an order counts as covered once at most this much is still owed
    pub coverage_tolerance_cents: i64,

    /// Warehouse stock is drawn from; `None` means the primary warehouse
    pub warehouse_id: Option<String>,

    pub database_path: PathBuf,

    /// Where the open session queue is saved between runs
    pub session_snapshot_path: PathBuf,

    /// Pending payments older than this are expired
    pub payment_expiry_secs: u64,

    /// Ingest demo mobile-money notifications
    pub simulate_feed: bool,

    pub simulate_interval_secs: u64,
}

impl Default for RegisterConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        RegisterConfig {
            store_name: "Tally Store".to_string(),
            cashier_id: "cashier-01".to_string(),
            tax_rate_bps: DEFAULT_TAX_RATE_BPS,
            coverage_tolerance_cents: DEFAULT_COVERAGE_TOLERANCE_CENTS,
            warehouse_id: None,
            database_path: data_dir.join("tally.db"),
            session_snapshot_path: data_dir.join("sessions.json"),
            payment_expiry_secs: 1800,
            simulate_feed: false,
            simulate_interval_secs: 20,
        }
    }
}

impl RegisterConfig {
    // =========================================================================
    // Loading
    // =========================================================================

    /// Loads config: defaults, then the TOML file (if present), then
    /// `TALLY_*` environment overrides, then validation.
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading register config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns the defaults if loading fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load register config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::Invalid("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Register config saved");
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.cashier_id.trim().is_empty() {
            return Err(ConfigError::Invalid("cashier_id must not be empty".into()));
        }

        validate_tax_rate_bps(self.tax_rate_bps)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.coverage_tolerance_cents < 0 {
            return Err(ConfigError::Invalid(
                "coverage_tolerance_cents must not be negative".into(),
            ));
        }

        if self.simulate_feed && self.simulate_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "simulate_interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `TALLY_*` overrides from `lookup`. Unparseable numbers are
    /// ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(name) = lookup("TALLY_STORE_NAME") {
            self.store_name = name;
        }

        if let Some(id) = lookup("TALLY_CASHIER_ID") {
            debug!(cashier_id = %id, "Overriding cashier from environment");
            self.cashier_id = id;
        }

        if let Some(bps) = lookup("TALLY_TAX_RATE_BPS").and_then(|v| v.parse().ok()) {
            self.tax_rate_bps = bps;
        }

        if let Some(cents) = lookup("TALLY_COVERAGE_TOLERANCE_CENTS").and_then(|v| v.parse().ok()) {
            self.coverage_tolerance_cents = cents;
        }

        if let Some(id) = lookup("TALLY_WAREHOUSE_ID") {
            self.warehouse_id = Some(id);
        }

        if let Some(path) = lookup("TALLY_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database_path = PathBuf::from(path);
        }

        if let Some(path) = lookup("TALLY_SESSIONS_PATH") {
            self.session_snapshot_path = PathBuf::from(path);
        }

        if let Some(secs) = lookup("TALLY_PAYMENT_EXPIRY_SECS").and_then(|v| v.parse().ok()) {
            self.payment_expiry_secs = secs;
        }

        if let Some(flag) = lookup("TALLY_SIMULATE_FEED") {
            self.simulate_feed = matches!(flag.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }

        if let Some(secs) = lookup("TALLY_SIMULATE_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.simulate_interval_secs = secs;
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "tally", "pos").map(|dirs| dirs.config_dir().join("register.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn policy(&self) -> ReconciliationPolicy {
        ReconciliationPolicy::new(
            TaxRate::from_bps(self.tax_rate_bps),
            Money::from_cents(self.coverage_tolerance_cents),
        )
    }

    pub fn payment_expiry(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.payment_expiry_secs).unwrap_or(i64::MAX))
    }

    pub fn simulate_interval(&self) -> Option<Duration> {
        self.simulate_feed
            .then(|| Duration::from_secs(self.simulate_interval_secs))
    }
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("com", "tally", "pos")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
