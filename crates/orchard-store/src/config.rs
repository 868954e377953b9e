//! Storefront configuration.
//!
//! Loaded from environment variables with fallback to defaults.

use serde::{Deserialize, Serialize};
use std::env;

use orchard_core::{CheckoutPolicy, TaxRate};
use orchard_db::DbConfig;

/// Storefront configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file path.
    pub database_path: String,

    /// Connection pool size.
    pub max_connections: u32,

    /// Sales tax in basis points (1000 = 10%).
    pub tax_rate_bps: u32,

    /// Flat shipping fee in cents for orders below the threshold.
    pub shipping_flat_cents: i64,

    /// Subtotals at or above this ship free, in cents.
    pub free_shipping_threshold_cents: i64,
}

impl StoreConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = StoreConfig {
            database_path: env::var("ORCHARD_DB_PATH")
                .unwrap_or_else(|_| "./orchard.db".to_string()),

            max_connections: env::var("ORCHARD_DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("ORCHARD_DB_MAX_CONNECTIONS".to_string()))?,

            tax_rate_bps: env::var("ORCHARD_TAX_RATE_BPS")
                .unwrap_or_else(|_| "1000".to_string()) // 10%
                .parse()
                .map_err(|_| ConfigError::InvalidValue("ORCHARD_TAX_RATE_BPS".to_string()))?,

            shipping_flat_cents: env::var("ORCHARD_SHIPPING_FLAT_CENTS")
                .unwrap_or_else(|_| "1000".to_string()) // $10.00
                .parse()
                .map_err(|_| ConfigError::InvalidValue("ORCHARD_SHIPPING_FLAT_CENTS".to_string()))?,

            free_shipping_threshold_cents: env::var("ORCHARD_FREE_SHIPPING_THRESHOLD_CENTS")
                .unwrap_or_else(|_| "10000".to_string()) // $100.00
                .parse()
                .map_err(|_| {
                    ConfigError::InvalidValue("ORCHARD_FREE_SHIPPING_THRESHOLD_CENTS".to_string())
                })?,
        };

        if config.tax_rate_bps > 10000 {
            return Err(ConfigError::InvalidValue("ORCHARD_TAX_RATE_BPS".to_string()));
        }

        Ok(config)
    }

    /// The pricing policy the cart aggregator runs with.
    pub fn checkout_policy(&self) -> CheckoutPolicy {
        CheckoutPolicy {
            tax_rate: TaxRate::from_bps(self.tax_rate_bps),
            shipping_flat_cents: self.shipping_flat_cents,
            free_shipping_threshold_cents: self.free_shipping_threshold_cents,
        }
    }

    /// The pool configuration for `orchard-db`.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path).max_connections(self.max_connections)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            database_path: "./orchard.db".to_string(),
            max_connections: 5,
            tax_rate_bps: 1000,
            shipping_flat_cents: 1000,
            free_shipping_threshold_cents: 10000,
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
