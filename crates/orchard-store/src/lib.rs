//! # orchard-store: Storefront Service Layer for Orchard Commerce
//!
//! The operations a storefront client calls, composed linearly:
//!
//! ```text
//! item mutation ──► totals recompute ──► (optional) coupon evaluation
//!       │                                        │
//!       └──────────────► checkout ◄──────────────┘
//!                           │
//!                  order materialization ──► cart clear
//! ```
//!
//! ## Modules
//!
//! - [`cart`] - cart mutations with totals recompute ([`CartService`])
//! - [`coupon`] - coupon apply/remove ([`CouponService`])
//! - [`checkout`] - order materialization and history ([`CheckoutService`])
//! - [`review`] - review submission and moderation ([`ReviewService`])
//! - [`config`] - environment configuration ([`StoreConfig`])
//! - [`error`] - the serialized error surface ([`StoreError`])
//!
//! ## Usage
//!
//! ```rust,ignore
//! use orchard_store::{Store, StoreConfig};
//!
//! let store = Store::open(StoreConfig::load()?).await?;
//! store.carts().add_item("cust-1", &product_id, 2).await?;
//! store.coupons().apply("cust-1", "WELCOME10").await?;
//! let receipt = store.checkout().place_order("cust-1", request).await?;
//! ```

pub mod cart;
pub mod checkout;
pub mod config;
pub mod coupon;
pub mod error;
pub mod review;

pub use cart::{CartService, CartView};
pub use checkout::{CheckoutRequest, CheckoutService, OrderReceipt};
pub use config::{ConfigError, StoreConfig};
pub use coupon::CouponService;
pub use error::{ErrorCode, StoreError};
pub use review::ReviewService;

use orchard_core::CheckoutPolicy;
use orchard_db::Database;

/// The storefront: a database plus a pricing policy, handing out services.
#[derive(Debug, Clone)]
pub struct Store {
    db: Database,
    policy: CheckoutPolicy,
}

impl Store {
    /// Opens the database (running migrations) and builds the store from
    /// configuration.
    pub async fn open(config: StoreConfig) -> Result<Store, StoreError> {
        let db = Database::new(config.db_config()).await?;
        Ok(Store {
            db,
            policy: config.checkout_policy(),
        })
    }

    /// Builds a store over an already-open database. Used by tests and
    /// embedders that manage the pool themselves.
    pub fn new(db: Database, policy: CheckoutPolicy) -> Store {
        Store { db, policy }
    }

    pub fn carts(&self) -> CartService {
        CartService::new(self.db.clone(), self.policy)
    }

    pub fn coupons(&self) -> CouponService {
        CouponService::new(self.db.clone(), self.policy)
    }

    pub fn checkout(&self) -> CheckoutService {
        CheckoutService::new(self.db.clone(), self.policy)
    }

    pub fn reviews(&self) -> ReviewService {
        ReviewService::new(self.db.clone())
    }

    pub fn db(&self) -> &Database {
        &self.db
    }
}
