//! # orchard-db: Storage Layer for Orchard Commerce
//!
//! SQLite persistence for the storefront, via sqlx.
//!
//! ## Architecture Position
//! ```text
//! orchard-store (cart / coupon / checkout / review services)
//!      │
//!      ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                 orchard-db (THIS CRATE)                 │
//! │                                                         │
//! │   Database        Repositories          Migrations      │
//! │   (pool.rs)       products  carts       (embedded       │
//! │   SqlitePool      coupons   orders       .sql files)    │
//! │   WAL mode        reviews                               │
//! └─────────────────────────────────────────────────────────┘
//!      │
//!      ▼
//! SQLite database file (or :memory: in tests)
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and the `Database` handle
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Storage error types
//! - [`repository`] - Repository implementations per aggregate
//!
//! ## Usage
//!
//! ```rust,ignore
//! use orchard_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/orchard.db")).await?;
//! let product = db.products().get_by_sku("TEE-BLK-M").await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::cart::CartRepository;
pub use repository::coupon::CouponRepository;
pub use repository::order::OrderRepository;
pub use repository::product::ProductRepository;
pub use repository::review::ReviewRepository;
