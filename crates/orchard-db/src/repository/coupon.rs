//! # Coupon Repository
//!
//! Lookup by code plus the small amount of write access seeding and
//! campaign teardown need. Evaluation itself is pure
//! (`orchard_core::coupon`); this repository just fetches rows.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use orchard_core::Coupon;

const COUPON_COLUMNS: &str = "id, code, kind, value, starts_at, expires_at, min_order_cents, \
     max_discount_cents, is_active, created_at";

/// Repository for coupon storage operations.
#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: SqlitePool,
}

impl CouponRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CouponRepository { pool }
    }

    /// Finds a coupon by its code (codes are stored uppercased).
    ///
    /// Inactive and out-of-window coupons are returned too; the evaluator
    /// owns the rejection so every caller reports the same error taxonomy.
    pub async fn find_by_code(&self, code: &str) -> DbResult<Option<Coupon>> {
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE code = ?"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(coupon)
    }

    /// Inserts a new coupon.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` when the code already exists.
    pub async fn insert(&self, coupon: &Coupon) -> DbResult<()> {
        debug!(code = %coupon.code, "Inserting coupon");

        sqlx::query(
            "INSERT INTO coupons (
                id, code, kind, value, starts_at, expires_at,
                min_order_cents, max_discount_cents, is_active, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&coupon.id)
        .bind(&coupon.code)
        .bind(coupon.kind)
        .bind(coupon.value)
        .bind(coupon.starts_at)
        .bind(coupon.expires_at)
        .bind(coupon.min_order_cents)
        .bind(coupon.max_discount_cents)
        .bind(coupon.is_active)
        .bind(coupon.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deactivates a coupon by code (ends a campaign early).
    pub async fn deactivate(&self, code: &str) -> DbResult<()> {
        debug!(code = %code, "Deactivating coupon");

        let result = sqlx::query("UPDATE coupons SET is_active = 0 WHERE code = ?")
            .bind(code)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Coupon", code));
        }

        Ok(())
    }

    /// Lists active coupons, newest first.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Coupon>> {
        let coupons = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE is_active = 1 \
             ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(coupons)
    }
}
