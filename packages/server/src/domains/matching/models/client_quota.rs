//! ClientQuota model
//!
//! Per-client cap on matches created per rolling week. The count is only
//! ever mutated through `check_and_increment`, a single conditional UPDATE,
//! so concurrent qualifying records can never overshoot the allowance.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct ClientQuota {
    pub client_id: Uuid,
    pub weekly_allowance: i32,
    pub current_count: i32,
    pub last_reset_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClientQuota {
    /// Create or update the allowance for a client
    pub async fn ensure(client_id: Uuid, weekly_allowance: i32, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO client_quotas (client_id, weekly_allowance)
            VALUES ($1, $2)
            ON CONFLICT (client_id)
            DO UPDATE SET weekly_allowance = $2, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(client_id)
        .bind(weekly_allowance)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_client(client_id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM client_quotas WHERE client_id = $1")
            .bind(client_id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Atomic check-and-increment.
    ///
    /// In one statement: the count resets when the rolling weekly boundary
    /// has passed since `last_reset_at`, then increments iff the effective
    /// count is below the allowance. Returns the updated row when allowed,
    /// `None` when denied (denial mutates nothing). A client without a
    /// quota row is denied.
    pub async fn check_and_increment(client_id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE client_quotas
            SET current_count = CASE
                    WHEN last_reset_at <= NOW() - INTERVAL '7 days' THEN 1
                    ELSE current_count + 1
                END,
                last_reset_at = CASE
                    WHEN last_reset_at <= NOW() - INTERVAL '7 days' THEN NOW()
                    ELSE last_reset_at
                END,
                updated_at = NOW()
            WHERE client_id = $1
              AND (CASE
                    WHEN last_reset_at <= NOW() - INTERVAL '7 days' THEN 0
                    ELSE current_count
                  END) < weekly_allowance
            RETURNING *
            "#,
        )
        .bind(client_id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }
}
