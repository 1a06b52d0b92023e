//! Campaign model
//!
//! A client's outreach campaign. The `criteria` payload is opaque to the
//! pipeline; it is handed verbatim to the scoring collaborator.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct Campaign {
    pub id: Uuid,
    pub client_id: Uuid,
    pub name: String,
    pub criteria: serde_json::Value,
    pub vetting_threshold_override: Option<i32>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    pub async fn create(
        client_id: Uuid,
        name: &str,
        criteria: serde_json::Value,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO campaigns (client_id, name, criteria) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(client_id)
        .bind(name)
        .bind(criteria)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn set_threshold_override(
        id: Uuid,
        threshold: Option<i32>,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "UPDATE campaigns SET vetting_threshold_override = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(threshold)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Qualification threshold for this campaign, falling back to the
    /// configured global default
    pub fn effective_threshold(&self, default: i32) -> i32 {
        self.vetting_threshold_override.unwrap_or(default)
    }
}
