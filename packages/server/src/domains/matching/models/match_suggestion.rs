//! MatchSuggestion model
//!
//! Created once per qualifying discovery record; owned by the human-review
//! workflow after creation.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct MatchSuggestion {
    pub id: Uuid,
    pub discovery_record_id: Uuid,
    pub campaign_id: Uuid,
    pub media_id: Uuid,
    pub vetting_score: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl MatchSuggestion {
    /// Create the suggestion for a record. Create-once: a concurrent or
    /// repeated call returns the existing row.
    pub async fn create(
        discovery_record_id: Uuid,
        campaign_id: Uuid,
        media_id: Uuid,
        vetting_score: i32,
        pool: &PgPool,
    ) -> Result<(Self, bool)> {
        let inserted = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO match_suggestions (discovery_record_id, campaign_id, media_id, vetting_score)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (discovery_record_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(discovery_record_id)
        .bind(campaign_id)
        .bind(media_id)
        .bind(vetting_score)
        .fetch_optional(pool)
        .await?;

        match inserted {
            Some(suggestion) => Ok((suggestion, true)),
            None => {
                let existing = Self::find_by_record(discovery_record_id, pool).await?;
                Ok((existing, false))
            }
        }
    }

    pub async fn find_by_record(discovery_record_id: Uuid, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM match_suggestions WHERE discovery_record_id = $1",
        )
        .bind(discovery_record_id)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn count_for_campaign(campaign_id: Uuid, pool: &PgPool) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM match_suggestions WHERE campaign_id = $1")
                .bind(campaign_id)
                .fetch_one(pool)
                .await?;
        Ok(count)
    }
}
