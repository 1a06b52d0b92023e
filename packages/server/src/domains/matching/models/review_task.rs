//! ReviewTask model
//!
//! A human-review work item for a match suggestion. Created by the pipeline,
//! owned downstream.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct ReviewTask {
    pub id: Uuid,
    pub match_suggestion_id: Uuid,
    pub campaign_id: Uuid,
    pub status: String,
    pub due_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ReviewTask {
    pub async fn create(
        match_suggestion_id: Uuid,
        campaign_id: Uuid,
        due_at: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO review_tasks (match_suggestion_id, campaign_id, due_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(match_suggestion_id)
        .bind(campaign_id)
        .bind(due_at)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_suggestion(
        match_suggestion_id: Uuid,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM review_tasks WHERE match_suggestion_id = $1 ORDER BY created_at",
        )
        .bind(match_suggestion_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
