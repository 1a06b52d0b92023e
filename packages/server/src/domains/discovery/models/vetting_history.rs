//! VettingHistory model
//!
//! Superseded vetting scores, archived by the force re-vet operation so
//! audit survives criteria changes.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct VettingHistory {
    pub id: Uuid,
    pub discovery_record_id: Uuid,
    pub vetting_score: i32,
    pub vetting_reasoning: Option<String>,
    pub vetted_at: Option<DateTime<Utc>>,
    pub archived_at: DateTime<Utc>,
}

impl VettingHistory {
    /// Archive a superseded score. Runs inside the force re-vet transaction.
    pub async fn archive(
        discovery_record_id: Uuid,
        score: i32,
        reasoning: Option<&str>,
        vetted_at: Option<DateTime<Utc>>,
        conn: &mut PgConnection,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO vetting_history (discovery_record_id, vetting_score, vetting_reasoning, vetted_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(discovery_record_id)
        .bind(score)
        .bind(reasoning)
        .bind(vetted_at)
        .fetch_one(conn)
        .await
        .map_err(Into::into)
    }

    pub async fn find_for_record(
        discovery_record_id: Uuid,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM vetting_history WHERE discovery_record_id = $1 ORDER BY archived_at",
        )
        .bind(discovery_record_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
