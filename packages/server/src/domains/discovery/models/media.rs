//! Media model
//!
//! A podcast profile, shared across every campaign that discovered it.
//! Created at first discovery, mutated by enrichment, never deleted by the
//! pipeline. Signal writes are idempotent: applying the same signals twice
//! leaves the row in the same state.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::kernel::traits::{EnrichmentSignals, MediaProfile};

#[derive(Debug, Clone, FromRow)]
pub struct Media {
    pub id: Uuid,
    pub title: String,
    pub website_url: Option<String>,
    pub rss_url: Option<String>,
    pub ai_description: Option<String>,
    pub audience_estimate: Option<i32>,
    pub social_reach: Option<i32>,
    pub episode_count: Option<i32>,
    pub publish_cadence_days: Option<i32>,
    pub quality_score: Option<i32>,
    pub enriched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derived quality aggregate (0-100) from the raw enrichment signals.
///
/// Log-scaled per component so a single outsized signal cannot saturate
/// the score.
pub fn compute_quality_score(
    audience_estimate: i32,
    social_reach: i32,
    episode_count: i32,
) -> i32 {
    let audience = ((audience_estimate.max(0) as f64 + 1.0).log10() * 8.0).min(40.0);
    let social = ((social_reach.max(0) as f64 + 1.0).log10() * 6.0).min(30.0);
    let episodes = ((episode_count.max(0) as f64 + 1.0).log10() * 10.0).min(30.0);
    ((audience + social + episodes).round() as i32).clamp(0, 100)
}

impl Media {
    pub async fn create(
        title: &str,
        website_url: Option<&str>,
        rss_url: Option<&str>,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO media (title, website_url, rss_url) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(title)
        .bind(website_url)
        .bind(rss_url)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>("SELECT * FROM media WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .map_err(Into::into)
    }

    /// Write enrichment signals and the recomputed aggregate.
    ///
    /// Safe to repeat: the same signals always produce the same row state.
    /// Several discovery records may point at this media and each
    /// enrichment pass may land here.
    pub async fn apply_signals(
        id: Uuid,
        signals: &EnrichmentSignals,
        pool: &PgPool,
    ) -> Result<Self> {
        let quality_score = match (
            signals.audience_estimate,
            signals.social_reach,
            signals.episode_count,
        ) {
            (Some(a), Some(s), Some(e)) => Some(compute_quality_score(a, s, e)),
            _ => None,
        };

        sqlx::query_as::<_, Self>(
            r#"
            UPDATE media
            SET audience_estimate = $2,
                social_reach = $3,
                episode_count = $4,
                publish_cadence_days = $5,
                quality_score = $6,
                enriched_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(signals.audience_estimate)
        .bind(signals.social_reach)
        .bind(signals.episode_count)
        .bind(signals.publish_cadence_days)
        .bind(quality_score)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Write the AI description, only if still absent.
    ///
    /// Returns false when another worker already filled it - the caller
    /// treats that as success.
    pub async fn write_description(id: Uuid, description: &str, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE media
            SET ai_description = $2, updated_at = NOW()
            WHERE id = $1 AND ai_description IS NULL
            "#,
        )
        .bind(id)
        .bind(description)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Media whose raw signals are all present but whose aggregate was
    /// never derived (e.g., a crash between the two writes)
    pub async fn find_missing_aggregate(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM media
            WHERE quality_score IS NULL
              AND audience_estimate IS NOT NULL
              AND social_reach IS NOT NULL
              AND episode_count IS NOT NULL
            ORDER BY updated_at
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Recompute the quality aggregate from the stored raw signals
    pub async fn recompute_aggregate(id: Uuid, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE media
            SET quality_score = LEAST(100, GREATEST(0, ROUND(
                    LEAST(40.0, LOG(audience_estimate + 1.0) * 8.0)
                  + LEAST(30.0, LOG(social_reach + 1.0) * 6.0)
                  + LEAST(30.0, LOG(episode_count + 1.0) * 10.0)
                )))::INT,
                updated_at = NOW()
            WHERE id = $1
              AND audience_estimate IS NOT NULL
              AND social_reach IS NOT NULL
              AND episode_count IS NOT NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// All signals the enrichment stage is responsible for are present
    pub fn has_complete_signals(&self) -> bool {
        self.audience_estimate.is_some()
            && self.social_reach.is_some()
            && self.episode_count.is_some()
    }

    /// Flattened view handed to the scoring collaborator
    pub fn profile(&self) -> MediaProfile {
        MediaProfile {
            media_id: self.id,
            title: self.title.clone(),
            description: self.ai_description.clone().unwrap_or_default(),
            quality_score: self.quality_score,
            audience_estimate: self.audience_estimate,
            social_reach: self.social_reach,
            episode_count: self.episode_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_score_bounds() {
        assert_eq!(compute_quality_score(0, 0, 0), 0);
        assert!(compute_quality_score(i32::MAX, i32::MAX, i32::MAX) <= 100);
        assert!(compute_quality_score(-5, -5, -5) >= 0);
    }

    #[test]
    fn test_quality_score_monotonic_in_audience() {
        let small = compute_quality_score(100, 500, 20);
        let large = compute_quality_score(100_000, 500, 20);
        assert!(large > small);
    }

    #[test]
    fn test_quality_score_deterministic() {
        assert_eq!(
            compute_quality_score(12_000, 3_400, 150),
            compute_quality_score(12_000, 3_400, 150)
        );
    }
}
