//! DiscoveryRecord model
//!
//! The central pipeline entity: one candidate (campaign, media) pairing.
//! Stage runners coordinate exclusively through the status fields and the
//! typed claim markers on this row; no other code path writes them.
//!
//! All SQL for claiming, releasing, and repairing records lives here.
//! Claiming uses a CTE over `FOR UPDATE SKIP LOCKED` so concurrent callers
//! (in-process or cross-process) never receive the same row.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::kernel::traits::FailureKind;

use super::vetting_history::VettingHistory;

/// Per-stage status of a discovery record
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, sqlx::Type)]
#[sqlx(type_name = "stage_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    /// Quota exhausted - terminal but re-evaluable by the operator sweep
    Limited,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StageStatus::Pending => "pending",
            StageStatus::InProgress => "in_progress",
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
            StageStatus::Limited => "limited",
        };
        f.write_str(s)
    }
}

/// Lock-managed pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Enrichment,
    Description,
    Vetting,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Enrichment => "enrichment",
            Stage::Description => "description",
            Stage::Vetting => "vetting",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DiscoveryRecord {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub media_id: Uuid,

    pub enrichment_status: StageStatus,
    pub enrichment_claimed_by: Option<String>,
    pub enrichment_claimed_at: Option<DateTime<Utc>>,
    pub enrichment_error: Option<String>,
    pub enrichment_error_kind: Option<FailureKind>,
    pub enrichment_attempts: i32,
    pub enrichment_next_attempt_at: Option<DateTime<Utc>>,

    pub description_claimed_by: Option<String>,
    pub description_claimed_at: Option<DateTime<Utc>>,

    pub vetting_status: StageStatus,
    pub vetting_claimed_by: Option<String>,
    pub vetting_claimed_at: Option<DateTime<Utc>>,
    pub vetting_error: Option<String>,
    pub vetting_error_kind: Option<FailureKind>,
    pub vetting_attempts: i32,
    pub vetting_next_attempt_at: Option<DateTime<Utc>>,
    pub vetting_score: Option<i32>,
    pub vetting_reasoning: Option<String>,

    pub match_created: bool,

    pub discovered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub vetted_at: Option<DateTime<Utc>>,
}

/// One row of the per-campaign status dashboard query
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct StatusCount {
    pub enrichment_status: StageStatus,
    pub vetting_status: StageStatus,
    pub match_created: bool,
    pub count: i64,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl DiscoveryRecord {
    /// Register a pairing. Idempotent: an existing (campaign, media) row is
    /// returned unchanged.
    pub async fn create(campaign_id: Uuid, media_id: Uuid, pool: &PgPool) -> Result<Self> {
        let inserted = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO discovery_records (campaign_id, media_id)
            VALUES ($1, $2)
            ON CONFLICT (campaign_id, media_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(campaign_id)
        .bind(media_id)
        .fetch_optional(pool)
        .await?;

        match inserted {
            Some(record) => Ok(record),
            None => sqlx::query_as::<_, Self>(
                "SELECT * FROM discovery_records WHERE campaign_id = $1 AND media_id = $2",
            )
            .bind(campaign_id)
            .bind(media_id)
            .fetch_one(pool)
            .await
            .map_err(Into::into),
        }
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>("SELECT * FROM discovery_records WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .map_err(Into::into)
    }

    // -------------------------------------------------------------------------
    // Claiming
    // -------------------------------------------------------------------------

    /// Claim up to `limit` records ready for enrichment.
    ///
    /// Ready: pending with no live marker (or a stale one), backoff window
    /// elapsed. Stale in_progress rows are reclaimable directly.
    pub async fn claim_enrichment(
        limit: i64,
        worker_token: &str,
        stale_after_secs: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            WITH ready AS (
                SELECT id
                FROM discovery_records
                WHERE (
                        (enrichment_status = 'pending'
                         AND (enrichment_claimed_by IS NULL
                              OR enrichment_claimed_at < NOW() - ($3 || ' seconds')::INTERVAL))
                     OR (enrichment_status = 'in_progress'
                         AND enrichment_claimed_at < NOW() - ($3 || ' seconds')::INTERVAL)
                      )
                  AND (enrichment_next_attempt_at IS NULL OR enrichment_next_attempt_at <= NOW())
                ORDER BY discovered_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE discovery_records d
            SET enrichment_status = 'in_progress',
                enrichment_claimed_by = $2,
                enrichment_claimed_at = NOW(),
                updated_at = NOW()
            WHERE d.id IN (SELECT id FROM ready)
            RETURNING *
            "#,
        )
        .bind(limit)
        .bind(worker_token)
        .bind(stale_after_secs.to_string())
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Claim up to `limit` records whose media still lacks a description.
    ///
    /// The NOT EXISTS guard keeps two records of the same media from being
    /// claimed across sweeps; same-media duplicates within one batch remain
    /// possible and are tolerated because the description write re-checks.
    pub async fn claim_description(
        limit: i64,
        worker_token: &str,
        stale_after_secs: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            WITH ready AS (
                SELECT d.id
                FROM discovery_records d
                JOIN media m ON m.id = d.media_id
                WHERE d.enrichment_status = 'completed'
                  AND m.ai_description IS NULL
                  AND (d.description_claimed_by IS NULL
                       OR d.description_claimed_at < NOW() - ($3 || ' seconds')::INTERVAL)
                  AND NOT EXISTS (
                      SELECT 1 FROM discovery_records peer
                      WHERE peer.media_id = d.media_id
                        AND peer.id <> d.id
                        AND peer.description_claimed_by IS NOT NULL
                        AND peer.description_claimed_at >= NOW() - ($3 || ' seconds')::INTERVAL
                  )
                ORDER BY d.discovered_at
                LIMIT $1
                FOR UPDATE OF d SKIP LOCKED
            )
            UPDATE discovery_records d
            SET description_claimed_by = $2,
                description_claimed_at = NOW(),
                updated_at = NOW()
            WHERE d.id IN (SELECT id FROM ready)
            RETURNING *
            "#,
        )
        .bind(limit)
        .bind(worker_token)
        .bind(stale_after_secs.to_string())
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Claim up to `limit` records ready for vetting.
    ///
    /// The ready predicate enforces the stage-ordering invariant: enrichment
    /// completed and the media description present.
    pub async fn claim_vetting(
        limit: i64,
        worker_token: &str,
        stale_after_secs: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            WITH ready AS (
                SELECT d.id
                FROM discovery_records d
                JOIN media m ON m.id = d.media_id
                WHERE d.enrichment_status = 'completed'
                  AND m.ai_description IS NOT NULL
                  AND (
                        (d.vetting_status = 'pending'
                         AND (d.vetting_claimed_by IS NULL
                              OR d.vetting_claimed_at < NOW() - ($3 || ' seconds')::INTERVAL))
                     OR (d.vetting_status = 'in_progress'
                         AND d.vetting_claimed_at < NOW() - ($3 || ' seconds')::INTERVAL)
                      )
                  AND (d.vetting_next_attempt_at IS NULL OR d.vetting_next_attempt_at <= NOW())
                ORDER BY d.discovered_at
                LIMIT $1
                FOR UPDATE OF d SKIP LOCKED
            )
            UPDATE discovery_records d
            SET vetting_status = 'in_progress',
                vetting_claimed_by = $2,
                vetting_claimed_at = NOW(),
                updated_at = NOW()
            WHERE d.id IN (SELECT id FROM ready)
            RETURNING *
            "#,
        )
        .bind(limit)
        .bind(worker_token)
        .bind(stale_after_secs.to_string())
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    // -------------------------------------------------------------------------
    // Releasing
    // -------------------------------------------------------------------------

    /// Release an enrichment claim as successful.
    ///
    /// The worker-token guard keeps a worker whose stale claim was already
    /// reclaimed from clobbering the new claimant's state.
    pub async fn complete_enrichment(
        id: Uuid,
        worker_token: &str,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE discovery_records
            SET enrichment_status = 'completed',
                enrichment_claimed_by = NULL,
                enrichment_claimed_at = NULL,
                enrichment_error = NULL,
                enrichment_error_kind = NULL,
                enrichment_attempts = 0,
                enrichment_next_attempt_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND enrichment_claimed_by = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(worker_token)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Release an enrichment claim as failed.
    ///
    /// Transient failures back off exponentially (60s * 2^attempts, capped)
    /// until the attempt budget runs out, then park as failed-transient for
    /// the reconciler. Permanent failures park immediately.
    pub async fn fail_enrichment(
        id: Uuid,
        worker_token: &str,
        error: &str,
        kind: FailureKind,
        max_attempts: i32,
        backoff_cap_secs: i64,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE discovery_records
            SET enrichment_status = CASE
                    WHEN $4 = 'permanent'::failure_kind THEN 'failed'::stage_status
                    WHEN enrichment_attempts + 1 >= $5 THEN 'failed'::stage_status
                    ELSE 'pending'::stage_status
                END,
                enrichment_error = $3,
                enrichment_error_kind = $4,
                enrichment_attempts = enrichment_attempts + 1,
                enrichment_next_attempt_at = CASE
                    WHEN $4 = 'transient'::failure_kind AND enrichment_attempts + 1 < $5
                    THEN NOW() + (LEAST(60 * POWER(2, enrichment_attempts), $6)::TEXT || ' seconds')::INTERVAL
                    ELSE NULL
                END,
                enrichment_claimed_by = NULL,
                enrichment_claimed_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND enrichment_claimed_by = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(worker_token)
        .bind(error)
        .bind(kind)
        .bind(max_attempts)
        .bind(backoff_cap_secs as f64)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Drop a description claim. Description has no persisted status of its
    /// own; the media row carries the outcome.
    pub async fn release_description(
        id: Uuid,
        worker_token: &str,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE discovery_records
            SET description_claimed_by = NULL,
                description_claimed_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND description_claimed_by = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(worker_token)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Release a vetting claim as successful, writing the score.
    ///
    /// Only an in_progress row accepts the write, so a completed score is
    /// never overwritten by an ordinary pipeline run.
    pub async fn complete_vetting(
        id: Uuid,
        worker_token: &str,
        score: i32,
        reasoning: &str,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE discovery_records
            SET vetting_status = 'completed',
                vetting_score = $3,
                vetting_reasoning = $4,
                vetted_at = NOW(),
                vetting_claimed_by = NULL,
                vetting_claimed_at = NULL,
                vetting_error = NULL,
                vetting_error_kind = NULL,
                vetting_attempts = 0,
                vetting_next_attempt_at = NULL,
                updated_at = NOW()
            WHERE id = $1
              AND vetting_claimed_by = $2
              AND vetting_status = 'in_progress'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(worker_token)
        .bind(score)
        .bind(reasoning)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Release a vetting claim as failed (same backoff policy as enrichment)
    pub async fn fail_vetting(
        id: Uuid,
        worker_token: &str,
        error: &str,
        kind: FailureKind,
        max_attempts: i32,
        backoff_cap_secs: i64,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE discovery_records
            SET vetting_status = CASE
                    WHEN $4 = 'permanent'::failure_kind THEN 'failed'::stage_status
                    WHEN vetting_attempts + 1 >= $5 THEN 'failed'::stage_status
                    ELSE 'pending'::stage_status
                END,
                vetting_error = $3,
                vetting_error_kind = $4,
                vetting_attempts = vetting_attempts + 1,
                vetting_next_attempt_at = CASE
                    WHEN $4 = 'transient'::failure_kind AND vetting_attempts + 1 < $5
                    THEN NOW() + (LEAST(60 * POWER(2, vetting_attempts), $6)::TEXT || ' seconds')::INTERVAL
                    ELSE NULL
                END,
                vetting_claimed_by = NULL,
                vetting_claimed_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND vetting_claimed_by = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(worker_token)
        .bind(error)
        .bind(kind)
        .bind(max_attempts)
        .bind(backoff_cap_secs as f64)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    // -------------------------------------------------------------------------
    // Stale-claim cleanup
    // -------------------------------------------------------------------------

    /// Forcibly clear enrichment markers older than the threshold.
    /// The interrupted attempt is recorded as failed-transient.
    pub async fn cleanup_stale_enrichment(older_than_secs: i64, pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE discovery_records
            SET enrichment_status = CASE
                    WHEN enrichment_status = 'in_progress' THEN 'pending'::stage_status
                    ELSE enrichment_status
                END,
                enrichment_error = CASE
                    WHEN enrichment_status = 'in_progress'
                    THEN 'stale claim reclaimed from ' || enrichment_claimed_by
                    ELSE enrichment_error
                END,
                enrichment_error_kind = CASE
                    WHEN enrichment_status = 'in_progress' THEN 'transient'::failure_kind
                    ELSE enrichment_error_kind
                END,
                enrichment_claimed_by = NULL,
                enrichment_claimed_at = NULL,
                updated_at = NOW()
            WHERE enrichment_claimed_by IS NOT NULL
              AND enrichment_claimed_at < NOW() - ($1 || ' seconds')::INTERVAL
            "#,
        )
        .bind(older_than_secs.to_string())
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn cleanup_stale_description(older_than_secs: i64, pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE discovery_records
            SET description_claimed_by = NULL,
                description_claimed_at = NULL,
                updated_at = NOW()
            WHERE description_claimed_by IS NOT NULL
              AND description_claimed_at < NOW() - ($1 || ' seconds')::INTERVAL
            "#,
        )
        .bind(older_than_secs.to_string())
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn cleanup_stale_vetting(older_than_secs: i64, pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE discovery_records
            SET vetting_status = CASE
                    WHEN vetting_status = 'in_progress' THEN 'pending'::stage_status
                    ELSE vetting_status
                END,
                vetting_error = CASE
                    WHEN vetting_status = 'in_progress'
                    THEN 'stale claim reclaimed from ' || vetting_claimed_by
                    ELSE vetting_error
                END,
                vetting_error_kind = CASE
                    WHEN vetting_status = 'in_progress' THEN 'transient'::failure_kind
                    ELSE vetting_error_kind
                END,
                vetting_claimed_by = NULL,
                vetting_claimed_at = NULL,
                updated_at = NOW()
            WHERE vetting_claimed_by IS NOT NULL
              AND vetting_claimed_at < NOW() - ($1 || ' seconds')::INTERVAL
            "#,
        )
        .bind(older_than_secs.to_string())
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    // -------------------------------------------------------------------------
    // Reconciler repairs
    // -------------------------------------------------------------------------

    /// Records still pending enrichment whose media already carries every
    /// signal (a signal write that succeeded while the status update was
    /// lost). Force-advance to completed.
    pub async fn force_advance_enriched(pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE discovery_records d
            SET enrichment_status = 'completed',
                enrichment_error = NULL,
                enrichment_error_kind = NULL,
                enrichment_attempts = 0,
                enrichment_next_attempt_at = NULL,
                updated_at = NOW()
            FROM media m
            WHERE m.id = d.media_id
              AND d.enrichment_status = 'pending'
              AND d.enrichment_claimed_by IS NULL
              AND m.audience_estimate IS NOT NULL
              AND m.social_reach IS NOT NULL
              AND m.episode_count IS NOT NULL
            "#,
        )
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Return transient-failed records to pending once the cooldown has
    /// passed. Permanent failures are left untouched.
    pub async fn reset_transient_enrichment_failures(
        cooldown_secs: i64,
        pool: &PgPool,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE discovery_records
            SET enrichment_status = 'pending',
                enrichment_attempts = 0,
                enrichment_next_attempt_at = NULL,
                updated_at = NOW()
            WHERE enrichment_status = 'failed'
              AND enrichment_error_kind = 'transient'
              AND updated_at < NOW() - ($1 || ' seconds')::INTERVAL
            "#,
        )
        .bind(cooldown_secs.to_string())
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn reset_transient_vetting_failures(
        cooldown_secs: i64,
        pool: &PgPool,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE discovery_records
            SET vetting_status = 'pending',
                vetting_attempts = 0,
                vetting_next_attempt_at = NULL,
                updated_at = NOW()
            WHERE vetting_status = 'failed'
              AND vetting_error_kind = 'transient'
              AND updated_at < NOW() - ($1 || ' seconds')::INTERVAL
            "#,
        )
        .bind(cooldown_secs.to_string())
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    // -------------------------------------------------------------------------
    // Match bookkeeping
    // -------------------------------------------------------------------------

    /// Record that a match suggestion exists for this record.
    /// Also restores `completed` for records re-admitted from `limited`.
    pub async fn mark_match_created(id: Uuid, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE discovery_records
            SET match_created = TRUE,
                vetting_status = 'completed',
                updated_at = NOW()
            WHERE id = $1
              AND vetting_status IN ('completed', 'limited')
              AND vetting_score IS NOT NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Park a qualifying record whose client quota is exhausted
    pub async fn mark_limited(id: Uuid, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE discovery_records
            SET vetting_status = 'limited',
                updated_at = NOW()
            WHERE id = $1 AND vetting_status IN ('completed', 'limited')
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Quota-limited records for a client, oldest vetted first
    pub async fn find_limited_for_client(
        client_id: Uuid,
        limit: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT d.*
            FROM discovery_records d
            JOIN campaigns c ON c.id = d.campaign_id
            WHERE c.client_id = $1
              AND d.vetting_status = 'limited'
              AND d.match_created = FALSE
            ORDER BY d.vetted_at
            LIMIT $2
            "#,
        )
        .bind(client_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    // -------------------------------------------------------------------------
    // Operator surface
    // -------------------------------------------------------------------------

    /// Reset a record for re-vetting after campaign criteria change.
    ///
    /// The superseded score is archived to vetting_history, then score,
    /// reasoning, errors, and attempts are cleared and vetting returns to
    /// pending. Refused while a live claim exists or once a match was
    /// created.
    pub async fn force_revet(id: Uuid, stale_after_secs: i64, pool: &PgPool) -> Result<Self> {
        let mut tx = pool.begin().await?;

        let record = sqlx::query_as::<_, Self>(
            "SELECT * FROM discovery_records WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if record.match_created {
            bail!("cannot re-vet record {}: match already created", id);
        }
        let claim_live = match (&record.vetting_claimed_by, record.vetting_claimed_at) {
            (Some(_), Some(at)) => at > Utc::now() - chrono::Duration::seconds(stale_after_secs),
            _ => false,
        };
        if claim_live {
            bail!("cannot re-vet record {}: vetting claim in flight", id);
        }

        if let Some(score) = record.vetting_score {
            VettingHistory::archive(
                record.id,
                score,
                record.vetting_reasoning.as_deref(),
                record.vetted_at,
                &mut tx,
            )
            .await?;
        }

        let updated = sqlx::query_as::<_, Self>(
            r#"
            UPDATE discovery_records
            SET vetting_status = 'pending',
                vetting_score = NULL,
                vetting_reasoning = NULL,
                vetted_at = NULL,
                vetting_error = NULL,
                vetting_error_kind = NULL,
                vetting_attempts = 0,
                vetting_next_attempt_at = NULL,
                vetting_claimed_by = NULL,
                vetting_claimed_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Per-campaign dashboard counts, grouped by stage-status combination
    pub async fn status_counts(campaign_id: Uuid, pool: &PgPool) -> Result<Vec<StatusCount>> {
        sqlx::query_as::<_, StatusCount>(
            r#"
            SELECT enrichment_status, vetting_status, match_created, COUNT(*) AS count
            FROM discovery_records
            WHERE campaign_id = $1
            GROUP BY enrichment_status, vetting_status, match_created
            ORDER BY enrichment_status, vetting_status, match_created
            "#,
        )
        .bind(campaign_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
