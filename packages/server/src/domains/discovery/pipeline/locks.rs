//! Lock manager - atomic claim/release primitives over the typed marker
//! fields on discovery records.
//!
//! Claiming is a single CTE statement using `FOR UPDATE SKIP LOCKED`
//! (see the model layer), so no two concurrent callers - in-process or
//! cross-process - ever receive the same record for the same stage. A
//! marker older than the stale threshold is reclaimable by anyone;
//! `cleanup_stale` clears such markers eagerly so a crashed worker cannot
//! starve a record.

use anyhow::Result;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::domains::discovery::models::{DiscoveryRecord, Stage};
use crate::kernel::traits::FailureKind;

pub struct LockManager {
    pool: PgPool,
    worker_token: String,
    stale_after_secs: i64,
    max_transient_attempts: i32,
    backoff_cap_secs: i64,
}

impl LockManager {
    pub fn new(pool: PgPool, config: &PipelineConfig) -> Self {
        Self {
            pool,
            worker_token: format!("worker-{}", Uuid::new_v4()),
            stale_after_secs: config.stale_claim_after.as_secs() as i64,
            max_transient_attempts: config.max_transient_attempts,
            backoff_cap_secs: config.backoff_cap.as_secs() as i64,
        }
    }

    pub fn worker_token(&self) -> &str {
        &self.worker_token
    }

    /// Atomically claim up to `batch_size` records ready for `stage`.
    ///
    /// Lock contention is not an error: contended rows are skipped and the
    /// call simply returns fewer records than requested.
    pub async fn try_claim(&self, stage: Stage, batch_size: i64) -> Result<Vec<DiscoveryRecord>> {
        match stage {
            Stage::Enrichment => {
                DiscoveryRecord::claim_enrichment(
                    batch_size,
                    &self.worker_token,
                    self.stale_after_secs,
                    &self.pool,
                )
                .await
            }
            Stage::Description => {
                DiscoveryRecord::claim_description(
                    batch_size,
                    &self.worker_token,
                    self.stale_after_secs,
                    &self.pool,
                )
                .await
            }
            Stage::Vetting => {
                DiscoveryRecord::claim_vetting(
                    batch_size,
                    &self.worker_token,
                    self.stale_after_secs,
                    &self.pool,
                )
                .await
            }
        }
    }

    /// Release an enrichment claim as successful, advancing the status.
    /// Returns None when the claim was already reclaimed from this worker.
    pub async fn release_enrichment_success(&self, id: Uuid) -> Result<Option<DiscoveryRecord>> {
        DiscoveryRecord::complete_enrichment(id, &self.worker_token, &self.pool).await
    }

    /// Release a vetting claim as successful, writing score and reasoning.
    pub async fn release_vetting_success(
        &self,
        id: Uuid,
        score: i32,
        reasoning: &str,
    ) -> Result<Option<DiscoveryRecord>> {
        DiscoveryRecord::complete_vetting(id, &self.worker_token, score, reasoning, &self.pool)
            .await
    }

    /// Release a description claim. The media row carries the outcome;
    /// the record itself has no description status to advance.
    pub async fn release_description(&self, id: Uuid) -> Result<Option<DiscoveryRecord>> {
        DiscoveryRecord::release_description(id, &self.worker_token, &self.pool).await
    }

    /// Release a claim as failed, recording the classified error.
    ///
    /// Transient failures stay `pending` behind a backoff window until the
    /// attempt budget is exhausted; permanent failures park as `failed`.
    pub async fn release_failure(
        &self,
        id: Uuid,
        stage: Stage,
        error: &str,
        kind: FailureKind,
    ) -> Result<Option<DiscoveryRecord>> {
        match stage {
            Stage::Enrichment => {
                DiscoveryRecord::fail_enrichment(
                    id,
                    &self.worker_token,
                    error,
                    kind,
                    self.max_transient_attempts,
                    self.backoff_cap_secs,
                    &self.pool,
                )
                .await
            }
            Stage::Vetting => {
                DiscoveryRecord::fail_vetting(
                    id,
                    &self.worker_token,
                    error,
                    kind,
                    self.max_transient_attempts,
                    self.backoff_cap_secs,
                    &self.pool,
                )
                .await
            }
            // Description failures leave no mark on the record
            Stage::Description => self.release_description(id).await,
        }
    }

    /// Forcibly clear markers older than the stale threshold for one stage.
    /// The interrupted attempts are treated as failed-transient.
    pub async fn cleanup_stale(&self, stage: Stage) -> Result<u64> {
        let cleared = match stage {
            Stage::Enrichment => {
                DiscoveryRecord::cleanup_stale_enrichment(self.stale_after_secs, &self.pool).await?
            }
            Stage::Description => {
                DiscoveryRecord::cleanup_stale_description(self.stale_after_secs, &self.pool)
                    .await?
            }
            Stage::Vetting => {
                DiscoveryRecord::cleanup_stale_vetting(self.stale_after_secs, &self.pool).await?
            }
        };

        if cleared > 0 {
            warn!(stage = %stage, cleared, "reclaimed stale claims");
        }
        Ok(cleared)
    }

    /// Stale-claim sweep across every stage
    pub async fn cleanup_stale_all(&self) -> Result<u64> {
        let mut total = 0;
        for stage in [Stage::Enrichment, Stage::Description, Stage::Vetting] {
            total += self.cleanup_stale(stage).await?;
        }
        Ok(total)
    }
}
