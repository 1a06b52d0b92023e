//! Enrichment stage runner.
//!
//! Claims records pending enrichment, invokes the enrichment collaborator
//! to compute social/quality signals for the associated media, and writes
//! back readiness. Media writes are idempotent: several records can share
//! one media and each pass lands the same state.
//!
//! Collaborator errors never propagate past this boundary - every failure
//! is classified and converted into a status/error-field write.

use std::sync::Arc;

use anyhow::Result;
use futures::{stream, StreamExt};
use tracing::{debug, error, warn};

use crate::domains::discovery::models::{DiscoveryRecord, Media, Stage};
use crate::kernel::traits::{CollaboratorError, EnrichmentSignals, FailureKind};
use crate::kernel::PipelineDeps;

use super::locks::LockManager;
use super::{StageOutcome, SweepSummary};

pub struct EnrichmentRunner {
    deps: PipelineDeps,
    locks: Arc<LockManager>,
}

impl EnrichmentRunner {
    pub fn new(deps: PipelineDeps, locks: Arc<LockManager>) -> Self {
        Self { deps, locks }
    }

    /// One scheduled sweep: claim a batch and process it with bounded
    /// concurrency (collaborator calls are the rate-limited resource).
    pub async fn run_once(&self) -> Result<SweepSummary> {
        let batch = self
            .locks
            .try_claim(Stage::Enrichment, self.deps.config.claim_batch_size)
            .await?;

        let mut summary = SweepSummary {
            claimed: batch.len(),
            ..Default::default()
        };
        if batch.is_empty() {
            return Ok(summary);
        }

        let outcomes: Vec<StageOutcome> = stream::iter(batch)
            .map(|record| self.process(record))
            .buffer_unordered(self.deps.config.stage_worker_limit)
            .collect()
            .await;

        for outcome in outcomes {
            summary.absorb(outcome);
        }
        Ok(summary)
    }

    async fn process(&self, record: DiscoveryRecord) -> StageOutcome {
        let result = match tokio::time::timeout(
            self.deps.config.collaborator_timeout,
            self.deps.enrichment.enrich_media(record.media_id),
        )
        .await
        {
            Ok(inner) => inner,
            Err(_) => Err(CollaboratorError::timeout("enrichment")),
        };

        match result {
            Ok(signals) => {
                if let Err(e) = self.persist_success(&record, &signals).await {
                    error!(
                        record_id = %record.id,
                        error = %e,
                        "failed to persist enrichment result"
                    );
                    return StageOutcome::Error;
                }
                debug!(
                    record_id = %record.id,
                    media_id = %record.media_id,
                    quality_ready = signals.is_complete(),
                    "enrichment completed"
                );
                StageOutcome::Succeeded
            }
            Err(err) => {
                let kind = err.kind();
                warn!(
                    record_id = %record.id,
                    media_id = %record.media_id,
                    error = %err,
                    "enrichment collaborator failed"
                );
                match self
                    .locks
                    .release_failure(record.id, Stage::Enrichment, &err.to_string(), kind)
                    .await
                {
                    Ok(_) => match kind {
                        FailureKind::Transient => StageOutcome::TransientFailure,
                        FailureKind::Permanent => StageOutcome::PermanentFailure,
                    },
                    Err(e) => {
                        error!(record_id = %record.id, error = %e, "failed to release claim");
                        StageOutcome::Error
                    }
                }
            }
        }
    }

    async fn persist_success(
        &self,
        record: &DiscoveryRecord,
        signals: &EnrichmentSignals,
    ) -> Result<()> {
        Media::apply_signals(record.media_id, signals, &self.deps.db_pool).await?;

        if self
            .locks
            .release_enrichment_success(record.id)
            .await?
            .is_none()
        {
            // Our claim went stale and was reclaimed; the media write above
            // is idempotent, so the new claimant simply repeats it
            debug!(record_id = %record.id, "enrichment claim was reclaimed before release");
        }
        Ok(())
    }
}
