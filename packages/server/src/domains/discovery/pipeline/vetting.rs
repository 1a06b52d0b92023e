//! Vetting stage runner.
//!
//! Claims records whose enrichment completed and whose media carries an AI
//! description (the claim predicate enforces the stage-ordering
//! invariant), asks the scoring collaborator for a 0-100 fit score, and
//! writes the result. A qualifying score triggers match creation
//! immediately, inside the same sweep.
//!
//! A completed score is immutable to ordinary pipeline runs; only the
//! operator's force re-vet clears it.

use std::sync::Arc;

use anyhow::Result;
use futures::{stream, StreamExt};
use tracing::{debug, error, warn};

use crate::domains::discovery::models::{Campaign, DiscoveryRecord, Media, Stage};
use crate::domains::matching::MatchCreator;
use crate::kernel::traits::{CollaboratorError, FailureKind};
use crate::kernel::PipelineDeps;

use super::locks::LockManager;
use super::{StageOutcome, SweepSummary};

pub struct VettingRunner {
    deps: PipelineDeps,
    locks: Arc<LockManager>,
    match_creator: Arc<MatchCreator>,
}

impl VettingRunner {
    pub fn new(
        deps: PipelineDeps,
        locks: Arc<LockManager>,
        match_creator: Arc<MatchCreator>,
    ) -> Self {
        Self {
            deps,
            locks,
            match_creator,
        }
    }

    pub async fn run_once(&self) -> Result<SweepSummary> {
        let batch = self
            .locks
            .try_claim(Stage::Vetting, self.deps.config.claim_batch_size)
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
        let (campaign, media) = match self.load_context(&record).await {
            Ok(context) => context,
            Err(e) => {
                error!(record_id = %record.id, error = %e, "failed to load vetting context");
                return StageOutcome::Error;
            }
        };

        let profile = media.profile();
        let result = match tokio::time::timeout(
            self.deps.config.collaborator_timeout,
            self.deps.vetting.score_candidate(&campaign.criteria, &profile),
        )
        .await
        {
            Ok(inner) => inner,
            Err(_) => Err(CollaboratorError::timeout("vetting")),
        };

        match result {
            Ok(outcome) => {
                let released = match self
                    .locks
                    .release_vetting_success(record.id, outcome.score, &outcome.reasoning)
                    .await
                {
                    Ok(released) => released,
                    Err(e) => {
                        error!(record_id = %record.id, error = %e, "failed to write vetting result");
                        return StageOutcome::Error;
                    }
                };

                let Some(vetted) = released else {
                    debug!(record_id = %record.id, "vetting claim was reclaimed before release");
                    return StageOutcome::Error;
                };

                let threshold = campaign.effective_threshold(self.deps.config.vetting_threshold);
                if outcome.score >= threshold {
                    if let Err(e) = self.match_creator.create_for_record(&vetted).await {
                        // The record stays completed; the operator retry
                        // sweep can pick it up once the underlying issue
                        // clears
                        error!(record_id = %record.id, error = %e, "match creation failed");
                    }
                } else {
                    debug!(
                        record_id = %record.id,
                        score = outcome.score,
                        threshold,
                        "score below qualification threshold"
                    );
                }
                StageOutcome::Succeeded
            }
            Err(err) => {
                let kind = err.kind();
                warn!(
                    record_id = %record.id,
                    media_id = %record.media_id,
                    error = %err,
                    "scoring collaborator failed"
                );
                match self
                    .locks
                    .release_failure(record.id, Stage::Vetting, &err.to_string(), kind)
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

    async fn load_context(&self, record: &DiscoveryRecord) -> Result<(Campaign, Media)> {
        let campaign = Campaign::find_by_id(record.campaign_id, &self.deps.db_pool).await?;
        let media = Media::find_by_id(record.media_id, &self.deps.db_pool).await?;
        Ok((campaign, media))
    }
}
