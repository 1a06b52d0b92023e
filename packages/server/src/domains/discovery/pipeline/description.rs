//! AI description stage runner.
//!
//! Fills `media.ai_description` for records whose enrichment completed.
//! Runs on a shorter interval than enrichment: a missing description is
//! the most common blocker for vetting, and filling it must not require a
//! full enrichment re-run.
//!
//! Description work is keyed on the media, claimed through the record.
//! Claimed records are grouped by media in-process so one media is
//! described once per sweep; the final write re-checks that the
//! description is still absent, which makes repeats harmless.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use futures::{stream, StreamExt};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::domains::discovery::models::{DiscoveryRecord, Media, Stage};
use crate::kernel::traits::{CollaboratorError, FailureKind};
use crate::kernel::PipelineDeps;

use super::locks::LockManager;
use super::{StageOutcome, SweepSummary};

pub struct DescriptionRunner {
    deps: PipelineDeps,
    locks: Arc<LockManager>,
}

impl DescriptionRunner {
    pub fn new(deps: PipelineDeps, locks: Arc<LockManager>) -> Self {
        Self { deps, locks }
    }

    pub async fn run_once(&self) -> Result<SweepSummary> {
        let batch = self
            .locks
            .try_claim(Stage::Description, self.deps.config.claim_batch_size)
            .await?;

        let mut summary = SweepSummary {
            claimed: batch.len(),
            ..Default::default()
        };
        if batch.is_empty() {
            return Ok(summary);
        }

        let mut by_media: HashMap<Uuid, Vec<DiscoveryRecord>> = HashMap::new();
        for record in batch {
            by_media.entry(record.media_id).or_default().push(record);
        }

        let outcomes: Vec<StageOutcome> = stream::iter(by_media)
            .map(|(media_id, records)| self.process_media(media_id, records))
            .buffer_unordered(self.deps.config.stage_worker_limit)
            .collect()
            .await;

        for outcome in outcomes {
            summary.absorb(outcome);
        }
        Ok(summary)
    }

    /// Generate and write the description for one media, then drop every
    /// claim that rode along for it.
    async fn process_media(&self, media_id: Uuid, records: Vec<DiscoveryRecord>) -> StageOutcome {
        let result = match tokio::time::timeout(
            self.deps.config.collaborator_timeout,
            self.deps.description.generate_description(media_id),
        )
        .await
        {
            Ok(inner) => inner,
            Err(_) => Err(CollaboratorError::timeout("description")),
        };

        let outcome = match result {
            Ok(text) => match Media::write_description(media_id, &text, &self.deps.db_pool).await {
                Ok(wrote) => {
                    if wrote {
                        debug!(media_id = %media_id, "ai description written");
                    } else {
                        debug!(media_id = %media_id, "ai description already present");
                    }
                    StageOutcome::Succeeded
                }
                Err(e) => {
                    error!(media_id = %media_id, error = %e, "failed to write description");
                    StageOutcome::Error
                }
            },
            Err(err) => {
                // No persisted description status exists: releasing the
                // claim is enough, the media stays eligible next sweep
                warn!(media_id = %media_id, error = %err, "description collaborator failed");
                match err.kind() {
                    FailureKind::Transient => StageOutcome::TransientFailure,
                    FailureKind::Permanent => StageOutcome::PermanentFailure,
                }
            }
        };

        for record in &records {
            if let Err(e) = self.locks.release_description(record.id).await {
                error!(record_id = %record.id, error = %e, "failed to release description claim");
            }
        }
        outcome
    }
}
