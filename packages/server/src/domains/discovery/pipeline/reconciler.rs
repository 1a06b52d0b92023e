//! Health reconciler.
//!
//! Periodic repair pass over pipeline bookkeeping, run independently of
//! the forward stages. It fixes inconsistent states that crashes leave
//! behind so production never needs one-off repair scripts:
//!
//! 1. Records still pending enrichment whose media already carries every
//!    signal are force-advanced (a signal write whose status update was
//!    lost).
//! 2. Stale claims are reclaimed across all stages.
//! 3. Transient-failed records past the cooldown return to pending;
//!    permanent failures are left for the operator.
//! 4. Media with complete raw signals but no derived aggregate get it
//!    recomputed.
//!
//! The reconciler never advances a record into match creation.

use std::sync::Arc;

use anyhow::Result;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::domains::discovery::models::{DiscoveryRecord, Media};

use super::locks::LockManager;

#[derive(Debug, Default, Clone, Copy)]
pub struct ReconcileSummary {
    pub enrichment_advanced: u64,
    pub stale_claims_cleared: u64,
    pub transient_failures_reset: u64,
    pub aggregates_recomputed: u64,
}

impl ReconcileSummary {
    pub fn is_clean(&self) -> bool {
        self.enrichment_advanced == 0
            && self.stale_claims_cleared == 0
            && self.transient_failures_reset == 0
            && self.aggregates_recomputed == 0
    }
}

impl std::fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "advanced={} stale_cleared={} failures_reset={} aggregates={}",
            self.enrichment_advanced,
            self.stale_claims_cleared,
            self.transient_failures_reset,
            self.aggregates_recomputed
        )
    }
}

pub struct Reconciler {
    pool: PgPool,
    locks: Arc<LockManager>,
    config: PipelineConfig,
}

impl Reconciler {
    pub fn new(pool: PgPool, locks: Arc<LockManager>, config: PipelineConfig) -> Self {
        Self {
            pool,
            locks,
            config,
        }
    }

    pub async fn run_once(&self) -> Result<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();

        summary.enrichment_advanced = DiscoveryRecord::force_advance_enriched(&self.pool).await?;

        summary.stale_claims_cleared = self.locks.cleanup_stale_all().await?;

        let cooldown = self.config.failed_retry_cooldown.as_secs() as i64;
        summary.transient_failures_reset =
            DiscoveryRecord::reset_transient_enrichment_failures(cooldown, &self.pool).await?
                + DiscoveryRecord::reset_transient_vetting_failures(cooldown, &self.pool).await?;

        let orphaned =
            Media::find_missing_aggregate(self.config.claim_batch_size, &self.pool).await?;
        for media in orphaned {
            Media::recompute_aggregate(media.id, &self.pool).await?;
            summary.aggregates_recomputed += 1;
        }

        if summary.is_clean() {
            info!("reconciler pass: state consistent");
        } else {
            warn!(%summary, "reconciler repaired inconsistent state");
        }
        Ok(summary)
    }
}
