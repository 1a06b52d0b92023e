//! Match creation for qualifying discovery records.
//!
//! Invoked inline by the vetting stage runner immediately after a
//! qualifying score lands, and by the operator-triggered quota-aware retry
//! sweep for records previously parked as `limited`.
//!
//! The quota's atomic check-and-increment is the only guard against burst
//! over-creation: C concurrent qualifying records against allowance A
//! yield exactly min(C, A) matches.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::domains::discovery::models::{Campaign, DiscoveryRecord};
use crate::kernel::traits::BaseMatchWriter;

use super::models::{ClientQuota, MatchSuggestion, ReviewTask};

/// Result of attempting match creation for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Quota allowed; suggestion and review task exist, record flagged
    Created,
    /// Quota denied; record parked as limited
    Limited,
    /// Score below the campaign's effective threshold (retry sweep only)
    NotQualified,
}

/// Summary of an operator retry sweep over limited records
#[derive(Debug, Default, Clone, Copy)]
pub struct RetrySummary {
    pub examined: usize,
    pub created: usize,
    pub still_limited: usize,
    pub not_qualified: usize,
}

pub struct MatchCreator {
    pool: PgPool,
    match_writer: Arc<dyn BaseMatchWriter>,
    config: PipelineConfig,
}

impl MatchCreator {
    pub fn new(
        pool: PgPool,
        match_writer: Arc<dyn BaseMatchWriter>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            pool,
            match_writer,
            config,
        }
    }

    /// Create a match for a record that just received a qualifying score.
    ///
    /// The caller has already checked the threshold; this only arbitrates
    /// quota and performs the writes.
    pub async fn create_for_record(&self, record: &DiscoveryRecord) -> Result<MatchOutcome> {
        let score = record
            .vetting_score
            .context("record has no vetting score")?;

        let campaign = Campaign::find_by_id(record.campaign_id, &self.pool).await?;

        if ClientQuota::find_by_client(campaign.client_id, &self.pool)
            .await?
            .is_none()
        {
            warn!(
                client_id = %campaign.client_id,
                record_id = %record.id,
                "no quota row for client; treating as exhausted"
            );
        }

        match ClientQuota::check_and_increment(campaign.client_id, &self.pool).await? {
            Some(quota) => {
                let match_id = self
                    .match_writer
                    .create_match_and_review_task(
                        record.id,
                        record.campaign_id,
                        record.media_id,
                        score,
                    )
                    .await?;
                DiscoveryRecord::mark_match_created(record.id, &self.pool).await?;

                info!(
                    record_id = %record.id,
                    match_id = %match_id,
                    score,
                    quota_used = quota.current_count,
                    quota_allowance = quota.weekly_allowance,
                    "match suggestion created"
                );
                Ok(MatchOutcome::Created)
            }
            None => {
                DiscoveryRecord::mark_limited(record.id, &self.pool).await?;
                info!(
                    record_id = %record.id,
                    client_id = %campaign.client_id,
                    "weekly quota exhausted; record parked as limited"
                );
                Ok(MatchOutcome::Limited)
            }
        }
    }

    /// Operator-triggered sweep: re-admit quota-limited records for a
    /// client, oldest vetted first, under the same quota gate. Never
    /// re-scores.
    pub async fn retry_quota_limited(&self, client_id: Uuid, limit: i64) -> Result<RetrySummary> {
        let records =
            DiscoveryRecord::find_limited_for_client(client_id, limit, &self.pool).await?;

        let mut summary = RetrySummary {
            examined: records.len(),
            ..Default::default()
        };

        for record in records {
            let campaign = Campaign::find_by_id(record.campaign_id, &self.pool).await?;
            let threshold = campaign.effective_threshold(self.config.vetting_threshold);

            let qualifies = record.vetting_score.map(|s| s >= threshold).unwrap_or(false);
            if !qualifies {
                // Criteria changed underneath the parked record; leave it
                // for an explicit re-vet instead of matching on a stale score
                debug!(record_id = %record.id, "limited record no longer qualifies");
                summary.not_qualified += 1;
                continue;
            }

            match self.create_for_record(&record).await? {
                MatchOutcome::Created => summary.created += 1,
                MatchOutcome::Limited => summary.still_limited += 1,
                MatchOutcome::NotQualified => summary.not_qualified += 1,
            }
        }

        Ok(summary)
    }
}

/// Default match writer: creates the suggestion and review task rows in
/// Postgres. The suggestion is create-once per record; the review task is
/// only written alongside a newly created suggestion.
pub struct PostgresMatchWriter {
    pool: PgPool,
    review_due_days: i64,
}

impl PostgresMatchWriter {
    pub fn new(pool: PgPool, review_due_days: i64) -> Self {
        Self {
            pool,
            review_due_days,
        }
    }
}

#[async_trait]
impl BaseMatchWriter for PostgresMatchWriter {
    async fn create_match_and_review_task(
        &self,
        discovery_record_id: Uuid,
        campaign_id: Uuid,
        media_id: Uuid,
        vetting_score: i32,
    ) -> Result<Uuid> {
        let (suggestion, newly_created) = MatchSuggestion::create(
            discovery_record_id,
            campaign_id,
            media_id,
            vetting_score,
            &self.pool,
        )
        .await?;

        if newly_created {
            let due_at = Utc::now() + Duration::days(self.review_due_days);
            ReviewTask::create(suggestion.id, campaign_id, due_at, &self.pool).await?;
        } else {
            debug!(
                record_id = %discovery_record_id,
                suggestion_id = %suggestion.id,
                "match suggestion already existed"
            );
        }

        Ok(suggestion.id)
    }
}
