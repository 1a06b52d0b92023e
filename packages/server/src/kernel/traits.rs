// Trait definitions for the external collaborators
//
// These are INFRASTRUCTURE traits only - no business logic. The pipeline
// treats enrichment, description generation, and scoring as black boxes
// behind these contracts; implementations are wired in by the embedding
// application (or by test fakes).
//
// Naming convention: Base* for trait names (e.g., BaseEnrichmentService)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Error taxonomy
// =============================================================================

/// How a collaborator failure should be treated by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "failure_kind", rename_all = "lowercase")]
pub enum FailureKind {
    /// Timeout, rate limit, network - retried with backoff
    Transient,
    /// The resource genuinely cannot be processed - never auto-retried
    Permanent,
}

impl FailureKind {
    /// Whether this failure kind should trigger an automatic retry
    pub fn should_retry(&self) -> bool {
        matches!(self, FailureKind::Transient)
    }
}

/// Error returned by any collaborator call.
///
/// Every collaborator error is caught at the stage-runner boundary,
/// classified by kind, and converted into a status/error-field write.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl CollaboratorError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CollaboratorError::Transient(_) => FailureKind::Transient,
            CollaboratorError::Permanent(_) => FailureKind::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind().should_retry()
    }

    /// A collaborator call that outlived its timeout counts as transient
    pub fn timeout(what: &str) -> Self {
        CollaboratorError::Transient(format!("{} timed out", what))
    }
}

// =============================================================================
// Value types exchanged with collaborators
// =============================================================================

/// Social/quality signals computed by the enrichment collaborator.
///
/// All fields are optional; `is_complete` gates quality readiness.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentSignals {
    pub audience_estimate: Option<i32>,
    pub social_reach: Option<i32>,
    pub episode_count: Option<i32>,
    pub publish_cadence_days: Option<i32>,
}

impl EnrichmentSignals {
    /// True when every signal the aggregate depends on is present
    pub fn is_complete(&self) -> bool {
        self.audience_estimate.is_some()
            && self.social_reach.is_some()
            && self.episode_count.is_some()
    }
}

/// Flattened media view handed to the scoring collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaProfile {
    pub media_id: Uuid,
    pub title: String,
    pub description: String,
    pub quality_score: Option<i32>,
    pub audience_estimate: Option<i32>,
    pub social_reach: Option<i32>,
    pub episode_count: Option<i32>,
}

/// Result of scoring a candidate against campaign criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VettingOutcome {
    /// 0-100; clamped at the trait boundary
    pub score: i32,
    pub reasoning: String,
}

impl VettingOutcome {
    pub fn new(score: i32, reasoning: impl Into<String>) -> Self {
        Self {
            score: score.clamp(0, 100),
            reasoning: reasoning.into(),
        }
    }
}

// =============================================================================
// Collaborator contracts
// =============================================================================

/// Computes social/quality signals for a media profile.
#[async_trait]
pub trait BaseEnrichmentService: Send + Sync {
    async fn enrich_media(&self, media_id: Uuid) -> Result<EnrichmentSignals, CollaboratorError>;
}

/// Generates the AI description for a media profile.
#[async_trait]
pub trait BaseDescriptionService: Send + Sync {
    async fn generate_description(&self, media_id: Uuid) -> Result<String, CollaboratorError>;
}

/// Scores a candidate pairing against campaign criteria.
#[async_trait]
pub trait BaseVettingService: Send + Sync {
    async fn score_candidate(
        &self,
        criteria: &serde_json::Value,
        profile: &MediaProfile,
    ) -> Result<VettingOutcome, CollaboratorError>;
}

/// Writes the match suggestion and its review task for a qualifying record.
///
/// Downstream consumer boundary: the pipeline only invokes creation, never
/// mutates these rows afterwards.
#[async_trait]
pub trait BaseMatchWriter: Send + Sync {
    /// Returns the id of the created (or already existing) match suggestion.
    async fn create_match_and_review_task(
        &self,
        discovery_record_id: Uuid,
        campaign_id: Uuid,
        media_id: Uuid,
        vetting_score: i32,
    ) -> anyhow::Result<Uuid>;
}
