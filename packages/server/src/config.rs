use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub pipeline: PipelineConfig,
}

/// Tunables for the pipeline engine.
///
/// Every value has a default; set the corresponding `CASTMATCH_*` variable
/// to override.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Global qualification threshold for vetting scores (0-100).
    /// Campaigns may override per-row via `vetting_threshold_override`.
    pub vetting_threshold: i32,
    /// Maximum records claimed per sweep, per stage.
    pub claim_batch_size: i64,
    /// Concurrent collaborator calls per stage sweep.
    pub stage_worker_limit: usize,
    /// Timeout for a single collaborator call. Expiry counts as transient.
    pub collaborator_timeout: Duration,
    /// Age after which a claim marker is considered stale and reclaimable.
    pub stale_claim_after: Duration,
    /// Transient failures allowed before a record is parked as failed.
    pub max_transient_attempts: i32,
    /// Cap for the exponential retry backoff.
    pub backoff_cap: Duration,
    /// How long a transient-failed record rests before the reconciler
    /// returns it to pending.
    pub failed_retry_cooldown: Duration,
    /// Review tasks come due this many days after match creation.
    pub review_due_days: i64,
    /// Cron expressions (6-field, tokio-cron-scheduler syntax) per task.
    pub enrichment_schedule: String,
    pub description_schedule: String,
    pub vetting_schedule: String,
    pub reconciler_schedule: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            vetting_threshold: 50,
            claim_batch_size: 10,
            stage_worker_limit: 4,
            collaborator_timeout: Duration::from_secs(30),
            stale_claim_after: Duration::from_secs(600),
            max_transient_attempts: 5,
            backoff_cap: Duration::from_secs(3600),
            failed_retry_cooldown: Duration::from_secs(1800),
            review_due_days: 3,
            // Description runs on a shorter interval: a missing description
            // is the most common blocker for vetting
            enrichment_schedule: "0 * * * * *".to_string(),
            description_schedule: "*/20 * * * * *".to_string(),
            vetting_schedule: "30 * * * * *".to_string(),
            reconciler_schedule: "0 */10 * * * *".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            pipeline: PipelineConfig::from_env()?,
        })
    }
}

impl PipelineConfig {
    /// Load tunables from the environment, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            vetting_threshold: env_parse("CASTMATCH_VETTING_THRESHOLD", defaults.vetting_threshold)?,
            claim_batch_size: env_parse("CASTMATCH_CLAIM_BATCH_SIZE", defaults.claim_batch_size)?,
            stage_worker_limit: env_parse("CASTMATCH_STAGE_WORKER_LIMIT", defaults.stage_worker_limit)?,
            collaborator_timeout: Duration::from_secs(env_parse(
                "CASTMATCH_COLLABORATOR_TIMEOUT_SECS",
                defaults.collaborator_timeout.as_secs(),
            )?),
            stale_claim_after: Duration::from_secs(env_parse(
                "CASTMATCH_STALE_CLAIM_SECS",
                defaults.stale_claim_after.as_secs(),
            )?),
            max_transient_attempts: env_parse(
                "CASTMATCH_MAX_TRANSIENT_ATTEMPTS",
                defaults.max_transient_attempts,
            )?,
            backoff_cap: Duration::from_secs(env_parse(
                "CASTMATCH_BACKOFF_CAP_SECS",
                defaults.backoff_cap.as_secs(),
            )?),
            failed_retry_cooldown: Duration::from_secs(env_parse(
                "CASTMATCH_FAILED_RETRY_COOLDOWN_SECS",
                defaults.failed_retry_cooldown.as_secs(),
            )?),
            review_due_days: env_parse("CASTMATCH_REVIEW_DUE_DAYS", defaults.review_due_days)?,
            enrichment_schedule: env::var("CASTMATCH_ENRICHMENT_SCHEDULE")
                .unwrap_or(defaults.enrichment_schedule),
            description_schedule: env::var("CASTMATCH_DESCRIPTION_SCHEDULE")
                .unwrap_or(defaults.description_schedule),
            vetting_schedule: env::var("CASTMATCH_VETTING_SCHEDULE")
                .unwrap_or(defaults.vetting_schedule),
            reconciler_schedule: env::var("CASTMATCH_RECONCILER_SCHEDULE")
                .unwrap_or(defaults.reconciler_schedule),
        })
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(var) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a valid number", var)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.vetting_threshold, 50);
        assert_eq!(config.claim_batch_size, 10);
        assert_eq!(config.max_transient_attempts, 5);
        assert!(config.stale_claim_after > config.collaborator_timeout);
    }

    #[test]
    fn test_env_parse_falls_back_to_default() {
        let value: i32 = env_parse("CASTMATCH_TEST_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }
}
