//! Database fixtures and state helpers for pipeline tests.

use std::sync::Arc;
use std::time::Duration;

use castmatch_core::config::PipelineConfig;
use castmatch_core::domains::discovery::models::{Campaign, DiscoveryRecord, Media};
use castmatch_core::domains::matching::PostgresMatchWriter;
use castmatch_core::kernel::{
    BaseDescriptionService, BaseEnrichmentService, BaseVettingService, PipelineDeps,
};
use sqlx::PgPool;
use uuid::Uuid;

use super::fakes::complete_signals;

/// Config tuned for tests: small batches, quick timeouts
pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        vetting_threshold: 50,
        claim_batch_size: 10,
        stage_worker_limit: 4,
        collaborator_timeout: Duration::from_secs(5),
        stale_claim_after: Duration::from_secs(600),
        max_transient_attempts: 5,
        backoff_cap: Duration::from_secs(3600),
        failed_retry_cooldown: Duration::from_secs(1800),
        review_due_days: 3,
        ..PipelineConfig::default()
    }
}

pub fn make_deps(
    pool: &PgPool,
    enrichment: Arc<dyn BaseEnrichmentService>,
    description: Arc<dyn BaseDescriptionService>,
    vetting: Arc<dyn BaseVettingService>,
    config: PipelineConfig,
) -> PipelineDeps {
    let match_writer = Arc::new(PostgresMatchWriter::new(
        pool.clone(),
        config.review_due_days,
    ));
    PipelineDeps::new(
        pool.clone(),
        enrichment,
        description,
        vetting,
        match_writer,
        config,
    )
}

pub async fn seed_campaign(client_id: Uuid, pool: &PgPool) -> Campaign {
    Campaign::create(
        client_id,
        "B2B SaaS founder stories",
        serde_json::json!({"topics": ["saas", "founder journeys"], "audience": "b2b operators"}),
        pool,
    )
    .await
    .expect("seed campaign")
}

pub async fn seed_media(title: &str, pool: &PgPool) -> Media {
    Media::create(title, Some("https://example.com"), None, pool)
        .await
        .expect("seed media")
}

pub async fn seed_record(campaign: &Campaign, media: &Media, pool: &PgPool) -> DiscoveryRecord {
    DiscoveryRecord::create(campaign.id, media.id, pool)
        .await
        .expect("seed record")
}

/// Campaign + media + record in one go
pub async fn seed_pipeline_record(client_id: Uuid, pool: &PgPool) -> (Campaign, Media, DiscoveryRecord) {
    let campaign = seed_campaign(client_id, pool).await;
    let media = seed_media("The Operators Podcast", pool).await;
    let record = seed_record(&campaign, &media, pool).await;
    (campaign, media, record)
}

// =============================================================================
// Direct state manipulation (simulating prior pipeline progress or crashes)
// =============================================================================

/// Put a record's enrichment at completed, with signals on the media
pub async fn complete_enrichment_stage(record: &DiscoveryRecord, pool: &PgPool) {
    Media::apply_signals(record.media_id, &complete_signals(), pool)
        .await
        .expect("apply signals");
    sqlx::query(
        "UPDATE discovery_records SET enrichment_status = 'completed', updated_at = NOW() WHERE id = $1",
    )
    .bind(record.id)
    .execute(pool)
    .await
    .expect("complete enrichment");
}

/// Fill the media description directly
pub async fn fill_description(media_id: Uuid, pool: &PgPool) {
    Media::write_description(media_id, "A weekly show interviewing B2B operators.", pool)
        .await
        .expect("fill description");
}

/// Put a record at vetting completed with the given score
pub async fn complete_vetting_stage(record: &DiscoveryRecord, score: i32, pool: &PgPool) {
    complete_enrichment_stage(record, pool).await;
    fill_description(record.media_id, pool).await;
    sqlx::query(
        r#"
        UPDATE discovery_records
        SET vetting_status = 'completed',
            vetting_score = $2,
            vetting_reasoning = 'fixture',
            vetted_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(record.id)
    .bind(score)
    .execute(pool)
    .await
    .expect("complete vetting");
}

/// Backdate a stage claim so it reads as stale. `stage` is one of
/// enrichment/description/vetting.
pub async fn age_claim(record_id: Uuid, stage: &str, age_secs: i64, pool: &PgPool) {
    let sql = format!(
        "UPDATE discovery_records
         SET {stage}_claimed_at = NOW() - ($2 || ' seconds')::INTERVAL
         WHERE id = $1 AND {stage}_claimed_by IS NOT NULL",
    );
    let result = sqlx::query(&sql)
        .bind(record_id)
        .bind(age_secs.to_string())
        .execute(pool)
        .await
        .expect("age claim");
    assert_eq!(result.rows_affected(), 1, "no live {stage} claim to age");
}

/// Backdate updated_at (for cooldown-window tests)
pub async fn age_updated_at(record_id: Uuid, age_secs: i64, pool: &PgPool) {
    sqlx::query(
        "UPDATE discovery_records
         SET updated_at = NOW() - ($2 || ' seconds')::INTERVAL
         WHERE id = $1",
    )
    .bind(record_id)
    .bind(age_secs.to_string())
    .execute(pool)
    .await
    .expect("age updated_at");
}

/// Clear a retry backoff window so the record is immediately claimable
pub async fn clear_backoff(record_id: Uuid, pool: &PgPool) {
    sqlx::query(
        "UPDATE discovery_records
         SET enrichment_next_attempt_at = NULL, vetting_next_attempt_at = NULL
         WHERE id = $1",
    )
    .bind(record_id)
    .execute(pool)
    .await
    .expect("clear backoff");
}

/// Set the quota counter directly (for mid-week scenarios)
pub async fn set_quota_count(client_id: Uuid, count: i32, pool: &PgPool) {
    sqlx::query("UPDATE client_quotas SET current_count = $2 WHERE client_id = $1")
        .bind(client_id)
        .bind(count)
        .execute(pool)
        .await
        .expect("set quota count");
}

/// Push last_reset_at into the past (for weekly boundary tests)
pub async fn age_quota_reset(client_id: Uuid, age_days: i64, pool: &PgPool) {
    sqlx::query(
        "UPDATE client_quotas
         SET last_reset_at = NOW() - ($2 || ' days')::INTERVAL
         WHERE client_id = $1",
    )
    .bind(client_id)
    .bind(age_days.to_string())
    .execute(pool)
    .await
    .expect("age quota reset");
}
