//! Lock manager integration tests: mutual exclusion, stale reclaim, and
//! release semantics over a real Postgres.

mod common;

use std::collections::HashSet;

use castmatch_core::domains::discovery::models::{DiscoveryRecord, Stage, StageStatus};
use castmatch_core::domains::discovery::pipeline::LockManager;
use castmatch_core::kernel::FailureKind;
use common::*;
use test_context::test_context;
use uuid::Uuid;

#[test_context(TestHarness)]
#[tokio::test]
async fn concurrent_claims_are_disjoint(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let campaign = seed_campaign(Uuid::new_v4(), pool).await;

    let mut backlog = HashSet::new();
    for i in 0..20 {
        let media = seed_media(&format!("Podcast {}", i), pool).await;
        let record = seed_record(&campaign, &media, pool).await;
        backlog.insert(record.id);
    }

    let config = test_config();
    let managers: Vec<_> = (0..4).map(|_| LockManager::new(pool.clone(), &config)).collect();

    let claims = futures::future::join_all(
        managers
            .iter()
            .map(|manager| manager.try_claim(Stage::Enrichment, 10)),
    )
    .await;

    let mut seen = HashSet::new();
    let mut total = 0;
    for batch in claims {
        for record in batch.expect("claim") {
            total += 1;
            assert!(
                seen.insert(record.id),
                "record {} claimed by two workers",
                record.id
            );
            assert!(backlog.contains(&record.id));
        }
    }
    // Every ready record claimed exactly once across all callers
    assert_eq!(total, 20);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn claim_sets_marker_and_status(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let (_, _, record) = seed_pipeline_record(Uuid::new_v4(), pool).await;

    let manager = LockManager::new(pool.clone(), &test_config());
    let claimed = manager.try_claim(Stage::Enrichment, 10).await.unwrap();
    assert_eq!(claimed.len(), 1);

    let fresh = DiscoveryRecord::find_by_id(record.id, pool).await.unwrap();
    assert_eq!(fresh.enrichment_status, StageStatus::InProgress);
    assert_eq!(
        fresh.enrichment_claimed_by.as_deref(),
        Some(manager.worker_token())
    );
    assert!(fresh.enrichment_claimed_at.is_some());

    // A second caller finds nothing while the claim is live
    let other = LockManager::new(pool.clone(), &test_config());
    assert!(other.try_claim(Stage::Enrichment, 10).await.unwrap().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn stale_claim_is_reclaimable_by_try_claim(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let (_, _, record) = seed_pipeline_record(Uuid::new_v4(), pool).await;

    let crashed = LockManager::new(pool.clone(), &test_config());
    let claimed = crashed.try_claim(Stage::Enrichment, 10).await.unwrap();
    assert_eq!(claimed.len(), 1);

    // The worker dies without releasing; its marker ages past the threshold
    age_claim(record.id, "enrichment", 601, pool).await;

    let successor = LockManager::new(pool.clone(), &test_config());
    let reclaimed = successor.try_claim(Stage::Enrichment, 10).await.unwrap();
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].id, record.id);
    assert_eq!(
        reclaimed[0].enrichment_claimed_by.as_deref(),
        Some(successor.worker_token())
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn crashed_vetting_worker_record_recovers(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let (_, _, record) = seed_pipeline_record(Uuid::new_v4(), pool).await;
    complete_enrichment_stage(&record, pool).await;
    fill_description(record.media_id, pool).await;

    let crashed = LockManager::new(pool.clone(), &test_config());
    assert_eq!(crashed.try_claim(Stage::Vetting, 10).await.unwrap().len(), 1);

    age_claim(record.id, "vetting", 700, pool).await;

    // CleanupStale returns the record to pending...
    let janitor = LockManager::new(pool.clone(), &test_config());
    assert_eq!(janitor.cleanup_stale(Stage::Vetting).await.unwrap(), 1);

    let fresh = DiscoveryRecord::find_by_id(record.id, pool).await.unwrap();
    assert_eq!(fresh.vetting_status, StageStatus::Pending);
    assert!(fresh.vetting_claimed_by.is_none());
    assert_eq!(fresh.vetting_error_kind, Some(FailureKind::Transient));

    // ...and a later claim picks it up again
    let reclaimed = janitor.try_claim(Stage::Vetting, 10).await.unwrap();
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].id, record.id);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn release_success_advances_status(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let (_, _, record) = seed_pipeline_record(Uuid::new_v4(), pool).await;

    let manager = LockManager::new(pool.clone(), &test_config());
    manager.try_claim(Stage::Enrichment, 10).await.unwrap();

    let released = manager
        .release_enrichment_success(record.id)
        .await
        .unwrap()
        .expect("release should hit our claim");
    assert_eq!(released.enrichment_status, StageStatus::Completed);
    assert!(released.enrichment_claimed_by.is_none());
    assert!(released.enrichment_error.is_none());
    assert_eq!(released.enrichment_attempts, 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn transient_failure_backs_off_then_parks_as_failed(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let (_, _, record) = seed_pipeline_record(Uuid::new_v4(), pool).await;

    let mut config = test_config();
    config.max_transient_attempts = 2;
    let manager = LockManager::new(pool.clone(), &config);

    // First transient failure: back to pending behind a backoff window
    manager.try_claim(Stage::Enrichment, 10).await.unwrap();
    manager
        .release_failure(record.id, Stage::Enrichment, "rate limited", FailureKind::Transient)
        .await
        .unwrap();

    let fresh = DiscoveryRecord::find_by_id(record.id, pool).await.unwrap();
    assert_eq!(fresh.enrichment_status, StageStatus::Pending);
    assert_eq!(fresh.enrichment_attempts, 1);
    assert_eq!(fresh.enrichment_error.as_deref(), Some("rate limited"));
    let next_attempt = fresh.enrichment_next_attempt_at.expect("backoff window set");
    assert!(next_attempt > chrono::Utc::now());

    // The backoff window hides it from claims
    assert!(manager.try_claim(Stage::Enrichment, 10).await.unwrap().is_empty());

    // Second transient failure exhausts the budget and parks the record
    clear_backoff(record.id, pool).await;
    manager.try_claim(Stage::Enrichment, 10).await.unwrap();
    manager
        .release_failure(record.id, Stage::Enrichment, "rate limited", FailureKind::Transient)
        .await
        .unwrap();

    let parked = DiscoveryRecord::find_by_id(record.id, pool).await.unwrap();
    assert_eq!(parked.enrichment_status, StageStatus::Failed);
    assert_eq!(parked.enrichment_error_kind, Some(FailureKind::Transient));
    assert_eq!(parked.enrichment_attempts, 2);
    assert!(manager.try_claim(Stage::Enrichment, 10).await.unwrap().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn permanent_failure_is_never_reclaimed(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let (_, _, record) = seed_pipeline_record(Uuid::new_v4(), pool).await;

    let manager = LockManager::new(pool.clone(), &test_config());
    manager.try_claim(Stage::Enrichment, 10).await.unwrap();
    manager
        .release_failure(
            record.id,
            Stage::Enrichment,
            "feed no longer resolves",
            FailureKind::Permanent,
        )
        .await
        .unwrap();

    let fresh = DiscoveryRecord::find_by_id(record.id, pool).await.unwrap();
    assert_eq!(fresh.enrichment_status, StageStatus::Failed);
    assert_eq!(fresh.enrichment_error_kind, Some(FailureKind::Permanent));
    assert!(fresh.enrichment_next_attempt_at.is_none());

    assert!(manager.try_claim(Stage::Enrichment, 10).await.unwrap().is_empty());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn release_with_foreign_token_is_a_noop(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let (_, _, record) = seed_pipeline_record(Uuid::new_v4(), pool).await;

    let owner = LockManager::new(pool.clone(), &test_config());
    owner.try_claim(Stage::Enrichment, 10).await.unwrap();

    // A different worker (e.g., one whose stale claim was reclaimed)
    // cannot release or fail the current owner's claim
    let stranger = LockManager::new(pool.clone(), &test_config());
    assert!(stranger
        .release_enrichment_success(record.id)
        .await
        .unwrap()
        .is_none());
    assert!(stranger
        .release_failure(record.id, Stage::Enrichment, "boom", FailureKind::Transient)
        .await
        .unwrap()
        .is_none());

    let fresh = DiscoveryRecord::find_by_id(record.id, pool).await.unwrap();
    assert_eq!(fresh.enrichment_status, StageStatus::InProgress);
    assert_eq!(
        fresh.enrichment_claimed_by.as_deref(),
        Some(owner.worker_token())
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn claim_respects_batch_size(ctx: &TestHarness) {
    let pool = &ctx.db_pool;
    let campaign = seed_campaign(Uuid::new_v4(), pool).await;
    for i in 0..5 {
        let media = seed_media(&format!("Show {}", i), pool).await;
        seed_record(&campaign, &media, pool).await;
    }

    let manager = LockManager::new(pool.clone(), &test_config());
    let claimed = manager.try_claim(Stage::Enrichment, 3).await.unwrap();
    assert_eq!(claimed.len(), 3);

    let rest = manager.try_claim(Stage::Enrichment, 10).await.unwrap();
    assert_eq!(rest.len(), 2);
}
