// Main entry point for the pipeline daemon

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use castmatch_core::domains::matching::PostgresMatchWriter;
use castmatch_core::kernel::scheduled_tasks::start_scheduler;
use castmatch_core::kernel::{
    BaseDescriptionService, BaseEnrichmentService, BaseVettingService, CollaboratorError,
    EnrichmentSignals, MediaProfile, PipelineDeps, VettingOutcome,
};
use castmatch_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Stand-in for provider integrations that are linked in by the embedding
/// deployment. Calls fail transient, so records back off and retry instead
/// of parking as permanently failed.
// TODO: wire the production enrichment, description, and scoring providers
struct UnwiredProvider(&'static str);

#[async_trait]
impl BaseEnrichmentService for UnwiredProvider {
    async fn enrich_media(&self, _media_id: Uuid) -> Result<EnrichmentSignals, CollaboratorError> {
        Err(CollaboratorError::Transient(format!(
            "{} provider not wired",
            self.0
        )))
    }
}

#[async_trait]
impl BaseDescriptionService for UnwiredProvider {
    async fn generate_description(&self, _media_id: Uuid) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Transient(format!(
            "{} provider not wired",
            self.0
        )))
    }
}

#[async_trait]
impl BaseVettingService for UnwiredProvider {
    async fn score_candidate(
        &self,
        _criteria: &serde_json::Value,
        _profile: &MediaProfile,
    ) -> Result<VettingOutcome, CollaboratorError> {
        Err(CollaboratorError::Transient(format!(
            "{} provider not wired",
            self.0
        )))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,castmatch_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting castmatch discovery pipeline");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    tracing::warn!(
        "enrichment/description/vetting providers are not wired; stage sweeps will back off until they are"
    );

    let match_writer = Arc::new(PostgresMatchWriter::new(
        pool.clone(),
        config.pipeline.review_due_days,
    ));
    let deps = PipelineDeps::new(
        pool,
        Arc::new(UnwiredProvider("enrichment")),
        Arc::new(UnwiredProvider("description")),
        Arc::new(UnwiredProvider("vetting")),
        match_writer,
        config.pipeline,
    );

    let mut scheduler = start_scheduler(deps)
        .await
        .context("Failed to start scheduler")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received, stopping scheduler");

    scheduler
        .shutdown()
        .await
        .context("Failed to shut down scheduler")?;

    Ok(())
}
