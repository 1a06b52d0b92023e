//! Operator CLI for the discovery pipeline
//!
//! Read-only status plus the two operator interventions the pipeline
//! supports: force re-vet and the quota-aware retry of limited records.
//! Outputs JSON for scripting.

use std::sync::Arc;

use anyhow::{Context, Result};
use castmatch_core::domains::discovery::models::{DiscoveryRecord, StatusCount};
use castmatch_core::domains::matching::{MatchCreator, PostgresMatchWriter};
use castmatch_core::Config;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "ops_cli")]
#[command(about = "Operator tooling for the discovery pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Per-campaign status counts
    Status { campaign_id: Uuid },

    /// Reset a record for re-vetting (archives the current score)
    ForceRevet { record_id: Uuid },

    /// Re-admit quota-limited records for a client under the current quota
    RetryLimited {
        client_id: Uuid,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
}

#[derive(Serialize)]
struct Response {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    counts: Option<Vec<StatusCount>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry: Option<RetryResponse>,
}

#[derive(Serialize)]
struct RetryResponse {
    examined: usize,
    created: usize,
    still_limited: usize,
    not_qualified: usize,
}

impl Response {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            counts: None,
            retry: None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let response = match cli.command {
        Commands::Migrate => {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run migrations")?;
            Response::ok("migrations applied")
        }
        Commands::Status { campaign_id } => {
            let counts = DiscoveryRecord::status_counts(campaign_id, &pool).await?;
            Response {
                success: true,
                message: None,
                counts: Some(counts),
                retry: None,
            }
        }
        Commands::ForceRevet { record_id } => {
            let stale_secs = config.pipeline.stale_claim_after.as_secs() as i64;
            let record = DiscoveryRecord::force_revet(record_id, stale_secs, &pool).await?;
            Response::ok(format!(
                "record {} reset to vetting_status={}",
                record.id, record.vetting_status
            ))
        }
        Commands::RetryLimited { client_id, limit } => {
            let creator = match_creator(&pool, &config);
            let summary = creator.retry_quota_limited(client_id, limit).await?;
            Response {
                success: true,
                message: None,
                counts: None,
                retry: Some(RetryResponse {
                    examined: summary.examined,
                    created: summary.created,
                    still_limited: summary.still_limited,
                    not_qualified: summary.not_qualified,
                }),
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn match_creator(pool: &PgPool, config: &Config) -> MatchCreator {
    let writer = Arc::new(PostgresMatchWriter::new(
        pool.clone(),
        config.pipeline.review_due_days,
    ));
    MatchCreator::new(pool.clone(), writer, config.pipeline.clone())
}
