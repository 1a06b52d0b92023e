//! Pipeline dependencies (using traits for testability)
//!
//! Central dependency container handed to every stage runner and to the
//! scheduler. All external services use trait abstractions so tests can
//! substitute fakes.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::PipelineConfig;
use crate::kernel::traits::{
    BaseDescriptionService, BaseEnrichmentService, BaseMatchWriter, BaseVettingService,
};

/// Dependencies accessible to stage runners
#[derive(Clone)]
pub struct PipelineDeps {
    pub db_pool: PgPool,
    pub enrichment: Arc<dyn BaseEnrichmentService>,
    pub description: Arc<dyn BaseDescriptionService>,
    pub vetting: Arc<dyn BaseVettingService>,
    pub match_writer: Arc<dyn BaseMatchWriter>,
    pub config: PipelineConfig,
}

impl PipelineDeps {
    pub fn new(
        db_pool: PgPool,
        enrichment: Arc<dyn BaseEnrichmentService>,
        description: Arc<dyn BaseDescriptionService>,
        vetting: Arc<dyn BaseVettingService>,
        match_writer: Arc<dyn BaseMatchWriter>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            db_pool,
            enrichment,
            description,
            vetting,
            match_writer,
            config,
        }
    }
}
