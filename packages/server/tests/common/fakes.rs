//! Programmable collaborator fakes.
//!
//! Each fake pops from a scripted queue of outcomes, falling back to a
//! default once the script runs dry, and counts calls for assertions.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use castmatch_core::kernel::{
    BaseDescriptionService, BaseEnrichmentService, BaseVettingService, CollaboratorError,
    EnrichmentSignals, MediaProfile, VettingOutcome,
};
use uuid::Uuid;

/// A scripted collaborator response
#[derive(Debug, Clone)]
pub enum FakeOutcome<T> {
    Ok(T),
    Transient(&'static str),
    Permanent(&'static str),
}

impl<T: Clone> FakeOutcome<T> {
    fn into_result(self) -> Result<T, CollaboratorError> {
        match self {
            FakeOutcome::Ok(value) => Ok(value),
            FakeOutcome::Transient(msg) => Err(CollaboratorError::Transient(msg.to_string())),
            FakeOutcome::Permanent(msg) => Err(CollaboratorError::Permanent(msg.to_string())),
        }
    }
}

struct Script<T> {
    queue: Mutex<VecDeque<FakeOutcome<T>>>,
    default: FakeOutcome<T>,
    calls: AtomicUsize,
}

impl<T: Clone> Script<T> {
    fn new(default: FakeOutcome<T>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            default,
            calls: AtomicUsize::new(0),
        }
    }

    fn push(&self, outcome: FakeOutcome<T>) {
        self.queue.lock().unwrap().push_back(outcome);
    }

    fn next(&self) -> Result<T, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.queue.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.default.clone()).into_result()
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn complete_signals() -> EnrichmentSignals {
    EnrichmentSignals {
        audience_estimate: Some(25_000),
        social_reach: Some(8_000),
        episode_count: Some(140),
        publish_cadence_days: Some(7),
    }
}

// =============================================================================
// Enrichment fake
// =============================================================================

pub struct FakeEnrichment {
    script: Script<EnrichmentSignals>,
}

impl FakeEnrichment {
    /// Always succeeds with complete signals
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            script: Script::new(FakeOutcome::Ok(complete_signals())),
        })
    }

    pub fn failing_transient(msg: &'static str) -> Arc<Self> {
        Arc::new(Self {
            script: Script::new(FakeOutcome::Transient(msg)),
        })
    }

    pub fn failing_permanent(msg: &'static str) -> Arc<Self> {
        Arc::new(Self {
            script: Script::new(FakeOutcome::Permanent(msg)),
        })
    }

    pub fn push(&self, outcome: FakeOutcome<EnrichmentSignals>) {
        self.script.push(outcome);
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl BaseEnrichmentService for FakeEnrichment {
    async fn enrich_media(&self, _media_id: Uuid) -> Result<EnrichmentSignals, CollaboratorError> {
        self.script.next()
    }
}

// =============================================================================
// Description fake
// =============================================================================

pub struct FakeDescription {
    script: Script<String>,
}

impl FakeDescription {
    pub fn ok(text: &str) -> Arc<Self> {
        Arc::new(Self {
            script: Script::new(FakeOutcome::Ok(text.to_string())),
        })
    }

    pub fn failing_transient(msg: &'static str) -> Arc<Self> {
        Arc::new(Self {
            script: Script::new(FakeOutcome::Transient(msg)),
        })
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl BaseDescriptionService for FakeDescription {
    async fn generate_description(&self, _media_id: Uuid) -> Result<String, CollaboratorError> {
        self.script.next()
    }
}

// =============================================================================
// Vetting fake
// =============================================================================

pub struct FakeVetting {
    script: Script<VettingOutcome>,
}

impl FakeVetting {
    pub fn scoring(score: i32) -> Arc<Self> {
        Arc::new(Self {
            script: Script::new(FakeOutcome::Ok(VettingOutcome::new(score, "scripted fit"))),
        })
    }

    pub fn failing_transient(msg: &'static str) -> Arc<Self> {
        Arc::new(Self {
            script: Script::new(FakeOutcome::Transient(msg)),
        })
    }

    pub fn failing_permanent(msg: &'static str) -> Arc<Self> {
        Arc::new(Self {
            script: Script::new(FakeOutcome::Permanent(msg)),
        })
    }

    pub fn calls(&self) -> usize {
        self.script.calls()
    }
}

#[async_trait]
impl BaseVettingService for FakeVetting {
    async fn score_candidate(
        &self,
        _criteria: &serde_json::Value,
        _profile: &MediaProfile,
    ) -> Result<VettingOutcome, CollaboratorError> {
        self.script.next()
    }
}
