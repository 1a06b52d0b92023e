//! Scheduled pipeline tasks using tokio-cron-scheduler.
//!
//! Each stage runner and the reconciler registers as an independent
//! fixed-interval task. Distinct tasks run fully concurrently; a single
//! task never overlaps itself - a firing is skipped while the previous
//! invocation is still in flight (see [`TaskGate`]).
//!
//! ```text
//! Scheduler
//!     ├─► enrichment sweep   (every minute)
//!     ├─► description sweep  (every 20s - vetting's common bottleneck)
//!     ├─► vetting sweep      (every minute)
//!     └─► reconciler         (every 10 minutes)
//! ```
//!
//! Task-level failures are logged as operational alerts and never halt
//! the other tasks.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::discovery::pipeline::{
    DescriptionRunner, EnrichmentRunner, LockManager, Reconciler, VettingRunner,
};
use crate::domains::matching::MatchCreator;
use crate::kernel::PipelineDeps;

/// At-most-one-concurrent-execution guard, keyed by task name.
///
/// The running flag lives in an in-memory map behind a single mutex; the
/// flag itself flips via compare-and-swap so a slow firing can never be
/// entered twice. State is never shared beyond the scheduler.
#[derive(Default)]
pub struct TaskGate {
    flags: Mutex<HashMap<&'static str, Arc<AtomicBool>>>,
}

impl TaskGate {
    /// Try to enter the named task. Returns a guard that releases the
    /// task on drop, or None when the previous invocation is still
    /// running.
    pub fn try_begin(&self, name: &'static str) -> Option<TaskGuard> {
        let flag = {
            let mut flags = self.flags.lock().expect("task gate poisoned");
            flags.entry(name).or_default().clone()
        };

        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TaskGuard { flag })
    }
}

pub struct TaskGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Start all pipeline tasks
pub async fn start_scheduler(deps: PipelineDeps) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;
    let gate = Arc::new(TaskGate::default());

    let locks = Arc::new(LockManager::new(deps.db_pool.clone(), &deps.config));
    let match_creator = Arc::new(MatchCreator::new(
        deps.db_pool.clone(),
        deps.match_writer.clone(),
        deps.config.clone(),
    ));

    let enrichment = Arc::new(EnrichmentRunner::new(deps.clone(), locks.clone()));
    let description = Arc::new(DescriptionRunner::new(deps.clone(), locks.clone()));
    let vetting = Arc::new(VettingRunner::new(
        deps.clone(),
        locks.clone(),
        match_creator,
    ));
    let reconciler = Arc::new(Reconciler::new(
        deps.db_pool.clone(),
        locks,
        deps.config.clone(),
    ));

    let enrichment_job = {
        let runner = enrichment.clone();
        sweep_task(
            &deps.config.enrichment_schedule,
            "enrichment-sweep",
            gate.clone(),
            move || {
                let runner = runner.clone();
                async move { runner.run_once().await.map(|s| s.to_string()) }
            },
        )?
    };
    scheduler.add(enrichment_job).await?;

    let description_job = {
        let runner = description.clone();
        sweep_task(
            &deps.config.description_schedule,
            "description-sweep",
            gate.clone(),
            move || {
                let runner = runner.clone();
                async move { runner.run_once().await.map(|s| s.to_string()) }
            },
        )?
    };
    scheduler.add(description_job).await?;

    let vetting_job = {
        let runner = vetting.clone();
        sweep_task(
            &deps.config.vetting_schedule,
            "vetting-sweep",
            gate.clone(),
            move || {
                let runner = runner.clone();
                async move { runner.run_once().await.map(|s| s.to_string()) }
            },
        )?
    };
    scheduler.add(vetting_job).await?;

    let reconciler_job = {
        let runner = reconciler.clone();
        sweep_task(
            &deps.config.reconciler_schedule,
            "reconciler",
            gate,
            move || {
                let runner = runner.clone();
                async move { runner.run_once().await.map(|s| s.to_string()) }
            },
        )?
    };
    scheduler.add(reconciler_job).await?;

    scheduler.start().await?;

    tracing::info!(
        enrichment = %deps.config.enrichment_schedule,
        description = %deps.config.description_schedule,
        vetting = %deps.config.vetting_schedule,
        reconciler = %deps.config.reconciler_schedule,
        "pipeline tasks scheduled"
    );
    Ok(scheduler)
}

/// Wrap a runner invocation as a gated cron job
fn sweep_task<F, Fut>(
    schedule: &str,
    name: &'static str,
    gate: Arc<TaskGate>,
    run: F,
) -> Result<Job>
where
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    let job = Job::new_async(schedule, move |_uuid, _lock| {
        let gate = gate.clone();
        let run = run.clone();
        Box::pin(async move {
            let Some(_guard) = gate.try_begin(name) else {
                tracing::debug!(task = name, "previous invocation still running; skipping");
                return;
            };
            match run().await {
                Ok(summary) => tracing::info!(task = name, %summary, "sweep complete"),
                Err(e) => tracing::error!(task = name, error = %e, "task failed"),
            }
        })
    })?;
    Ok(job)
}
