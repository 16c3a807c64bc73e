//! ABOUTME: Concurrency-capped dispatch of pipeline tasks with cancel signalling
//! ABOUTME: Tracks one cancellation token per active job

use crate::pipeline::{run_job, PipelineContext};
use fa_core::Id;
use metrics::counter;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Result of delivering a cancel signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelSignal {
    /// The signal reached an active pipeline task
    Requested,
    /// The token had already been fired
    AlreadyRequested,
    /// No active task is tracked for that job
    NotTracked,
}

type ControlMap = Arc<Mutex<HashMap<Id, CancellationToken>>>;

/// Spawns pipeline tasks, capping how many run at once. Queued jobs wait on
/// the semaphore; their cancellation token is live from the moment of spawn,
/// so a queued job can be cancelled before it starts.
pub struct Dispatcher {
    semaphore: Arc<Semaphore>,
    controls: ControlMap,
}

impl Dispatcher {
    pub fn new(max_concurrent_jobs: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent_jobs)),
            controls: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Dispatch a pipeline task for a stored job.
    pub fn spawn(&self, ctx: Arc<PipelineContext>, job_id: Id) {
        let cancel = CancellationToken::new();
        Self::insert(&self.controls, job_id, cancel.clone());

        let controls = Arc::clone(&self.controls);
        let semaphore = Arc::clone(&self.semaphore);
        tokio::spawn(async move {
            // A queued job must honor cancellation without waiting for a
            // slot; it goes straight to cancelled.
            let _permit = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(job_id = %job_id, "Cancelled while waiting for a pipeline slot");
                    ctx.store.append_log(&job_id, "Job cancelled.");
                    ctx.store.mark_cancelled(&job_id, "Job cancelled by user.");
                    counter!("jobs_cancelled_total").increment(1);
                    Self::forget(&controls, &job_id);
                    return;
                }
                // Closed semaphores never occur here; holders release on drop.
                permit = semaphore.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };
            debug!(job_id = %job_id, "Pipeline slot acquired");
            run_job(ctx, job_id, cancel).await;
            Self::forget(&controls, &job_id);
        });
    }

    /// Fire the cancellation token for an active job.
    pub fn cancel(&self, job_id: &Id) -> CancelSignal {
        let Ok(controls) = self.controls.lock() else {
            return CancelSignal::NotTracked;
        };
        match controls.get(job_id) {
            None => CancelSignal::NotTracked,
            Some(token) if token.is_cancelled() => CancelSignal::AlreadyRequested,
            Some(token) => {
                info!(job_id = %job_id, "Cancellation signal delivered");
                token.cancel();
                CancelSignal::Requested
            }
        }
    }

    /// Number of jobs currently tracked (queued or running)
    pub fn active_count(&self) -> usize {
        self.controls.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn insert(controls: &ControlMap, job_id: Id, token: CancellationToken) {
        if let Ok(mut controls) = controls.lock() {
            controls.insert(job_id, token);
        }
    }

    fn forget(controls: &ControlMap, job_id: &Id) {
        if let Ok(mut controls) = controls.lock() {
            controls.remove(job_id);
        }
    }
}
