//! ABOUTME: In-memory job registry, the single source of truth for job state
//! ABOUTME: Enforces the status machine, monotonic progress, and bounded logs

use crate::model::{describe, Job, JobRequest, JobStatus};
use chrono::Utc;
use fa_core::Id;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use tracing::{debug, warn};

/// Cap on retained log lines per job; the oldest lines are dropped first
const MAX_JOB_LOGS: usize = 500;

/// What a cancellation request found in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelState {
    /// The job exists and is still active
    Active,
    /// The job already reached a terminal state
    AlreadyTerminal,
    /// No job with that id (never existed, or evicted)
    NotFound,
}

struct StoreInner {
    jobs: HashMap<Id, Job>,
    /// Creation order, oldest first, used for eviction and listing
    order: VecDeque<Id>,
}

/// Concurrent registry of jobs. All state transitions go through here; the
/// web layer only ever reads snapshots.
pub struct JobStore {
    inner: RwLock<StoreInner>,
    max_jobs: usize,
}

impl JobStore {
    pub fn new(max_jobs: usize) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                jobs: HashMap::new(),
                order: VecDeque::new(),
            }),
            max_jobs,
        }
    }

    /// Create a queued job from a validated request and return a snapshot.
    pub fn create(&self, request: JobRequest) -> Job {
        let descriptors = describe(&request);
        let now = Utc::now();
        let job = Job {
            id: Id::new(),
            status: JobStatus::Queued,
            progress: 0.0,
            label: descriptors.label,
            subtitle: descriptors.subtitle,
            metadata: descriptors.metadata,
            message: String::new(),
            logs: vec!["Job queued.".to_string()],
            request,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        };

        let mut inner = self.write();
        inner.order.push_back(job.id);
        inner.jobs.insert(job.id, job.clone());
        Self::evict_over_capacity(&mut inner, self.max_jobs);
        job
    }

    pub fn get(&self, id: &Id) -> Option<Job> {
        self.read().jobs.get(id).cloned()
    }

    /// All retained jobs, newest first.
    pub fn list(&self) -> Vec<Job> {
        let inner = self.read();
        inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.jobs.get(id).cloned())
            .collect()
    }

    pub fn append_log(&self, id: &Id, message: impl Into<String>) {
        self.mutate(id, |job| {
            job.logs.push(message.into());
            if job.logs.len() > MAX_JOB_LOGS {
                let excess = job.logs.len() - MAX_JOB_LOGS;
                job.logs.drain(..excess);
            }
        });
    }

    /// Overwrite the most recent log line; used to keep progress output
    /// compact instead of appending hundreds of percentage lines.
    pub fn replace_last_log(&self, id: &Id, message: impl Into<String>) {
        let message = message.into();
        self.mutate(id, |job| match job.logs.last_mut() {
            Some(last) => *last = message,
            None => job.logs.push(message),
        });
    }

    /// Raise progress toward the given value. Progress never moves backward
    /// and is clamped to 0-100.
    pub fn set_progress(&self, id: &Id, value: f32) {
        self.mutate(id, |job| {
            let clamped = value.clamp(0.0, 100.0);
            if clamped > job.progress {
                job.progress = clamped;
            }
        });
    }

    /// Transition a queued job to processing and record the start time.
    pub fn mark_processing(&self, id: &Id) {
        self.mutate(id, |job| {
            if job.status.is_terminal() {
                warn!(job_id = %job.id, status = %job.status, "Ignoring processing transition on terminal job");
                return;
            }
            job.status = JobStatus::Processing;
            if job.started_at.is_none() {
                job.started_at = Some(Utc::now());
            }
        });
    }

    pub fn mark_complete(&self, id: &Id) {
        self.terminal_transition(id, JobStatus::Complete, None);
    }

    pub fn mark_failed(&self, id: &Id, message: impl Into<String>) {
        self.terminal_transition(id, JobStatus::Failed, Some(message.into()));
    }

    pub fn mark_cancelled(&self, id: &Id, message: impl Into<String>) {
        self.terminal_transition(id, JobStatus::Cancelled, Some(message.into()));
    }

    /// Check what a cancellation request would act on. The actual signal is
    /// delivered through the dispatcher; this only reports store state.
    pub fn cancel_state(&self, id: &Id) -> CancelState {
        match self.read().jobs.get(id) {
            None => CancelState::NotFound,
            Some(job) if job.status.is_terminal() => CancelState::AlreadyTerminal,
            Some(_) => CancelState::Active,
        }
    }

    /// Record that cancellation was requested, without changing status.
    pub fn note_cancel_requested(&self, id: &Id) {
        self.append_log(id, "Cancellation requested by user.");
        self.mutate(id, |job| {
            job.message = "Cancelling...".to_string();
        });
    }

    /// Refresh presentation fields after the pipeline normalized the request.
    pub fn update_descriptors(&self, id: &Id, request: &JobRequest) {
        let descriptors = describe(request);
        self.mutate(id, |job| {
            job.label = descriptors.label.clone();
            job.subtitle = descriptors.subtitle.clone();
            job.metadata = descriptors.metadata.clone();
            job.request = request.clone();
        });
    }

    /// Replace format metadata lines, keeping unrelated entries.
    pub fn set_format_metadata(&self, id: &Id, entries: Vec<String>) {
        const FORMAT_PREFIXES: &[&str] = &[
            "format:",
            "format id:",
            "resolution:",
            "video codec:",
            "audio codec:",
            "filesize:",
        ];
        self.mutate(id, |job| {
            job.metadata.retain(|entry| {
                let lowered = entry.to_lowercase();
                !FORMAT_PREFIXES.iter().any(|p| lowered.starts_with(p))
            });
            job.metadata.extend(entries.iter().cloned());
        });
    }

    fn terminal_transition(&self, id: &Id, status: JobStatus, message: Option<String>) {
        self.mutate(id, |job| {
            if job.status.is_terminal() {
                warn!(
                    job_id = %job.id,
                    from = %job.status,
                    to = %status,
                    "Ignoring transition on terminal job"
                );
                return;
            }
            job.status = status;
            job.completed_at = Some(Utc::now());
            if status == JobStatus::Complete {
                job.progress = 100.0;
            }
            if let Some(message) = message {
                job.message = message;
            } else {
                job.message.clear();
            }
        });
    }

    fn mutate(&self, id: &Id, f: impl FnOnce(&mut Job)) {
        let mut inner = self.write();
        match inner.jobs.get_mut(id) {
            Some(job) => {
                f(job);
                job.updated_at = Utc::now();
            }
            None => debug!(job_id = %id, "Update for unknown job ignored"),
        }
    }

    /// Drop the oldest jobs beyond capacity, preferring terminal ones.
    fn evict_over_capacity(inner: &mut StoreInner, max_jobs: usize) {
        while inner.order.len() > max_jobs {
            let victim = inner
                .order
                .iter()
                .find(|id| {
                    inner
                        .jobs
                        .get(id)
                        .map(|job| job.status.is_terminal())
                        .unwrap_or(true)
                })
                .copied()
                .or_else(|| inner.order.front().copied());
            let Some(victim) = victim else { break };
            inner.order.retain(|id| *id != victim);
            if inner.jobs.remove(&victim).is_some() {
                debug!(job_id = %victim, "Evicted job beyond retention limit");
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobTarget, PlaylistMode, StandaloneNameMode};

    fn request() -> JobRequest {
        JobRequest {
            url: "https://www.youtube.com/watch?v=abc".to_string(),
            target: JobTarget::Standalone {
                name_mode: StandaloneNameMode::Youtube,
                custom_name: None,
            },
            playlist_mode: PlaylistMode::Single,
        }
    }

    #[test]
    fn test_create_starts_queued_with_initial_log() {
        let store = JobStore::new(10);
        let job = store.create(request());

        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0.0);
        assert_eq!(job.logs, vec!["Job queued."]);
        assert!(job.started_at.is_none());
        assert!(store.get(&job.id).is_some());
    }

    #[test]
    fn test_list_is_newest_first_and_capped() {
        let store = JobStore::new(3);
        let first = store.create(request());
        store.mark_failed(&first.id, "boom");
        let _second = store.create(request());
        let _third = store.create(request());
        let fourth = store.create(request());

        let jobs = store.list();
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].id, fourth.id);
        // The terminal job was the eviction victim
        assert!(store.get(&first.id).is_none());
        assert_eq!(store.cancel_state(&first.id), CancelState::NotFound);
    }

    #[test]
    fn test_eviction_prefers_terminal_jobs() {
        let store = JobStore::new(2);
        let active = store.create(request());
        let done = store.create(request());
        store.mark_complete(&done.id);
        let _newest = store.create(request());

        assert!(store.get(&active.id).is_some());
        assert!(store.get(&done.id).is_none());
    }

    #[test]
    fn test_progress_is_monotonic_and_clamped() {
        let store = JobStore::new(10);
        let job = store.create(request());

        store.set_progress(&job.id, 42.5);
        store.set_progress(&job.id, 17.0);
        assert_eq!(store.get(&job.id).unwrap().progress, 42.5);

        store.set_progress(&job.id, 400.0);
        assert_eq!(store.get(&job.id).unwrap().progress, 100.0);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let store = JobStore::new(10);
        let job = store.create(request());

        store.mark_processing(&job.id);
        assert!(store.get(&job.id).unwrap().started_at.is_some());

        store.mark_cancelled(&job.id, "Job cancelled by user.");
        store.mark_complete(&job.id);
        store.mark_failed(&job.id, "too late");

        let job = store.get(&job.id).unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.message, "Job cancelled by user.");
    }

    #[test]
    fn test_complete_forces_progress_to_100() {
        let store = JobStore::new(10);
        let job = store.create(request());
        store.mark_processing(&job.id);
        store.set_progress(&job.id, 55.0);
        store.mark_complete(&job.id);

        let job = store.get(&job.id).unwrap();
        assert_eq!(job.progress, 100.0);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_replace_last_log_keeps_log_count() {
        let store = JobStore::new(10);
        let job = store.create(request());

        store.append_log(&job.id, "[download]   1.0% of 10MiB");
        store.replace_last_log(&job.id, "[download]  50.0% of 10MiB");

        let logs = store.get(&job.id).unwrap().logs;
        assert_eq!(
            logs,
            vec!["Job queued.", "[download]  50.0% of 10MiB"]
        );
    }

    #[test]
    fn test_log_cap_drops_oldest() {
        let store = JobStore::new(10);
        let job = store.create(request());
        for i in 0..600 {
            store.append_log(&job.id, format!("line {i}"));
        }

        let logs = store.get(&job.id).unwrap().logs;
        assert_eq!(logs.len(), 500);
        assert_eq!(logs.last().unwrap(), "line 599");
        assert_eq!(logs.first().unwrap(), "line 100");
    }

    #[test]
    fn test_cancel_state() {
        let store = JobStore::new(10);
        let job = store.create(request());
        assert_eq!(store.cancel_state(&job.id), CancelState::Active);

        store.mark_complete(&job.id);
        assert_eq!(store.cancel_state(&job.id), CancelState::AlreadyTerminal);

        assert_eq!(store.cancel_state(&Id::new()), CancelState::NotFound);
    }
}
