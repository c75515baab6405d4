//! Background ingestion tracking.
//!
//! Every upload gets its own task. The task submits the file, then polls the
//! job status until the job settles or the attempt cap is hit. Each task owns one
//! registration in the session's [`TimerRegistry`], and that registration is how
//! it gets cancelled.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use uuid::Uuid;

mod outcome;
pub use outcome::*;
mod registry;
pub use registry::*;
mod state;
pub use state::*;

use crate::{
    collection::DocumentView,
    types::{FileId, IngestionJob, JobStatus, UploadFile, UploadResponse},
    upstream::{Upstream, UpstreamError},
    Configuration,
};

#[derive(Debug, Clone)]
pub struct TrackerPolicy {
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub clear_after_success: Duration,
    pub clear_after_failure: Duration,
}

impl Default for TrackerPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_attempts: 300,
            clear_after_success: Duration::from_secs(3),
            clear_after_failure: Duration::from_secs(10),
        }
    }
}

impl TrackerPolicy {
    pub fn from_config(cfg: &Configuration) -> Self {
        Self {
            poll_interval: cfg.poll_interval,
            max_attempts: cfg.poll_max_attempts,
            clear_after_success: cfg.clear_after_success,
            clear_after_failure: cfg.clear_after_failure,
        }
    }

    /// Slots with real failures stay up longer. Skips do not count.
    pub fn clear_delay(&self, outcome: &Outcome) -> Duration {
        if outcome.has_failures() {
            self.clear_after_failure
        } else {
            self.clear_after_success
        }
    }
}

/// Result of a bare submit.
#[derive(Debug, Clone)]
pub enum Submission {
    Completed(UploadResponse),
    Queued { job_id: String },
}

/// Progress UI slot for one submission.
#[derive(Debug, Clone, Serialize)]
pub struct JobSlot {
    pub file_id: FileId,
    pub display_name: String,
    pub status: DisplayStatus,
    pub message: String,
    pub polling_stopped: bool,
    pub state: JobState,
    pub job: IngestionJob,
    pub created_at: DateTime<Utc>,
}

impl JobSlot {
    fn new(file_id: FileId, display_name: &str, state: JobState) -> Self {
        let message = match &state {
            JobState::Uploading => format!("Uploading {}...", display_name),
            _ => format!("Processing {}...", display_name),
        };
        let mut job = IngestionJob::new(file_id, display_name);
        if let JobState::Processing { job_id, .. } = &state {
            job.job_id = Some(job_id.clone());
        }
        Self {
            file_id,
            display_name: display_name.to_string(),
            status: state.display_status(),
            message,
            polling_stopped: state.is_indeterminate(),
            state,
            job,
            created_at: Utc::now(),
        }
    }

    /// Keeps the progress already reported and swaps in a fresh state.
    fn resume(&mut self, state: JobState, message: String) {
        self.status = state.display_status();
        self.polling_stopped = state.is_indeterminate();
        self.message = message;
        self.state = state;
    }

    fn advance(&mut self, event: &JobEvent, transition: Transition) {
        match event {
            JobEvent::Uploaded(resp) => {
                self.job.job_id = resp.job_id.clone();
                if let JobState::Completed(outcome) = &transition.next {
                    self.job.status = JobStatus::Completed;
                    self.job.total_files = outcome.total_files;
                    self.job.processed_files = outcome.total_files;
                    self.job.total_chunks = outcome.total_chunks;
                }
            }
            JobEvent::Polled(resp) => self.job.apply(resp),
            JobEvent::UploadFailed(_) | JobEvent::PollFailed(_) | JobEvent::Recheck => {}
        }
        if let JobState::Failed { message } = &transition.next {
            self.job.status = JobStatus::Failed;
            self.job.error_message = Some(message.clone());
        }
        self.status = transition.next.display_status();
        self.polling_stopped = transition.next.is_indeterminate();
        self.message = transition.message;
        self.state = transition.next;
    }
}

enum Step {
    Upload {
        file: UploadFile,
        collection_id: String,
    },
    Poll {
        delay: Option<Duration>,
    },
    Clear(Duration),
    Done,
}

struct Inner {
    upstream: Arc<dyn Upstream>,
    view: DocumentView,
    policy: TrackerPolicy,
    registry: TimerRegistry,
    slots: Mutex<HashMap<FileId, JobSlot>>,
}

/// Owns the polling lifecycles of one session.
///
/// Dropping the tracker cancels every pending timer.
pub struct JobTracker {
    inner: Arc<Inner>,
}

impl JobTracker {
    pub fn new(upstream: Arc<dyn Upstream>, view: DocumentView, policy: TrackerPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                upstream,
                view,
                policy,
                registry: TimerRegistry::new(),
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Sends a file without tracking it.
    pub async fn submit(
        &self,
        file: &UploadFile,
        collection_id: &str,
    ) -> Result<Submission, UpstreamError> {
        let resp = self.inner.upstream.upload(file, collection_id).await?;
        if !resp.success {
            return Err(UpstreamError::Rejected(
                resp.message
                    .unwrap_or_else(|| format!("Failed to upload {}", file.name)),
            ));
        }
        match resp.job_id.as_deref().map(str::trim) {
            Some(job_id) if !job_id.is_empty() => Ok(Submission::Queued {
                job_id: job_id.to_string(),
            }),
            _ => Ok(Submission::Completed(resp)),
        }
    }

    /// Starts polling a job that was already submitted.
    pub fn track(&self, job_id: &str, file_id: FileId, display_name: &str) {
        let state = JobState::Processing {
            job_id: job_id.to_string(),
            attempts: 0,
            polling: Polling::Active,
        };
        tracing::info!(%file_id, job_id, file = display_name, "Tracking ingestion job");
        self.spawn(
            file_id,
            display_name,
            state,
            Step::Poll { delay: None },
            Some(job_id.to_string()),
        );
    }

    /// Uploads and tracks one file in a single task.
    pub fn upload(&self, file: UploadFile, collection_id: &str) -> FileId {
        let file_id = Uuid::new_v4();
        let display_name = file.name.clone();
        tracing::info!(%file_id, file = %display_name, collection_id, "Submitting upload");
        self.spawn(
            file_id,
            &display_name,
            JobState::Uploading,
            Step::Upload {
                file,
                collection_id: collection_id.to_string(),
            },
            None,
        );
        file_id
    }

    /// Fans a batch out into independent tracked uploads.
    pub fn upload_batch(&self, files: Vec<UploadFile>, collection_id: &str) -> Vec<FileId> {
        files
            .into_iter()
            .map(|file| self.upload(file, collection_id))
            .collect()
    }

    /// Resumes polling a job that hit the attempt cap, with a fresh budget.
    pub fn recheck(&self, file_id: FileId) -> Result<(), TransitionError> {
        let (display_name, transition) = {
            let slots = self.inner.slots();
            let Some(slot) = slots.get(&file_id) else {
                return Err(TransitionError {
                    from: "missing",
                    event: JobEvent::Recheck.name(),
                });
            };
            let transition = transition(
                &slot.state,
                &JobEvent::Recheck,
                &slot.display_name,
                &self.inner.policy,
            )?;
            (slot.display_name.clone(), transition)
        };
        let Effect::StartPolling { job_id } = transition.effect.clone() else {
            return Ok(());
        };
        tracing::info!(%file_id, job_id, "Re-checking stalled job");
        self.spawn(
            file_id,
            &display_name,
            transition.next,
            Step::Poll { delay: None },
            Some(job_id),
        );
        Ok(())
    }

    pub fn slots(&self) -> Vec<JobSlot> {
        let mut slots: Vec<JobSlot> = self.inner.slots().values().cloned().collect();
        slots.sort_by_key(|slot| slot.created_at);
        slots
    }

    pub fn slot(&self, file_id: &FileId) -> Option<JobSlot> {
        self.inner.slots().get(file_id).cloned()
    }

    /// Removes a slot and cancels its timer.
    pub fn dismiss(&self, file_id: &FileId) -> bool {
        self.inner.registry.cancel(file_id);
        self.inner.slots().remove(file_id).is_some()
    }

    /// Cancels every job that has not settled and drops its slot.
    ///
    /// Settled slots keep their clear timers.
    pub fn cancel_pending(&self) -> usize {
        let pending: Vec<FileId> = self
            .inner
            .slots()
            .iter()
            .filter(|(_, slot)| !slot.state.is_terminal())
            .map(|(file_id, _)| *file_id)
            .collect();
        for file_id in &pending {
            self.dismiss(file_id);
        }
        if !pending.is_empty() {
            tracing::info!(count = pending.len(), "Cancelled pending ingestion jobs");
        }
        pending.len()
    }

    /// Cancels all timers and forgets every slot.
    pub fn shutdown(&self) {
        let cancelled = self.inner.registry.cancel_all();
        self.inner.slots().clear();
        tracing::debug!(cancelled, "Job tracker shut down");
    }

    pub fn active_timers(&self) -> usize {
        self.inner.registry.len()
    }

    fn spawn(
        &self,
        file_id: FileId,
        display_name: &str,
        state: JobState,
        step: Step,
        job_id: Option<String>,
    ) {
        let handle = self.inner.registry.register(file_id);
        {
            let mut slots = self.inner.slots();
            match slots.get_mut(&file_id) {
                Some(slot) => {
                    let message = format!("Processing {}...", display_name);
                    slot.resume(state, message);
                }
                None => {
                    slots.insert(file_id, JobSlot::new(file_id, display_name, state));
                }
            }
        }
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.drive(handle, step, job_id).await });
    }
}

impl Drop for JobTracker {
    fn drop(&mut self) {
        self.inner.registry.cancel_all();
    }
}

impl Inner {
    fn slots(&self) -> MutexGuard<'_, HashMap<FileId, JobSlot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn drive(
        self: Arc<Self>,
        mut handle: TimerHandle,
        mut step: Step,
        mut job_id: Option<String>,
    ) {
        let file_id = handle.file_id();
        loop {
            let event = match step {
                Step::Upload {
                    file,
                    collection_id,
                } => match handle
                    .guard(self.upstream.upload(&file, &collection_id))
                    .await
                {
                    None => break,
                    Some(Ok(resp)) => JobEvent::Uploaded(resp),
                    Some(Err(err)) => {
                        tracing::warn!(%file_id, "Upload failed: {}", err);
                        JobEvent::UploadFailed(err.to_string())
                    }
                },
                Step::Poll { delay } => {
                    if let Some(delay) = delay {
                        if !handle.sleep(delay).await {
                            break;
                        }
                    }
                    let Some(id) = job_id.as_deref() else {
                        break;
                    };
                    match handle.guard(self.upstream.job_status(id)).await {
                        None => break,
                        Some(Ok(resp)) => JobEvent::Polled(resp),
                        Some(Err(err)) => {
                            tracing::warn!(%file_id, job_id = id, "Failed to check status: {}", err);
                            JobEvent::PollFailed(err.to_string())
                        }
                    }
                }
                Step::Clear(delay) => {
                    if let Err(err) = self.view.refresh().await {
                        tracing::warn!(%file_id, "Failed to refresh documents: {}", err);
                    }
                    if handle.sleep(delay).await {
                        self.slots().remove(&file_id);
                        tracing::debug!(%file_id, "Cleared finished job");
                    }
                    break;
                }
                Step::Done => break,
            };

            let Some(effect) = self.apply(file_id, &event) else {
                break;
            };
            step = match effect {
                Effect::StartPolling { job_id: id } => {
                    job_id = Some(id);
                    Step::Poll { delay: None }
                }
                Effect::Reschedule => Step::Poll {
                    delay: Some(self.policy.poll_interval),
                },
                Effect::ScheduleClear(delay) => Step::Clear(delay),
                Effect::StopPolling => {
                    tracing::warn!(
                        %file_id,
                        attempts = self.policy.max_attempts,
                        "Polling stopped before the job settled"
                    );
                    Step::Done
                }
                Effect::Settle => Step::Done,
            };
        }
        self.registry.release(&handle);
    }

    /// Applies an event to the slot. `None` means the slot is gone and the
    /// event is discarded.
    fn apply(&self, file_id: FileId, event: &JobEvent) -> Option<Effect> {
        let mut slots = self.slots();
        let Some(slot) = slots.get_mut(&file_id) else {
            tracing::debug!(%file_id, event = event.name(), "Discarding event for a removed slot");
            return None;
        };
        match transition(&slot.state, event, &slot.display_name, &self.policy) {
            Ok(transition) => {
                let effect = transition.effect.clone();
                tracing::debug!(
                    %file_id,
                    from = slot.state.name(),
                    to = transition.next.name(),
                    "Job transition"
                );
                if transition.next.is_terminal() {
                    tracing::info!(%file_id, "{}", transition.message);
                }
                slot.advance(event, transition);
                Some(effect)
            }
            Err(err) => {
                tracing::error!(%file_id, "{}", err);
                None
            }
        }
    }
}
