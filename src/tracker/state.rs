use serde::Serialize;
use std::time::Duration;

use super::{
    outcome::{DisplayStatus, Outcome},
    TrackerPolicy,
};
use crate::types::{JobStatus, JobStatusResponse, UploadResponse};

pub const STATUS_CHECK_FAILED: &str = "Failed to check status";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Polling {
    Active,
    /// The attempt cap was reached without a terminal status.
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Uploading,
    Processing {
        job_id: String,
        attempts: u32,
        polling: Polling,
    },
    Completed(Outcome),
    Failed {
        message: String,
    },
}

impl JobState {
    pub fn name(&self) -> &'static str {
        match self {
            JobState::Uploading => "uploading",
            JobState::Processing { .. } => "processing",
            JobState::Completed(_) => "completed",
            JobState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed(_) | JobState::Failed { .. })
    }

    /// Polling gave up without a verdict.
    pub fn is_indeterminate(&self) -> bool {
        matches!(
            self,
            JobState::Processing {
                polling: Polling::Stopped,
                ..
            }
        )
    }

    pub fn display_status(&self) -> DisplayStatus {
        match self {
            JobState::Uploading => DisplayStatus::Uploading,
            JobState::Processing { .. } => DisplayStatus::Processing,
            JobState::Completed(outcome) => outcome.status,
            JobState::Failed { .. } => DisplayStatus::Error,
        }
    }
}

#[derive(Debug, Clone)]
pub enum JobEvent {
    Uploaded(UploadResponse),
    UploadFailed(String),
    Polled(JobStatusResponse),
    PollFailed(String),
    /// Manual re-check of a job whose polling stopped at the cap.
    Recheck,
}

impl JobEvent {
    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::Uploaded(_) => "uploaded",
            JobEvent::UploadFailed(_) => "upload_failed",
            JobEvent::Polled(_) => "polled",
            JobEvent::PollFailed(_) => "poll_failed",
            JobEvent::Recheck => "recheck",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Poll right away; later polls are rescheduled after the interval.
    StartPolling { job_id: String },
    Reschedule,
    /// Attempt cap reached. The last progress stays displayed.
    StopPolling,
    ScheduleClear(Duration),
    /// Terminal failure. Nothing left to schedule.
    Settle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: JobState,
    pub effect: Effect,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Illegal transition from '{from}' on '{event}'")]
pub struct TransitionError {
    pub from: &'static str,
    pub event: &'static str,
}

/// Advances a job by one event.
pub fn transition(
    state: &JobState,
    event: &JobEvent,
    file_name: &str,
    policy: &TrackerPolicy,
) -> Result<Transition, TransitionError> {
    match (state, event) {
        (JobState::Uploading, JobEvent::Uploaded(resp)) if !resp.success => Ok(failed(
            resp.message
                .clone()
                .unwrap_or_else(|| format!("Failed to upload {}", file_name)),
        )),
        (JobState::Uploading, JobEvent::Uploaded(resp)) => match non_empty(&resp.job_id) {
            Some(job_id) => Ok(Transition {
                next: JobState::Processing {
                    job_id: job_id.to_string(),
                    attempts: 0,
                    polling: Polling::Active,
                },
                effect: Effect::StartPolling {
                    job_id: job_id.to_string(),
                },
                message: format!("Processing {}...", file_name),
            }),
            None => Ok(completed(Outcome::from_upload(resp), file_name, policy)),
        },
        (JobState::Uploading, JobEvent::UploadFailed(error)) => {
            Ok(failed(format!("Failed to upload {}: {}", file_name, error)))
        }
        (
            JobState::Processing {
                job_id,
                attempts,
                polling: Polling::Active,
            },
            JobEvent::Polled(resp),
        ) => match resp.status {
            JobStatus::Processing => Ok(still_processing(
                job_id,
                *attempts,
                progress_message(file_name, resp),
                policy,
            )),
            JobStatus::Completed => Ok(completed(Outcome::from_status(resp), file_name, policy)),
            JobStatus::Failed => Ok(failed(
                resp.error_message
                    .clone()
                    .unwrap_or_else(|| format!("Processing {} failed", file_name)),
            )),
        },
        (
            JobState::Processing {
                job_id,
                attempts,
                polling: Polling::Active,
            },
            JobEvent::PollFailed(_),
        ) => Ok(still_processing(
            job_id,
            *attempts,
            STATUS_CHECK_FAILED.to_string(),
            policy,
        )),
        (
            JobState::Processing {
                job_id,
                polling: Polling::Stopped,
                ..
            },
            JobEvent::Recheck,
        ) => Ok(Transition {
            next: JobState::Processing {
                job_id: job_id.clone(),
                attempts: 0,
                polling: Polling::Active,
            },
            effect: Effect::StartPolling {
                job_id: job_id.clone(),
            },
            message: format!("Checking {} again...", file_name),
        }),
        _ => Err(TransitionError {
            from: state.name(),
            event: event.name(),
        }),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.trim().is_empty())
}

fn still_processing(
    job_id: &str,
    attempts: u32,
    message: String,
    policy: &TrackerPolicy,
) -> Transition {
    let attempts = attempts + 1;
    let (polling, effect) = if attempts >= policy.max_attempts {
        (Polling::Stopped, Effect::StopPolling)
    } else {
        (Polling::Active, Effect::Reschedule)
    };
    Transition {
        next: JobState::Processing {
            job_id: job_id.to_string(),
            attempts,
            polling,
        },
        effect,
        message,
    }
}

fn completed(outcome: Outcome, file_name: &str, policy: &TrackerPolicy) -> Transition {
    let delay = policy.clear_delay(&outcome);
    let message = outcome.message(file_name);
    Transition {
        next: JobState::Completed(outcome),
        effect: Effect::ScheduleClear(delay),
        message,
    }
}

fn failed(message: String) -> Transition {
    Transition {
        next: JobState::Failed {
            message: message.clone(),
        },
        effect: Effect::Settle,
        message,
    }
}

fn progress_message(file_name: &str, resp: &JobStatusResponse) -> String {
    if resp.total_files > 1 {
        format!(
            "Processing {}: {}/{} files",
            file_name, resp.processed_files, resp.total_files
        )
    } else {
        format!("Processing {}...", file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileResult;

    fn policy() -> TrackerPolicy {
        TrackerPolicy {
            poll_interval: Duration::from_secs(1),
            max_attempts: 3,
            clear_after_success: Duration::from_secs(3),
            clear_after_failure: Duration::from_secs(10),
        }
    }

    fn processing(attempts: u32) -> JobState {
        JobState::Processing {
            job_id: "job-1".into(),
            attempts,
            polling: Polling::Active,
        }
    }

    fn status(status: JobStatus) -> JobStatusResponse {
        JobStatusResponse {
            status,
            total_files: 4,
            processed_files: 2,
            failed_files: 0,
            total_chunks: 9,
            file_results: Vec::new(),
            error_message: None,
        }
    }

    fn upload(job_id: Option<&str>) -> UploadResponse {
        UploadResponse {
            success: true,
            job_id: job_id.map(str::to_string),
            chunks_created: Some(5),
            processing_time: Some(0.4),
            message: None,
        }
    }

    #[test]
    fn test_upload_with_job_starts_polling() {
        let t = transition(
            &JobState::Uploading,
            &JobEvent::Uploaded(upload(Some("job-1"))),
            "a.zip",
            &policy(),
        )
        .unwrap();
        assert_eq!(t.next, processing(0));
        assert_eq!(
            t.effect,
            Effect::StartPolling {
                job_id: "job-1".into()
            }
        );
    }

    #[test]
    fn test_upload_without_job_completes_directly() {
        let t = transition(
            &JobState::Uploading,
            &JobEvent::Uploaded(upload(None)),
            "a.pdf",
            &policy(),
        )
        .unwrap();
        assert_eq!(t.next.display_status(), DisplayStatus::Complete);
        assert_eq!(t.effect, Effect::ScheduleClear(Duration::from_secs(3)));
        assert_eq!(t.message, "a.pdf processed successfully (5 chunks)");
    }

    #[test]
    fn test_blank_job_id_is_treated_as_synchronous() {
        let t = transition(
            &JobState::Uploading,
            &JobEvent::Uploaded(upload(Some("  "))),
            "a.pdf",
            &policy(),
        )
        .unwrap();
        assert!(matches!(t.next, JobState::Completed(_)));
    }

    #[test]
    fn test_rejected_upload_fails() {
        let mut resp = upload(None);
        resp.success = false;
        resp.message = Some("File too large".into());
        let t = transition(
            &JobState::Uploading,
            &JobEvent::Uploaded(resp),
            "a.pdf",
            &policy(),
        )
        .unwrap();
        assert_eq!(
            t.next,
            JobState::Failed {
                message: "File too large".into()
            }
        );
        assert_eq!(t.effect, Effect::Settle);
    }

    #[test]
    fn test_processing_reschedules_and_reports_progress() {
        let t = transition(
            &processing(0),
            &JobEvent::Polled(status(JobStatus::Processing)),
            "a.zip",
            &policy(),
        )
        .unwrap();
        assert_eq!(t.next, processing(1));
        assert_eq!(t.effect, Effect::Reschedule);
        assert_eq!(t.message, "Processing a.zip: 2/4 files");
    }

    #[test]
    fn test_attempt_cap_stops_polling_without_failing() {
        let t = transition(
            &processing(2),
            &JobEvent::Polled(status(JobStatus::Processing)),
            "a.zip",
            &policy(),
        )
        .unwrap();
        assert_eq!(t.effect, Effect::StopPolling);
        assert!(t.next.is_indeterminate());
        assert!(!t.next.is_terminal());
        assert_eq!(t.next.display_status(), DisplayStatus::Processing);
    }

    #[test]
    fn test_poll_error_consumes_an_attempt() {
        let t = transition(
            &processing(1),
            &JobEvent::PollFailed("connection reset".into()),
            "a.zip",
            &policy(),
        )
        .unwrap();
        assert_eq!(t.next, processing(2));
        assert_eq!(t.message, STATUS_CHECK_FAILED);

        let t = transition(&t.next, &JobEvent::PollFailed("again".into()), "a.zip", &policy())
            .unwrap();
        assert_eq!(t.effect, Effect::StopPolling);
    }

    #[test]
    fn test_completed_with_real_failure_uses_long_grace_period() {
        let mut resp = status(JobStatus::Completed);
        resp.processed_files = 4;
        resp.failed_files = 1;
        resp.file_results = vec![FileResult {
            filename: "bad.pdf".into(),
            success: false,
            error: Some("corrupt".into()),
            error_type: None,
        }];
        let t = transition(&processing(5), &JobEvent::Polled(resp), "a.zip", &policy()).unwrap();
        assert_eq!(t.next.display_status(), DisplayStatus::Warning);
        assert_eq!(t.effect, Effect::ScheduleClear(Duration::from_secs(10)));
    }

    #[test]
    fn test_failed_status_surfaces_error_message() {
        let mut resp = status(JobStatus::Failed);
        resp.error_message = Some("Archive is encrypted".into());
        let t = transition(&processing(0), &JobEvent::Polled(resp), "a.zip", &policy()).unwrap();
        assert_eq!(t.message, "Archive is encrypted");
        assert_eq!(t.next.display_status(), DisplayStatus::Error);
    }

    #[test]
    fn test_recheck_only_from_stopped() {
        let stopped = JobState::Processing {
            job_id: "job-1".into(),
            attempts: 3,
            polling: Polling::Stopped,
        };
        let t = transition(&stopped, &JobEvent::Recheck, "a.zip", &policy()).unwrap();
        assert_eq!(t.next, processing(0));

        let err = transition(&processing(1), &JobEvent::Recheck, "a.zip", &policy()).unwrap_err();
        assert_eq!(err.from, "processing");
        assert_eq!(err.event, "recheck");
    }

    #[test]
    fn test_terminal_states_reject_events() {
        let done = JobState::Failed {
            message: "x".into(),
        };
        assert!(transition(
            &done,
            &JobEvent::Polled(status(JobStatus::Completed)),
            "a",
            &policy()
        )
        .is_err());
        assert!(transition(&processing(0), &JobEvent::Uploaded(upload(None)), "a", &policy())
            .is_err());
    }
}
