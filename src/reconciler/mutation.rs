//! Client-issued state changes and their optimistic overlay.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;

use super::snapshot::Snapshot;
use crate::api::{CreateJobRequest, Job, JobStatus, StatusCounts};
use crate::error::ClientError;

pub const MIN_PRIORITY: i32 = 1;
pub const MAX_PRIORITY: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationAction {
    Cancel,
    Retry,
    /// Cancel of many jobs at once, reported as counts.
    BulkCancel,
}

impl MutationAction {
    fn intent(&self) -> Intent {
        match self {
            MutationAction::Cancel | MutationAction::BulkCancel => Intent::Cancel,
            MutationAction::Retry => Intent::Retry,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Cancel,
    Retry,
    Create {
        request: CreateJobRequest,
        submitted_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationState {
    Submitted,
    /// Accepted by the service. `after` is the last job-channel dispatch issued
    /// before the acknowledgement; snapshots dispatched later already include
    /// the change.
    Acknowledged { after: u64 },
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    pub id: u64,
    pub intent: Intent,
    /// Job id; empty for a create until the service assigns one.
    pub target: String,
    pub state: MutationState,
}

impl PendingMutation {
    pub(crate) fn for_action(id: u64, action: MutationAction, target: &str) -> Self {
        Self {
            id,
            intent: action.intent(),
            target: target.to_string(),
            state: MutationState::Submitted,
        }
    }

    pub(crate) fn for_create(id: u64, request: CreateJobRequest) -> Self {
        Self {
            id,
            intent: Intent::Create {
                request,
                submitted_at: Utc::now(),
            },
            target: String::new(),
            state: MutationState::Submitted,
        }
    }

    /// Whether a snapshot from dispatch `sequence` already reflects this change.
    pub fn confirmed_by(&self, sequence: u64) -> bool {
        matches!(self.state, MutationState::Acknowledged { after } if sequence > after)
    }

    fn overlays(&self, sequence: u64) -> bool {
        matches!(self.state, MutationState::Acknowledged { after } if sequence <= after)
    }
}

/// Outcome for one target of a mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    pub job_id: String,
    /// Server message on success, failure reason otherwise.
    pub result: Result<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationReport {
    pub action: MutationAction,
    pub outcomes: Vec<MutationOutcome>,
}

impl MutationReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn outcome(&self, job_id: &str) -> Option<&MutationOutcome> {
        self.outcomes.iter().find(|o| o.job_id == job_id)
    }
}

/// Result of a job submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Created(String),
    /// Another submission was still waiting for the service.
    Busy,
}

/// Client-side checks run before a create request is sent.
pub fn validate_create(request: &CreateJobRequest) -> Result<(), ClientError> {
    if request.procedures.iter().all(|p| p.trim().is_empty()) {
        return Err(ClientError::validation("Please select at least one procedure"));
    }
    if NaiveDate::parse_from_str(&request.target_date, "%Y-%m-%d").is_err() {
        return Err(ClientError::validation(format!(
            "Target date '{}' is not a valid YYYY-MM-DD date",
            request.target_date
        )));
    }
    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&request.priority) {
        return Err(ClientError::validation(format!(
            "Priority must be between {} and {}",
            MIN_PRIORITY, MAX_PRIORITY
        )));
    }
    Ok(())
}

fn placeholder_job(job_id: &str, request: &CreateJobRequest, submitted_at: DateTime<Utc>) -> Job {
    Job {
        job_id: job_id.to_string(),
        job_type: "procedure".to_string(),
        status: JobStatus::Pending,
        priority: request.priority,
        attempts: 0,
        max_attempts: 0,
        created_at: Some(submitted_at),
        started_at: None,
        completed_at: None,
        job_data: json!({
            "target_date": request.target_date,
            "procedures": request.procedures,
        }),
        error_message: None,
        result_data: None,
        result_summary: None,
        user_id: None,
    }
}

/// Apply acknowledged mutations that `snapshot` predates.
pub fn overlay(snapshot: &Snapshot, pending: &[PendingMutation]) -> Snapshot {
    let mut view = snapshot.clone();
    let mut inserted = 0u64;

    for mutation in pending.iter().filter(|m| m.overlays(snapshot.sequence)) {
        match &mutation.intent {
            Intent::Cancel => {
                if let Some(job) = view.jobs.iter_mut().find(|j| j.job_id == mutation.target) {
                    job.status = JobStatus::Cancelled;
                }
            }
            Intent::Retry => {
                if let Some(job) = view.jobs.iter_mut().find(|j| j.job_id == mutation.target) {
                    job.status = JobStatus::Pending;
                    job.error_message = None;
                    job.completed_at = None;
                }
            }
            Intent::Create {
                request,
                submitted_at,
            } => {
                if view.job(&mutation.target).is_none() {
                    view.jobs
                        .insert(0, placeholder_job(&mutation.target, request, *submitted_at));
                    inserted += 1;
                }
            }
        }
    }

    view.counts = StatusCounts::from_jobs(&view.jobs);
    view.total += inserted;
    view
}
