use crate::api::{FilterSet, JobStatus, StatusCounts};
use crate::reconciler::Snapshot;

use super::format::{
    DurationStyle, calculate_duration, format_datetime, job_progress, priority_label, short_id,
};

#[derive(Debug, Clone, PartialEq)]
pub struct QueueRow {
    pub job_id: String,
    pub short_id: String,
    pub job_type: String,
    pub target_date: String,
    pub status: JobStatus,
    pub priority: i32,
    pub priority_label: &'static str,
    pub progress: u8,
    pub attempts: String,
    pub created: String,
    pub duration: String,
    pub can_cancel: bool,
    pub can_retry: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueTable {
    pub rows: Vec<QueueRow>,
    /// Server-side count of matching jobs.
    pub total: u64,
    pub counts: StatusCounts,
}

impl QueueTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub fn render(snapshot: &Snapshot, filters: &FilterSet) -> QueueTable {
    let rows = super::visible(snapshot, filters)
        .map(|job| QueueRow {
            job_id: job.job_id.clone(),
            short_id: short_id(&job.job_id),
            job_type: job.job_type.clone(),
            target_date: job.target_date().unwrap_or("N/A").to_string(),
            status: job.status,
            priority: job.priority,
            priority_label: priority_label(job.priority),
            progress: job_progress(job),
            attempts: format!("{}/{}", job.attempts, job.max_attempts),
            created: format_datetime(job.created_at),
            duration: calculate_duration(job.created_at, job.completed_at, DurationStyle::Compact)
                .unwrap_or_default(),
            can_cancel: job.can_cancel(),
            can_retry: job.can_retry(),
        })
        .collect();

    QueueTable {
        rows,
        total: snapshot.total,
        counts: snapshot.counts,
    }
}
