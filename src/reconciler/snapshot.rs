use chrono::{DateTime, Utc};

use crate::api::{FilterSet, Job, Pagination, StatusCounts};

/// What the job channel fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobQuery {
    /// Filtered queue listing.
    Queue(FilterSet),
    /// The current user's most recent jobs.
    Recent { limit: u32 },
    /// One page of job history.
    History { page: u32, filters: FilterSet },
}

impl Default for JobQuery {
    fn default() -> Self {
        JobQuery::Queue(FilterSet::default())
    }
}

impl JobQuery {
    pub fn filters(&self) -> FilterSet {
        match self {
            JobQuery::Queue(filters) | JobQuery::History { filters, .. } => filters.clone(),
            JobQuery::Recent { limit } => FilterSet::default().with_limit(*limit),
        }
    }

    pub(crate) fn failure_label(&self) -> &'static str {
        match self {
            JobQuery::Queue(_) => "Error loading queue data",
            JobQuery::Recent { .. } => "Error loading recent jobs",
            JobQuery::History { .. } => "Failed to load job history",
        }
    }
}

/// Immutable view of the server's job state as of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Dispatch number on the job channel that produced this snapshot.
    pub sequence: u64,
    pub taken_at: DateTime<Utc>,
    pub jobs: Vec<Job>,
    /// Server-reported number of matching jobs.
    pub total: u64,
    pub counts: StatusCounts,
    pub pagination: Option<Pagination>,
}

impl Snapshot {
    pub fn new(sequence: u64, jobs: Vec<Job>, total: u64, pagination: Option<Pagination>) -> Self {
        let counts = StatusCounts::from_jobs(&jobs);
        Self {
            sequence,
            taken_at: Utc::now(),
            total: total.max(jobs.len() as u64),
            jobs,
            counts,
            pagination,
        }
    }

    pub fn job(&self, job_id: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.job_id == job_id)
    }
}
