//! Filter predicates sent with list queries.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::models::JobStatus;

pub const DEFAULT_LIMIT: u32 = 50;

/// User-selected predicate for job listings. Rebuilt from scratch on every
/// refresh; empty fields are left out of the query string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    pub status: Option<JobStatus>,
    pub priority: Option<i32>,
    pub job_type: Option<String>,
    /// Server-side relative window such as `today`, `week` or `month`.
    pub date_range: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub search: Option<String>,
    pub limit: u32,
}

impl Default for FilterSet {
    fn default() -> Self {
        Self {
            status: None,
            priority: None,
            job_type: None,
            date_range: None,
            start_date: None,
            end_date: None,
            search: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl FilterSet {
    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Query parameters for `/job/queue/api`.
    pub fn queue_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(status) = self.status {
            query.push(("status", status.to_string()));
        }
        if let Some(priority) = self.priority {
            query.push(("priority", priority.to_string()));
        }
        if let Some(job_type) = non_empty(&self.job_type) {
            query.push(("job_type", job_type.to_string()));
        }
        if let Some(range) = non_empty(&self.date_range) {
            query.push(("date_range", range.to_string()));
        }
        query.push(("limit", self.limit.to_string()));
        query
    }

    /// Query parameters for the history, history-stats and export endpoints.
    pub fn history_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(status) = self.status {
            query.push(("status", status.to_string()));
        }
        if let Some(priority) = self.priority {
            query.push(("priority", priority.to_string()));
        }
        if let Some(start) = self.start_date {
            query.push(("start_date", start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = self.end_date {
            query.push(("end_date", end.format("%Y-%m-%d").to_string()));
        }
        if let Some(search) = non_empty(&self.search) {
            query.push(("search", search.to_string()));
        }
        query.push(("limit", self.limit.to_string()));
        query
    }
}

/// Filters for the statistics report page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsFilters {
    pub time_range: Option<String>,
    pub job_type: Option<String>,
}

impl StatisticsFilters {
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(range) = non_empty(&self.time_range) {
            query.push(("timeRange", range.to_string()));
        }
        if let Some(job_type) = non_empty(&self.job_type) {
            query.push(("jobType", job_type.to_string()));
        }
        query
    }
}
