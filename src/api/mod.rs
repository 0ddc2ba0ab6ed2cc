//! Client side of the job service HTTP contract.
//!
//! ## Architecture
//!
//! - `models`: wire types (jobs, statistics, notifications, history pages)
//! - `filters`: query predicates and their query-string encoding
//! - `client`: reqwest implementation of [`JobApi`]
//!
//! Everything above this module talks to the service through the [`JobApi`]
//! trait so a scripted service can stand in for tests.

pub mod client;
pub mod filters;
pub mod models;

use async_trait::async_trait;

use crate::error::ClientError;

pub use client::HttpJobClient;
pub use filters::{FilterSet, StatisticsFilters};
pub use models::{
    CreateJobRequest, HistoryPage, HistoryStats, Job, JobStatus, Notification, Pagination,
    QueueStatistics, StatisticsReport, StatusCounts, TrendSeries, WorkerCommand, WorkerReply,
    WorkerStatus, priority_band,
};

/// One page of the filtered queue listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    /// Total matching jobs on the server, which may exceed `jobs.len()`.
    pub total: u64,
}

/// Operations offered by the remote job service.
#[async_trait]
pub trait JobApi: Send + Sync + 'static {
    async fn list_jobs(&self, filters: &FilterSet) -> Result<JobPage, ClientError>;

    /// The current user's most recent jobs.
    async fn user_jobs(&self, limit: u32) -> Result<Vec<Job>, ClientError>;

    async fn statistics(&self) -> Result<QueueStatistics, ClientError>;

    async fn job_status(&self, job_id: &str) -> Result<Job, ClientError>;

    /// Submit a procedure job; returns the new job id.
    async fn create_job(&self, request: &CreateJobRequest) -> Result<String, ClientError>;

    async fn cancel_job(&self, job_id: &str) -> Result<String, ClientError>;

    async fn retry_job(&self, job_id: &str) -> Result<String, ClientError>;

    async fn notifications(
        &self,
        unread_only: bool,
        limit: Option<u32>,
    ) -> Result<Vec<Notification>, ClientError>;

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), ClientError>;

    async fn job_history(&self, page: u32, filters: &FilterSet) -> Result<HistoryPage, ClientError>;

    async fn history_stats(&self, filters: &FilterSet) -> Result<HistoryStats, ClientError>;

    /// Raw CSV bytes of the filtered history.
    async fn export_history(&self, filters: &FilterSet) -> Result<Vec<u8>, ClientError>;

    async fn statistics_report(
        &self,
        filters: &StatisticsFilters,
    ) -> Result<StatisticsReport, ClientError>;

    async fn trends(
        &self,
        filters: &StatisticsFilters,
        period: &str,
    ) -> Result<TrendSeries, ClientError>;

    async fn worker_command(&self, command: WorkerCommand) -> Result<WorkerReply, ClientError>;

    async fn worker_status(&self) -> Result<WorkerStatus, ClientError>;
}
