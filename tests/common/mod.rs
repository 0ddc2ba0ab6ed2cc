//! Scripted in-memory job service shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use jobdeck::api::{
    CreateJobRequest, FilterSet, HistoryPage, HistoryStats, Job, JobApi, JobPage, JobStatus,
    Notification, Pagination, QueueStatistics, StatisticsFilters, StatisticsReport, StatusCounts,
    TrendSeries, WorkerCommand, WorkerReply, WorkerStatus,
};
use jobdeck::api::models::ReportOverview;
use jobdeck::error::ClientError;
use jobdeck::notify::{Notice, NoticeLevel};
use serde_json::json;
use tokio::sync::{Semaphore, mpsc};

pub fn job(id: &str, status: JobStatus) -> Job {
    serde_json::from_value(json!({
        "job_id": id,
        "job_type": "procedure",
        "status": status,
        "priority": 5,
        "attempts": 1,
        "max_attempts": 3,
        "created_at": "2024-03-01T10:00:00Z",
        "job_data": { "target_date": "2024-03-01", "procedures": ["attrecord"] },
    }))
    .expect("valid job")
}

pub fn notification(id: &str, is_read: bool) -> Notification {
    serde_json::from_value(json!({
        "id": id,
        "title": "Job finished",
        "message": format!("Job {id} completed"),
        "type": "job_completed",
        "is_read": is_read,
    }))
    .expect("valid notification")
}

pub fn rejected(message: &str) -> ClientError {
    ClientError::Rejected {
        status: 400,
        message: message.to_string(),
    }
}

/// A semaphore that starts closed (zero permits); `Semaphore` has no `Default`.
pub struct Gate(Semaphore);

impl Default for Gate {
    fn default() -> Self {
        Self(Semaphore::new(0))
    }
}

impl std::ops::Deref for Gate {
    type Target = Semaphore;
    fn deref(&self) -> &Semaphore {
        &self.0
    }
}

/// Jobs live in a list the fake mutates the way the real service would.
/// List responses can be held at a gate to control their arrival order.
#[derive(Default)]
pub struct FakeJobApi {
    pub jobs: Mutex<Vec<Job>>,
    pub list_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
    pub statistics_calls: AtomicUsize,
    pub fail_cancel: Mutex<HashSet<String>>,
    pub fail_list: AtomicBool,
    pub fail_statistics: AtomicBool,
    pub created: Mutex<Vec<CreateJobRequest>>,
    pub notifications: Mutex<Vec<Notification>>,
    pub notification_calls: AtomicUsize,
    pub history_pages: Mutex<Vec<u32>>,
    pub report_filters: Mutex<Vec<StatisticsFilters>>,
    pub fail_report: AtomicBool,
    pub fail_worker: AtomicBool,
    pub worker_commands: Mutex<Vec<WorkerCommand>>,
    gated: AtomicBool,
    gated_reports: AtomicBool,
    gate: Gate,
}

impl FakeJobApi {
    pub fn with_jobs(jobs: Vec<Job>) -> Self {
        Self {
            jobs: Mutex::new(jobs),
            ..Self::default()
        }
    }

    /// Hold every subsequent list response until [`release`](Self::release).
    pub fn hold_lists(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    /// Hold every subsequent statistics report the same way.
    pub fn hold_reports(&self) {
        self.gated_reports.store(true, Ordering::SeqCst);
    }

    pub fn report_calls(&self) -> usize {
        self.report_filters.lock().unwrap().len()
    }

    pub fn release(&self, responses: usize) {
        self.gate.add_permits(responses);
    }

    pub fn fail_cancel_for(&self, id: &str) {
        self.fail_cancel.lock().unwrap().insert(id.to_string());
    }

    pub fn set_status(&self, id: &str, status: JobStatus) {
        for job in self.jobs.lock().unwrap().iter_mut() {
            if job.job_id == id {
                job.status = status;
            }
        }
    }

    pub fn status_of(&self, id: &str) -> Option<JobStatus> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .find(|job| job.job_id == id)
            .map(|job| job.status)
    }

    async fn pass_gate(&self, gated: &AtomicBool) {
        if gated.load(Ordering::SeqCst) {
            self.gate.acquire().await.expect("gate open").forget();
        }
    }

    fn snapshot(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobApi for FakeJobApi {
    async fn list_jobs(&self, filters: &FilterSet) -> Result<JobPage, ClientError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        // Read before waiting so a held response carries the state at dispatch.
        let jobs: Vec<Job> = self
            .snapshot()
            .into_iter()
            .filter(|job| matches(filters, job))
            .collect();
        self.pass_gate(&self.gated).await;
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(rejected("Queue unavailable"));
        }
        let total = jobs.len() as u64;
        Ok(JobPage { jobs, total })
    }

    async fn user_jobs(&self, limit: u32) -> Result<Vec<Job>, ClientError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let jobs = self.snapshot().into_iter().take(limit as usize).collect();
        self.pass_gate(&self.gated).await;
        Ok(jobs)
    }

    async fn statistics(&self) -> Result<QueueStatistics, ClientError> {
        self.statistics_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_statistics.load(Ordering::SeqCst) {
            return Err(rejected("Statistics unavailable"));
        }
        let jobs = self.snapshot();
        Ok(QueueStatistics {
            status_counts: StatusCounts::from_jobs(&jobs),
            recent_jobs_24h: jobs.len() as u64,
            is_worker_running: true,
        })
    }

    async fn job_status(&self, job_id: &str) -> Result<Job, ClientError> {
        self.snapshot()
            .into_iter()
            .find(|job| job.job_id == job_id)
            .ok_or_else(|| rejected("Job not found"))
    }

    async fn create_job(&self, request: &CreateJobRequest) -> Result<String, ClientError> {
        let mut created = self.created.lock().unwrap();
        created.push(request.clone());
        let id = format!("new-{}", created.len());
        self.jobs
            .lock()
            .unwrap()
            .insert(0, job(&id, JobStatus::Pending));
        Ok(id)
    }

    async fn cancel_job(&self, job_id: &str) -> Result<String, ClientError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_cancel.lock().unwrap().contains(job_id) {
            return Err(rejected("Job cannot be cancelled"));
        }
        self.set_status(job_id, JobStatus::Cancelled);
        Ok("Job cancelled".to_string())
    }

    async fn retry_job(&self, job_id: &str) -> Result<String, ClientError> {
        self.set_status(job_id, JobStatus::Pending);
        Ok("Job retry initiated".to_string())
    }

    async fn notifications(
        &self,
        unread_only: bool,
        limit: Option<u32>,
    ) -> Result<Vec<Notification>, ClientError> {
        self.notification_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| !unread_only || !n.is_read)
            .take(limit.map_or(usize::MAX, |limit| limit as usize))
            .cloned()
            .collect())
    }

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), ClientError> {
        let mut notifications = self.notifications.lock().unwrap();
        let found = notifications
            .iter_mut()
            .find(|n| n.notification_id == notification_id)
            .ok_or_else(|| rejected("Notification not found"))?;
        found.is_read = true;
        Ok(())
    }

    async fn job_history(&self, page: u32, filters: &FilterSet) -> Result<HistoryPage, ClientError> {
        self.history_pages.lock().unwrap().push(page);
        let jobs: Vec<Job> = self
            .snapshot()
            .into_iter()
            .filter(|job| job.status.is_terminal() && matches(filters, job))
            .collect();
        Ok(HistoryPage {
            pagination: Pagination {
                current_page: page,
                total_pages: 1,
                total: jobs.len() as u64,
                per_page: filters.limit,
            },
            jobs,
        })
    }

    async fn history_stats(&self, _filters: &FilterSet) -> Result<HistoryStats, ClientError> {
        Ok(HistoryStats::default())
    }

    async fn export_history(&self, _filters: &FilterSet) -> Result<Vec<u8>, ClientError> {
        Ok(b"job_id,status\n".to_vec())
    }

    /// Completed count echoes the time range so tests can tell reports apart.
    async fn statistics_report(
        &self,
        filters: &StatisticsFilters,
    ) -> Result<StatisticsReport, ClientError> {
        self.report_filters.lock().unwrap().push(filters.clone());
        self.pass_gate(&self.gated_reports).await;
        if self.fail_report.load(Ordering::SeqCst) {
            return Err(rejected("Report unavailable"));
        }
        let completed = match filters.time_range.as_deref() {
            Some("month") => 30,
            Some("today") => 1,
            _ => 7,
        };
        Ok(StatisticsReport {
            overview: ReportOverview {
                completed,
                failed: 1,
                success_rate: 87.5,
                ..ReportOverview::default()
            },
            ..StatisticsReport::default()
        })
    }

    async fn trends(
        &self,
        _filters: &StatisticsFilters,
        _period: &str,
    ) -> Result<TrendSeries, ClientError> {
        Ok(TrendSeries::default())
    }

    async fn worker_command(&self, command: WorkerCommand) -> Result<WorkerReply, ClientError> {
        self.worker_commands.lock().unwrap().push(command);
        if self.fail_worker.load(Ordering::SeqCst) {
            return Err(ClientError::Rejected {
                status: 500,
                message: "Worker is already running".to_string(),
            });
        }
        Ok(WorkerReply {
            status: None,
            message: format!("Worker {} acknowledged", command.verb()),
        })
    }

    async fn worker_status(&self) -> Result<WorkerStatus, ClientError> {
        if self.fail_worker.load(Ordering::SeqCst) {
            return Err(rejected("Worker unreachable"));
        }
        Ok(WorkerStatus {
            running: true,
            ..WorkerStatus::default()
        })
    }
}

/// What the real service does with the filters it is sent. `date_range` is
/// relative to the service clock and left out.
pub fn matches(filters: &FilterSet, job: &Job) -> bool {
    if filters.status.is_some_and(|status| status != job.status) {
        return false;
    }
    if filters.priority.is_some_and(|priority| priority != job.priority) {
        return false;
    }
    if let Some(job_type) = filters.job_type.as_deref().filter(|t| !t.is_empty()) {
        if !job.job_type.eq_ignore_ascii_case(job_type) {
            return false;
        }
    }
    if filters.start_date.is_some() || filters.end_date.is_some() {
        let Some(created) = job.created_at.map(|ts| ts.date_naive()) else {
            return false;
        };
        if filters.start_date.is_some_and(|start| created < start)
            || filters.end_date.is_some_and(|end| created > end)
        {
            return false;
        }
    }
    if let Some(needle) = filters.search.as_deref().filter(|s| !s.is_empty()) {
        let needle = needle.to_lowercase();
        let haystacks = [
            Some(job.job_id.as_str()),
            Some(job.job_type.as_str()),
            job.error_message.as_deref(),
            job.target_date(),
        ];
        return haystacks
            .into_iter()
            .flatten()
            .any(|text| text.to_lowercase().contains(&needle));
    }
    true
}

/// Everything delivered so far.
pub fn drain(notices: &mut mpsc::UnboundedReceiver<Notice>) -> Vec<Notice> {
    let mut out = Vec::new();
    while let Ok(notice) = notices.try_recv() {
        out.push(notice);
    }
    out
}

pub fn messages(notices: &[Notice], level: NoticeLevel) -> Vec<&str> {
    notices
        .iter()
        .filter(|n| n.level == level)
        .map(|n| n.message.as_str())
        .collect()
}
