//! Wire types for the job service.
//!
//! The service is loose about shapes: ids arrive as strings or numbers,
//! timestamps as RFC 3339, naive ISO-8601 or RFC 2822 (Flask's default), and
//! the history endpoint names some fields differently. Everything here
//! normalises on the way in.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Unknown => "unknown",
        }
    }

    /// Finished jobs never change status again on the server.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown status '{}' (expected pending, running, completed, failed or cancelled)",
                    s
                )
            })
    }
}

pub const DEFAULT_PRIORITY: i32 = 5;

/// Coarse band the history endpoints report instead of the number.
pub fn priority_band(priority: i32) -> &'static str {
    match priority {
        ..=3 => "High",
        4..=7 => "Medium",
        _ => "Low",
    }
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    #[serde(default)]
    pub successful_procedures: u32,
    #[serde(default)]
    pub total_procedures: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(alias = "id", deserialize_with = "string_or_number")]
    pub job_id: String,
    #[serde(alias = "job_name", default)]
    pub job_type: String,
    pub status: JobStatus,
    #[serde(default = "default_priority", deserialize_with = "priority_value")]
    pub priority: i32,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub max_attempts: u32,
    #[serde(default, with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub job_data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, alias = "result", skip_serializing_if = "Option::is_none")]
    pub result_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<ResultSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Value>,
}

impl Job {
    pub fn target_date(&self) -> Option<&str> {
        self.job_data.get("target_date").and_then(Value::as_str)
    }

    pub fn procedures(&self) -> Vec<&str> {
        self.job_data
            .get("procedures")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn can_cancel(&self) -> bool {
        self.status == JobStatus::Pending
    }

    /// Failed jobs can be retried until the service's attempt budget is spent.
    pub fn can_retry(&self) -> bool {
        self.status == JobStatus::Failed && self.attempts < self.max_attempts
    }

    pub fn user_label(&self) -> String {
        match &self.user_id {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "-".to_string(),
            Some(other) => other.to_string(),
        }
    }
}

/// Per-status job counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    #[serde(default)]
    pub pending: u64,
    #[serde(default)]
    pub running: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub cancelled: u64,
}

impl StatusCounts {
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Self {
        let mut counts = StatusCounts::default();
        for job in jobs {
            match job.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
                JobStatus::Cancelled => counts.cancelled += 1,
                JobStatus::Unknown => {}
            }
        }
        counts
    }

    pub fn get(&self, status: JobStatus) -> u64 {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::Running => self.running,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
            JobStatus::Cancelled => self.cancelled,
            JobStatus::Unknown => 0,
        }
    }

    pub fn total(&self) -> u64 {
        self.pending + self.running + self.completed + self.failed + self.cancelled
    }
}

/// Aggregate numbers from `/job/statistics/api`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStatistics {
    #[serde(default)]
    pub status_counts: StatusCounts,
    #[serde(default)]
    pub recent_jobs_24h: u64,
    #[serde(default)]
    pub is_worker_running: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(alias = "id", deserialize_with = "string_or_number")]
    pub notification_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub job_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(alias = "page", default = "first_page")]
    pub current_page: u32,
    #[serde(alias = "pages", default = "first_page")]
    pub total_pages: u32,
    #[serde(alias = "total_items", default)]
    pub total: u64,
    #[serde(default)]
    pub per_page: u32,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub jobs: Vec<Job>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub cancelled: u64,
    /// Average run time in seconds.
    #[serde(default)]
    pub avg_duration: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportOverview {
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub cancelled: u64,
    #[serde(default)]
    pub avg_duration: f64,
    #[serde(default)]
    pub success_rate: f64,
}

/// Period-over-period change, in percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportTrends {
    #[serde(default)]
    pub completed_trend: f64,
    #[serde(default)]
    pub failed_trend: f64,
    #[serde(default)]
    pub duration_trend: f64,
    #[serde(default)]
    pub success_rate_trend: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorFrequency {
    pub error_type: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
    #[serde(default)]
    pub overview: ReportOverview,
    #[serde(default)]
    pub trends: ReportTrends,
    #[serde(default)]
    pub duration_distribution: BTreeMap<String, u64>,
    #[serde(default)]
    pub common_errors: Vec<ErrorFrequency>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub completed: Vec<u64>,
    #[serde(default)]
    pub failed: Vec<u64>,
}

/// Body of `POST /job/procedure`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateJobRequest {
    pub target_date: String,
    pub procedures: Vec<String>,
    pub priority: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCommand {
    Start,
    Stop,
    Restart,
}

impl WorkerCommand {
    pub fn path(&self) -> &'static str {
        match self {
            WorkerCommand::Start => "/worker/start",
            WorkerCommand::Stop => "/worker/stop",
            WorkerCommand::Restart => "/worker/restart",
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            WorkerCommand::Start => "start",
            WorkerCommand::Stop => "stop",
            WorkerCommand::Restart => "restart",
        }
    }
}

/// Result of a worker start/stop/restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerReply {
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub message: String,
}

/// Worker health as reported by `/worker/status`. The service adds fields
/// freely, so anything beyond the running flag is kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatus {
    #[serde(alias = "is_running", default)]
    pub running: bool,
    #[serde(flatten)]
    pub details: BTreeMap<String, Value>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Signed(i64),
        Unsigned(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Signed(n) => n.to_string(),
        Raw::Unsigned(n) => n.to_string(),
    })
}

/// Priorities are integers on the queue endpoints and band labels on the
/// history endpoints (`high` 1-3, `medium` 4-7, `low` 8-10). A band decodes to
/// a number inside it, so [`priority_band`] gives the label back.
fn priority_value<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Label(String),
        Missing(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n.clamp(i32::MIN as i64, i32::MAX as i64) as i32,
        Raw::Label(label) => match label.trim().to_ascii_lowercase().as_str() {
            "critical" | "urgent" => 1,
            "high" => 3,
            "medium" | "normal" => DEFAULT_PRIORITY,
            "low" => 8,
            "very low" | "very_low" => 9,
            other => other.parse().unwrap_or(DEFAULT_PRIORITY),
        },
        Raw::Missing(()) => DEFAULT_PRIORITY,
    })
}

pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    /// Parse any of the timestamp spellings the service produces. Naive values
    /// are taken as UTC.
    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse))
    }
}
