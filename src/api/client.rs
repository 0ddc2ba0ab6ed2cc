//! HTTP client for the job service.
//!
//! Every JSON endpoint answers with an envelope `{ "success": bool, ... }`.
//! A non-2xx status or `success: false` is turned into
//! [`ClientError::Rejected`] carrying the body's `message` when it has one.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::filters::{FilterSet, StatisticsFilters};
use super::models::{
    CreateJobRequest, HistoryPage, HistoryStats, Job, Notification, QueueStatistics,
    StatisticsReport, TrendSeries, WorkerCommand, WorkerReply, WorkerStatus,
};
use super::{JobApi, JobPage};
use crate::error::ClientError;

#[derive(Deserialize)]
struct JobsEnvelope {
    #[serde(default)]
    jobs: Vec<Job>,
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Deserialize)]
struct StatisticsEnvelope {
    statistics: QueueStatistics,
}

#[derive(Deserialize)]
struct JobEnvelope {
    job: Job,
}

#[derive(Deserialize)]
struct CreatedEnvelope {
    #[serde(deserialize_with = "id_string")]
    job_id: String,
}

#[derive(Deserialize)]
struct MessageEnvelope {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct NotificationsEnvelope {
    #[serde(default)]
    notifications: Vec<Notification>,
}

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct WorkerStatusEnvelope {
    #[serde(alias = "status")]
    worker_status: WorkerStatus,
}

fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Talks to the job service over HTTP.
#[derive(Clone)]
pub struct HttpJobClient {
    base: Url,
    client: reqwest::Client,
}

impl HttpJobClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base = Url::parse(base_url)
            .map_err(|e| ClientError::validation(format!("Invalid base URL '{}': {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::validation(format!(
                "Invalid base URL '{}'",
                base_url
            )));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base, client })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Build an endpoint URL from path segments; ids are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<reqwest::Response, ClientError> {
        let url = self.endpoint(segments);
        tracing::debug!(method = %method, url = %url, "Job service request");

        let mut request = self.client.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        Ok(request.send().await?)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let response = self.send(Method::GET, segments, query, None).await?;
        read_envelope(response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        let response = self.send(Method::POST, segments, &[], body).await?;
        read_envelope(response).await
    }
}

fn rejection(status: StatusCode, body: Option<&Value>) -> ClientError {
    let message = body
        .and_then(|b| b.get("message").or_else(|| b.get("error")))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| match status.canonical_reason() {
            Some(reason) if !status.is_success() => reason.to_string(),
            _ => "Request was not successful".to_string(),
        });
    ClientError::Rejected {
        status: status.as_u16(),
        message,
    }
}

async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    let body: Value = match serde_json::from_slice(&bytes) {
        Ok(body) => body,
        Err(_) if !status.is_success() => return Err(rejection(status, None)),
        Err(e) => return Err(e.into()),
    };

    let success = body
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(status.is_success());
    if !status.is_success() || !success {
        return Err(rejection(status, Some(&body)));
    }

    Ok(serde_json::from_value(body)?)
}

#[async_trait]
impl JobApi for HttpJobClient {
    async fn list_jobs(&self, filters: &FilterSet) -> Result<JobPage, ClientError> {
        let envelope: JobsEnvelope = self
            .get(&["job", "queue", "api"], &filters.queue_query())
            .await?;
        let total = envelope.total.unwrap_or(envelope.jobs.len() as u64);
        Ok(JobPage {
            jobs: envelope.jobs,
            total,
        })
    }

    async fn user_jobs(&self, limit: u32) -> Result<Vec<Job>, ClientError> {
        let envelope: JobsEnvelope = self
            .get(&["job", "user"], &[("limit", limit.to_string())])
            .await?;
        Ok(envelope.jobs)
    }

    async fn statistics(&self) -> Result<QueueStatistics, ClientError> {
        let envelope: StatisticsEnvelope = self.get(&["job", "statistics", "api"], &[]).await?;
        Ok(envelope.statistics)
    }

    async fn job_status(&self, job_id: &str) -> Result<Job, ClientError> {
        let envelope: JobEnvelope = self.get(&["job", job_id, "status"], &[]).await?;
        Ok(envelope.job)
    }

    async fn create_job(&self, request: &CreateJobRequest) -> Result<String, ClientError> {
        let envelope: CreatedEnvelope = self
            .post(&["job", "procedure"], Some(serde_json::to_value(request)?))
            .await?;
        Ok(envelope.job_id)
    }

    async fn cancel_job(&self, job_id: &str) -> Result<String, ClientError> {
        let envelope: MessageEnvelope = self.post(&["job", job_id, "cancel"], None).await?;
        Ok(envelope.message.unwrap_or_default())
    }

    async fn retry_job(&self, job_id: &str) -> Result<String, ClientError> {
        let envelope: MessageEnvelope = self.post(&["job", job_id, "retry"], None).await?;
        Ok(envelope.message.unwrap_or_default())
    }

    async fn notifications(
        &self,
        unread_only: bool,
        limit: Option<u32>,
    ) -> Result<Vec<Notification>, ClientError> {
        let mut query = Vec::new();
        if unread_only {
            query.push(("unread_only", "true".to_string()));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        let envelope: NotificationsEnvelope = self.get(&["job", "notifications"], &query).await?;
        Ok(envelope.notifications)
    }

    async fn mark_notification_read(&self, notification_id: &str) -> Result<(), ClientError> {
        let response = self
            .send(
                Method::POST,
                &["job", "notifications", notification_id, "read"],
                &[],
                None,
            )
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.json::<Value>().await.ok();
        Err(rejection(status, body.as_ref()))
    }

    async fn job_history(&self, page: u32, filters: &FilterSet) -> Result<HistoryPage, ClientError> {
        let mut query = vec![("page", page.max(1).to_string())];
        query.extend(filters.history_query());
        let envelope: DataEnvelope<HistoryPage> =
            self.get(&["job", "api", "job-history"], &query).await?;
        Ok(envelope.data)
    }

    async fn history_stats(&self, filters: &FilterSet) -> Result<HistoryStats, ClientError> {
        let envelope: DataEnvelope<HistoryStats> = self
            .get(&["job", "api", "job-history-stats"], &filters.history_query())
            .await?;
        Ok(envelope.data)
    }

    async fn export_history(&self, filters: &FilterSet) -> Result<Vec<u8>, ClientError> {
        let mut query = filters.history_query();
        query.push(("export", "csv".to_string()));
        let response = self
            .send(Method::GET, &["job", "api", "job-history-export"], &query, None)
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.json::<Value>().await.ok();
            return Err(rejection(status, body.as_ref()));
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn statistics_report(
        &self,
        filters: &StatisticsFilters,
    ) -> Result<StatisticsReport, ClientError> {
        let envelope: DataEnvelope<StatisticsReport> = self
            .get(&["job", "api", "job-statistics"], &filters.query())
            .await?;
        Ok(envelope.data)
    }

    async fn trends(
        &self,
        filters: &StatisticsFilters,
        period: &str,
    ) -> Result<TrendSeries, ClientError> {
        let mut query = filters.query();
        query.push(("period", period.to_string()));
        let envelope: DataEnvelope<TrendSeries> =
            self.get(&["job", "api", "job-trends"], &query).await?;
        Ok(envelope.data)
    }

    async fn worker_command(&self, command: WorkerCommand) -> Result<WorkerReply, ClientError> {
        let segments: Vec<&str> = command.path().trim_start_matches('/').split('/').collect();
        self.post(&segments, None).await
    }

    async fn worker_status(&self) -> Result<WorkerStatus, ClientError> {
        let envelope: WorkerStatusEnvelope = self.get(&["worker", "status"], &[]).await?;
        Ok(envelope.worker_status)
    }
}
