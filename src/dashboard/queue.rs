//! Queue monitor: filtered queue, row actions, bulk cancel, worker control.

use std::sync::Arc;
use std::time::Duration;

use crate::api::{FilterSet, JobApi, WorkerCommand, WorkerStatus};
use crate::config::AppConfig;
use crate::error::{ClientError, ErrorKind};
use crate::notify::Notifier;
use crate::reconciler::{
    Channel, JobQuery, MutationAction, MutationReport, PollHandle, Reconciler, RefreshOutcome,
    Snapshot,
};
use crate::views::{self, queue::QueueTable};

pub struct QueueMonitor {
    reconciler: Reconciler,
    filters: FilterSet,
    period: Duration,
    auto_refresh: Option<PollHandle>,
}

impl QueueMonitor {
    pub fn new(api: Arc<dyn JobApi>, notifier: Notifier, config: &AppConfig) -> Self {
        let filters = FilterSet::default().with_limit(config.queue_limit);
        Self {
            reconciler: Reconciler::with_query(api, notifier, JobQuery::Queue(filters.clone())),
            filters,
            period: config.queue_refresh(),
            auto_refresh: None,
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub async fn load(&self) -> Result<RefreshOutcome<Snapshot>, ClientError> {
        self.reconciler
            .refresh_superseding(&JobQuery::Queue(self.filters.clone()))
            .await
    }

    /// Replace the filters and reload; a response for the old filters that
    /// is still in flight will not be shown.
    pub async fn set_filters(&mut self, filters: FilterSet) {
        self.filters = filters;
        self.reconciler.clear_selection().await;
        let _ = self.load().await;
    }

    pub fn is_auto_refreshing(&self) -> bool {
        self.auto_refresh.is_some()
    }

    pub fn start_auto_refresh(&mut self) {
        self.auto_refresh = Some(self.reconciler.start_polling(Channel::Jobs, self.period));
    }

    /// Flip auto-refresh; returns whether it is now on.
    pub fn toggle_auto_refresh(&mut self) -> bool {
        match self.auto_refresh.take() {
            Some(handle) => {
                handle.stop();
                false
            }
            None => {
                self.start_auto_refresh();
                true
            }
        }
    }

    pub fn stop(&mut self) {
        self.auto_refresh = None;
        self.reconciler.stop();
    }

    pub async fn cancel(&self, job_id: &str) -> MutationReport {
        self.act(MutationAction::Cancel, job_id).await
    }

    pub async fn retry(&self, job_id: &str) -> MutationReport {
        self.act(MutationAction::Retry, job_id).await
    }

    async fn act(&self, action: MutationAction, job_id: &str) -> MutationReport {
        let report = self.reconciler.mutate(action, &[job_id.to_string()]).await;
        if report.succeeded() > 0 {
            let _ = self.load().await;
        }
        report
    }

    pub async fn toggle_selection(&self, job_id: &str) -> bool {
        self.reconciler.toggle_selection(job_id).await
    }

    pub async fn select_all(&self, force: Option<bool>) -> usize {
        self.reconciler.select_all(force).await
    }

    /// Cancel every selected job, then reload the queue.
    pub async fn bulk_cancel(&self) -> Option<MutationReport> {
        let report = self.reconciler.bulk_cancel().await?;
        let _ = self.load().await;
        Some(report)
    }

    pub async fn worker(&self, command: WorkerCommand) -> Result<String, ClientError> {
        let notifier = self.reconciler.notifier();
        match self.reconciler.api().worker_command(command).await {
            Ok(reply) => {
                let message = if reply.message.is_empty() {
                    format!("Worker {} requested", command.verb())
                } else {
                    reply.message
                };
                notifier.success(message.clone());
                if command != WorkerCommand::Stop {
                    let _ = self.load().await;
                }
                Ok(message)
            }
            Err(err) => {
                let message = match err.kind() {
                    ErrorKind::ServerRejected => err.user_message(),
                    _ => format!("Error {} worker: {}", gerund(command), err.user_message()),
                };
                notifier.error(message);
                Err(err)
            }
        }
    }

    pub async fn worker_status(&self) -> Result<WorkerStatus, ClientError> {
        self.reconciler.api().worker_status().await.inspect_err(|err| {
            self.reconciler
                .notifier()
                .error(format!("Error getting worker status: {}", err.user_message()))
        })
    }

    pub async fn table(&self) -> Option<QueueTable> {
        let snapshot = self.reconciler.current().await?;
        Some(views::queue::render(&snapshot, &self.filters))
    }
}

fn gerund(command: WorkerCommand) -> &'static str {
    match command {
        WorkerCommand::Start => "starting",
        WorkerCommand::Stop => "stopping",
        WorkerCommand::Restart => "restarting",
    }
}

impl Drop for QueueMonitor {
    fn drop(&mut self) {
        self.reconciler.stop();
    }
}
