//! Overview screen: counters, recent jobs, notification badge, job creation.

use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::api::{CreateJobRequest, FilterSet, JobApi, models::DEFAULT_PRIORITY};
use crate::config::AppConfig;
use crate::error::ClientError;
use crate::notify::Notifier;
use crate::reconciler::{
    Channel, JobQuery, MutationAction, MutationReport, PollHandle, Reconciler, Submission,
};
use crate::views::{self, dashboard::RecentJobCard, stats::Counter};

/// Procedures the service knows how to run.
pub const PROCEDURES: [&str; 2] = ["attrecord", "spjamkerja"];

/// Create-job form state.
#[derive(Debug, Clone, PartialEq)]
pub struct JobForm {
    pub target_date: NaiveDate,
    pub procedures: Vec<String>,
    pub priority: i32,
}

impl Default for JobForm {
    fn default() -> Self {
        Self {
            target_date: Local::now().date_naive(),
            procedures: Vec::new(),
            priority: DEFAULT_PRIORITY,
        }
    }
}

impl JobForm {
    /// Back to an empty form dated today.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Add or remove a procedure; returns whether it is now selected.
    pub fn toggle_procedure(&mut self, name: &str) -> bool {
        if let Some(index) = self.procedures.iter().position(|p| p == name) {
            self.procedures.remove(index);
            false
        } else {
            self.procedures.push(name.to_string());
            true
        }
    }

    pub fn request(&self) -> CreateJobRequest {
        CreateJobRequest {
            target_date: self.target_date.format("%Y-%m-%d").to_string(),
            procedures: self.procedures.clone(),
            priority: self.priority,
        }
    }
}

pub struct Overview {
    reconciler: Reconciler,
    pub form: JobForm,
    recent_limit: u32,
    cadence: Cadence,
    pollers: Vec<PollHandle>,
}

struct Cadence {
    data: std::time::Duration,
    notifications: std::time::Duration,
}

impl Overview {
    pub fn new(api: Arc<dyn JobApi>, notifier: Notifier, config: &AppConfig) -> Self {
        let query = JobQuery::Recent {
            limit: config.recent_jobs_limit,
        };
        Self {
            reconciler: Reconciler::with_query(api, notifier, query),
            form: JobForm::default(),
            recent_limit: config.recent_jobs_limit,
            cadence: Cadence {
                data: config.dashboard_refresh(),
                notifications: config.notification_refresh(),
            },
            pollers: Vec::new(),
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    fn query(&self) -> JobQuery {
        JobQuery::Recent {
            limit: self.recent_limit,
        }
    }

    /// Load counters, recent jobs and the badge concurrently.
    pub async fn load(&self) {
        let query = self.query();
        let (stats, jobs, badge) = tokio::join!(
            self.reconciler.refresh_statistics(),
            self.reconciler.refresh_superseding(&query),
            self.reconciler.refresh_notification_count(),
        );
        tracing::debug!(
            stats = super::landed(stats),
            jobs = super::landed(jobs),
            badge = super::landed(badge),
            "Overview loaded"
        );
    }

    /// User-requested reload of everything on the screen.
    pub async fn refresh_all(&self) {
        self.reconciler.notifier().info("Refreshing dashboard data...");
        self.load().await;
    }

    /// Start the data and badge timers. Calling it again restarts them.
    pub fn start(&mut self) {
        self.pollers = vec![
            self.reconciler.start_polling(Channel::Jobs, self.cadence.data),
            self.reconciler.start_polling(Channel::Statistics, self.cadence.data),
            self.reconciler
                .start_polling(Channel::Notifications, self.cadence.notifications),
        ];
    }

    pub fn stop(&mut self) {
        self.pollers.clear();
        self.reconciler.stop();
    }

    /// Submit the form. On success the form resets and the screen reloads.
    pub async fn create_job(&mut self) -> Result<Submission, ClientError> {
        let submission = self.reconciler.create_job(self.form.request()).await?;
        if matches!(submission, Submission::Created(_)) {
            self.form.reset();
            self.load().await;
        }
        Ok(submission)
    }

    pub async fn cancel(&self, job_id: &str) -> MutationReport {
        let report = self
            .reconciler
            .mutate(MutationAction::Cancel, &[job_id.to_string()])
            .await;
        if report.succeeded() > 0 {
            self.load().await;
        }
        report
    }

    pub async fn recent_jobs(&self) -> Vec<RecentJobCard> {
        let filters = FilterSet::default().with_limit(self.recent_limit);
        self.reconciler
            .current()
            .await
            .map(|snapshot| views::dashboard::render(&snapshot, &filters))
            .unwrap_or_default()
    }

    pub async fn counters(&self) -> [Counter; 5] {
        views::stats::render(&self.reconciler.statistics().await)
    }

    pub async fn worker_label(&self) -> &'static str {
        views::stats::worker_label(&self.reconciler.statistics().await)
    }
}

impl Drop for Overview {
    fn drop(&mut self) {
        self.reconciler.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_request_and_reset() {
        let mut form = JobForm {
            target_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            ..JobForm::default()
        };
        assert!(form.toggle_procedure("attrecord"));
        assert!(form.toggle_procedure("spjamkerja"));
        assert!(!form.toggle_procedure("spjamkerja"));

        let request = form.request();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "target_date": "2024-01-15",
                "procedures": ["attrecord"],
                "priority": 5
            })
        );

        form.reset();
        assert!(form.procedures.is_empty());
        assert_eq!(form.target_date, Local::now().date_naive());
    }
}
