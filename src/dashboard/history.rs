//! History browser: paged history, filters, retry, CSV export.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;

use crate::api::{FilterSet, HistoryStats, JobApi, Pagination};
use crate::error::ClientError;
use crate::notify::Notifier;
use crate::reconciler::{JobQuery, MutationAction, MutationReport, Reconciler, RefreshOutcome, Snapshot};
use crate::views::{self, history::HistoryTable};

pub struct HistoryBrowser {
    reconciler: Reconciler,
    filters: FilterSet,
    page: u32,
}

impl HistoryBrowser {
    pub fn new(api: Arc<dyn JobApi>, notifier: Notifier) -> Self {
        let filters = FilterSet::default();
        let query = JobQuery::History {
            page: 1,
            filters: filters.clone(),
        };
        Self {
            reconciler: Reconciler::with_query(api, notifier, query),
            filters,
            page: 1,
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub async fn load_page(&mut self, page: u32) -> Result<RefreshOutcome<Snapshot>, ClientError> {
        self.page = page.max(1);
        let query = JobQuery::History {
            page: self.page,
            filters: self.filters.clone(),
        };
        self.reconciler.refresh_superseding(&query).await
    }

    pub async fn reload(&mut self) -> Result<RefreshOutcome<Snapshot>, ClientError> {
        self.load_page(self.page).await
    }

    async fn pagination(&self) -> Option<Pagination> {
        self.reconciler.current().await?.pagination
    }

    /// Move to the next page if there is one.
    pub async fn next_page(&mut self) -> bool {
        let last = self.pagination().await.map_or(1, |p| p.total_pages);
        if self.page >= last {
            return false;
        }
        let _ = self.load_page(self.page + 1).await;
        true
    }

    pub async fn previous_page(&mut self) -> bool {
        if self.page <= 1 {
            return false;
        }
        let _ = self.load_page(self.page - 1).await;
        true
    }

    /// Replace the filters without fetching; the next load uses them.
    pub fn set_filters(&mut self, filters: FilterSet) {
        self.filters = filters;
    }

    /// Filter changes always start again from the first page.
    pub async fn apply_filters(&mut self, filters: FilterSet) {
        self.set_filters(filters);
        let _ = self.load_page(1).await;
    }

    pub async fn reset_filters(&mut self) {
        self.reconciler.notifier().info("Filters have been reset");
        self.apply_filters(FilterSet::default()).await;
    }

    pub async fn retry(&mut self, job_id: &str) -> MutationReport {
        let report = self
            .reconciler
            .mutate(MutationAction::Retry, &[job_id.to_string()])
            .await;
        if report.succeeded() > 0 {
            let _ = self.reload().await;
        }
        report
    }

    /// Totals for the current filters. Failures are logged only.
    pub async fn stats(&self) -> Option<HistoryStats> {
        match self.reconciler.api().history_stats(&self.filters).await {
            Ok(stats) => Some(stats),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load history statistics");
                None
            }
        }
    }

    /// Download the filtered history as CSV into `dir`.
    pub async fn export(&self, dir: &Path) -> Result<PathBuf> {
        let notifier = self.reconciler.notifier();
        let written = async {
            let bytes = self.reconciler.api().export_history(&self.filters).await?;
            let path = dir.join(views::history::export_filename(Local::now().date_naive()));
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            anyhow::Ok(path)
        }
        .await;

        match &written {
            Ok(path) => {
                tracing::info!(path = %path.display(), "History exported");
                notifier.success("Job history exported successfully");
            }
            Err(err) => notifier.error(format!("Failed to export job history: {err:#}")),
        }
        written
    }

    pub async fn table(&self) -> Option<HistoryTable> {
        let snapshot = self.reconciler.current().await?;
        Some(views::history::render(&snapshot, &self.filters))
    }

    pub fn stop(&self) {
        self.reconciler.stop();
    }
}

impl Drop for HistoryBrowser {
    fn drop(&mut self) {
        self.reconciler.stop();
    }
}
