//! History table and its page selector.

use chrono::NaiveDate;

use crate::api::{FilterSet, JobStatus, Pagination, priority_band};
use crate::reconciler::Snapshot;

use super::format::{DurationStyle, calculate_duration, capitalize, format_datetime};

/// Pages shown either side of the current one.
const PAGE_WINDOW: u32 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub job_id: String,
    pub job_name: String,
    pub status: String,
    pub priority: &'static str,
    pub started: String,
    pub finished: String,
    /// Exact run time; `None` while unfinished.
    pub duration: Option<String>,
    pub result: String,
    pub can_retry: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLink {
    Previous(u32),
    Page { number: u32, current: bool },
    Gap,
    Next(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryTable {
    pub rows: Vec<HistoryRow>,
    /// Empty when everything fits on one page.
    pub pages: Vec<PageLink>,
    pub total: u64,
}

pub fn render(snapshot: &Snapshot, filters: &FilterSet) -> HistoryTable {
    // Priorities arrive as bands here, so only status is re-checked.
    let filters = FilterSet {
        priority: None,
        ..filters.clone()
    };
    let rows = super::visible(snapshot, &filters)
        .map(|job| HistoryRow {
            job_id: job.job_id.clone(),
            job_name: job.job_type.clone(),
            status: capitalize(job.status.as_str()),
            priority: priority_band(job.priority),
            started: format_datetime(job.created_at),
            finished: job
                .completed_at
                .map(|at| format_datetime(Some(at)))
                .unwrap_or_else(|| "-".to_string()),
            duration: calculate_duration(job.created_at, job.completed_at, DurationStyle::Precise),
            result: result_text(job.result_data.as_ref()),
            can_retry: job.status == JobStatus::Failed,
        })
        .collect();

    HistoryTable {
        rows,
        pages: snapshot.pagination.map(page_links).unwrap_or_default(),
        total: snapshot.total,
    }
}

fn result_text(result: Option<&serde_json::Value>) -> String {
    match result {
        None | Some(serde_json::Value::Null) => "No result".to_string(),
        Some(serde_json::Value::String(text)) if text.is_empty() => "No result".to_string(),
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Page selector: first and last page always reachable, a window of pages
/// around the current one, gaps where pages are skipped.
pub fn page_links(pagination: Pagination) -> Vec<PageLink> {
    let total = pagination.total_pages;
    if total <= 1 {
        return Vec::new();
    }
    let current = pagination.current_page.clamp(1, total);
    let start = current.saturating_sub(PAGE_WINDOW).max(1);
    let end = (current + PAGE_WINDOW).min(total);

    let mut links = Vec::new();
    if current > 1 {
        links.push(PageLink::Previous(current - 1));
    }
    if start > 1 {
        links.push(PageLink::Page {
            number: 1,
            current: false,
        });
        if start > 2 {
            links.push(PageLink::Gap);
        }
    }
    for number in start..=end {
        links.push(PageLink::Page {
            number,
            current: number == current,
        });
    }
    if end < total {
        if end < total - 1 {
            links.push(PageLink::Gap);
        }
        links.push(PageLink::Page {
            number: total,
            current: false,
        });
    }
    if current < total {
        links.push(PageLink::Next(current + 1));
    }
    links
}

/// File name used when saving an export made on `date`.
pub fn export_filename(date: NaiveDate) -> String {
    format!("job_history_{}.csv", date.format("%Y-%m-%d"))
}
