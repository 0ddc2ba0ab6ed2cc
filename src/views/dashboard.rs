//! Recent-job cards on the overview screen.

use crate::api::{FilterSet, JobStatus};
use crate::reconciler::Snapshot;

use super::format::{DurationStyle, calculate_duration, format_datetime};

/// Priorities at or below this get the high-priority marker.
pub const HIGH_PRIORITY: i32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct RecentJobCard {
    pub job_id: String,
    pub job_type: String,
    pub status: JobStatus,
    pub high_priority: bool,
    pub target_date: String,
    pub procedures: String,
    pub created: String,
    pub duration: String,
    pub error: Option<String>,
    pub result: Option<String>,
    pub can_cancel: bool,
}

pub fn render(snapshot: &Snapshot, filters: &FilterSet) -> Vec<RecentJobCard> {
    super::visible(snapshot, filters)
        .map(|job| RecentJobCard {
            job_id: job.job_id.clone(),
            job_type: job.job_type.clone(),
            status: job.status,
            high_priority: job.priority <= HIGH_PRIORITY,
            target_date: job.target_date().unwrap_or("N/A").to_string(),
            procedures: job.procedures().join(", "),
            created: format_datetime(job.created_at),
            duration: calculate_duration(job.created_at, job.completed_at, DurationStyle::Long)
                .unwrap_or_default(),
            error: job.error_message.clone(),
            result: job.result_summary.as_ref().map(|summary| {
                format!(
                    "{}/{} procedures completed",
                    summary.successful_procedures, summary.total_procedures
                )
            }),
            can_cancel: job.can_cancel(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Job;
    use serde_json::json;

    #[test]
    fn card_fields() {
        let jobs: Vec<Job> = serde_json::from_value(json!([{
            "job_id": "abc123",
            "job_type": "procedure",
            "status": "completed",
            "priority": 1,
            "created_at": "2024-01-15T08:00:00Z",
            "completed_at": "2024-01-15T08:00:45Z",
            "job_data": {"target_date": "2024-01-15", "procedures": ["attrecord", "spjamkerja"]},
            "result_summary": {"successful_procedures": 2, "total_procedures": 2}
        }]))
        .unwrap();
        let snapshot = Snapshot::new(1, jobs, 1, None);
        let filters = FilterSet::default().with_limit(5);

        let cards = render(&snapshot, &filters);
        assert_eq!(cards.len(), 1);
        let card = &cards[0];
        assert!(card.high_priority);
        assert_eq!(card.procedures, "attrecord, spjamkerja");
        assert_eq!(card.duration, "45 seconds");
        assert_eq!(card.result.as_deref(), Some("2/2 procedures completed"));
        assert!(!card.can_cancel);

        assert_eq!(cards, render(&snapshot, &filters));
    }
}
