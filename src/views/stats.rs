//! Statistics counters and the statistics report.

use crate::api::StatisticsReport;
use crate::reconciler::StatsPanel;

use super::format::{format_number, format_seconds};

/// Shown in every counter when statistics could not be loaded.
pub const ERROR_PLACEHOLDER: &str = "Error";

/// Duration buckets in display order.
pub const DURATION_BUCKETS: [&str; 5] = ["0-30s", "30s-1m", "1-5m", "5-15m", "15m+"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counter {
    pub label: &'static str,
    pub value: String,
}

const COUNTER_LABELS: [&str; 5] = ["Pending", "Running", "Completed", "Failed", "Last 24h"];

/// The five overview counters.
pub fn render(panel: &StatsPanel) -> [Counter; 5] {
    let values: [String; 5] = match panel {
        StatsPanel::Ready(stats) => {
            let counts = &stats.status_counts;
            [
                counts.pending,
                counts.running,
                counts.completed,
                counts.failed,
                stats.recent_jobs_24h,
            ]
            .map(|n| n.to_string())
        }
        StatsPanel::Loading => std::array::from_fn(|_| "-".to_string()),
        StatsPanel::Unavailable => std::array::from_fn(|_| ERROR_PLACEHOLDER.to_string()),
    };

    let mut values = values.into_iter();
    COUNTER_LABELS.map(|label| Counter {
        label,
        value: values.next().unwrap_or_default(),
    })
}

/// Worker indicator derived from the same statistics.
pub fn worker_label(panel: &StatsPanel) -> &'static str {
    match panel {
        StatsPanel::Ready(stats) if stats.is_worker_running => "Online",
        StatsPanel::Ready(_) => "Offline",
        StatsPanel::Loading | StatsPanel::Unavailable => "Unknown",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trend {
    /// Signed change, e.g. "+4.2%".
    pub text: String,
    pub direction: TrendDirection,
    /// Whether the change is an improvement.
    pub good: bool,
}

/// Period-over-period change. `inverted` marks metrics where going down is
/// the improvement (failures, duration).
pub fn trend(value: f64, inverted: bool) -> Trend {
    let sign = if value > 0.0 { "+" } else { "" };
    let direction = if value > 0.0 {
        TrendDirection::Up
    } else if value < 0.0 {
        TrendDirection::Down
    } else {
        TrendDirection::Flat
    };
    let good = match direction {
        TrendDirection::Up => !inverted,
        TrendDirection::Down => inverted,
        TrendDirection::Flat => true,
    };
    Trend {
        text: format!("{sign}{value:.1}%"),
        direction,
        good,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportCard {
    pub label: &'static str,
    pub value: String,
    pub trend: Trend,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportView {
    pub cards: Vec<ReportCard>,
    /// (bucket, count) in [`DURATION_BUCKETS`] order.
    pub durations: Vec<(&'static str, u64)>,
    /// Outcome split: completed, failed, cancelled.
    pub outcomes: [(&'static str, u64); 3],
    pub top_errors: Vec<String>,
}

pub fn render_report(report: &StatisticsReport) -> ReportView {
    let overview = &report.overview;
    let trends = &report.trends;

    let cards = vec![
        ReportCard {
            label: "Completed",
            value: format_number(overview.completed),
            trend: trend(trends.completed_trend, false),
        },
        ReportCard {
            label: "Failed",
            value: format_number(overview.failed),
            trend: trend(trends.failed_trend, true),
        },
        ReportCard {
            label: "Avg duration",
            value: format_seconds(overview.avg_duration),
            trend: trend(trends.duration_trend, true),
        },
        ReportCard {
            label: "Success rate",
            value: format!("{:.1}%", overview.success_rate),
            trend: trend(trends.success_rate_trend, false),
        },
    ];

    let durations = DURATION_BUCKETS
        .iter()
        .map(|bucket| {
            (
                *bucket,
                report.duration_distribution.get(*bucket).copied().unwrap_or(0),
            )
        })
        .collect();

    let top_errors = report
        .common_errors
        .iter()
        .take(5)
        .map(|e| format!("{} ({}, {:.1}%)", e.error_type, e.count, e.percentage))
        .collect();

    ReportView {
        cards,
        durations,
        outcomes: [
            ("Completed", overview.completed),
            ("Failed", overview.failed),
            ("Cancelled", overview.cancelled),
        ],
        top_errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{QueueStatistics, StatusCounts};
    use crate::api::models::{ReportOverview, ReportTrends};

    #[test]
    fn unavailable_statistics_show_error_everywhere() {
        let counters = render(&StatsPanel::Unavailable);
        assert!(counters.iter().all(|c| c.value == "Error"));
        assert_eq!(counters[4].label, "Last 24h");
        assert_eq!(worker_label(&StatsPanel::Unavailable), "Unknown");
    }

    #[test]
    fn ready_statistics_fill_counters() {
        let panel = StatsPanel::Ready(QueueStatistics {
            status_counts: StatusCounts {
                pending: 3,
                running: 1,
                completed: 40,
                failed: 2,
                cancelled: 5,
            },
            recent_jobs_24h: 12,
            is_worker_running: true,
        });
        let values: Vec<_> = render(&panel).iter().map(|c| c.value.clone()).collect();
        assert_eq!(values, ["3", "1", "40", "2", "12"]);
        assert_eq!(worker_label(&panel), "Online");
        assert_eq!(render(&panel), render(&panel));
    }

    #[test]
    fn failure_and_duration_trends_are_inverted() {
        let up = trend(4.26, false);
        assert_eq!(up.text, "+4.3%");
        assert!(up.good);

        let more_failures = trend(4.0, true);
        assert_eq!(more_failures.direction, TrendDirection::Up);
        assert!(!more_failures.good);

        let faster = trend(-10.0, true);
        assert_eq!(faster.text, "-10.0%");
        assert!(faster.good);
    }

    #[test]
    fn report_view() {
        let mut report = StatisticsReport {
            overview: ReportOverview {
                completed: 1_500,
                failed: 20,
                cancelled: 3,
                avg_duration: 95.0,
                success_rate: 98.7,
            },
            trends: ReportTrends {
                failed_trend: -2.0,
                ..Default::default()
            },
            ..Default::default()
        };
        report.duration_distribution.insert("1-5m".to_string(), 7);

        let view = render_report(&report);
        assert_eq!(view.cards[0].value, "1.5K");
        assert_eq!(view.cards[2].value, "1m 35s");
        assert_eq!(view.cards[3].value, "98.7%");
        assert!(view.cards[1].trend.good);
        assert_eq!(view.durations[2], ("1-5m", 7));
        assert_eq!(view.durations[0], ("0-30s", 0));
    }
}
