//! Text formatting shared by the views.

use chrono::{DateTime, Local, Utc};

use crate::api::{Job, JobStatus};

/// How much room a duration gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationStyle {
    /// Dashboard cards: "45 seconds", "3 minutes", "2h 5m".
    Long,
    /// Queue table cells: "45s", "3m", "2h 5m".
    Compact,
    /// History rows: exact "2h 5m 12s"; nothing when either end is missing.
    Precise,
}

/// Elapsed time between `start` and `end` rendered in `style`.
///
/// `Long` and `Compact` say "N/A" without a start and "Running..." without an
/// end. `Precise` returns `None` in both cases and for negative spans.
pub fn calculate_duration(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    style: DurationStyle,
) -> Option<String> {
    if style == DurationStyle::Precise {
        let ms = (end? - start?).num_milliseconds();
        if ms < 0 {
            return None;
        }
        let seconds = ms / 1000;
        let minutes = seconds / 60;
        let hours = minutes / 60;
        return Some(if hours > 0 {
            format!("{}h {}m {}s", hours, minutes % 60, seconds % 60)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds % 60)
        } else {
            format!("{}s", seconds)
        });
    }

    let Some(start) = start else {
        return Some("N/A".to_string());
    };
    let Some(end) = end else {
        return Some("Running...".to_string());
    };

    let ms = (end - start).num_milliseconds();
    let long = style == DurationStyle::Long;
    Some(if ms < 1_000 {
        if long { "< 1 second" } else { "< 1s" }.to_string()
    } else if ms < 60_000 {
        let secs = rounded(ms, 1_000);
        if long { format!("{secs} seconds") } else { format!("{secs}s") }
    } else if ms < 3_600_000 {
        let mins = rounded(ms, 60_000);
        if long { format!("{mins} minutes") } else { format!("{mins}m") }
    } else {
        let hours = ms / 3_600_000;
        let mins = rounded(ms % 3_600_000, 60_000);
        format!("{hours}h {mins}m")
    })
}

fn rounded(value: i64, unit: i64) -> i64 {
    (value + unit / 2) / unit
}

/// Seconds as "45s", "3m 20s" or "2h 5m".
pub fn format_seconds(seconds: f64) -> String {
    let seconds = seconds.max(0.0).round() as u64;
    if seconds < 60 {
        format!("{seconds}s")
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}

/// 1234 -> "1.2K", 2500000 -> "2.5M".
pub fn format_number(value: u64) -> String {
    if value >= 1_000_000 {
        format!("{:.1}M", value as f64 / 1_000_000.0)
    } else if value >= 1_000 {
        format!("{:.1}K", value as f64 / 1_000.0)
    } else {
        value.to_string()
    }
}

pub fn format_datetime(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(at) => at.with_timezone(&Local).format("%d %b %Y %H:%M").to_string(),
        None => "N/A".to_string(),
    }
}

pub fn priority_label(priority: i32) -> &'static str {
    match priority {
        ..=1 => "Critical",
        2..=3 => "High",
        4..=5 => "Normal",
        6..=7 => "Low",
        _ => "Very Low",
    }
}

/// Rough completion percentage for a progress bar.
pub fn job_progress(job: &Job) -> u8 {
    match job.status {
        JobStatus::Completed => 100,
        JobStatus::Running => 50,
        JobStatus::Failed if job.attempts > 0 && job.max_attempts > 0 => {
            (job.attempts.min(job.max_attempts) * 100 / job.max_attempts) as u8
        }
        _ => 0,
    }
}

/// First eight characters of a job id, followed by "..." when truncated.
pub fn short_id(job_id: &str) -> String {
    match job_id.char_indices().nth(8) {
        Some((cut, _)) => format!("{}...", &job_id[..cut]),
        None => job_id.to_string(),
    }
}

pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
