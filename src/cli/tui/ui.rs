//! UI rendering for the TUI.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

use crate::api::JobStatus;
use crate::dashboard::overview::PROCEDURES;
use crate::notify::NoticeLevel;
use crate::views::format::{DurationStyle, calculate_duration, format_datetime, priority_label};
use crate::views::history::PageLink;

use super::app::{Screen, TuiApp, View};

/// Main render function - dispatches to view-specific renderers.
pub fn render(frame: &mut Frame, app: &TuiApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Footer/help
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);

    match &app.view {
        View::List { screen, selected } => match screen {
            Screen::Overview => render_overview(frame, app, chunks[1], *selected),
            Screen::Queue => render_queue(frame, app, chunks[1], *selected),
            Screen::History => render_history(frame, app, chunks[1], *selected),
            Screen::Notifications => render_notifications(frame, app, chunks[1], *selected),
        },
        View::NewJob => render_form(frame, app, chunks[1]),
        View::Detail { scroll, .. } => render_detail(frame, app, chunks[1], *scroll),
    }

    render_footer(frame, app, chunks[2]);
}

fn render_header(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let badge = match app.data.unread {
        Some(0) | None => String::new(),
        Some(n) => format!("  Notifications: {n}"),
    };
    let title = format!("JOBDECK  Worker: {}{}", app.data.worker, badge);

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    frame.render_widget(block, area);
}

fn status_icon(status: JobStatus) -> Span<'static> {
    match status {
        JobStatus::Completed => Span::styled("✓", Style::default().fg(Color::Green)),
        JobStatus::Failed => Span::styled("✗", Style::default().fg(Color::Red)),
        JobStatus::Running => Span::styled("▶", Style::default().fg(Color::Cyan)),
        JobStatus::Cancelled => Span::styled("-", Style::default().fg(Color::DarkGray)),
        _ => Span::styled("•", Style::default().fg(Color::Yellow)),
    }
}

fn row_style(is_selected: bool) -> Style {
    if is_selected {
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    }
}

fn cursor(is_selected: bool) -> Span<'static> {
    Span::raw(if is_selected { "> " } else { "  " })
}

fn empty(frame: &mut Frame, area: Rect, block: Block, text: &str) {
    let text = Paragraph::new(format!("  {text}"))
        .style(Style::default().fg(Color::DarkGray))
        .block(block);
    frame.render_widget(text, area);
}

fn titled(title: String) -> Block<'static> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
}

fn render_overview(frame: &mut Frame, app: &TuiApp, area: Rect, selected: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let counters: Vec<Span> = app
        .data
        .counters
        .iter()
        .flat_map(|counter| {
            [
                Span::styled(
                    format!("  {}: ", counter.label),
                    Style::default().fg(Color::Cyan),
                ),
                Span::raw(counter.value.clone()),
            ]
        })
        .collect();
    let paragraph = Paragraph::new(Line::from(counters)).block(titled("Queue".to_string()));
    frame.render_widget(paragraph, chunks[0]);

    let block = titled("Recent Jobs".to_string());
    if app.data.recent.is_empty() {
        empty(frame, chunks[1], block, "No recent jobs");
        return;
    }

    let items: Vec<ListItem> = app
        .data
        .recent
        .iter()
        .enumerate()
        .map(|(i, card)| {
            let is_selected = i == selected;
            let marker = if card.high_priority { "!" } else { " " };
            let mut spans = vec![
                cursor(is_selected),
                status_icon(card.status),
                Span::raw(format!(
                    " {marker} {}  {}  {}  {}  {}",
                    card.job_type, card.target_date, card.procedures, card.created, card.duration
                )),
            ];
            if let Some(result) = &card.result {
                spans.push(Span::styled(
                    format!("  {result}"),
                    Style::default().fg(Color::Green),
                ));
            }
            if let Some(error) = &card.error {
                spans.push(Span::styled(
                    format!("  {error}"),
                    Style::default().fg(Color::Red),
                ));
            }
            ListItem::new(Line::from(spans)).style(row_style(is_selected))
        })
        .collect();

    frame.render_widget(List::new(items).block(block), chunks[1]);
}

fn render_queue(frame: &mut Frame, app: &TuiApp, area: Rect, selected: usize) {
    let filter = app
        .data
        .queue_status
        .map_or("all".to_string(), |status| status.to_string());
    let auto = if app.data.auto_refresh { "on" } else { "off" };
    let total = app.data.queue.as_ref().map_or(0, |t| t.total);
    let block = titled(format!(
        "Job Queue  [{total} jobs]  status: {filter}  auto-refresh: {auto}  selected: {}",
        app.data.selection.len()
    ));

    let Some(table) = app.data.queue.as_ref().filter(|t| !t.is_empty()) else {
        empty(frame, area, block, "No jobs found");
        return;
    };

    let items: Vec<ListItem> = table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let is_selected = i == selected;
            let check = if app.data.selection.contains(&row.job_id) {
                "[x]"
            } else {
                "[ ]"
            };
            let line = Line::from(vec![
                cursor(is_selected),
                Span::raw(format!("{check} ")),
                status_icon(row.status),
                Span::raw(format!(
                    "  {}  {:<12} {}  {:<9} {:>3}%  {}  {}  {}",
                    row.short_id,
                    row.job_type,
                    row.target_date,
                    row.priority_label,
                    row.progress,
                    row.attempts,
                    row.created,
                    row.duration
                )),
            ]);
            ListItem::new(line).style(row_style(is_selected))
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn render_history(frame: &mut Frame, app: &TuiApp, area: Rect, selected: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    let filter = app
        .data
        .history_status
        .map_or("all".to_string(), |status| status.to_string());
    let total = app.data.history.as_ref().map_or(0, |t| t.total);
    let block = titled(format!(
        "Job History  [{total} jobs]  page {}  status: {filter}",
        app.data.history_page
    ));

    let Some(table) = app.data.history.as_ref().filter(|t| !t.rows.is_empty()) else {
        empty(frame, area, block, "No jobs found");
        return;
    };

    let items: Vec<ListItem> = table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let line = Line::from(vec![
                cursor(i == selected),
                Span::raw(format!(
                    "{:<10} {:<12} {:<9} {}  {}  {:<10} {}",
                    row.status,
                    row.job_name,
                    row.priority,
                    row.started,
                    row.finished,
                    row.duration.as_deref().unwrap_or("-"),
                    row.result
                )),
            ]);
            ListItem::new(line).style(row_style(i == selected))
        })
        .collect();
    frame.render_widget(List::new(items).block(block), chunks[0]);

    let pages: Vec<Span> = table
        .pages
        .iter()
        .map(|link| match link {
            PageLink::Previous(_) => Span::raw(" ‹ "),
            PageLink::Next(_) => Span::raw(" › "),
            PageLink::Gap => Span::raw(" … "),
            PageLink::Page { number, current: true } => Span::styled(
                format!(" {number} "),
                Style::default().add_modifier(Modifier::REVERSED),
            ),
            PageLink::Page { number, .. } => Span::raw(format!(" {number} ")),
        })
        .collect();
    frame.render_widget(Paragraph::new(Line::from(pages)), chunks[1]);
}

fn render_notifications(frame: &mut Frame, app: &TuiApp, area: Rect, selected: usize) {
    let block = titled("Notifications".to_string());
    if app.data.notifications.is_empty() {
        empty(frame, area, block, "No notifications");
        return;
    }

    let items: Vec<ListItem> = app
        .data
        .notifications
        .iter()
        .enumerate()
        .map(|(i, notification)| {
            let dot = if notification.is_read {
                Span::raw(" ")
            } else {
                Span::styled("●", Style::default().fg(Color::Yellow))
            };
            let line = Line::from(vec![
                cursor(i == selected),
                dot,
                Span::raw(format!(
                    " {}  {}  {}",
                    format_datetime(notification.created_at),
                    notification.title,
                    notification.message
                )),
            ]);
            ListItem::new(line).style(row_style(i == selected))
        })
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

fn render_form(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let form = app.form();
    let mut lines = vec![
        Line::from(vec![
            Span::styled("  Target date: ", Style::default().fg(Color::Cyan)),
            Span::raw(form.target_date.format("%Y-%m-%d").to_string()),
        ]),
        Line::from(vec![
            Span::styled("  Priority:    ", Style::default().fg(Color::Cyan)),
            Span::raw(format!("{} ({})", form.priority, priority_label(form.priority))),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "  Procedures",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )),
    ];
    for (i, name) in PROCEDURES.iter().enumerate() {
        let check = if form.procedures.iter().any(|p| p.as_str() == *name) {
            "[x]"
        } else {
            "[ ]"
        };
        lines.push(Line::from(format!("  {}. {check} {name}", i + 1)));
    }

    let paragraph = Paragraph::new(lines).block(titled("New Job".to_string()));
    frame.render_widget(paragraph, area);
}

fn render_detail(frame: &mut Frame, app: &TuiApp, area: Rect, scroll: u16) {
    let block = titled("Job Details".to_string());

    let Some(job) = &app.data.selected_job else {
        empty(frame, area, block, "Loading...");
        return;
    };

    let field = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(format!("  {label:<13}"), Style::default().fg(Color::Cyan)),
            Span::raw(value),
        ])
    };

    let mut lines = vec![
        field("Job ID:", job.job_id.clone()),
        field("Type:", job.job_type.clone()),
        field("Status:", job.status.to_string()),
        field("Priority:", priority_label(job.priority).to_string()),
        field(
            "Attempts:",
            format!("{}/{}", job.attempts, job.max_attempts),
        ),
        field("User:", job.user_label()),
        field("Created:", format_datetime(job.created_at)),
        field("Started:", format_datetime(job.started_at)),
        field("Completed:", format_datetime(job.completed_at)),
        field(
            "Duration:",
            calculate_duration(job.started_at, job.completed_at, DurationStyle::Long)
                .unwrap_or_else(|| "-".to_string()),
        ),
        field("Target date:", job.target_date().unwrap_or("N/A").to_string()),
        field("Procedures:", job.procedures().join(", ")),
    ];

    if let Some(error) = &job.error_message {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  Error: {error}"),
            Style::default().fg(Color::Red),
        )));
    }

    if let Some(result) = &job.result_data {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "  Result",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from("  ─────────────────────────────────────────"));
        let pretty = serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string());
        lines.extend(pretty.lines().map(|l| Line::from(format!("  {l}"))));
    }

    let paragraph = Paragraph::new(lines).block(block).scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

fn render_footer(frame: &mut Frame, app: &TuiApp, area: Rect) {
    let help_text = match &app.view {
        View::List {
            screen: Screen::Overview,
            ..
        } => "[↑↓] Navigate  [Enter] Details  [c] New  [x] Cancel  [u] Queue  [h] History  [n] Notifications  [r] Refresh  [q] Quit",
        View::List {
            screen: Screen::Queue,
            ..
        } => "[space] Select  [a] All  [B] Bulk cancel  [x] Cancel  [t] Retry  [f] Status  [p] Auto  [S/X/R] Worker  [Esc] Back",
        View::List {
            screen: Screen::History,
            ..
        } => "[←→] Page  [f] Status  [t] Retry  [e] Export  [Enter] Details  [Esc] Back  [q] Quit",
        View::List {
            screen: Screen::Notifications,
            ..
        } => "[↑↓] Navigate  [m] Mark read  [Enter] Job  [Esc] Back  [q] Quit",
        View::NewJob => "[1/2] Procedure  [←→] Date  [+/-] Priority  [Enter] Submit  [Esc] Back",
        View::Detail { .. } => "[↑↓] Scroll  [x] Cancel  [t] Retry  [Esc] Back  [q] Quit",
    };

    let mut spans = vec![Span::raw(format!("  {help_text}"))];

    if let Some(notice) = &app.notice {
        let color = match notice.level {
            NoticeLevel::Info => Color::Cyan,
            NoticeLevel::Success => Color::Green,
            NoticeLevel::Warning => Color::Yellow,
            NoticeLevel::Error => Color::Red,
        };
        spans.push(Span::styled(
            format!("  {}", notice.message),
            Style::default().fg(color),
        ));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}
