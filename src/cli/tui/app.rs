//! TUI application state and logic.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::api::{FilterSet, Job, JobApi, JobStatus, Notification, WorkerCommand};
use crate::config::AppConfig;
use crate::dashboard::{HistoryBrowser, JobForm, Overview, QueueMonitor, overview::PROCEDURES};
use crate::notify::{Notice, Notifier};
use crate::reconciler::{MAX_PRIORITY, MIN_PRIORITY, Submission};
use crate::views::dashboard::RecentJobCard;
use crate::views::history::HistoryTable;
use crate::views::queue::QueueTable;
use crate::views::stats::Counter;

const NOTIFICATION_LIMIT: u32 = 20;

/// Data copied out of the controllers before each frame.
#[derive(Debug, Default)]
pub struct AppData {
    pub counters: Vec<Counter>,
    pub worker: &'static str,
    pub unread: Option<usize>,
    pub recent: Vec<RecentJobCard>,
    pub queue: Option<QueueTable>,
    pub selection: BTreeSet<String>,
    pub auto_refresh: bool,
    pub queue_status: Option<JobStatus>,
    pub history: Option<HistoryTable>,
    pub history_page: u32,
    pub history_status: Option<JobStatus>,
    pub notifications: Vec<Notification>,
    pub selected_job: Option<Job>,
}

/// Top-level screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Overview,
    Queue,
    History,
    Notifications,
}

/// Current view being displayed.
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    /// One of the list screens.
    List { screen: Screen, selected: usize },
    /// Create-job form.
    NewJob,
    /// Single job detail view.
    Detail {
        job_id: String,
        scroll: u16,
        from: Screen,
    },
}

impl Default for View {
    fn default() -> Self {
        View::List {
            screen: Screen::Overview,
            selected: 0,
        }
    }
}

/// Actions that can be triggered by user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Up,
    Down,
    Left,
    Right,
    Select,
    Back,
    Refresh,
    Overview,
    Queue,
    History,
    Notifications,
    NewJob,
    Cancel,
    Retry,
    ToggleSelect,
    SelectAll,
    BulkCancel,
    AutoRefresh,
    Export,
    MarkRead,
    CycleStatus,
    Worker(WorkerCommand),
    ToggleProcedure(usize),
    PriorityUp,
    PriorityDown,
}

/// Main TUI application state.
pub struct TuiApp {
    overview: Overview,
    queue: QueueMonitor,
    history: HistoryBrowser,
    notices: mpsc::UnboundedReceiver<Notice>,
    export_dir: PathBuf,
    pub view: View,
    pub data: AppData,
    pub notice: Option<Notice>,
    pub running: bool,
}

impl TuiApp {
    pub fn new(api: Arc<dyn JobApi>, config: &AppConfig, export_dir: PathBuf) -> Self {
        let (notifier, notices) = Notifier::channel();
        Self {
            overview: Overview::new(api.clone(), notifier.clone(), config),
            queue: QueueMonitor::new(api.clone(), notifier.clone(), config),
            history: HistoryBrowser::new(api, notifier),
            notices,
            export_dir,
            view: View::default(),
            data: AppData::default(),
            notice: None,
            running: true,
        }
    }

    /// Initial load of every screen, then start the timers.
    pub async fn init(&mut self) {
        let (_, _, _) = tokio::join!(
            self.overview.load(),
            self.queue.load(),
            self.history.load_page(1),
        );
        self.overview.start();
        self.queue.start_auto_refresh();
        self.sync().await;
    }

    pub fn shutdown(&mut self) {
        self.overview.stop();
        self.queue.stop();
        self.history.stop();
    }

    /// Pull fresh state out of the controllers and keep the newest notice.
    pub async fn sync(&mut self) {
        while let Ok(notice) = self.notices.try_recv() {
            self.notice = Some(notice);
        }

        let data = &mut self.data;
        data.counters = self.overview.counters().await.to_vec();
        data.worker = self.overview.worker_label().await;
        data.unread = self.overview.reconciler().unread_notifications().await;
        data.recent = self.overview.recent_jobs().await;
        data.queue = self.queue.table().await;
        data.selection = self.queue.reconciler().selection().await;
        data.auto_refresh = self.queue.is_auto_refreshing();
        data.queue_status = self.queue.filters().status;
        data.history = self.history.table().await;
        data.history_page = self.history.page();
        data.history_status = self.history.filters().status;
    }

    pub fn form(&self) -> &JobForm {
        &self.overview.form
    }

    /// Number of rows on the current list screen.
    fn row_count(&self, screen: Screen) -> usize {
        match screen {
            Screen::Overview => self.data.recent.len(),
            Screen::Queue => self.data.queue.as_ref().map_or(0, |t| t.rows.len()),
            Screen::History => self.data.history.as_ref().map_or(0, |t| t.rows.len()),
            Screen::Notifications => self.data.notifications.len(),
        }
    }

    fn selected_job_id(&self) -> Option<(Screen, String)> {
        let View::List { screen, selected } = &self.view else {
            if let View::Detail { job_id, from, .. } = &self.view {
                return Some((*from, job_id.clone()));
            }
            return None;
        };
        let id = match screen {
            Screen::Overview => self.data.recent.get(*selected).map(|c| c.job_id.clone()),
            Screen::Queue => self
                .data
                .queue
                .as_ref()
                .and_then(|t| t.rows.get(*selected))
                .map(|r| r.job_id.clone()),
            Screen::History => self
                .data
                .history
                .as_ref()
                .and_then(|t| t.rows.get(*selected))
                .map(|r| r.job_id.clone()),
            Screen::Notifications => self
                .data
                .notifications
                .get(*selected)
                .and_then(|n| n.job_id.clone()),
        }?;
        Some((*screen, id))
    }

    fn current_screen(&self) -> Option<Screen> {
        match &self.view {
            View::List { screen, .. } => Some(*screen),
            View::Detail { from, .. } => Some(*from),
            View::NewJob => None,
        }
    }

    fn on_history_list(&self) -> bool {
        matches!(
            self.view,
            View::List {
                screen: Screen::History,
                ..
            }
        )
    }

    async fn open(&mut self, screen: Screen) {
        if screen == Screen::Notifications {
            if let Ok(list) = self
                .overview
                .reconciler()
                .notifications(NOTIFICATION_LIMIT)
                .await
            {
                self.data.notifications = list;
            }
        }
        self.view = View::List {
            screen,
            selected: 0,
        };
    }

    /// Handle an action and update state accordingly.
    pub async fn handle_action(&mut self, action: Action) {
        if self.view == View::NewJob && self.handle_form_action(action).await {
            return;
        }

        match action {
            Action::Quit => self.running = false,
            Action::Refresh => self.refresh().await,
            Action::Overview => self.open(Screen::Overview).await,
            Action::Queue => self.open(Screen::Queue).await,
            Action::History => self.open(Screen::History).await,
            Action::Notifications => self.open(Screen::Notifications).await,
            Action::NewJob => self.view = View::NewJob,
            Action::Back => {
                let screen = self.current_screen().unwrap_or(Screen::Overview);
                self.view = View::List {
                    screen,
                    selected: 0,
                };
            }
            Action::Up => self.navigate(-1),
            Action::Down => self.navigate(1),
            Action::Left if self.on_history_list() => {
                self.history.previous_page().await;
            }
            Action::Right if self.on_history_list() => {
                self.history.next_page().await;
            }
            Action::Left | Action::Right => {}
            Action::Select => self.select_item().await,
            Action::Cancel => {
                if let Some((screen, id)) = self.selected_job_id() {
                    match screen {
                        Screen::Queue => {
                            self.queue.cancel(&id).await;
                        }
                        _ => {
                            self.overview.cancel(&id).await;
                        }
                    }
                }
            }
            Action::Retry => {
                if let Some((screen, id)) = self.selected_job_id() {
                    match screen {
                        Screen::History => {
                            self.history.retry(&id).await;
                        }
                        _ => {
                            self.queue.retry(&id).await;
                        }
                    }
                }
            }
            Action::ToggleSelect => {
                if let Some((Screen::Queue, id)) = self.selected_job_id() {
                    self.queue.toggle_selection(&id).await;
                }
            }
            Action::SelectAll => {
                self.queue.select_all(None).await;
            }
            Action::BulkCancel => {
                self.queue.bulk_cancel().await;
            }
            Action::AutoRefresh => {
                self.queue.toggle_auto_refresh();
            }
            Action::Export => {
                let _ = self.history.export(&self.export_dir).await;
            }
            Action::MarkRead => self.mark_read().await,
            Action::CycleStatus => self.cycle_status().await,
            Action::Worker(command) => {
                let _ = self.queue.worker(command).await;
            }
            Action::ToggleProcedure(_) | Action::PriorityUp | Action::PriorityDown => {}
        }
        self.sync().await;
    }

    /// Keys specific to the create form; returns true when consumed.
    async fn handle_form_action(&mut self, action: Action) -> bool {
        let form = &mut self.overview.form;
        match action {
            Action::ToggleProcedure(index) => {
                if let Some(name) = PROCEDURES.get(index) {
                    form.toggle_procedure(name);
                }
            }
            Action::PriorityUp => form.priority = (form.priority - 1).max(MIN_PRIORITY),
            Action::PriorityDown => form.priority = (form.priority + 1).min(MAX_PRIORITY),
            Action::Left => {
                form.target_date = form.target_date.pred_opt().unwrap_or(form.target_date)
            }
            Action::Right => {
                form.target_date = form.target_date.succ_opt().unwrap_or(form.target_date)
            }
            Action::Select => {
                if let Ok(Submission::Created(_)) = self.overview.create_job().await {
                    self.view = View::default();
                }
                self.sync().await;
            }
            _ => return false,
        }
        true
    }

    async fn refresh(&mut self) {
        match self.current_screen() {
            Some(Screen::Queue) => {
                let _ = self.queue.load().await;
            }
            Some(Screen::History) => {
                let _ = self.history.reload().await;
            }
            Some(Screen::Notifications) => self.open(Screen::Notifications).await,
            Some(Screen::Overview) | None => self.overview.refresh_all().await,
        }
    }

    async fn cycle_status(&mut self) {
        let next = |current: Option<JobStatus>| -> Option<JobStatus> {
            let order = JobStatus::ALL;
            match current {
                None => order.first().copied(),
                Some(status) => order
                    .iter()
                    .position(|s| *s == status)
                    .and_then(|i| order.get(i + 1))
                    .copied(),
            }
        };
        match self.current_screen() {
            Some(Screen::Queue) => {
                let filters = FilterSet {
                    status: next(self.queue.filters().status),
                    ..self.queue.filters().clone()
                };
                self.queue.set_filters(filters).await;
            }
            Some(Screen::History) => {
                let status = next(self.history.filters().status);
                if status.is_none() {
                    self.history.reset_filters().await;
                } else {
                    let filters = FilterSet {
                        status,
                        ..self.history.filters().clone()
                    };
                    self.history.apply_filters(filters).await;
                }
            }
            _ => {}
        }
    }

    async fn mark_read(&mut self) {
        let &View::List {
            screen: Screen::Notifications,
            selected,
        } = &self.view
        else {
            return;
        };
        let Some(id) = self
            .data
            .notifications
            .get(selected)
            .map(|n| n.notification_id.clone())
        else {
            return;
        };
        if self
            .overview
            .reconciler()
            .mark_notification_read(&id)
            .await
            .is_ok()
        {
            if let Some(notification) = self.data.notifications.get_mut(selected) {
                notification.is_read = true;
            }
        }
    }

    fn navigate(&mut self, delta: i32) {
        let rows = self.current_screen().map_or(0, |screen| self.row_count(screen));
        match &mut self.view {
            View::List { selected, .. } => {
                let last = rows.saturating_sub(1);
                *selected = if delta < 0 {
                    selected.saturating_sub(1)
                } else {
                    (*selected + 1).min(last)
                };
            }
            View::Detail { scroll, .. } => {
                *scroll = if delta < 0 {
                    scroll.saturating_sub(1)
                } else {
                    scroll.saturating_add(1)
                };
            }
            View::NewJob => {}
        }
    }

    async fn select_item(&mut self) {
        let Some((from, job_id)) = self.selected_job_id() else {
            return;
        };
        if matches!(self.view, View::Detail { .. }) {
            return;
        }
        let reconciler = match from {
            Screen::Queue => self.queue.reconciler(),
            Screen::History => self.history.reconciler(),
            Screen::Overview | Screen::Notifications => self.overview.reconciler(),
        };
        self.data.selected_job = reconciler.job_detail(&job_id).await.ok();
        self.view = View::Detail {
            job_id,
            scroll: 0,
            from,
        };
    }
}
