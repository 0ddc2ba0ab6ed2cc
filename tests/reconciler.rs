mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{FakeJobApi, drain, job, messages, notification};
use jobdeck::api::{CreateJobRequest, FilterSet, JobApi, JobStatus, StatisticsFilters, WorkerCommand};
use jobdeck::config::AppConfig;
use jobdeck::dashboard::{HistoryBrowser, QueueMonitor, StatisticsPanel};
use jobdeck::error::ErrorKind;
use jobdeck::notify::{NoticeLevel, Notifier};
use jobdeck::reconciler::{
    Channel, JobQuery, MutationAction, Reconciler, RefreshOutcome, StatsPanel, Submission,
};
use jobdeck::views;
use tokio::time::timeout;

fn queue_query() -> JobQuery {
    JobQuery::Queue(FilterSet::default())
}

fn pending_jobs(ids: &[&str]) -> Vec<jobdeck::api::Job> {
    ids.iter().map(|id| job(id, JobStatus::Pending)).collect()
}

async fn wait_until(reached: impl Fn() -> bool) {
    timeout(Duration::from_secs(1), async {
        while !reached() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("timeout waiting for request");
}

async fn wait_for(counter: &AtomicUsize, calls: usize) {
    wait_until(|| counter.load(Ordering::SeqCst) >= calls).await;
}

#[tokio::test]
async fn busy_channel_skips_second_refresh() {
    let fake = Arc::new(FakeJobApi::with_jobs(pending_jobs(&["a"])));
    fake.hold_lists();
    let reconciler = Reconciler::new(fake.clone(), Notifier::log_only());

    let first = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.refresh(&queue_query()).await }
    });
    wait_for(&fake.list_calls, 1).await;

    let second = reconciler.refresh(&queue_query()).await.unwrap();
    assert_eq!(second, RefreshOutcome::Skipped);
    assert_eq!(fake.list_calls.load(Ordering::SeqCst), 1);

    fake.release(1);
    let first = first.await.unwrap().unwrap();
    assert!(first.is_applied());
}

#[tokio::test]
async fn response_after_stop_is_discarded() {
    let fake = Arc::new(FakeJobApi::with_jobs(pending_jobs(&["a"])));
    fake.hold_lists();
    let reconciler = Reconciler::new(fake.clone(), Notifier::log_only());

    let in_flight = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.refresh(&queue_query()).await }
    });
    wait_for(&fake.list_calls, 1).await;

    reconciler.stop();
    fake.release(1);

    let outcome = in_flight.await.unwrap().unwrap();
    assert_eq!(outcome, RefreshOutcome::Discarded);
    assert!(reconciler.current().await.is_none());
    assert!(reconciler.is_stopped());
}

#[tokio::test]
async fn superseded_response_never_replaces_newer_one() {
    let fake = Arc::new(FakeJobApi::with_jobs(pending_jobs(&["a", "b"])));
    fake.hold_lists();
    let reconciler = Reconciler::new(fake.clone(), Notifier::log_only());

    let older = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.refresh_superseding(&queue_query()).await }
    });
    wait_for(&fake.list_calls, 1).await;

    let running = JobQuery::Queue(FilterSet::default().with_status(JobStatus::Running));
    let newer = tokio::spawn({
        let reconciler = reconciler.clone();
        let running = running.clone();
        async move { reconciler.refresh_superseding(&running).await }
    });
    wait_for(&fake.list_calls, 2).await;

    fake.release(2);
    let older = older.await.unwrap().unwrap();
    let newer = newer.await.unwrap().unwrap();

    assert_eq!(older, RefreshOutcome::Superseded);
    let shown = newer.applied().expect("newer response applied");
    assert!(shown.jobs.is_empty());
    assert_eq!(reconciler.query().await, running);
}

#[tokio::test]
async fn bulk_cancel_reports_partial_failure() {
    let fake = Arc::new(FakeJobApi::with_jobs(pending_jobs(&["A", "B", "C"])));
    fake.fail_cancel_for("B");
    let (notifier, mut notices) = Notifier::channel();
    let reconciler = Reconciler::with_query(fake.clone(), notifier, queue_query());
    reconciler.refresh_current().await.unwrap();

    let targets: Vec<String> = ["A", "B", "C"].map(String::from).to_vec();
    let report = reconciler.mutate(MutationAction::BulkCancel, &targets).await;

    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(fake.cancel_calls.load(Ordering::SeqCst), 3);

    let notices = drain(&mut notices);
    assert_eq!(
        messages(&notices, NoticeLevel::Success),
        vec!["Successfully cancelled 2 jobs"]
    );
    assert_eq!(
        messages(&notices, NoticeLevel::Error),
        vec!["Failed to cancel 1 jobs"]
    );

    // Shown immediately, before any re-fetch.
    let shown = reconciler.current().await.unwrap();
    let status = |id: &str| shown.jobs.iter().find(|j| j.job_id == id).unwrap().status;
    assert_eq!(status("A"), JobStatus::Cancelled);
    assert_eq!(status("B"), JobStatus::Pending);
    assert_eq!(status("C"), JobStatus::Cancelled);

    // The next snapshot confirms the accepted changes and settles the overlay.
    reconciler.refresh_current().await.unwrap();
    assert!(reconciler.pending_mutations().await.is_empty());
    assert_eq!(fake.status_of("B"), Some(JobStatus::Pending));
}

#[tokio::test]
async fn statistics_failure_shows_error_in_every_counter() {
    let fake = Arc::new(FakeJobApi::default());
    fake.fail_statistics.store(true, Ordering::SeqCst);
    let (notifier, mut notices) = Notifier::channel();
    let reconciler = Reconciler::new(fake, notifier);

    let err = reconciler.refresh_statistics().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServerRejected);
    assert_eq!(reconciler.statistics().await, StatsPanel::Unavailable);

    let counters = views::stats::render(&reconciler.statistics().await);
    assert!(
        counters
            .iter()
            .all(|c| c.value == views::stats::ERROR_PLACEHOLDER)
    );
    assert_eq!(
        messages(&drain(&mut notices), NoticeLevel::Error),
        vec!["Failed to load statistics: Statistics unavailable"]
    );
}

#[tokio::test]
async fn created_job_shows_until_snapshot_contains_it() {
    let fake = Arc::new(FakeJobApi::with_jobs(pending_jobs(&["old"])));
    let (notifier, mut notices) = Notifier::channel();
    let reconciler =
        Reconciler::with_query(fake.clone(), notifier, JobQuery::Recent { limit: 5 });
    reconciler.refresh_current().await.unwrap();

    let request = CreateJobRequest {
        target_date: "2024-03-02".to_string(),
        procedures: vec!["attrecord".to_string()],
        priority: 3,
    };
    let submitted = reconciler.create_job(request.clone()).await.unwrap();
    assert_eq!(submitted, Submission::Created("new-1".to_string()));
    assert_eq!(fake.created.lock().unwrap().as_slice(), &[request]);

    let shown = reconciler.current().await.unwrap();
    assert_eq!(shown.jobs[0].job_id, "new-1");
    assert_eq!(shown.jobs.len(), 2);
    assert_eq!(
        messages(&drain(&mut notices), NoticeLevel::Success),
        vec!["Job created successfully! Job ID: new-1"]
    );

    reconciler.refresh_current().await.unwrap();
    assert!(reconciler.pending_mutations().await.is_empty());
    let shown = reconciler.current().await.unwrap();
    assert_eq!(
        shown.jobs.iter().filter(|j| j.job_id == "new-1").count(),
        1
    );
}

#[tokio::test]
async fn invalid_create_never_reaches_service() {
    let fake = Arc::new(FakeJobApi::default());
    let (notifier, mut notices) = Notifier::channel();
    let reconciler = Reconciler::new(fake.clone(), notifier);

    let request = CreateJobRequest {
        target_date: "2024-03-02".to_string(),
        procedures: Vec::new(),
        priority: 5,
    };
    let err = reconciler.create_job(request).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    assert!(fake.created.lock().unwrap().is_empty());
    assert_eq!(
        messages(&drain(&mut notices), NoticeLevel::Warning),
        vec!["Please select at least one procedure"]
    );
}

#[tokio::test(start_paused = true)]
async fn polling_stops_with_reconciler() {
    let fake = Arc::new(FakeJobApi::with_jobs(pending_jobs(&["a"])));
    let reconciler = Reconciler::with_query(fake.clone(), Notifier::log_only(), queue_query());

    let _handle = reconciler.start_polling(Channel::Jobs, Duration::from_secs(10));
    tokio::time::sleep(Duration::from_secs(35)).await;
    assert_eq!(fake.list_calls.load(Ordering::SeqCst), 3);

    reconciler.stop();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(fake.list_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn queue_monitor_bulk_cancel_reloads_and_clears_selection() {
    let mut jobs = pending_jobs(&["A", "B"]);
    jobs.push(job("R", JobStatus::Running));
    let fake = Arc::new(FakeJobApi::with_jobs(jobs));
    let (notifier, _notices) = Notifier::channel();
    let api: Arc<dyn JobApi> = fake.clone();
    let queue = QueueMonitor::new(api, notifier, &AppConfig::default());
    queue.load().await.unwrap();

    // Only cancellable jobs get selected.
    assert_eq!(queue.select_all(None).await, 2);

    let report = queue.bulk_cancel().await.expect("selection was not empty");
    assert_eq!(report.succeeded(), 2);
    assert!(queue.reconciler().selection().await.is_empty());

    let table = queue.table().await.unwrap();
    let cancelled = table
        .rows
        .iter()
        .filter(|row| row.status == JobStatus::Cancelled)
        .count();
    assert_eq!(cancelled, 2);
    assert!(queue.reconciler().pending_mutations().await.is_empty());
}

#[tokio::test]
async fn empty_bulk_cancel_only_warns() {
    let fake = Arc::new(FakeJobApi::with_jobs(pending_jobs(&["A"])));
    let (notifier, mut notices) = Notifier::channel();
    let reconciler = Reconciler::new(fake.clone(), notifier);

    assert!(reconciler.bulk_cancel().await.is_none());
    assert_eq!(fake.cancel_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        messages(&drain(&mut notices), NoticeLevel::Warning),
        vec!["Please select jobs to cancel"]
    );
}

#[tokio::test]
async fn history_export_writes_dated_csv() {
    let fake = Arc::new(FakeJobApi::with_jobs(vec![job("done", JobStatus::Completed)]));
    let (notifier, mut notices) = Notifier::channel();
    let mut history = HistoryBrowser::new(fake, notifier);
    history.load_page(1).await.unwrap();
    assert_eq!(history.table().await.unwrap().rows.len(), 1);

    let dir = tempfile::tempdir().unwrap();
    let path = history.export(dir.path()).await.unwrap();

    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("job_history_") && name.ends_with(".csv"));
    assert_eq!(std::fs::read(&path).unwrap(), b"job_id,status\n");
    assert_eq!(
        messages(&drain(&mut notices), NoticeLevel::Success),
        vec!["Job history exported successfully"]
    );
}

#[tokio::test]
async fn notification_badge_counts_unread_and_drops_on_read() {
    let fake = Arc::new(FakeJobApi::default());
    *fake.notifications.lock().unwrap() = vec![
        notification("n1", false),
        notification("n2", false),
        notification("n3", true),
    ];
    let (notifier, mut notices) = Notifier::channel();
    let reconciler = Reconciler::new(fake.clone(), notifier);
    assert_eq!(reconciler.unread_notifications().await, None);

    let outcome = reconciler.refresh_notification_count().await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Applied(2));

    reconciler.mark_notification_read("n1").await.unwrap();
    assert_eq!(reconciler.unread_notifications().await, Some(1));

    // Unknown ids leave the badge alone and say why.
    assert!(reconciler.mark_notification_read("missing").await.is_err());
    assert_eq!(reconciler.unread_notifications().await, Some(1));
    assert_eq!(
        messages(&drain(&mut notices), NoticeLevel::Error),
        vec!["Failed to mark notification as read: Notification not found"]
    );

    let outcome = reconciler.refresh_notification_count().await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Applied(1));
    assert_eq!(reconciler.notifications(10).await.unwrap().len(), 3);
}

#[tokio::test]
async fn held_jobs_fetch_does_not_block_other_channels() {
    let fake = Arc::new(FakeJobApi::with_jobs(pending_jobs(&["a"])));
    *fake.notifications.lock().unwrap() = vec![notification("n1", false)];
    fake.hold_lists();
    let reconciler = Reconciler::new(fake.clone(), Notifier::log_only());

    let jobs = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.refresh(&queue_query()).await }
    });
    wait_for(&fake.list_calls, 1).await;
    assert!(reconciler.guard(Channel::Jobs).is_busy());

    let badge = reconciler.refresh_notification_count().await.unwrap();
    assert_eq!(badge, RefreshOutcome::Applied(1));
    assert_eq!(fake.notification_calls.load(Ordering::SeqCst), 1);
    assert!(reconciler.refresh_statistics().await.unwrap().is_applied());

    fake.release(1);
    assert!(jobs.await.unwrap().unwrap().is_applied());
}

fn time_range(range: &str) -> StatisticsFilters {
    StatisticsFilters {
        time_range: Some(range.to_string()),
        job_type: None,
    }
}

fn completed_card(panel: &Option<jobdeck::views::stats::ReportView>) -> Option<String> {
    panel
        .as_ref()?
        .cards
        .iter()
        .find(|card| card.label == "Completed")
        .map(|card| card.value.clone())
}

#[tokio::test]
async fn statistics_panel_loads_report() {
    let fake = Arc::new(FakeJobApi::default());
    let panel = StatisticsPanel::new(fake.clone(), Notifier::log_only(), &AppConfig::default());

    assert!(panel.load().await.unwrap().is_applied());
    assert_eq!(completed_card(&panel.view().await).as_deref(), Some("7"));
    assert_eq!(
        fake.report_filters.lock().unwrap().as_slice(),
        &[time_range("week")]
    );
}

#[tokio::test]
async fn statistics_panel_keeps_latest_filters_only() {
    let fake = Arc::new(FakeJobApi::default());
    fake.hold_reports();
    let panel = StatisticsPanel::new(fake.clone(), Notifier::log_only(), &AppConfig::default());

    let (older, newer, ()) = tokio::join!(
        panel.load(),
        async {
            wait_until(|| fake.report_calls() >= 1).await;
            panel.apply_filters(time_range("month")).await
        },
        async {
            wait_until(|| fake.report_calls() >= 2).await;
            fake.release(2);
        }
    );

    assert_eq!(older.unwrap(), RefreshOutcome::Superseded);
    assert!(newer.unwrap().is_applied());
    assert_eq!(completed_card(&panel.view().await).as_deref(), Some("30"));
    assert_eq!(panel.filters().await, time_range("month"));
}

#[tokio::test]
async fn statistics_panel_discards_report_after_stop() {
    let fake = Arc::new(FakeJobApi::default());
    fake.hold_reports();
    let panel = StatisticsPanel::new(fake.clone(), Notifier::log_only(), &AppConfig::default());

    let (outcome, ()) = tokio::join!(panel.load(), async {
        wait_until(|| fake.report_calls() >= 1).await;
        panel.stop();
        fake.release(1);
    });

    assert_eq!(outcome.unwrap(), RefreshOutcome::Discarded);
    assert!(panel.view().await.is_none());
}

#[tokio::test]
async fn statistics_panel_failure_is_announced() {
    let fake = Arc::new(FakeJobApi::default());
    fake.fail_report.store(true, Ordering::SeqCst);
    let (notifier, mut notices) = Notifier::channel();
    let panel = StatisticsPanel::new(fake, notifier, &AppConfig::default());

    assert!(panel.load().await.is_err());
    assert!(panel.view().await.is_none());
    assert_eq!(
        messages(&drain(&mut notices), NoticeLevel::Error),
        vec!["Failed to load statistics: Report unavailable"]
    );
}

#[tokio::test]
async fn worker_start_confirms_and_reloads_queue() {
    let fake = Arc::new(FakeJobApi::with_jobs(pending_jobs(&["a"])));
    let (notifier, mut notices) = Notifier::channel();
    let queue = QueueMonitor::new(fake.clone(), notifier, &AppConfig::default());

    let message = queue.worker(WorkerCommand::Start).await.unwrap();
    assert_eq!(message, "Worker start acknowledged");
    assert_eq!(fake.list_calls.load(Ordering::SeqCst), 1);
    assert!(queue.table().await.is_some());

    // Stopping the worker changes nothing in the queue, so no reload.
    queue.worker(WorkerCommand::Stop).await.unwrap();
    assert_eq!(fake.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        fake.worker_commands.lock().unwrap().as_slice(),
        &[WorkerCommand::Start, WorkerCommand::Stop]
    );
    assert_eq!(
        messages(&drain(&mut notices), NoticeLevel::Success),
        vec!["Worker start acknowledged", "Worker stop acknowledged"]
    );

    assert!(queue.worker_status().await.unwrap().running);
}

#[tokio::test]
async fn worker_failures_show_service_reason() {
    let fake = Arc::new(FakeJobApi::default());
    fake.fail_worker.store(true, Ordering::SeqCst);
    let (notifier, mut notices) = Notifier::channel();
    let queue = QueueMonitor::new(fake.clone(), notifier, &AppConfig::default());

    assert!(queue.worker(WorkerCommand::Restart).await.is_err());
    assert!(queue.worker_status().await.is_err());
    assert_eq!(fake.list_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        messages(&drain(&mut notices), NoticeLevel::Error),
        vec![
            "Worker is already running",
            "Error getting worker status: Worker unreachable",
        ]
    );
}

#[tokio::test]
async fn history_page_is_fetched_once_with_current_filters() {
    let fake = Arc::new(FakeJobApi::with_jobs(vec![
        job("f1", JobStatus::Failed),
        job("c1", JobStatus::Completed),
    ]));
    let mut history = HistoryBrowser::new(fake.clone(), Notifier::log_only());

    history.set_filters(FilterSet::default().with_status(JobStatus::Failed));
    assert!(fake.history_pages.lock().unwrap().is_empty());

    history.load_page(3).await.unwrap();
    assert_eq!(fake.history_pages.lock().unwrap().as_slice(), &[3]);
    assert_eq!(history.page(), 3);

    let table = history.table().await.unwrap();
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows[0].job_id, "f1");

    // Exporting reuses the filters without loading a page.
    let dir = tempfile::tempdir().unwrap();
    history.export(dir.path()).await.unwrap();
    assert_eq!(fake.history_pages.lock().unwrap().len(), 1);
}
