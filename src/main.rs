use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use jobdeck::api::{FilterSet, HttpJobClient, JobApi, JobStatus, WorkerCommand};
use jobdeck::config::AppConfig;
use jobdeck::dashboard::{HistoryBrowser, Overview, QueueMonitor, StatisticsPanel};
use jobdeck::logging::{self, LogConfig};
use jobdeck::notify::{Notice, Notifier};
use jobdeck::reconciler::{MutationAction, Reconciler, Submission};
use serde::Serialize;
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Parser)]
#[command(name = "jobdeck")]
#[command(about = "Terminal dashboard for the background job service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./jobdeck.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Args, Serialize)]
struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    request_timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    verbose: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    json_logs: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive dashboard
    Tui {
        /// Directory for history exports
        #[arg(long, default_value = ".")]
        export_dir: PathBuf,
    },
    /// Poll in the background and print notices until interrupted
    Watch,
    #[command(subcommand)]
    Jobs(JobsCommand),
    /// Finished jobs, one page at a time
    History {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        status: Option<JobStatus>,
        #[arg(long)]
        search: Option<String>,
        /// Write the filtered history as CSV into this directory
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Queue counters, or the full report with --report
    Stats {
        #[arg(long)]
        report: bool,
        #[arg(long)]
        time_range: Option<String>,
    },
    Notifications {
        #[arg(long)]
        unread: bool,
        /// Mark this notification as read
        #[arg(long)]
        read: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    #[command(subcommand)]
    Worker(WorkerAction),
    /// Print the effective configuration
    Config {
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum JobsCommand {
    List {
        #[arg(long)]
        status: Option<JobStatus>,
        #[arg(long)]
        priority: Option<i32>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    Show {
        job_id: String,
    },
    Create {
        /// YYYY-MM-DD, defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long = "procedure", required = true)]
        procedures: Vec<String>,
        #[arg(long)]
        priority: Option<i32>,
    },
    Cancel {
        #[arg(required = true)]
        job_ids: Vec<String>,
    },
    Retry {
        job_id: String,
    },
}

#[derive(Subcommand)]
enum WorkerAction {
    Start,
    Stop,
    Restart,
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::new(cli.config.as_deref(), Some(&cli.overrides))
        .context("Failed to load configuration")?;

    if let Commands::Config { write } = &cli.command {
        return run_config(&config, write.as_deref());
    }

    let interactive = matches!(cli.command, Commands::Tui { .. });
    logging::init(LogConfig {
        json: config.json_logs,
        verbose: config.verbose,
        file: interactive.then(|| config.log_file()),
    })
    .context("Failed to initialise logging")?;

    let api: Arc<dyn JobApi> = Arc::new(
        HttpJobClient::new(&config.base_url, config.request_timeout())
            .context("Failed to create job service client")?,
    );

    match cli.command {
        Commands::Tui { export_dir } => jobdeck::cli::tui::run(api, &config, export_dir).await?,
        Commands::Watch => run_watch(api, &config).await?,
        Commands::Jobs(command) => run_jobs(api, &config, command).await?,
        Commands::History {
            page,
            status,
            search,
            export,
        } => run_history(api, page, status, search, export).await?,
        Commands::Stats { report, time_range } => {
            run_stats(api, &config, report, time_range).await?
        }
        Commands::Notifications {
            unread,
            read,
            limit,
        } => run_notifications(api, unread, read, limit).await?,
        Commands::Worker(action) => run_worker(api, &config, action).await?,
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn run_config(config: &AppConfig, write: Option<&Path>) -> Result<()> {
    let text = config.to_toml().context("Failed to serialise configuration")?;
    match write {
        Some(path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Configuration written to {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

/// Print whatever notices the command produced.
fn drain(notices: &mut UnboundedReceiver<Notice>) {
    while let Ok(notice) = notices.try_recv() {
        eprintln!("{notice}");
    }
}

async fn run_watch(api: Arc<dyn JobApi>, config: &AppConfig) -> Result<()> {
    let (notifier, mut notices) = Notifier::channel();
    let mut overview = Overview::new(api.clone(), notifier.clone(), config);
    let mut queue = QueueMonitor::new(api, notifier, config);

    let (_, loaded) = tokio::join!(overview.load(), queue.load());
    loaded.context("Initial queue load failed")?;
    overview.start();
    queue.start_auto_refresh();
    tracing::info!(base_url = %config.base_url, "Watching job service");

    let mut summary = tokio::time::interval(config.dashboard_refresh());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(notice) = notices.recv() => println!("{notice}"),
            _ = summary.tick() => {
                let counters = overview.counters().await;
                let line: Vec<String> = counters
                    .iter()
                    .map(|c| format!("{}: {}", c.label, c.value))
                    .collect();
                println!("{}  worker: {}", line.join("  "), overview.worker_label().await);
            }
        }
    }

    tracing::info!("Shutting down");
    overview.stop();
    queue.stop();
    Ok(())
}

async fn run_jobs(api: Arc<dyn JobApi>, config: &AppConfig, command: JobsCommand) -> Result<()> {
    let (notifier, mut notices) = Notifier::channel();

    let result = match command {
        JobsCommand::List {
            status,
            priority,
            search,
            limit,
        } => {
            let mut queue = QueueMonitor::new(api, notifier, config);
            let filters = FilterSet {
                status,
                priority,
                search,
                limit: limit.unwrap_or(config.queue_limit),
                ..FilterSet::default()
            };
            queue.set_filters(filters).await;
            let table = queue.table().await;
            queue.stop();
            match table {
                Some(table) if !table.is_empty() => {
                    for row in &table.rows {
                        println!(
                            "{}  {:<10} {:<12} {:<10} {:<9} {:>3}%  {:<5} {}",
                            row.job_id,
                            row.status,
                            row.job_type,
                            row.target_date,
                            row.priority_label,
                            row.progress,
                            row.attempts,
                            row.duration
                        );
                    }
                    println!("{} of {} jobs", table.rows.len(), table.total);
                    Ok(())
                }
                Some(_) => {
                    println!("No jobs found");
                    Ok(())
                }
                None => Err(anyhow::anyhow!("Failed to load jobs")),
            }
        }
        JobsCommand::Show { job_id } => {
            let reconciler = Reconciler::new(api, notifier);
            match reconciler.job_detail(&job_id).await {
                Ok(job) => serde_json::to_string_pretty(&job)
                    .map(|text| println!("{text}"))
                    .context("Failed to format job"),
                Err(err) => Err(err.into()),
            }
        }
        JobsCommand::Create {
            date,
            procedures,
            priority,
        } => {
            let mut overview = Overview::new(api, notifier, config);
            if let Some(date) = date {
                overview.form.target_date = date;
            }
            overview.form.procedures = procedures;
            if let Some(priority) = priority {
                overview.form.priority = priority;
            }
            let submitted = overview.create_job().await;
            overview.stop();
            match submitted {
                Ok(Submission::Created(job_id)) => {
                    println!("{job_id}");
                    Ok(())
                }
                Ok(Submission::Busy) => Err(anyhow::anyhow!("A submission is already in flight")),
                Err(err) => Err(err.into()),
            }
        }
        JobsCommand::Cancel { job_ids } => {
            let reconciler = Reconciler::new(api, notifier);
            let action = if job_ids.len() > 1 {
                MutationAction::BulkCancel
            } else {
                MutationAction::Cancel
            };
            let report = reconciler.mutate(action, &job_ids).await;
            if report.failed() > 0 {
                Err(anyhow::anyhow!("{} of {} cancellations failed", report.failed(), job_ids.len()))
            } else {
                Ok(())
            }
        }
        JobsCommand::Retry { job_id } => {
            let reconciler = Reconciler::new(api, notifier);
            let report = reconciler
                .mutate(MutationAction::Retry, &[job_id.clone()])
                .await;
            if report.failed() > 0 {
                Err(anyhow::anyhow!("Retry of {job_id} failed"))
            } else {
                Ok(())
            }
        }
    };

    drain(&mut notices);
    result
}

async fn run_history(
    api: Arc<dyn JobApi>,
    page: u32,
    status: Option<JobStatus>,
    search: Option<String>,
    export: Option<PathBuf>,
) -> Result<()> {
    let (notifier, mut notices) = Notifier::channel();
    let mut history = HistoryBrowser::new(api, notifier);
    let filters = FilterSet {
        status,
        search,
        ..FilterSet::default()
    };

    history.set_filters(filters);

    let result = async {
        if let Some(dir) = export {
            let path = history.export(&dir).await?;
            println!("{}", path.display());
            return Ok(());
        }

        history.load_page(page).await?;
        let Some(table) = history.table().await else {
            bail!("Failed to load job history");
        };
        for row in &table.rows {
            println!(
                "{}  {:<10} {:<12} {:<9} {}  {}  {:<10} {}",
                row.job_id,
                row.status,
                row.job_name,
                row.priority,
                row.started,
                row.finished,
                row.duration.as_deref().unwrap_or("-"),
                row.result
            );
        }
        println!("page {} ({} jobs)", history.page(), table.total);
        if let Some(stats) = history.stats().await {
            println!(
                "completed: {}  failed: {}  cancelled: {}  avg: {:.1}s",
                stats.completed, stats.failed, stats.cancelled, stats.avg_duration
            );
        }
        anyhow::Ok(())
    }
    .await;

    history.stop();
    drain(&mut notices);
    result
}

async fn run_stats(
    api: Arc<dyn JobApi>,
    config: &AppConfig,
    report: bool,
    time_range: Option<String>,
) -> Result<()> {
    let (notifier, mut notices) = Notifier::channel();

    let result = async {
        if !report {
            let reconciler = Reconciler::new(api, notifier);
            let refreshed = reconciler.refresh_statistics().await;
            let panel = reconciler.statistics().await;
            for counter in jobdeck::views::stats::render(&panel) {
                println!("{:<10} {}", counter.label, counter.value);
            }
            println!("Worker     {}", jobdeck::views::stats::worker_label(&panel));
            refreshed?;
            return Ok(());
        }

        let panel = StatisticsPanel::new(api, notifier, config);
        let mut filters = panel.filters().await;
        if time_range.is_some() {
            filters.time_range = time_range;
        }
        let loaded = panel.apply_filters(filters).await;
        let view = panel.view().await;
        panel.stop();
        loaded?;
        let Some(view) = view else {
            bail!("No statistics available");
        };
        for card in &view.cards {
            println!("{:<14} {:>10}  {}", card.label, card.value, card.trend.text);
        }
        println!();
        for (bucket, count) in &view.durations {
            println!("{bucket:<8} {count}");
        }
        for (outcome, count) in &view.outcomes {
            println!("{outcome:<10} {count}");
        }
        for error in &view.top_errors {
            println!("  {error}");
        }
        anyhow::Ok(())
    }
    .await;

    drain(&mut notices);
    result
}

async fn run_notifications(
    api: Arc<dyn JobApi>,
    unread: bool,
    read: Option<String>,
    limit: u32,
) -> Result<()> {
    let (notifier, mut notices) = Notifier::channel();
    let reconciler = Reconciler::new(api, notifier);

    let result = async {
        if let Some(id) = read {
            reconciler.mark_notification_read(&id).await?;
            return Ok(());
        }
        let list = if unread {
            reconciler.api().notifications(true, Some(limit)).await?
        } else {
            reconciler.notifications(limit).await?
        };
        for notification in &list {
            let marker = if notification.is_read { " " } else { "*" };
            println!(
                "{marker} {}  {}  {}",
                notification.notification_id, notification.title, notification.message
            );
        }
        anyhow::Ok(())
    }
    .await;

    drain(&mut notices);
    result
}

async fn run_worker(api: Arc<dyn JobApi>, config: &AppConfig, action: WorkerAction) -> Result<()> {
    let (notifier, mut notices) = Notifier::channel();
    let mut queue = QueueMonitor::new(api, notifier, config);

    let result = match action {
        WorkerAction::Start => queue.worker(WorkerCommand::Start).await.map(drop),
        WorkerAction::Stop => queue.worker(WorkerCommand::Stop).await.map(drop),
        WorkerAction::Restart => queue.worker(WorkerCommand::Restart).await.map(drop),
        WorkerAction::Status => queue.worker_status().await.map(|status| {
            println!("running: {}", status.running);
            for (key, value) in &status.details {
                println!("{key}: {value}");
            }
        }),
    };

    queue.stop();
    drain(&mut notices);
    Ok(result?)
}
