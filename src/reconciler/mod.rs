//! Polling data reconciler.
//!
//! Keeps a locally displayed set of jobs in step with the job service while
//! periodic refreshes race with user actions.
//!
//! - Every refresh stream is a [`Channel`] with its own guard. Timer ticks are
//!   dropped when the channel is busy; user actions supersede whatever is in
//!   flight.
//! - A response is applied only when its dispatch is still the latest on the
//!   channel, so ordering follows dispatch and not arrival.
//! - Acknowledged mutations are overlaid on snapshots that predate them until
//!   a later snapshot lands.
//! - After [`Reconciler::stop`] nothing is applied any more, including
//!   responses that were already on the wire.

pub mod channel;
pub mod mutation;
pub mod poller;
pub mod snapshot;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{CreateJobRequest, Job, JobApi, Notification, QueueStatistics};
use crate::error::{ClientError, ErrorKind};
use crate::notify::Notifier;

pub use channel::{Channel, ChannelGuard, Dispatch};
pub use mutation::{
    Intent, MAX_PRIORITY, MIN_PRIORITY, MutationAction, MutationOutcome, MutationReport,
    MutationState, PendingMutation,
    Submission, overlay, validate_create,
};
pub use poller::PollHandle;
pub use snapshot::{JobQuery, Snapshot};

/// What happened to one refresh attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome<T> {
    /// The response was applied to the displayed state.
    Applied(T),
    /// The channel was busy; no request was sent.
    Skipped,
    /// A later dispatch on the channel made this response stale.
    Superseded,
    /// The reconciler was stopped before the response arrived.
    Discarded,
}

impl<T> RefreshOutcome<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            RefreshOutcome::Applied(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, RefreshOutcome::Applied(_))
    }
}

/// State of the aggregate statistics counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum StatsPanel {
    #[default]
    Loading,
    Ready(QueueStatistics),
    /// The last fetch failed; counters show a placeholder instead of numbers.
    Unavailable,
}

#[derive(Default)]
struct DisplayState {
    snapshot: Option<Arc<Snapshot>>,
    query: JobQuery,
    pending: Vec<PendingMutation>,
    stats: StatsPanel,
    unread_notifications: Option<usize>,
    selection: BTreeSet<String>,
    next_mutation_id: u64,
}

impl DisplayState {
    fn next_id(&mut self) -> u64 {
        self.next_mutation_id += 1;
        self.next_mutation_id
    }

    fn view(&self) -> Option<Snapshot> {
        self.snapshot
            .as_ref()
            .map(|snapshot| overlay(snapshot, &self.pending))
    }

    fn settle(&mut self, id: u64, state: MutationState) {
        if let Some(mutation) = self.pending.iter_mut().find(|m| m.id == id) {
            mutation.state = state;
        }
    }
}

struct Inner {
    api: Arc<dyn JobApi>,
    notifier: Notifier,
    jobs: ChannelGuard,
    statistics: ChannelGuard,
    notifications: ChannelGuard,
    submit: ChannelGuard,
    state: RwLock<DisplayState>,
    shutdown: CancellationToken,
}

/// Cloneable handle; clones share the same displayed state.
#[derive(Clone)]
pub struct Reconciler {
    inner: Arc<Inner>,
}

impl Reconciler {
    pub fn new(api: Arc<dyn JobApi>, notifier: Notifier) -> Self {
        Self::with_query(api, notifier, JobQuery::default())
    }

    pub fn with_query(api: Arc<dyn JobApi>, notifier: Notifier, query: JobQuery) -> Self {
        let state = DisplayState {
            query,
            ..Default::default()
        };
        Self {
            inner: Arc::new(Inner {
                api,
                notifier,
                jobs: ChannelGuard::new(Channel::Jobs.name()),
                statistics: ChannelGuard::new(Channel::Statistics.name()),
                notifications: ChannelGuard::new(Channel::Notifications.name()),
                submit: ChannelGuard::new("submit"),
                state: RwLock::new(state),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn api(&self) -> &Arc<dyn JobApi> {
        &self.inner.api
    }

    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    pub fn guard(&self, channel: Channel) -> &ChannelGuard {
        match channel {
            Channel::Jobs => &self.inner.jobs,
            Channel::Statistics => &self.inner.statistics,
            Channel::Notifications => &self.inner.notifications,
        }
    }

    // ---- job channel ----

    /// Fetch `query` unless a fetch is already in flight on the job channel.
    pub async fn refresh(
        &self,
        query: &JobQuery,
    ) -> Result<RefreshOutcome<Snapshot>, ClientError> {
        match self.inner.jobs.try_begin() {
            Some(dispatch) => self.run_refresh(query, dispatch).await,
            None => {
                debug!(channel = %Channel::Jobs, "Refresh skipped, channel busy");
                Ok(RefreshOutcome::Skipped)
            }
        }
    }

    /// Fetch `query` now. Anything already in flight on the job channel will
    /// be ignored when it returns.
    pub async fn refresh_superseding(
        &self,
        query: &JobQuery,
    ) -> Result<RefreshOutcome<Snapshot>, ClientError> {
        self.inner.state.write().await.query = query.clone();
        let dispatch = self.inner.jobs.begin_superseding();
        self.run_refresh(query, dispatch).await
    }

    /// Tick-style refresh of whatever query was last requested.
    pub async fn refresh_current(&self) -> Result<RefreshOutcome<Snapshot>, ClientError> {
        let query = self.query().await;
        self.refresh(&query).await
    }

    async fn run_refresh(
        &self,
        query: &JobQuery,
        dispatch: Dispatch<'_>,
    ) -> Result<RefreshOutcome<Snapshot>, ClientError> {
        let sequence = dispatch.sequence();
        let api = &self.inner.api;
        let fetch = async {
            match query {
                JobQuery::Queue(filters) => api
                    .list_jobs(filters)
                    .await
                    .map(|page| (page.jobs, page.total, None)),
                JobQuery::Recent { limit } => api.user_jobs(*limit).await.map(|jobs| {
                    let total = jobs.len() as u64;
                    (jobs, total, None)
                }),
                JobQuery::History { page, filters } => {
                    api.job_history(*page, filters).await.map(|history| {
                        let total = history.pagination.total;
                        (history.jobs, total, Some(history.pagination))
                    })
                }
            }
        };

        apply_if_current(
            dispatch,
            &self.inner.shutdown,
            &self.inner.state,
            fetch,
            |state, fetched| {
                if state
                    .snapshot
                    .as_ref()
                    .is_some_and(|shown| shown.sequence >= sequence)
                {
                    debug!(channel = %Channel::Jobs, sequence, "Older than the displayed snapshot");
                    return Ok(RefreshOutcome::Superseded);
                }
                let (jobs, total, pagination) = fetched.inspect_err(|err| {
                    warn!(channel = %Channel::Jobs, sequence, error = %err, "Refresh failed");
                    self.inner
                        .notifier
                        .error(format!("{}: {}", query.failure_label(), err.user_message()));
                })?;

                state.pending.retain(|m| {
                    !m.confirmed_by(sequence) && !matches!(m.state, MutationState::Rejected { .. })
                });
                state.query = query.clone();
                state.snapshot = Some(Arc::new(Snapshot::new(sequence, jobs, total, pagination)));
                debug!(channel = %Channel::Jobs, sequence, pending = state.pending.len(), "Snapshot applied");

                Ok(state
                    .view()
                    .map(RefreshOutcome::Applied)
                    .unwrap_or(RefreshOutcome::Discarded))
            },
        )
        .await
    }

    /// Displayed jobs: the latest snapshot with outstanding mutations overlaid.
    pub async fn current(&self) -> Option<Snapshot> {
        self.inner.state.read().await.view()
    }

    pub async fn query(&self) -> JobQuery {
        self.inner.state.read().await.query.clone()
    }

    pub async fn pending_mutations(&self) -> Vec<PendingMutation> {
        self.inner.state.read().await.pending.clone()
    }

    // ---- mutations ----

    /// Send one request per target, all at once, and report every outcome.
    /// Accepted changes show immediately; rejected ones leave the job as the
    /// service last reported it.
    pub async fn mutate(&self, action: MutationAction, targets: &[String]) -> MutationReport {
        let registered: Vec<(u64, String)> = {
            let mut state = self.inner.state.write().await;
            targets
                .iter()
                .map(|target| {
                    let id = state.next_id();
                    state
                        .pending
                        .push(PendingMutation::for_action(id, action, target));
                    (id, target.clone())
                })
                .collect()
        };

        let tasks: Vec<_> = registered
            .iter()
            .map(|(_, target)| {
                let api = self.inner.api.clone();
                let target = target.clone();
                tokio::spawn(async move {
                    match action {
                        MutationAction::Retry => api.retry_job(&target).await,
                        MutationAction::Cancel | MutationAction::BulkCancel => {
                            api.cancel_job(&target).await
                        }
                    }
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (task, (id, target)) in tasks.into_iter().zip(registered) {
            let result = match task.await {
                Ok(Ok(message)) => Ok(message),
                Ok(Err(err)) => Err(err),
                Err(join_err) => Err(ClientError::validation(format!(
                    "Request task failed: {join_err}"
                ))),
            };

            let settled = match &result {
                Ok(_) => MutationState::Acknowledged {
                    after: self.inner.jobs.latest(),
                },
                Err(err) => MutationState::Rejected {
                    reason: err.user_message(),
                },
            };
            if !self.inner.shutdown.is_cancelled() {
                self.inner.state.write().await.settle(id, settled);
            }

            if let Err(err) = &result {
                warn!(job_id = %target, action = ?action, error = %err, "Mutation failed");
            }
            outcomes.push(MutationOutcome {
                job_id: target,
                result: result.map_err(|err| describe_failure(action, &err)),
            });
        }

        let report = MutationReport { action, outcomes };
        self.announce(&report);
        report
    }

    fn announce(&self, report: &MutationReport) {
        let notifier = &self.inner.notifier;
        match report.action {
            MutationAction::BulkCancel => {
                if report.succeeded() > 0 {
                    notifier.success(format!("Successfully cancelled {} jobs", report.succeeded()));
                }
                if report.failed() > 0 {
                    notifier.error(format!("Failed to cancel {} jobs", report.failed()));
                }
            }
            MutationAction::Cancel | MutationAction::Retry => {
                for outcome in &report.outcomes {
                    match (&outcome.result, report.action) {
                        (Ok(_), MutationAction::Retry) => notifier.success("Job retry initiated"),
                        (Ok(_), _) => notifier.success("Job cancelled successfully"),
                        (Err(reason), _) => notifier.error(reason.clone()),
                    }
                }
            }
        }
    }

    /// Cancel every selected job, then clear the selection. Returns `None`
    /// when nothing was selected.
    pub async fn bulk_cancel(&self) -> Option<MutationReport> {
        let targets: Vec<String> = {
            let mut state = self.inner.state.write().await;
            std::mem::take(&mut state.selection).into_iter().collect()
        };
        if targets.is_empty() {
            self.inner.notifier.warning("Please select jobs to cancel");
            return None;
        }
        Some(self.mutate(MutationAction::BulkCancel, &targets).await)
    }

    /// Validate and submit a new job. Only one submission may be outstanding.
    pub async fn create_job(&self, request: CreateJobRequest) -> Result<Submission, ClientError> {
        if let Err(err) = validate_create(&request) {
            self.inner.notifier.warning(err.user_message());
            return Err(err);
        }
        let Some(_submitting) = self.inner.submit.try_begin() else {
            debug!("Create ignored, submission already in flight");
            return Ok(Submission::Busy);
        };

        let id = {
            let mut state = self.inner.state.write().await;
            let id = state.next_id();
            state
                .pending
                .push(PendingMutation::for_create(id, request.clone()));
            id
        };

        match self.inner.api.create_job(&request).await {
            Ok(job_id) => {
                let mut state = self.inner.state.write().await;
                if let Some(mutation) = state.pending.iter_mut().find(|m| m.id == id) {
                    mutation.target = job_id.clone();
                    mutation.state = MutationState::Acknowledged {
                        after: self.inner.jobs.latest(),
                    };
                }
                drop(state);
                self.inner
                    .notifier
                    .success(format!("Job created successfully! Job ID: {job_id}"));
                Ok(Submission::Created(job_id))
            }
            Err(err) => {
                self.inner.state.write().await.pending.retain(|m| m.id != id);
                warn!(error = %err, "Job submission failed");
                self.inner
                    .notifier
                    .error(format!("Error creating job: {}", err.user_message()));
                Err(err)
            }
        }
    }

    // ---- selection ----

    /// Flip one job in or out of the selection; returns whether it is now selected.
    pub async fn toggle_selection(&self, job_id: &str) -> bool {
        let mut state = self.inner.state.write().await;
        if state.selection.remove(job_id) {
            false
        } else {
            state.selection.insert(job_id.to_string());
            true
        }
    }

    /// Select every cancellable job on display, or clear the selection.
    /// Without `force`, selects when nothing is selected and clears otherwise.
    pub async fn select_all(&self, force: Option<bool>) -> usize {
        let mut state = self.inner.state.write().await;
        let select = force.unwrap_or(state.selection.is_empty());
        let selectable: Vec<String> = state
            .view()
            .map(|view| {
                view.jobs
                    .iter()
                    .filter(|job| job.can_cancel())
                    .map(|job| job.job_id.clone())
                    .collect()
            })
            .unwrap_or_default();

        state.selection.clear();
        if select {
            state.selection.extend(selectable);
        }
        state.selection.len()
    }

    pub async fn clear_selection(&self) {
        self.inner.state.write().await.selection.clear();
    }

    pub async fn selection(&self) -> BTreeSet<String> {
        self.inner.state.read().await.selection.clone()
    }

    // ---- statistics channel ----

    pub async fn refresh_statistics(
        &self,
    ) -> Result<RefreshOutcome<QueueStatistics>, ClientError> {
        let Some(dispatch) = self.inner.statistics.try_begin() else {
            return Ok(RefreshOutcome::Skipped);
        };
        let sequence = dispatch.sequence();
        apply_if_current(
            dispatch,
            &self.inner.shutdown,
            &self.inner.state,
            self.inner.api.statistics(),
            |state, fetched| match fetched {
                Ok(stats) => {
                    debug!(channel = %Channel::Statistics, sequence, "Statistics applied");
                    state.stats = StatsPanel::Ready(stats.clone());
                    Ok(RefreshOutcome::Applied(stats))
                }
                Err(err) => {
                    state.stats = StatsPanel::Unavailable;
                    warn!(channel = %Channel::Statistics, sequence, error = %err, "Statistics refresh failed");
                    self.inner
                        .notifier
                        .error(format!("Failed to load statistics: {}", err.user_message()));
                    Err(err)
                }
            },
        )
        .await
    }

    pub async fn statistics(&self) -> StatsPanel {
        self.inner.state.read().await.stats.clone()
    }

    // ---- notification channel ----

    /// Refresh the unread-notification badge. Failures only reach the log.
    pub async fn refresh_notification_count(
        &self,
    ) -> Result<RefreshOutcome<usize>, ClientError> {
        let Some(dispatch) = self.inner.notifications.try_begin() else {
            return Ok(RefreshOutcome::Skipped);
        };
        apply_if_current(
            dispatch,
            &self.inner.shutdown,
            &self.inner.state,
            self.inner.api.notifications(true, None),
            |state, fetched| match fetched {
                Ok(unread) => {
                    let count = unread.iter().filter(|n| !n.is_read).count();
                    state.unread_notifications = Some(count);
                    Ok(RefreshOutcome::Applied(count))
                }
                Err(err) => {
                    warn!(channel = %Channel::Notifications, error = %err, "Notification count refresh failed");
                    Err(err)
                }
            },
        )
        .await
    }

    pub async fn unread_notifications(&self) -> Option<usize> {
        self.inner.state.read().await.unread_notifications
    }

    pub async fn notifications(&self, limit: u32) -> Result<Vec<Notification>, ClientError> {
        self.inner
            .api
            .notifications(false, Some(limit))
            .await
            .inspect_err(|err| {
                self.inner
                    .notifier
                    .error(format!("Error loading notifications: {}", err.user_message()))
            })
    }

    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<(), ClientError> {
        match self.inner.api.mark_notification_read(notification_id).await {
            Ok(()) => {
                let mut state = self.inner.state.write().await;
                if let Some(count) = state.unread_notifications.as_mut() {
                    *count = count.saturating_sub(1);
                }
                Ok(())
            }
            Err(err) => {
                self.inner.notifier.error(format!(
                    "Failed to mark notification as read: {}",
                    err.user_message()
                ));
                Err(err)
            }
        }
    }

    pub async fn job_detail(&self, job_id: &str) -> Result<Job, ClientError> {
        self.inner.api.job_status(job_id).await.inspect_err(|err| {
            self.inner
                .notifier
                .error(format!("Error loading job details: {}", err.user_message()))
        })
    }

    // ---- lifecycle ----

    /// Poll `channel` every `period` until the handle or the reconciler stops.
    pub fn start_polling(&self, channel: Channel, period: Duration) -> PollHandle {
        let this = self.clone();
        poller::spawn(
            channel,
            period,
            self.inner.shutdown.child_token(),
            move || {
                let this = this.clone();
                async move { this.tick(channel).await }
            },
        )
    }

    async fn tick(&self, channel: Channel) {
        let outcome = match channel {
            Channel::Jobs => self.refresh_current().await.map(|o| o.is_applied()),
            Channel::Statistics => self.refresh_statistics().await.map(|o| o.is_applied()),
            Channel::Notifications => self
                .refresh_notification_count()
                .await
                .map(|o| o.is_applied()),
        };
        if let Ok(applied) = outcome {
            debug!(channel = %channel, applied, "Tick finished");
        }
    }

    /// Tear down: stops every poller started from this reconciler and makes
    /// all later responses no-ops.
    pub fn stop(&self) {
        if !self.inner.shutdown.is_cancelled() {
            debug!("Reconciler stopped");
        }
        self.inner.shutdown.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

/// Await `fetch` for `dispatch`, then hand the result to `apply` under the
/// state lock. Nothing is applied once `shutdown` has fired or a later
/// dispatch was issued on the same channel.
pub(crate) async fn apply_if_current<S, T, R>(
    dispatch: Dispatch<'_>,
    shutdown: &CancellationToken,
    state: &RwLock<S>,
    fetch: impl Future<Output = Result<T, ClientError>>,
    apply: impl FnOnce(&mut S, Result<T, ClientError>) -> Result<RefreshOutcome<R>, ClientError>,
) -> Result<RefreshOutcome<R>, ClientError> {
    let channel = dispatch.channel();
    let sequence = dispatch.sequence();
    debug!(channel, sequence, "Request dispatched");
    let fetched = fetch.await;

    let mut state = state.write().await;
    if shutdown.is_cancelled() {
        debug!(channel, sequence, "Response discarded after stop");
        return Ok(RefreshOutcome::Discarded);
    }
    if !dispatch.is_current() {
        debug!(channel, sequence, "Stale response ignored");
        return Ok(RefreshOutcome::Superseded);
    }
    apply(&mut *state, fetched)
}

/// Reason shown for a failed cancel or retry: the service's own message when
/// it rejected the request, a generic one otherwise.
fn describe_failure(action: MutationAction, err: &ClientError) -> String {
    let verb = match action {
        MutationAction::Retry => "retrying",
        MutationAction::Cancel | MutationAction::BulkCancel => "cancelling",
    };
    match err.kind() {
        ErrorKind::ServerRejected => err.user_message(),
        ErrorKind::NetworkFailure | ErrorKind::ValidationFailure => {
            format!("Error {verb} job: {}", err.user_message())
        }
    }
}
