//! Statistics report page: overview cards, duration buckets, trend series.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{JobApi, StatisticsFilters, StatisticsReport, TrendSeries};
use crate::config::AppConfig;
use crate::error::ClientError;
use crate::notify::Notifier;
use crate::reconciler::{Channel, ChannelGuard, PollHandle, RefreshOutcome, apply_if_current, poller};
use crate::views::{self, stats::ReportView};

pub const DEFAULT_TIME_RANGE: &str = "week";
pub const DEFAULT_PERIOD: &str = "daily";

#[derive(Default)]
struct PanelState {
    report: Option<StatisticsReport>,
    trends: Option<TrendSeries>,
}

struct PanelInner {
    api: Arc<dyn JobApi>,
    notifier: Notifier,
    report_guard: ChannelGuard,
    trend_guard: ChannelGuard,
    filters: RwLock<StatisticsFilters>,
    state: RwLock<PanelState>,
    shutdown: CancellationToken,
}

pub struct StatisticsPanel {
    inner: Arc<PanelInner>,
    period: Duration,
    poller: Option<PollHandle>,
}

impl StatisticsPanel {
    pub fn new(api: Arc<dyn JobApi>, notifier: Notifier, config: &AppConfig) -> Self {
        Self {
            inner: Arc::new(PanelInner {
                api,
                notifier,
                report_guard: ChannelGuard::new("report"),
                trend_guard: ChannelGuard::new("trends"),
                filters: RwLock::new(StatisticsFilters {
                    time_range: Some(DEFAULT_TIME_RANGE.to_string()),
                    job_type: None,
                }),
                state: RwLock::new(PanelState::default()),
                shutdown: CancellationToken::new(),
            }),
            period: config.statistics_refresh(),
            poller: None,
        }
    }

    pub async fn filters(&self) -> StatisticsFilters {
        self.inner.filters.read().await.clone()
    }

    /// Reload the report; drops the request if one is already running.
    pub async fn load(&self) -> Result<RefreshOutcome<()>, ClientError> {
        self.inner.load(false).await
    }

    pub async fn apply_filters(&self, filters: StatisticsFilters) -> Result<RefreshOutcome<()>, ClientError> {
        *self.inner.filters.write().await = filters;
        self.inner.load(true).await
    }

    /// Fetch the completed/failed series for `period` (daily, weekly, monthly).
    pub async fn load_trends(&self, period: &str) -> Result<RefreshOutcome<()>, ClientError> {
        let inner = &self.inner;
        let dispatch = inner.trend_guard.begin_superseding();
        let filters = inner.filters.read().await.clone();
        apply_if_current(
            dispatch,
            &inner.shutdown,
            &inner.state,
            inner.api.trends(&filters, period),
            |state, fetched| match fetched {
                Ok(series) => {
                    state.trends = Some(series);
                    Ok(RefreshOutcome::Applied(()))
                }
                Err(err) => {
                    warn!(period, error = %err, "Trend refresh failed");
                    inner.notifier.error("Failed to update trend chart");
                    Err(err)
                }
            },
        )
        .await
    }

    pub fn start(&mut self) {
        let inner = self.inner.clone();
        self.poller = Some(poller::spawn(
            Channel::Statistics,
            self.period,
            self.inner.shutdown.child_token(),
            move || {
                let inner = inner.clone();
                async move {
                    let _ = inner.load(false).await;
                }
            },
        ));
    }

    /// Stop polling; anything still in flight is discarded on arrival.
    pub fn stop(&self) {
        if let Some(poller) = &self.poller {
            poller.stop();
        }
        self.inner.shutdown.cancel();
    }

    pub async fn view(&self) -> Option<ReportView> {
        let state = self.inner.state.read().await;
        state.report.as_ref().map(views::stats::render_report)
    }

    pub async fn trends(&self) -> Option<TrendSeries> {
        self.inner.state.read().await.trends.clone()
    }
}

impl PanelInner {
    async fn load(&self, supersede: bool) -> Result<RefreshOutcome<()>, ClientError> {
        let dispatch = if supersede {
            self.report_guard.begin_superseding()
        } else {
            match self.report_guard.try_begin() {
                Some(dispatch) => dispatch,
                None => return Ok(RefreshOutcome::Skipped),
            }
        };
        let sequence = dispatch.sequence();
        let filters = self.filters.read().await.clone();
        apply_if_current(
            dispatch,
            &self.shutdown,
            &self.state,
            self.api.statistics_report(&filters),
            |state, fetched| match fetched {
                Ok(report) => {
                    debug!(sequence, "Statistics report applied");
                    state.report = Some(report);
                    Ok(RefreshOutcome::Applied(()))
                }
                Err(err) => {
                    warn!(error = %err, "Statistics report refresh failed");
                    self.notifier
                        .error(format!("Failed to load statistics: {}", err.user_message()));
                    Err(err)
                }
            },
        )
        .await
    }
}

impl Drop for StatisticsPanel {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}
