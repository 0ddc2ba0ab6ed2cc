//! Screen controllers.
//!
//! Each controller owns exactly one [`Reconciler`](crate::reconciler::Reconciler)
//! and the timers bound to it. Front ends hold the controller and call into it;
//! there is no process-wide dashboard instance.

pub mod history;
pub mod overview;
pub mod queue;
pub mod statistics;

pub use history::HistoryBrowser;
pub use overview::{JobForm, Overview};
pub use queue::QueueMonitor;
pub use statistics::StatisticsPanel;

use crate::reconciler::RefreshOutcome;
use crate::error::ClientError;

/// Failures have already been turned into notices by the reconciler; callers
/// that only need "did it land" use this.
pub(crate) fn landed<T>(result: Result<RefreshOutcome<T>, ClientError>) -> bool {
    matches!(result, Ok(RefreshOutcome::Applied(_)))
}
