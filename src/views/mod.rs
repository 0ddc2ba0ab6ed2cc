//! Pure projections of reconciler state into presentation rows.
//!
//! Nothing here touches the reconciler: every `render` takes its inputs by
//! reference and returns a fresh value, so the same inputs always produce the
//! same output.

pub mod dashboard;
pub mod format;
pub mod history;
pub mod queue;
pub mod stats;

use crate::api::{FilterSet, Job};
use crate::reconciler::Snapshot;

/// Jobs from `snapshot` to display under `filters`, at most `filters.limit`.
///
/// The service has already applied the filters. Only status and priority are
/// re-checked here, since a pending mutation can move a job out of the
/// selected status before the next snapshot arrives.
pub(crate) fn visible<'a>(
    snapshot: &'a Snapshot,
    filters: &'a FilterSet,
) -> impl Iterator<Item = &'a Job> {
    snapshot
        .jobs
        .iter()
        .filter(|job| filters.status.is_none_or(|status| status == job.status))
        .filter(|job| filters.priority.is_none_or(|priority| priority == job.priority))
        .take(filters.limit.max(1) as usize)
}
