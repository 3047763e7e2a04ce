//! Periodic workload digest.

use crate::review::domain::{ClosedTask, OpenTask};
use crate::review::ranking::ReviewerCandidate;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Quiet period after the last closure during which an empty digest is
/// still sent.
pub const SILENCE_WINDOW: Duration = Duration::hours(24);

/// Snapshot of open work and the assignment queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadDigest {
    /// When the digest was built.
    pub generated_at: DateTime<Utc>,
    /// Every open task, oldest first.
    pub open_tasks: Vec<OpenTask>,
    /// Full ranking, unavailable reviewers included.
    pub queue: Vec<ReviewerCandidate>,
}

/// Returns `true` when nothing is open and nothing closed within the silence
/// window before `now`.
pub(super) fn is_silent(
    open_tasks: &[OpenTask],
    last_closed: Option<&ClosedTask>,
    now: DateTime<Utc>,
) -> bool {
    open_tasks.is_empty()
        && last_closed.is_none_or(|closed| now - closed.closed_at() > SILENCE_WINDOW)
}
