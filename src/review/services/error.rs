//! Service-level errors for review lifecycle operations.

use crate::review::domain::{ClosedTaskId, OpenTaskId, ReviewDomainError};
use crate::review::ports::ReviewStoreError;
use crate::roster::domain::ReviewerId;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Reason a reviewer was refused for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssigneeRejection {
    /// The reviewer is not on the roster.
    Unknown,
    /// The roster member only authors reports.
    NotAReviewer,
    /// The reviewer wrote the report.
    IsAuthor,
    /// The reviewer was explicitly excluded.
    Excluded,
    /// The task already has a reviewer.
    AlreadyAssigned,
}

impl fmt::Display for AssigneeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Unknown => "not on the roster",
            Self::NotAReviewer => "not a reviewer",
            Self::IsAuthor => "author of the report",
            Self::Excluded => "excluded from this task",
            Self::AlreadyAssigned => "task is already assigned",
        };
        f.write_str(text)
    }
}

/// Errors returned by [`super::ReviewLifecycleService`].
///
/// Any error aborts and rolls back the enclosing transaction.
#[derive(Debug, Clone, Error)]
pub enum ReviewLifecycleError {
    /// An open task with the same project codes already exists.
    #[error("duplicate task: {0}")]
    DuplicateTask(OpenTaskId),

    /// A roster member with the same id or mail address already exists.
    #[error("duplicate reviewer: {0}")]
    DuplicateReviewer(ReviewerId),

    /// The open task does not exist.
    #[error("task not found: {0}")]
    TaskNotFound(OpenTaskId),

    /// The closed task does not exist.
    #[error("closed task not found: {0}")]
    ClosedTaskNotFound(ClosedTaskId),

    /// The roster member does not exist.
    #[error("reviewer not found: {0}")]
    ReviewerNotFound(ReviewerId),

    /// A requested reviewer cannot take the task.
    #[error("invalid assignee {reviewer}: {reason}")]
    InvalidAssignee {
        /// Reviewer that was refused.
        reviewer: ReviewerId,
        /// Why the reviewer was refused.
        reason: AssigneeRejection,
    },

    /// Ranking produced no candidate.
    #[error("no eligible reviewer for task {0}")]
    NoEligibleReviewer(OpenTaskId),

    /// The workload ledger disagrees with the open tasks.
    #[error("ledger invariant violated: {0}")]
    InvariantViolation(String),

    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] ReviewDomainError),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl From<ReviewStoreError> for ReviewLifecycleError {
    fn from(err: ReviewStoreError) -> Self {
        match err {
            ReviewStoreError::DuplicateTask(id) => Self::DuplicateTask(id),
            ReviewStoreError::DuplicateReviewer(id) => Self::DuplicateReviewer(id),
            ReviewStoreError::OpenTaskNotFound(id) => Self::TaskNotFound(id),
            ReviewStoreError::ClosedTaskNotFound(id) => Self::ClosedTaskNotFound(id),
            ReviewStoreError::ReviewerNotFound(id) => Self::ReviewerNotFound(id),
            ReviewStoreError::Unassigned(id) => {
                Self::Domain(ReviewDomainError::UnassignedTask(id))
            }
            ReviewStoreError::Ledger(inner) => Self::InvariantViolation(inner.to_string()),
            ReviewStoreError::Persistence(inner) => Self::Persistence(inner),
        }
    }
}

/// Result type for review lifecycle operations.
pub type ReviewLifecycleResult<T> = Result<T, ReviewLifecycleError>;
