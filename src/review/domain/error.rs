//! Error types for review domain validation.

use super::OpenTaskId;
use thiserror::Error;

/// Errors returned while constructing or transforming review values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReviewDomainError {
    /// A task was given no project codes.
    #[error("a task requires at least one project code")]
    EmptyProjectCodes,

    /// A project code is empty or contains the `+` separator.
    #[error("invalid project code: {0:?}")]
    InvalidProjectCode(String),

    /// Page counts must be positive.
    #[error("page count must be positive")]
    ZeroPages,

    /// The open task identifier is not a lowercase hex SHA-256 digest.
    #[error("invalid open task id: {0}")]
    InvalidOpenTaskId(String),

    /// Closed task identifiers are positive sequence numbers.
    #[error("invalid closed task id: {0}")]
    InvalidClosedTaskId(i64),

    /// Only assigned tasks can be closed.
    #[error("open task {0} has no reviewer")]
    UnassignedTask(OpenTaskId),

    /// Page indices start at 1 and sizes must be positive.
    #[error("invalid page request: index {page_index}, size {page_size}")]
    InvalidPageRequest {
        /// Requested 1-based page index.
        page_index: u32,
        /// Requested page size.
        page_size: u32,
    },
}
