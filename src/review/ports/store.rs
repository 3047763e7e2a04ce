//! Transactional store port covering the roster ledger, open tasks and
//! closed-task history.

use crate::review::domain::{
    ClosedTask, ClosedTaskId, MailLogEntry, NewClosedTask, NewMailLogEntry, OpenTask, OpenTaskId,
    Page, PageRequest, TaskFilter,
};
use crate::roster::domain::{Availability, Reviewer, ReviewerId, RosterDomainError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for review store operations.
pub type ReviewStoreResult<T> = Result<T, ReviewStoreError>;

/// Operations available inside one store transaction.
///
/// Every write joins the enclosing transaction and becomes visible to other
/// transactions only when [`ReviewStore::transaction`] commits.
pub trait ReviewTransaction {
    /// Serialises mutating transactions against each other.
    ///
    /// Callers that rank reviewers and then write must take this lock first.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::Persistence`] when the lock cannot be taken.
    fn lock_roster(&mut self) -> ReviewStoreResult<()>;

    /// Adds a member to the roster.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::DuplicateReviewer`] when the id or mail
    /// address is taken.
    fn insert_reviewer(&mut self, reviewer: &Reviewer) -> ReviewStoreResult<()>;

    /// Fetches one roster member.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::Persistence`] on storage failure.
    fn fetch_reviewer(&mut self, id: &ReviewerId) -> ReviewStoreResult<Option<Reviewer>>;

    /// Finds a roster member by mail address, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::Persistence`] on storage failure.
    fn find_reviewer_by_email(&mut self, email: &str) -> ReviewStoreResult<Option<Reviewer>>;

    /// Finds roster members whose id or display name equals `name`, ignoring
    /// case.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::Persistence`] on storage failure.
    fn find_reviewers_by_name(&mut self, name: &str) -> ReviewStoreResult<Vec<Reviewer>>;

    /// Lists the whole roster ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::Persistence`] on storage failure.
    fn list_reviewers(&mut self) -> ReviewStoreResult<Vec<Reviewer>>;

    /// Adds a signed delta to a reviewer's weighted page total.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::ReviewerNotFound`] for unknown reviewers
    /// and [`ReviewStoreError::Ledger`] when the total would go negative.
    fn adjust_pages(&mut self, id: &ReviewerId, delta: i64) -> ReviewStoreResult<Reviewer>;

    /// Sets a reviewer's availability level and refreshes `status_since`.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::ReviewerNotFound`] for unknown reviewers.
    fn set_availability(
        &mut self,
        id: &ReviewerId,
        level: Availability,
        now: DateTime<Utc>,
    ) -> ReviewStoreResult<Reviewer>;

    /// Resets every non-default level held for at least `threshold_days`.
    ///
    /// Returns the number of reset rows.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::Persistence`] on storage failure.
    fn reset_stale_availability(
        &mut self,
        threshold_days: u32,
        now: DateTime<Utc>,
    ) -> ReviewStoreResult<usize>;

    /// Inserts a new open task.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::DuplicateTask`] when the fingerprint exists.
    fn insert_open(&mut self, task: &OpenTask) -> ReviewStoreResult<()>;

    /// Fetches one open task.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::Persistence`] on storage failure.
    fn fetch_open(&mut self, id: &OpenTaskId) -> ReviewStoreResult<Option<OpenTask>>;

    /// Persists the mutable columns of an open task.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::OpenTaskNotFound`] when the row is missing.
    fn update_open(&mut self, task: &OpenTask) -> ReviewStoreResult<()>;

    /// Deletes an open task and returns the removed row.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::OpenTaskNotFound`] when the row is missing.
    fn delete_open(&mut self, id: &OpenTaskId) -> ReviewStoreResult<OpenTask>;

    /// Lists open tasks by `opened_at`, then id.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::Persistence`] on storage failure.
    fn search_open(
        &mut self,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> ReviewStoreResult<Page<OpenTask>>;

    /// Appends a history row and returns it with its sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::Persistence`] on storage failure.
    fn insert_closed(&mut self, task: NewClosedTask) -> ReviewStoreResult<ClosedTask>;

    /// Fetches one history row.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::Persistence`] on storage failure.
    fn fetch_closed(&mut self, id: ClosedTaskId) -> ReviewStoreResult<Option<ClosedTask>>;

    /// Lists history rows, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::Persistence`] on storage failure.
    fn search_closed(
        &mut self,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> ReviewStoreResult<Page<ClosedTask>>;

    /// Returns the history row with the highest sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::Persistence`] on storage failure.
    fn most_recent_closed(&mut self) -> ReviewStoreResult<Option<ClosedTask>>;

    /// Appends a mail log row stamped with `recorded_at`.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::Persistence`] on storage failure.
    fn insert_mail_log(
        &mut self,
        entry: NewMailLogEntry,
        recorded_at: DateTime<Utc>,
    ) -> ReviewStoreResult<MailLogEntry>;

    /// Lists at most `limit` mail log rows, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::Persistence`] on storage failure.
    fn recent_mail_log(&mut self, limit: usize) -> ReviewStoreResult<Vec<MailLogEntry>>;

    /// Moves an open task into history.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::OpenTaskNotFound`] when the row is missing
    /// and [`ReviewStoreError::Unassigned`] when it has no reviewer.
    fn close_open(
        &mut self,
        id: &OpenTaskId,
        closed_at: DateTime<Utc>,
    ) -> ReviewStoreResult<ClosedTask> {
        let task = self.delete_open(id)?;
        let history = task
            .close(closed_at)
            .map_err(|_| ReviewStoreError::Unassigned(id.clone()))?;
        self.insert_closed(history)
    }
}

/// Store that runs closures atomically.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Runs `work` inside one transaction.
    ///
    /// The transaction commits when `work` returns `Ok` and rolls back
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `work`, or a converted
    /// [`ReviewStoreError`] when the transaction cannot be started or
    /// committed.
    async fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<ReviewStoreError> + Send + 'static,
        F: FnOnce(&mut dyn ReviewTransaction) -> Result<T, E> + Send + 'static;
}

/// Errors returned by review store implementations.
#[derive(Debug, Clone, Error)]
pub enum ReviewStoreError {
    /// An open task with the same fingerprint already exists.
    #[error("duplicate open task: {0}")]
    DuplicateTask(OpenTaskId),

    /// A roster member with the same id or mail address already exists.
    #[error("duplicate reviewer: {0}")]
    DuplicateReviewer(ReviewerId),

    /// The open task was not found.
    #[error("open task not found: {0}")]
    OpenTaskNotFound(OpenTaskId),

    /// The closed task was not found.
    #[error("closed task not found: {0}")]
    ClosedTaskNotFound(ClosedTaskId),

    /// The reviewer was not found.
    #[error("reviewer not found: {0}")]
    ReviewerNotFound(ReviewerId),

    /// The open task cannot be closed without a reviewer.
    #[error("open task {0} has no reviewer")]
    Unassigned(OpenTaskId),

    /// A ledger adjustment was rejected.
    #[error(transparent)]
    Ledger(#[from] RosterDomainError),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ReviewStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
