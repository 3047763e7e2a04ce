//! Open and closed review task aggregates.

use super::{ClosedTaskId, OpenTaskId, Pages, ProjectCodes, ReviewDomainError};
use crate::roster::domain::ReviewerId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Report that is waiting for, or undergoing, review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenTask {
    id: OpenTaskId,
    codes: ProjectCodes,
    company: String,
    pages: Pages,
    urgent: bool,
    author_id: ReviewerId,
    reviewer_id: Option<ReviewerId>,
    opened_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted open task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedOpenTaskData {
    /// Persisted project codes.
    pub codes: ProjectCodes,
    /// Persisted company name.
    pub company: String,
    /// Persisted page count.
    pub pages: Pages,
    /// Persisted urgency flag.
    pub urgent: bool,
    /// Persisted author.
    pub author_id: ReviewerId,
    /// Persisted reviewer, if assigned.
    pub reviewer_id: Option<ReviewerId>,
    /// Persisted opening timestamp.
    pub opened_at: DateTime<Utc>,
}

impl OpenTask {
    /// Creates an unassigned open task stamped with the current time.
    #[must_use]
    pub fn new(
        codes: ProjectCodes,
        company: impl Into<String>,
        pages: Pages,
        urgent: bool,
        author_id: ReviewerId,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: OpenTaskId::from_codes(&codes),
            codes,
            company: company.into().trim().to_owned(),
            pages,
            urgent,
            author_id,
            reviewer_id: None,
            opened_at: clock.utc(),
        }
    }

    /// Replaces the opening timestamp.
    #[must_use]
    pub const fn with_opened_at(mut self, opened_at: DateTime<Utc>) -> Self {
        self.opened_at = opened_at;
        self
    }

    /// Reconstructs an open task from persisted storage.
    ///
    /// The identifier is re-derived from the codes.
    #[must_use]
    pub fn from_persisted(data: PersistedOpenTaskData) -> Self {
        Self {
            id: OpenTaskId::from_codes(&data.codes),
            codes: data.codes,
            company: data.company,
            pages: data.pages,
            urgent: data.urgent,
            author_id: data.author_id,
            reviewer_id: data.reviewer_id,
            opened_at: data.opened_at,
        }
    }

    /// Returns the task fingerprint.
    #[must_use]
    pub const fn id(&self) -> &OpenTaskId {
        &self.id
    }

    /// Returns the project codes.
    #[must_use]
    pub const fn codes(&self) -> &ProjectCodes {
        &self.codes
    }

    /// Returns the company name.
    #[must_use]
    pub fn company(&self) -> &str {
        &self.company
    }

    /// Returns the page count.
    #[must_use]
    pub const fn pages(&self) -> Pages {
        self.pages
    }

    /// Returns whether the task is urgent.
    #[must_use]
    pub const fn urgent(&self) -> bool {
        self.urgent
    }

    /// Returns the author.
    #[must_use]
    pub const fn author_id(&self) -> &ReviewerId {
        &self.author_id
    }

    /// Returns the assigned reviewer, if any.
    #[must_use]
    pub const fn reviewer_id(&self) -> Option<&ReviewerId> {
        self.reviewer_id.as_ref()
    }

    /// Returns the opening timestamp.
    #[must_use]
    pub const fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Returns the ledger weight of the task.
    #[must_use]
    pub fn weighted_pages(&self) -> i64 {
        self.pages.weighted(self.urgent)
    }

    /// Sets or replaces the assigned reviewer.
    pub fn set_reviewer(&mut self, reviewer_id: ReviewerId) {
        self.reviewer_id = Some(reviewer_id);
    }

    /// Replaces the page count.
    pub const fn set_pages(&mut self, pages: Pages) {
        self.pages = pages;
    }

    /// Replaces the urgency flag.
    pub const fn set_urgent(&mut self, urgent: bool) {
        self.urgent = urgent;
    }

    /// Builds the history row written when the task is finished.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewDomainError::UnassignedTask`] when no reviewer has
    /// been assigned.
    pub fn close(&self, closed_at: DateTime<Utc>) -> Result<NewClosedTask, ReviewDomainError> {
        let reviewer_id = self
            .reviewer_id
            .clone()
            .ok_or_else(|| ReviewDomainError::UnassignedTask(self.id.clone()))?;
        Ok(NewClosedTask {
            codes: self.codes.clone(),
            company: self.company.clone(),
            pages: self.pages,
            urgent: self.urgent,
            author_id: self.author_id.clone(),
            reviewer_id,
            opened_at: self.opened_at,
            closed_at,
        })
    }
}

/// History row awaiting its sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClosedTask {
    /// Project codes of the finished task.
    pub codes: ProjectCodes,
    /// Company name.
    pub company: String,
    /// Page count at finish time.
    pub pages: Pages,
    /// Urgency flag at finish time.
    pub urgent: bool,
    /// Author of the report.
    pub author_id: ReviewerId,
    /// Reviewer who finished the review.
    pub reviewer_id: ReviewerId,
    /// When the task was opened.
    pub opened_at: DateTime<Utc>,
    /// When the task was finished.
    pub closed_at: DateTime<Utc>,
}

/// Immutable history row for a finished review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedTask {
    id: ClosedTaskId,
    codes: ProjectCodes,
    company: String,
    pages: Pages,
    urgent: bool,
    author_id: ReviewerId,
    reviewer_id: ReviewerId,
    opened_at: DateTime<Utc>,
    closed_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted closed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedClosedTaskData {
    /// Persisted sequence number.
    pub id: ClosedTaskId,
    /// Remaining persisted columns.
    pub task: NewClosedTask,
}

impl ClosedTask {
    /// Reconstructs a closed task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedClosedTaskData) -> Self {
        let PersistedClosedTaskData { id, task } = data;
        Self {
            id,
            codes: task.codes,
            company: task.company,
            pages: task.pages,
            urgent: task.urgent,
            author_id: task.author_id,
            reviewer_id: task.reviewer_id,
            opened_at: task.opened_at,
            closed_at: task.closed_at,
        }
    }

    /// Returns the sequence number.
    #[must_use]
    pub const fn id(&self) -> ClosedTaskId {
        self.id
    }

    /// Returns the project codes.
    #[must_use]
    pub const fn codes(&self) -> &ProjectCodes {
        &self.codes
    }

    /// Returns the company name.
    #[must_use]
    pub fn company(&self) -> &str {
        &self.company
    }

    /// Returns the page count.
    #[must_use]
    pub const fn pages(&self) -> Pages {
        self.pages
    }

    /// Returns whether the task was urgent.
    #[must_use]
    pub const fn urgent(&self) -> bool {
        self.urgent
    }

    /// Returns the author.
    #[must_use]
    pub const fn author_id(&self) -> &ReviewerId {
        &self.author_id
    }

    /// Returns the reviewer who finished the task.
    #[must_use]
    pub const fn reviewer_id(&self) -> &ReviewerId {
        &self.reviewer_id
    }

    /// Returns the opening timestamp.
    #[must_use]
    pub const fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Returns the finishing timestamp.
    #[must_use]
    pub const fn closed_at(&self) -> DateTime<Utc> {
        self.closed_at
    }

    /// Returns the ledger weight the task carried.
    #[must_use]
    pub fn weighted_pages(&self) -> i64 {
        self.pages.weighted(self.urgent)
    }
}
