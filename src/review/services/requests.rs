//! Request payloads for review lifecycle operations.

use crate::review::domain::{OpenTask, OpenTaskId, Pages, ProjectCodes};
use crate::roster::domain::ReviewerId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::BTreeSet;

/// Request payload for opening a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenTaskRequest {
    codes: ProjectCodes,
    company: String,
    pages: Pages,
    urgent: bool,
    author_id: ReviewerId,
    opened_at: Option<DateTime<Utc>>,
}

impl OpenTaskRequest {
    /// Creates a non-urgent request.
    #[must_use]
    pub fn new(
        codes: ProjectCodes,
        company: impl Into<String>,
        pages: Pages,
        author_id: ReviewerId,
    ) -> Self {
        Self {
            codes,
            company: company.into(),
            pages,
            urgent: false,
            author_id,
            opened_at: None,
        }
    }

    /// Marks the task urgent or not.
    #[must_use]
    pub const fn with_urgent(mut self, urgent: bool) -> Self {
        self.urgent = urgent;
        self
    }

    /// Stamps the task with the time the report arrived instead of the
    /// current time. Must share a time base with the closing timestamps
    /// passed to `finish`.
    #[must_use]
    pub const fn with_opened_at(mut self, opened_at: DateTime<Utc>) -> Self {
        self.opened_at = Some(opened_at);
        self
    }

    /// Returns the author.
    #[must_use]
    pub const fn author_id(&self) -> &ReviewerId {
        &self.author_id
    }

    pub(super) fn into_task(self, clock: &impl Clock) -> OpenTask {
        let task = OpenTask::new(
            self.codes,
            self.company,
            self.pages,
            self.urgent,
            self.author_id,
            clock,
        );
        let Some(opened_at) = self.opened_at else {
            return task;
        };
        task.with_opened_at(opened_at)
    }
}

/// Request payload for assigning a reviewer to an unassigned task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignRequest {
    pub(super) task_id: OpenTaskId,
    pub(super) reviewer: Option<ReviewerId>,
    pub(super) exclude: BTreeSet<ReviewerId>,
}

impl AssignRequest {
    /// Creates a request that lets the ranker pick the reviewer.
    #[must_use]
    pub const fn new(task_id: OpenTaskId) -> Self {
        Self {
            task_id,
            reviewer: None,
            exclude: BTreeSet::new(),
        }
    }

    /// Forces a specific reviewer.
    #[must_use]
    pub fn with_reviewer(mut self, reviewer: ReviewerId) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    /// Excludes reviewers from ranking.
    #[must_use]
    pub fn with_exclude(mut self, exclude: impl IntoIterator<Item = ReviewerId>) -> Self {
        self.exclude.extend(exclude);
        self
    }
}

/// Request payload for editing an open task.
///
/// Unset fields keep their current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub(super) task_id: OpenTaskId,
    pub(super) reviewer: Option<ReviewerId>,
    pub(super) pages: Option<Pages>,
    pub(super) urgent: Option<bool>,
    pub(super) exclude: BTreeSet<ReviewerId>,
}

impl EditRequest {
    /// Creates a request that changes nothing.
    #[must_use]
    pub const fn new(task_id: OpenTaskId) -> Self {
        Self {
            task_id,
            reviewer: None,
            pages: None,
            urgent: None,
            exclude: BTreeSet::new(),
        }
    }

    /// Moves the task to another reviewer.
    #[must_use]
    pub fn with_reviewer(mut self, reviewer: ReviewerId) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    /// Replaces the page count.
    #[must_use]
    pub const fn with_pages(mut self, pages: Pages) -> Self {
        self.pages = Some(pages);
        self
    }

    /// Replaces the urgency flag.
    #[must_use]
    pub const fn with_urgent(mut self, urgent: bool) -> Self {
        self.urgent = Some(urgent);
        self
    }

    /// Refuses a move to any of these reviewers.
    #[must_use]
    pub fn with_exclude(mut self, exclude: impl IntoIterator<Item = ReviewerId>) -> Self {
        self.exclude.extend(exclude);
        self
    }
}

/// Request payload for opening and assigning a task in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    pub(super) task: OpenTaskRequest,
    pub(super) reviewer: Option<ReviewerId>,
    pub(super) exclude: BTreeSet<ReviewerId>,
}

impl SubmitRequest {
    /// Creates a request that lets the ranker pick the reviewer.
    #[must_use]
    pub const fn new(task: OpenTaskRequest) -> Self {
        Self {
            task,
            reviewer: None,
            exclude: BTreeSet::new(),
        }
    }

    /// Forces a specific reviewer.
    #[must_use]
    pub fn with_reviewer(mut self, reviewer: ReviewerId) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    /// Excludes reviewers from ranking.
    #[must_use]
    pub fn with_exclude(mut self, exclude: impl IntoIterator<Item = ReviewerId>) -> Self {
        self.exclude.extend(exclude);
        self
    }
}
