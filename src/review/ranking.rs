//! Reviewer ranking for new assignments.
//!
//! [`rank`] is a pure function over a [`RankingSnapshot`] read inside the
//! caller's transaction. Candidates are ordered by `(skipped, open_count,
//! pages_diff)` with the reviewer id as a final tiebreaker:
//!
//! - `skipped` demotes whoever closed the most recent review until somebody
//!   receives a task opened after that closure.
//! - `open_count` is the number of open tasks currently assigned.
//! - `pages_diff` is the weighted page total minus the smallest total among
//!   all eligible reviewers.
//!
//! Urgent requests move reviewers accepting all work ahead as a block, and
//! unavailable reviewers are dropped unless explicitly included.

use super::domain::{ClosedTask, OpenTask};
use crate::roster::domain::{Availability, Reviewer, ReviewerId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Reviewer and timestamp of the most recent closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastClosure {
    /// Reviewer who finished the task.
    pub reviewer_id: ReviewerId,
    /// When the task was finished.
    pub closed_at: DateTime<Utc>,
}

impl From<&ClosedTask> for LastClosure {
    fn from(task: &ClosedTask) -> Self {
        Self {
            reviewer_id: task.reviewer_id().clone(),
            closed_at: task.closed_at(),
        }
    }
}

/// Consistent view of the roster and open tasks used for ranking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankingSnapshot {
    reviewers: Vec<Reviewer>,
    open_counts: BTreeMap<ReviewerId, u32>,
    assigned_opened_at: Vec<DateTime<Utc>>,
    last_closure: Option<LastClosure>,
}

impl RankingSnapshot {
    /// Builds a snapshot from roster rows, all open tasks and the most recent
    /// closure.
    ///
    /// Members without the reviewer role are discarded.
    #[must_use]
    pub fn new(
        reviewers: impl IntoIterator<Item = Reviewer>,
        open_tasks: &[OpenTask],
        last_closure: Option<LastClosure>,
    ) -> Self {
        let mut open_counts = BTreeMap::new();
        let mut assigned_opened_at = Vec::new();
        for task in open_tasks {
            if let Some(reviewer_id) = task.reviewer_id() {
                *open_counts.entry(reviewer_id.clone()).or_insert(0_u32) += 1;
                assigned_opened_at.push(task.opened_at());
            }
        }
        Self {
            reviewers: reviewers
                .into_iter()
                .filter(Reviewer::is_reviewer)
                .collect(),
            open_counts,
            assigned_opened_at,
            last_closure,
        }
    }

    /// Returns the eligible reviewers.
    #[must_use]
    pub fn reviewers(&self) -> &[Reviewer] {
        &self.reviewers
    }

    /// Returns the number of open tasks assigned to `reviewer_id`.
    #[must_use]
    pub fn open_count(&self, reviewer_id: &ReviewerId) -> u32 {
        self.open_counts.get(reviewer_id).copied().unwrap_or(0)
    }

    /// Returns `true` when `reviewer_id` is demoted by the skip rule.
    #[must_use]
    pub fn is_skipped(&self, reviewer_id: &ReviewerId) -> bool {
        self.last_closure.as_ref().is_some_and(|closure| {
            &closure.reviewer_id == reviewer_id
                && !self
                    .assigned_opened_at
                    .iter()
                    .any(|opened_at| *opened_at > closure.closed_at)
        })
    }

    fn min_pages(&self) -> i64 {
        self.reviewers
            .iter()
            .map(Reviewer::pages_weighted)
            .min()
            .unwrap_or(0)
    }
}

/// Parameters of one ranking request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankRequest {
    /// Reviewers that must not be returned.
    pub exclude: BTreeSet<ReviewerId>,
    /// Whether the task being assigned is urgent.
    pub urgent: bool,
    /// Whether reviewers marked unavailable are kept.
    pub include_unavailable: bool,
}

/// One ranked reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewerCandidate {
    /// Roster row of the reviewer.
    pub reviewer: Reviewer,
    /// Weighted pages above the least loaded eligible reviewer.
    pub pages_diff: i64,
    /// Number of assigned open tasks.
    pub open_count: u32,
    /// Whether the reviewer is demoted by the skip rule.
    pub skipped: bool,
}

impl ReviewerCandidate {
    fn sort_key(&self) -> (bool, u32, i64, &ReviewerId) {
        (
            self.skipped,
            self.open_count,
            self.pages_diff,
            self.reviewer.id(),
        )
    }
}

/// Ranks eligible reviewers for an assignment, best candidate first.
#[must_use]
pub fn rank(snapshot: &RankingSnapshot, request: &RankRequest) -> Vec<ReviewerCandidate> {
    let min_pages = snapshot.min_pages();
    let mut candidates: Vec<ReviewerCandidate> = snapshot
        .reviewers
        .iter()
        .filter(|reviewer| !request.exclude.contains(reviewer.id()))
        .map(|reviewer| ReviewerCandidate {
            reviewer: reviewer.clone(),
            pages_diff: reviewer.pages_weighted() - min_pages,
            open_count: snapshot.open_count(reviewer.id()),
            skipped: snapshot.is_skipped(reviewer.id()),
        })
        .collect();
    candidates.sort_by(|left, right| left.sort_key().cmp(&right.sort_key()));

    if request.urgent {
        let (accepting, rest): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|candidate| candidate.reviewer.availability() == Availability::AcceptingAll);
        candidates = accepting;
        candidates.extend(rest);
    }

    if !request.include_unavailable {
        candidates.retain(|candidate| candidate.reviewer.availability() != Availability::Unavailable);
    }
    candidates
}
