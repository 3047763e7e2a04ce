//! Lifecycle engine for review tasks.
//!
//! Every public operation runs inside exactly one store transaction. Mutating
//! operations lock the roster first so that ranking and the writes that
//! follow it are serialised across workers, and they re-check the workload
//! ledger of every reviewer they touched before committing.

use super::digest::{WorkloadDigest, is_silent};
use super::error::{AssigneeRejection, ReviewLifecycleError, ReviewLifecycleResult};
use super::requests::{AssignRequest, EditRequest, OpenTaskRequest, SubmitRequest};
use crate::review::domain::{
    ClosedTask, ClosedTaskId, MailLogEntry, NewMailLogEntry, OpenTask, OpenTaskId, Page,
    PageRequest, ReviewDomainError, TaskFilter,
};
use crate::review::ports::{ReviewStore, ReviewStoreError, ReviewTransaction};
use crate::review::ranking::{LastClosure, RankRequest, RankingSnapshot, ReviewerCandidate, rank};
use crate::roster::domain::{Availability, Reviewer, ReviewerId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info};

/// Review lifecycle orchestration service.
pub struct ReviewLifecycleService<S, C>
where
    S: ReviewStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
}

impl<S, C> Clone for ReviewLifecycleService<S, C>
where
    S: ReviewStore,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S, C> ReviewLifecycleService<S, C>
where
    S: ReviewStore,
    C: Clock + Send + Sync,
{
    /// Creates a new review lifecycle service.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self { store, clock }
    }

    /// Adds a member to the roster.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewLifecycleError::DuplicateReviewer`] when the id or mail
    /// address is taken.
    pub async fn register_reviewer(&self, reviewer: Reviewer) -> ReviewLifecycleResult<Reviewer> {
        self.store
            .transaction(move |tx| {
                tx.lock_roster()?;
                tx.insert_reviewer(&reviewer)?;
                Ok(reviewer)
            })
            .await
    }

    /// Opens an unassigned task.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewLifecycleError::DuplicateTask`] when a task with the
    /// same project codes is already open and
    /// [`ReviewLifecycleError::ReviewerNotFound`] for an unknown author.
    pub async fn open(&self, request: OpenTaskRequest) -> ReviewLifecycleResult<OpenTask> {
        let task = request.into_task(&*self.clock);
        let opened = self
            .store
            .transaction(move |tx| {
                tx.lock_roster()?;
                open_in(tx, task)
            })
            .await?;
        info!(task_id = %opened.id(), author_id = %opened.author_id(), "opened review task");
        Ok(opened)
    }

    /// Assigns a reviewer to an unassigned task.
    ///
    /// Without a forced reviewer the best ranked candidate is chosen, never
    /// the author nor anyone in the exclusion set.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewLifecycleError::TaskNotFound`],
    /// [`ReviewLifecycleError::InvalidAssignee`] for a refused forced
    /// reviewer or an already assigned task, and
    /// [`ReviewLifecycleError::NoEligibleReviewer`] when ranking is empty.
    pub async fn assign(&self, request: AssignRequest) -> ReviewLifecycleResult<OpenTask> {
        let assigned = self
            .store
            .transaction(move |tx| {
                tx.lock_roster()?;
                assign_in(tx, request)
            })
            .await
            .inspect_err(log_invariant_violation)?;
        log_assignment(&assigned);
        Ok(assigned)
    }

    /// Opens and assigns a task in one transaction.
    ///
    /// A failed assignment leaves no open task behind.
    ///
    /// # Errors
    ///
    /// Returns any error of [`Self::open`] or [`Self::assign`].
    pub async fn submit(&self, request: SubmitRequest) -> ReviewLifecycleResult<OpenTask> {
        let SubmitRequest {
            task,
            reviewer,
            exclude,
        } = request;
        let open_task = task.into_task(&*self.clock);
        let assigned = self
            .store
            .transaction(move |tx| {
                tx.lock_roster()?;
                let opened = open_in(tx, open_task)?;
                assign_in(
                    tx,
                    AssignRequest {
                        task_id: opened.id().clone(),
                        reviewer,
                        exclude,
                    },
                )
            })
            .await
            .inspect_err(log_invariant_violation)?;
        log_assignment(&assigned);
        Ok(assigned)
    }

    /// Changes reviewer, page count or urgency of an open task.
    ///
    /// The ledger moves by one computed delta: the difference in weight when
    /// the reviewer is unchanged, or the old weight off the old reviewer and
    /// the new weight onto the new reviewer otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewLifecycleError::TaskNotFound`] and
    /// [`ReviewLifecycleError::InvalidAssignee`] for a refused new reviewer.
    pub async fn edit(&self, request: EditRequest) -> ReviewLifecycleResult<OpenTask> {
        let edited = self
            .store
            .transaction(move |tx| {
                tx.lock_roster()?;
                edit_in(tx, request)
            })
            .await
            .inspect_err(log_invariant_violation)?;
        info!(
            task_id = %edited.id(),
            pages = edited.pages().value(),
            urgent = edited.urgent(),
            "edited review task"
        );
        Ok(edited)
    }

    /// Moves an open task into history and releases its weight.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewLifecycleError::TaskNotFound`] when the task is not
    /// open, which is also the outcome of a redelivered finish.
    pub async fn finish(
        &self,
        task_id: OpenTaskId,
        closed_at: DateTime<Utc>,
    ) -> ReviewLifecycleResult<ClosedTask> {
        let closed = self
            .store
            .transaction(move |tx| {
                tx.lock_roster()?;
                finish_in(tx, &task_id, closed_at)
            })
            .await
            .inspect_err(log_invariant_violation)?;
        info!(
            closed_id = %closed.id(),
            reviewer_id = %closed.reviewer_id(),
            "finished review task"
        );
        Ok(closed)
    }

    /// Deletes an open task without writing history, reversing its weight.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewLifecycleError::TaskNotFound`] when the task is not
    /// open.
    pub async fn force_delete(&self, task_id: OpenTaskId) -> ReviewLifecycleResult<OpenTask> {
        let deleted = self
            .store
            .transaction(move |tx| {
                tx.lock_roster()?;
                force_delete_in(tx, &task_id)
            })
            .await
            .inspect_err(log_invariant_violation)?;
        info!(task_id = %deleted.id(), "force deleted review task");
        Ok(deleted)
    }

    /// Sets a reviewer's availability level.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewLifecycleError::ReviewerNotFound`] for unknown
    /// reviewers.
    pub async fn set_availability(
        &self,
        reviewer_id: ReviewerId,
        level: Availability,
    ) -> ReviewLifecycleResult<Reviewer> {
        let now = self.clock.utc();
        self.store
            .transaction(move |tx| {
                tx.lock_roster()?;
                Ok(tx.set_availability(&reviewer_id, level, now)?)
            })
            .await
    }

    /// Resets availability levels held for at least `threshold_days`.
    ///
    /// Returns the number of reset reviewers.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewLifecycleError::Persistence`] on storage failure.
    pub async fn reset_stale_availability(
        &self,
        threshold_days: u32,
    ) -> ReviewLifecycleResult<usize> {
        let now = self.clock.utc();
        let reset = self
            .store
            .transaction(move |tx| {
                tx.lock_roster()?;
                Ok::<_, ReviewLifecycleError>(tx.reset_stale_availability(threshold_days, now)?)
            })
            .await?;
        if reset > 0 {
            info!(reset, threshold_days, "reset stale availability");
        }
        Ok(reset)
    }

    /// Fetches a roster member.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewLifecycleError::Persistence`] on storage failure.
    pub async fn fetch_reviewer(
        &self,
        reviewer_id: ReviewerId,
    ) -> ReviewLifecycleResult<Option<Reviewer>> {
        self.store
            .transaction(move |tx| Ok(tx.fetch_reviewer(&reviewer_id)?))
            .await
    }

    /// Lists the whole roster.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewLifecycleError::Persistence`] on storage failure.
    pub async fn list_reviewers(&self) -> ReviewLifecycleResult<Vec<Reviewer>> {
        self.store
            .transaction(|tx| Ok(tx.list_reviewers()?))
            .await
    }

    /// Fetches an open task.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewLifecycleError::Persistence`] on storage failure.
    pub async fn fetch_open(&self, task_id: OpenTaskId) -> ReviewLifecycleResult<Option<OpenTask>> {
        self.store
            .transaction(move |tx| Ok(tx.fetch_open(&task_id)?))
            .await
    }

    /// Fetches a closed task.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewLifecycleError::Persistence`] on storage failure.
    pub async fn fetch_closed(
        &self,
        task_id: ClosedTaskId,
    ) -> ReviewLifecycleResult<Option<ClosedTask>> {
        self.store
            .transaction(move |tx| Ok(tx.fetch_closed(task_id)?))
            .await
    }

    /// Lists open tasks, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewLifecycleError::Persistence`] on storage failure.
    pub async fn search_open(
        &self,
        filter: TaskFilter,
        page: PageRequest,
    ) -> ReviewLifecycleResult<Page<OpenTask>> {
        self.store
            .transaction(move |tx| Ok(tx.search_open(&filter, page)?))
            .await
    }

    /// Lists closed tasks, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewLifecycleError::Persistence`] on storage failure.
    pub async fn search_closed(
        &self,
        filter: TaskFilter,
        page: PageRequest,
    ) -> ReviewLifecycleResult<Page<ClosedTask>> {
        self.store
            .transaction(move |tx| Ok(tx.search_closed(&filter, page)?))
            .await
    }

    /// Returns the most recently closed task.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewLifecycleError::Persistence`] on storage failure.
    pub async fn most_recent_closed(&self) -> ReviewLifecycleResult<Option<ClosedTask>> {
        self.store
            .transaction(|tx| Ok(tx.most_recent_closed()?))
            .await
    }

    /// Appends the outcome of one processed message to the mail log.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewLifecycleError::Persistence`] on storage failure.
    pub async fn record_mail(
        &self,
        entry: NewMailLogEntry,
    ) -> ReviewLifecycleResult<MailLogEntry> {
        let recorded_at = self.clock.utc();
        self.store
            .transaction(move |tx| Ok(tx.insert_mail_log(entry, recorded_at)?))
            .await
    }

    /// Returns up to `limit` mail log rows, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewLifecycleError::Persistence`] on storage failure.
    pub async fn recent_mail_log(
        &self,
        limit: usize,
    ) -> ReviewLifecycleResult<Vec<MailLogEntry>> {
        self.store
            .transaction(move |tx| Ok(tx.recent_mail_log(limit)?))
            .await
    }

    /// Returns the full assignment ranking with no exclusions.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewLifecycleError::Persistence`] on storage failure.
    pub async fn queue(
        &self,
        include_unavailable: bool,
    ) -> ReviewLifecycleResult<Vec<ReviewerCandidate>> {
        self.store
            .transaction(move |tx| {
                let snapshot = take_snapshot(tx)?;
                Ok(rank(
                    &snapshot,
                    &RankRequest {
                        include_unavailable,
                        ..RankRequest::default()
                    },
                ))
            })
            .await
    }

    /// Builds the workload digest for `now`.
    ///
    /// Returns `None` when nothing is open and nothing closed within the
    /// silence window.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewLifecycleError::Persistence`] on storage failure.
    pub async fn digest(
        &self,
        now: DateTime<Utc>,
    ) -> ReviewLifecycleResult<Option<WorkloadDigest>> {
        self.store
            .transaction(move |tx| {
                let open_tasks = tx.search_open(&TaskFilter::new(), PageRequest::all())?.rows;
                let last_closed = tx.most_recent_closed()?;
                if is_silent(&open_tasks, last_closed.as_ref(), now) {
                    return Ok(None);
                }
                let snapshot = RankingSnapshot::new(
                    tx.list_reviewers()?,
                    &open_tasks,
                    last_closed.as_ref().map(LastClosure::from),
                );
                let queue = rank(
                    &snapshot,
                    &RankRequest {
                        include_unavailable: true,
                        ..RankRequest::default()
                    },
                );
                Ok(Some(WorkloadDigest {
                    generated_at: now,
                    open_tasks,
                    queue,
                }))
            })
            .await
    }
}

fn log_invariant_violation(err: &ReviewLifecycleError) {
    if let ReviewLifecycleError::InvariantViolation(detail) = err {
        error!(detail = %detail, "workload ledger invariant violated; transaction rolled back");
    }
}

fn log_assignment(task: &OpenTask) {
    if let Some(reviewer_id) = task.reviewer_id() {
        info!(
            task_id = %task.id(),
            reviewer_id = %reviewer_id,
            weighted_pages = task.weighted_pages(),
            "assigned review task"
        );
    }
}

fn open_in(tx: &mut dyn ReviewTransaction, task: OpenTask) -> ReviewLifecycleResult<OpenTask> {
    if tx.fetch_reviewer(task.author_id())?.is_none() {
        return Err(ReviewLifecycleError::ReviewerNotFound(
            task.author_id().clone(),
        ));
    }
    tx.insert_open(&task)?;
    Ok(task)
}

fn assign_in(
    tx: &mut dyn ReviewTransaction,
    request: AssignRequest,
) -> ReviewLifecycleResult<OpenTask> {
    let AssignRequest {
        task_id,
        reviewer,
        exclude,
    } = request;
    let mut task = tx
        .fetch_open(&task_id)?
        .ok_or(ReviewLifecycleError::TaskNotFound(task_id))?;
    if let Some(current) = task.reviewer_id() {
        return Err(ReviewLifecycleError::InvalidAssignee {
            reviewer: current.clone(),
            reason: AssigneeRejection::AlreadyAssigned,
        });
    }
    let reviewer_id = match reviewer {
        Some(forced) => {
            validate_assignee(tx, &task, &forced, &exclude)?;
            forced
        }
        None => pick_reviewer(tx, &task, exclude)?,
    };
    task.set_reviewer(reviewer_id.clone());
    tx.update_open(&task)?;
    adjust_ledger(tx, &reviewer_id, task.weighted_pages())?;
    verify_ledger(tx, [&reviewer_id])?;
    Ok(task)
}

fn edit_in(tx: &mut dyn ReviewTransaction, request: EditRequest) -> ReviewLifecycleResult<OpenTask> {
    let EditRequest {
        task_id,
        reviewer,
        pages,
        urgent,
        exclude,
    } = request;
    let mut task = tx
        .fetch_open(&task_id)?
        .ok_or(ReviewLifecycleError::TaskNotFound(task_id))?;
    let old_reviewer = task.reviewer_id().cloned();
    let old_weighted = task.weighted_pages();

    if let Some(value) = pages {
        task.set_pages(value);
    }
    if let Some(value) = urgent {
        task.set_urgent(value);
    }
    if let Some(next) = reviewer {
        if old_reviewer.as_ref() != Some(&next) {
            validate_assignee(tx, &task, &next, &exclude)?;
        }
        task.set_reviewer(next);
    }
    let new_weighted = task.weighted_pages();

    tx.update_open(&task)?;
    let mut touched = Vec::new();
    match (old_reviewer, task.reviewer_id()) {
        (Some(old), Some(new)) if &old == new => {
            if new_weighted != old_weighted {
                adjust_ledger(tx, &old, new_weighted - old_weighted)?;
            }
            touched.push(old);
        }
        (Some(old), Some(new)) => {
            adjust_ledger(tx, &old, -old_weighted)?;
            adjust_ledger(tx, new, new_weighted)?;
            touched.push(old);
            touched.push(new.clone());
        }
        (None, Some(new)) => {
            adjust_ledger(tx, new, new_weighted)?;
            touched.push(new.clone());
        }
        (_, None) => {}
    }
    verify_ledger(tx, &touched)?;
    Ok(task)
}

fn finish_in(
    tx: &mut dyn ReviewTransaction,
    task_id: &OpenTaskId,
    closed_at: DateTime<Utc>,
) -> ReviewLifecycleResult<ClosedTask> {
    let task = tx
        .fetch_open(task_id)?
        .ok_or_else(|| ReviewLifecycleError::TaskNotFound(task_id.clone()))?;
    let reviewer_id = task
        .reviewer_id()
        .cloned()
        .ok_or_else(|| ReviewDomainError::UnassignedTask(task_id.clone()))?;
    let closed = tx.close_open(task_id, closed_at)?;
    adjust_ledger(tx, &reviewer_id, -task.weighted_pages())?;
    verify_ledger(tx, [&reviewer_id])?;
    Ok(closed)
}

fn force_delete_in(
    tx: &mut dyn ReviewTransaction,
    task_id: &OpenTaskId,
) -> ReviewLifecycleResult<OpenTask> {
    let task = tx.delete_open(task_id)?;
    if let Some(reviewer_id) = task.reviewer_id() {
        adjust_ledger(tx, reviewer_id, -task.weighted_pages())?;
        verify_ledger(tx, [reviewer_id])?;
    }
    Ok(task)
}

fn validate_assignee(
    tx: &mut dyn ReviewTransaction,
    task: &OpenTask,
    candidate: &ReviewerId,
    exclude: &BTreeSet<ReviewerId>,
) -> ReviewLifecycleResult<()> {
    let reject = |reason| ReviewLifecycleError::InvalidAssignee {
        reviewer: candidate.clone(),
        reason,
    };
    let reviewer = tx
        .fetch_reviewer(candidate)?
        .ok_or_else(|| reject(AssigneeRejection::Unknown))?;
    if !reviewer.is_reviewer() {
        return Err(reject(AssigneeRejection::NotAReviewer));
    }
    if candidate == task.author_id() {
        return Err(reject(AssigneeRejection::IsAuthor));
    }
    if exclude.contains(candidate) {
        return Err(reject(AssigneeRejection::Excluded));
    }
    Ok(())
}

fn pick_reviewer(
    tx: &mut dyn ReviewTransaction,
    task: &OpenTask,
    mut exclude: BTreeSet<ReviewerId>,
) -> ReviewLifecycleResult<ReviewerId> {
    exclude.insert(task.author_id().clone());
    let snapshot = take_snapshot(tx)?;
    let candidates = rank(
        &snapshot,
        &RankRequest {
            exclude,
            urgent: task.urgent(),
            include_unavailable: false,
        },
    );
    candidates
        .into_iter()
        .next()
        .map(|candidate| candidate.reviewer.id().clone())
        .ok_or_else(|| ReviewLifecycleError::NoEligibleReviewer(task.id().clone()))
}

fn take_snapshot(tx: &mut dyn ReviewTransaction) -> ReviewLifecycleResult<RankingSnapshot> {
    let reviewers = tx.list_reviewers()?;
    let open_tasks = tx.search_open(&TaskFilter::new(), PageRequest::all())?.rows;
    let last_closed = tx.most_recent_closed()?;
    Ok(RankingSnapshot::new(
        reviewers,
        &open_tasks,
        last_closed.as_ref().map(LastClosure::from),
    ))
}

/// Applies a ledger delta. An unknown reviewer here means the task rows
/// reference someone missing from the roster.
fn adjust_ledger(
    tx: &mut dyn ReviewTransaction,
    reviewer_id: &ReviewerId,
    delta: i64,
) -> ReviewLifecycleResult<()> {
    match tx.adjust_pages(reviewer_id, delta) {
        Ok(_) => Ok(()),
        Err(ReviewStoreError::ReviewerNotFound(id)) => Err(
            ReviewLifecycleError::InvariantViolation(format!("ledger row missing for {id}")),
        ),
        Err(err) => Err(err.into()),
    }
}

/// Recomputes the weighted total of each reviewer from open task rows and
/// compares it with the ledger.
fn verify_ledger<'a>(
    tx: &mut dyn ReviewTransaction,
    reviewer_ids: impl IntoIterator<Item = &'a ReviewerId>,
) -> ReviewLifecycleResult<()> {
    for reviewer_id in reviewer_ids {
        let recorded = tx
            .fetch_reviewer(reviewer_id)?
            .map(|reviewer| reviewer.pages_weighted())
            .ok_or_else(|| {
                ReviewLifecycleError::InvariantViolation(format!(
                    "ledger row missing for {reviewer_id}"
                ))
            })?;
        let expected: i64 = tx
            .search_open(
                &TaskFilter::new().with_reviewer(reviewer_id.clone()),
                PageRequest::all(),
            )?
            .rows
            .iter()
            .map(OpenTask::weighted_pages)
            .sum();
        if recorded != expected {
            return Err(ReviewLifecycleError::InvariantViolation(format!(
                "{reviewer_id} records {recorded} weighted pages but holds {expected}"
            )));
        }
    }
    Ok(())
}
