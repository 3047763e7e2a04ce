//! In-memory review store for tests and single-process use.

use crate::review::domain::{
    ClosedTask, ClosedTaskId, MailLogEntry, NewClosedTask, NewMailLogEntry, OpenTask, OpenTaskId,
    Page, PageRequest, PersistedClosedTaskData, TaskFilter,
};
use crate::review::ports::{ReviewStore, ReviewStoreError, ReviewStoreResult, ReviewTransaction};
use crate::roster::domain::{Availability, Reviewer, ReviewerId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Thread-safe in-memory review store.
///
/// Each transaction works on a copy of the state while holding the store
/// mutex and swaps it in on success, so transactions are fully serialised
/// and a failed closure leaves no trace.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReviewStore {
    state: Arc<Mutex<InMemoryReviewState>>,
}

#[derive(Debug, Clone, Default)]
struct InMemoryReviewState {
    reviewers: BTreeMap<ReviewerId, Reviewer>,
    open_tasks: BTreeMap<OpenTaskId, OpenTask>,
    closed_tasks: BTreeMap<ClosedTaskId, ClosedTask>,
    last_closed_sequence: i64,
    mail_log: Vec<MailLogEntry>,
}

impl InMemoryReviewStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with roster members.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewStoreError::DuplicateReviewer`] when two members share
    /// an id or mail address.
    pub fn with_reviewers(
        reviewers: impl IntoIterator<Item = Reviewer>,
    ) -> ReviewStoreResult<Self> {
        let store = Self::new();
        {
            let mut state = store.lock()?;
            let mut tx = InMemoryTransaction { state: &mut state };
            for reviewer in reviewers {
                tx.insert_reviewer(&reviewer)?;
            }
        }
        Ok(store)
    }

    fn lock(&self) -> ReviewStoreResult<std::sync::MutexGuard<'_, InMemoryReviewState>> {
        self.state
            .lock()
            .map_err(|err| ReviewStoreError::persistence(std::io::Error::other(err.to_string())))
    }
}

#[async_trait]
impl ReviewStore for InMemoryReviewStore {
    async fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<ReviewStoreError> + Send + 'static,
        F: FnOnce(&mut dyn ReviewTransaction) -> Result<T, E> + Send + 'static,
    {
        let mut guard = self.lock()?;
        let mut working = guard.clone();
        let outcome = work(&mut InMemoryTransaction {
            state: &mut working,
        })?;
        *guard = working;
        Ok(outcome)
    }
}

struct InMemoryTransaction<'a> {
    state: &'a mut InMemoryReviewState,
}

impl InMemoryTransaction<'_> {
    fn reviewer_mut(&mut self, id: &ReviewerId) -> ReviewStoreResult<&mut Reviewer> {
        self.state
            .reviewers
            .get_mut(id)
            .ok_or_else(|| ReviewStoreError::ReviewerNotFound(id.clone()))
    }
}

fn page_of<T>(rows: Vec<T>, page: PageRequest) -> Page<T> {
    let total = u64::try_from(rows.len()).unwrap_or(u64::MAX);
    Page {
        rows: page.apply(rows),
        total,
    }
}

impl ReviewTransaction for InMemoryTransaction<'_> {
    fn lock_roster(&mut self) -> ReviewStoreResult<()> {
        // The store mutex is already held for the whole transaction.
        Ok(())
    }

    fn insert_reviewer(&mut self, reviewer: &Reviewer) -> ReviewStoreResult<()> {
        let email_taken = reviewer.email().is_some_and(|email| {
            self.state
                .reviewers
                .values()
                .any(|existing| existing.email() == Some(email))
        });
        if email_taken || self.state.reviewers.contains_key(reviewer.id()) {
            return Err(ReviewStoreError::DuplicateReviewer(reviewer.id().clone()));
        }
        self.state
            .reviewers
            .insert(reviewer.id().clone(), reviewer.clone());
        Ok(())
    }

    fn fetch_reviewer(&mut self, id: &ReviewerId) -> ReviewStoreResult<Option<Reviewer>> {
        Ok(self.state.reviewers.get(id).cloned())
    }

    fn find_reviewer_by_email(&mut self, email: &str) -> ReviewStoreResult<Option<Reviewer>> {
        let wanted = email.trim().to_ascii_lowercase();
        Ok(self
            .state
            .reviewers
            .values()
            .find(|reviewer| reviewer.email() == Some(wanted.as_str()))
            .cloned())
    }

    fn find_reviewers_by_name(&mut self, name: &str) -> ReviewStoreResult<Vec<Reviewer>> {
        let wanted = name.trim().to_lowercase();
        Ok(self
            .state
            .reviewers
            .values()
            .filter(|reviewer| {
                reviewer.id().as_str().to_lowercase() == wanted
                    || reviewer.display_name().to_lowercase() == wanted
            })
            .cloned()
            .collect())
    }

    fn list_reviewers(&mut self) -> ReviewStoreResult<Vec<Reviewer>> {
        Ok(self.state.reviewers.values().cloned().collect())
    }

    fn adjust_pages(&mut self, id: &ReviewerId, delta: i64) -> ReviewStoreResult<Reviewer> {
        let reviewer = self.reviewer_mut(id)?;
        reviewer.adjust_pages(delta)?;
        Ok(reviewer.clone())
    }

    fn set_availability(
        &mut self,
        id: &ReviewerId,
        level: Availability,
        now: DateTime<Utc>,
    ) -> ReviewStoreResult<Reviewer> {
        let reviewer = self.reviewer_mut(id)?;
        reviewer.set_availability(level, now);
        Ok(reviewer.clone())
    }

    fn reset_stale_availability(
        &mut self,
        threshold_days: u32,
        now: DateTime<Utc>,
    ) -> ReviewStoreResult<usize> {
        let mut reset = 0;
        for reviewer in self.state.reviewers.values_mut() {
            if reviewer.is_stale(threshold_days, now) {
                reviewer.set_availability(Availability::AcceptingAll, now);
                reset += 1;
            }
        }
        Ok(reset)
    }

    fn insert_open(&mut self, task: &OpenTask) -> ReviewStoreResult<()> {
        if self.state.open_tasks.contains_key(task.id()) {
            return Err(ReviewStoreError::DuplicateTask(task.id().clone()));
        }
        self.state
            .open_tasks
            .insert(task.id().clone(), task.clone());
        Ok(())
    }

    fn fetch_open(&mut self, id: &OpenTaskId) -> ReviewStoreResult<Option<OpenTask>> {
        Ok(self.state.open_tasks.get(id).cloned())
    }

    fn update_open(&mut self, task: &OpenTask) -> ReviewStoreResult<()> {
        let slot = self
            .state
            .open_tasks
            .get_mut(task.id())
            .ok_or_else(|| ReviewStoreError::OpenTaskNotFound(task.id().clone()))?;
        *slot = task.clone();
        Ok(())
    }

    fn delete_open(&mut self, id: &OpenTaskId) -> ReviewStoreResult<OpenTask> {
        self.state
            .open_tasks
            .remove(id)
            .ok_or_else(|| ReviewStoreError::OpenTaskNotFound(id.clone()))
    }

    fn search_open(
        &mut self,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> ReviewStoreResult<Page<OpenTask>> {
        let mut rows: Vec<OpenTask> = self
            .state
            .open_tasks
            .values()
            .filter(|task| filter.matches_open(task))
            .cloned()
            .collect();
        rows.sort_by(|left, right| {
            (left.opened_at(), left.id()).cmp(&(right.opened_at(), right.id()))
        });
        Ok(page_of(rows, page))
    }

    fn insert_closed(&mut self, task: NewClosedTask) -> ReviewStoreResult<ClosedTask> {
        let sequence = self.state.last_closed_sequence + 1;
        let id = ClosedTaskId::new(sequence).map_err(ReviewStoreError::persistence)?;
        let closed = ClosedTask::from_persisted(PersistedClosedTaskData { id, task });
        self.state.last_closed_sequence = sequence;
        self.state.closed_tasks.insert(id, closed.clone());
        Ok(closed)
    }

    fn fetch_closed(&mut self, id: ClosedTaskId) -> ReviewStoreResult<Option<ClosedTask>> {
        Ok(self.state.closed_tasks.get(&id).cloned())
    }

    fn search_closed(
        &mut self,
        filter: &TaskFilter,
        page: PageRequest,
    ) -> ReviewStoreResult<Page<ClosedTask>> {
        let rows: Vec<ClosedTask> = self
            .state
            .closed_tasks
            .values()
            .rev()
            .filter(|task| filter.matches_closed(task))
            .cloned()
            .collect();
        Ok(page_of(rows, page))
    }

    fn most_recent_closed(&mut self) -> ReviewStoreResult<Option<ClosedTask>> {
        Ok(self.state.closed_tasks.values().next_back().cloned())
    }

    fn insert_mail_log(
        &mut self,
        entry: NewMailLogEntry,
        recorded_at: DateTime<Utc>,
    ) -> ReviewStoreResult<MailLogEntry> {
        let id = i64::try_from(self.state.mail_log.len())
            .map_err(ReviewStoreError::persistence)?
            + 1;
        let row = MailLogEntry {
            id,
            entry,
            recorded_at,
        };
        self.state.mail_log.push(row.clone());
        Ok(row)
    }

    fn recent_mail_log(&mut self, limit: usize) -> ReviewStoreResult<Vec<MailLogEntry>> {
        Ok(self.state.mail_log.iter().rev().take(limit).cloned().collect())
    }
}
