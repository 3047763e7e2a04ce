//! Shared helpers for in-memory integration tests.

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use mockable::Clock;
use rota::review::adapters::memory::InMemoryReviewStore;
use rota::review::domain::{OpenTask, PageRequest, Pages, ProjectCodes, TaskFilter};
use rota::review::services::{OpenTaskRequest, ReviewLifecycleService};
use rota::roster::domain::{Reviewer, ReviewerId, ReviewerRole};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Lifecycle service over the in-memory store and a controllable clock.
pub type TestService = ReviewLifecycleService<InMemoryReviewStore, SteppingClock>;

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct SteppingClock {
    now: Mutex<DateTime<Utc>>,
}

impl SteppingClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, step: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now += step;
    }
}

impl Clock for SteppingClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

/// Fixed start instant shared by the tests.
#[must_use]
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Parses a reviewer id.
#[must_use]
pub fn id(value: &str) -> ReviewerId {
    ReviewerId::new(value).expect("valid reviewer id")
}

/// Builds a roster member with a mail address under `example.com`.
#[must_use]
pub fn member(handle: &str, role: ReviewerRole) -> Reviewer {
    Reviewer::new(id(handle), handle, role, &SteppingClock::new(start_time()))
        .expect("valid reviewer")
        .with_email(format!("{handle}@example.com"))
}

/// Builds a code set with placeholder titles.
#[must_use]
pub fn codes(list: &[&str]) -> ProjectCodes {
    ProjectCodes::new(list.iter().map(|code| (*code, "title"))).expect("valid codes")
}

/// Builds a non-urgent open request by `author`.
#[must_use]
pub fn request(list: &[&str], pages: u32, author: &str) -> OpenTaskRequest {
    OpenTaskRequest::new(
        codes(list),
        "Acme",
        Pages::new(pages).expect("valid pages"),
        id(author),
    )
}

/// Seeds a store with author-only `zoe` and reviewers `a`, `b` and `c`.
#[must_use]
pub fn seeded_store() -> InMemoryReviewStore {
    InMemoryReviewStore::with_reviewers([
        member("zoe", ReviewerRole::AuthorOnly),
        member("a", ReviewerRole::Reviewer),
        member("b", ReviewerRole::Reviewer),
        member("c", ReviewerRole::Reviewer),
    ])
    .expect("seed roster")
}

/// Builds a service over `store` with a clock starting at [`start_time`].
#[must_use]
pub fn service_over(store: InMemoryReviewStore) -> (TestService, Arc<SteppingClock>) {
    let clock = Arc::new(SteppingClock::new(start_time()));
    (
        ReviewLifecycleService::new(Arc::new(store), Arc::clone(&clock)),
        clock,
    )
}

/// Returns every reviewer's ledger counter.
pub async fn ledger(service: &TestService) -> BTreeMap<String, i64> {
    service
        .list_reviewers()
        .await
        .expect("list reviewers")
        .into_iter()
        .map(|reviewer| (reviewer.id().as_str().to_owned(), reviewer.pages_weighted()))
        .collect()
}

/// Checks every reviewer's counter against the open tasks they hold.
///
/// # Errors
///
/// Returns an error naming the first reviewer whose counter disagrees.
pub async fn ensure_ledger_consistent(service: &TestService) -> Result<(), eyre::Report> {
    let open: Vec<OpenTask> = service
        .search_open(TaskFilter::new(), PageRequest::all())
        .await?
        .rows;
    for reviewer in service.list_reviewers().await? {
        let expected: i64 = open
            .iter()
            .filter(|task| task.reviewer_id() == Some(reviewer.id()))
            .map(OpenTask::weighted_pages)
            .sum();
        eyre::ensure!(
            reviewer.pages_weighted() == expected,
            "{} records {} but holds {expected}",
            reviewer.id(),
            reviewer.pages_weighted()
        );
    }
    Ok(())
}
