//! Shared world state for review lifecycle BDD scenarios.

use std::sync::Arc;

use mockable::DefaultClock;
use rota::review::{
    adapters::memory::InMemoryReviewStore,
    domain::{OpenTask, ProjectCodes},
    services::{ReviewLifecycleError, ReviewLifecycleService},
};
use rota::roster::domain::ReviewerId;
use rstest::fixture;

/// Service type used by the BDD world.
pub type TestReviewService = ReviewLifecycleService<InMemoryReviewStore, DefaultClock>;

/// Scenario world for review lifecycle behaviour tests.
pub struct ReviewWorld {
    pub service: TestReviewService,
    pub last_task: Option<OpenTask>,
    pub assigned: Vec<String>,
    pub last_error: Option<ReviewLifecycleError>,
}

impl ReviewWorld {
    /// Creates a world over an empty roster.
    #[must_use]
    pub fn new() -> Self {
        let service = ReviewLifecycleService::new(
            Arc::new(InMemoryReviewStore::new()),
            Arc::new(DefaultClock),
        );

        Self {
            service,
            last_task: None,
            assigned: Vec::new(),
            last_error: None,
        }
    }

    /// Returns the most recently opened task.
    pub fn last_task(&self) -> Result<&OpenTask, eyre::Report> {
        self.last_task
            .as_ref()
            .ok_or_else(|| eyre::eyre!("missing task in scenario world"))
    }
}

impl Default for ReviewWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> ReviewWorld {
    ReviewWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

/// Splits a comma separated list of reviewer ids.
pub fn reviewer_ids(list: &str) -> Result<Vec<ReviewerId>, eyre::Report> {
    list.split(',')
        .map(|raw| ReviewerId::new(raw.trim()).map_err(|err| eyre::eyre!("bad reviewer id: {err}")))
        .collect()
}

/// Parses `A1+B2` style code lists.
pub fn project_codes(list: &str) -> Result<ProjectCodes, eyre::Report> {
    ProjectCodes::new(list.split('+').map(|code| (code.trim(), "title")))
        .map_err(|err| eyre::eyre!("bad project codes: {err}"))
}
