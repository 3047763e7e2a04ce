//! Then steps for review lifecycle BDD scenarios.

use super::world::{ReviewWorld, reviewer_ids, run_async};
use rota::review::domain::{OpenTask, PageRequest, TaskFilter};
use rota::review::services::ReviewLifecycleError;
use rota::roster::domain::ReviewerId;
use rstest_bdd_macros::then;

#[then(r#"the submissions were assigned to "{reviewers}""#)]
fn submissions_assigned_to(world: &ReviewWorld, reviewers: String) -> Result<(), eyre::Report> {
    let expected: Vec<String> = reviewer_ids(&reviewers)?
        .iter()
        .map(|id| id.as_str().to_owned())
        .collect();
    if world.assigned != expected {
        return Err(eyre::eyre!(
            "expected assignments {expected:?}, found {:?}",
            world.assigned
        ));
    }
    Ok(())
}

#[then(r#"reviewer "{reviewer}" carries {pages:i64} weighted pages"#)]
fn reviewer_carries(
    world: &ReviewWorld,
    reviewer: String,
    pages: i64,
) -> Result<(), eyre::Report> {
    let id = ReviewerId::new(reviewer).map_err(|err| eyre::eyre!("bad reviewer id: {err}"))?;
    let found = run_async(world.service.fetch_reviewer(id.clone()))?
        .ok_or_else(|| eyre::eyre!("reviewer {id} not on the roster"))?;
    if found.pages_weighted() != pages {
        return Err(eyre::eyre!(
            "expected {id} to carry {pages}, found {}",
            found.pages_weighted()
        ));
    }
    Ok(())
}

#[then("the ledger matches the open tasks")]
fn ledger_matches(world: &ReviewWorld) -> Result<(), eyre::Report> {
    let open = run_async(
        world
            .service
            .search_open(TaskFilter::new(), PageRequest::all()),
    )?
    .rows;
    for reviewer in run_async(world.service.list_reviewers())? {
        let held: i64 = open
            .iter()
            .filter(|task| task.reviewer_id() == Some(reviewer.id()))
            .map(OpenTask::weighted_pages)
            .sum();
        if reviewer.pages_weighted() != held {
            return Err(eyre::eyre!(
                "{} records {} but holds {held}",
                reviewer.id(),
                reviewer.pages_weighted()
            ));
        }
    }
    Ok(())
}

#[then("the last operation failed because the task is not open")]
fn failed_not_open(world: &ReviewWorld) -> Result<(), eyre::Report> {
    if !matches!(world.last_error, Some(ReviewLifecycleError::TaskNotFound(_))) {
        return Err(eyre::eyre!(
            "expected TaskNotFound, got {:?}",
            world.last_error
        ));
    }
    Ok(())
}

#[then("the last operation failed as a duplicate task")]
fn failed_duplicate(world: &ReviewWorld) -> Result<(), eyre::Report> {
    if !matches!(world.last_error, Some(ReviewLifecycleError::DuplicateTask(_))) {
        return Err(eyre::eyre!(
            "expected DuplicateTask, got {:?}",
            world.last_error
        ));
    }
    Ok(())
}
