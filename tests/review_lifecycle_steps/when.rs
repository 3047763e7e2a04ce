//! When steps for review lifecycle BDD scenarios.

use super::world::{ReviewWorld, project_codes, run_async};
use chrono::Utc;
use rota::review::domain::{OpenTask, Pages};
use rota::review::services::{
    EditRequest, OpenTaskRequest, ReviewLifecycleResult, SubmitRequest,
};
use rota::roster::domain::ReviewerId;
use rstest_bdd_macros::when;

fn build_request(
    author: &str,
    codes: &str,
    pages: u32,
    urgent: bool,
) -> Result<OpenTaskRequest, eyre::Report> {
    let author_id =
        ReviewerId::new(author).map_err(|err| eyre::eyre!("bad author id: {err}"))?;
    let page_count = Pages::new(pages).map_err(|err| eyre::eyre!("bad pages: {err}"))?;
    Ok(
        OpenTaskRequest::new(project_codes(codes)?, "Acme", page_count, author_id)
            .with_urgent(urgent),
    )
}

fn record(world: &mut ReviewWorld, result: ReviewLifecycleResult<OpenTask>) {
    match result {
        Ok(task) => {
            if let Some(reviewer) = task.reviewer_id() {
                world.assigned.push(reviewer.as_str().to_owned());
            }
            world.last_task = Some(task);
            world.last_error = None;
        }
        Err(err) => world.last_error = Some(err),
    }
}

#[when(r#""{author}" submits "{codes}" with {pages:u32} pages"#)]
fn submits(
    world: &mut ReviewWorld,
    author: String,
    codes: String,
    pages: u32,
) -> Result<(), eyre::Report> {
    let request = SubmitRequest::new(build_request(&author, &codes, pages, false)?);
    let result = run_async(world.service.submit(request));
    record(world, result);
    Ok(())
}

#[when(r#""{author}" submits urgent "{codes}" with {pages:u32} pages"#)]
fn submits_urgent(
    world: &mut ReviewWorld,
    author: String,
    codes: String,
    pages: u32,
) -> Result<(), eyre::Report> {
    let request = SubmitRequest::new(build_request(&author, &codes, pages, true)?);
    let result = run_async(world.service.submit(request));
    record(world, result);
    Ok(())
}

#[when(r#""{author}" opens "{codes}" with {pages:u32} pages"#)]
fn opens(
    world: &mut ReviewWorld,
    author: String,
    codes: String,
    pages: u32,
) -> Result<(), eyre::Report> {
    let request = build_request(&author, &codes, pages, false)?;
    let result = run_async(world.service.open(request));
    record(world, result);
    Ok(())
}

#[when(r#"the last task is reassigned to "{reviewer}""#)]
fn reassigned(world: &mut ReviewWorld, reviewer: String) -> Result<(), eyre::Report> {
    let task_id = world.last_task()?.id().clone();
    let reviewer_id =
        ReviewerId::new(reviewer).map_err(|err| eyre::eyre!("bad reviewer id: {err}"))?;
    let result = run_async(
        world
            .service
            .edit(EditRequest::new(task_id).with_reviewer(reviewer_id)),
    );
    record(world, result);
    Ok(())
}

fn finish_last(world: &mut ReviewWorld) -> Result<(), eyre::Report> {
    let task_id = world.last_task()?.id().clone();
    match run_async(world.service.finish(task_id, Utc::now())) {
        Ok(_) => world.last_error = None,
        Err(err) => world.last_error = Some(err),
    }
    Ok(())
}

#[when("the last task is finished")]
fn finished(world: &mut ReviewWorld) -> Result<(), eyre::Report> {
    finish_last(world)
}

#[when("the last task is finished again")]
fn finished_again(world: &mut ReviewWorld) -> Result<(), eyre::Report> {
    finish_last(world)
}
