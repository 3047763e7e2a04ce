//! Review store tests against a real database.

use super::helpers::{PgService, TemporaryDatabase};
use chrono::Utc;
use mockable::DefaultClock;
use rota::review::domain::{
    NewMailLogEntry, OpenTask, PageRequest, Pages, ProjectCodes, TaskFilter,
};
use rota::review::services::{EditRequest, OpenTaskRequest, ReviewLifecycleError, SubmitRequest};
use rota::roster::domain::{Reviewer, ReviewerId, ReviewerRole};
use tokio::task::JoinSet;

fn rid(value: &str) -> Result<ReviewerId, eyre::Report> {
    Ok(ReviewerId::new(value)?)
}

async fn seed(service: &PgService) -> Result<(), eyre::Report> {
    for (handle, role) in [
        ("zoe", ReviewerRole::AuthorOnly),
        ("a", ReviewerRole::Reviewer),
        ("b", ReviewerRole::Reviewer),
    ] {
        let reviewer = Reviewer::new(rid(handle)?, handle, role, &DefaultClock)?
            .with_email(format!("{handle}@example.com"));
        service.register_reviewer(reviewer).await?;
    }
    Ok(())
}

fn request(code: &str, pages: u32) -> Result<OpenTaskRequest, eyre::Report> {
    Ok(OpenTaskRequest::new(
        ProjectCodes::new([(code, "title")])?,
        "Acme",
        Pages::new(pages)?,
        rid("zoe")?,
    ))
}

async fn ensure_ledger_consistent(service: &PgService) -> Result<(), eyre::Report> {
    let open = service
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

#[tokio::test(flavor = "multi_thread")]
async fn submit_and_finish_keep_the_ledger_balanced() -> Result<(), eyre::Report> {
    let Some(db) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let service = db.service()?;
    seed(&service).await?;

    let first = service.submit(SubmitRequest::new(request("A1", 20)?)).await?;
    let second = service
        .submit(SubmitRequest::new(request("B2", 30)?.with_urgent(true)))
        .await?;
    eyre::ensure!(first.reviewer_id() == Some(&rid("a")?), "first to a");
    eyre::ensure!(second.reviewer_id() == Some(&rid("b")?), "second to b");

    let closed = service.finish(first.id().clone(), Utc::now()).await?;
    let a = service
        .fetch_reviewer(rid("a")?)
        .await?
        .ok_or_else(|| eyre::eyre!("a missing"))?;
    let b = service
        .fetch_reviewer(rid("b")?)
        .await?
        .ok_or_else(|| eyre::eyre!("b missing"))?;
    eyre::ensure!(a.pages_weighted() == 0, "a released");
    eyre::ensure!(b.pages_weighted() == 45, "b carries urgent weight");

    let history = service.fetch_closed(closed.id()).await?;
    eyre::ensure!(history.as_ref() == Some(&closed), "history persisted");

    let replay = service.finish(first.id().clone(), Utc::now()).await;
    eyre::ensure!(
        matches!(replay, Err(ReviewLifecycleError::TaskNotFound(_))),
        "redelivery rejected, got {replay:?}"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_open_is_rejected() -> Result<(), eyre::Report> {
    let Some(db) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let service = db.service()?;
    seed(&service).await?;

    service.open(request("A1", 10)?).await?;
    let again = service.open(request("A1", 12)?).await;
    eyre::ensure!(
        matches!(again, Err(ReviewLifecycleError::DuplicateTask(_))),
        "expected DuplicateTask, got {again:?}"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn code_search_finds_supersets() -> Result<(), eyre::Report> {
    let Some(db) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let service = db.service()?;
    seed(&service).await?;
    service
        .open(OpenTaskRequest::new(
            ProjectCodes::new([("A1", "one"), ("B2", "two")])?,
            "Acme",
            Pages::new(5)?,
            rid("zoe")?,
        ))
        .await?;
    service.open(request("C3", 5)?).await?;

    let filter = TaskFilter::new().with_codes(["A1"])?;
    let page = service.search_open(filter, PageRequest::default()).await?;
    eyre::ensure!(page.total == 1, "one superset, found {}", page.total);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_workers_keep_the_ledger_balanced() -> Result<(), eyre::Report> {
    let Some(db) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let service = db.service()?;
    seed(&service).await?;
    let mut seeded = Vec::new();
    for code in ["S1", "S2", "S3", "S4"] {
        let task = service.submit(SubmitRequest::new(request(code, 20)?)).await?;
        seeded.push(task.id().clone());
    }
    let (to_edit, to_finish) = seeded.split_at(2);

    let mut workers = JoinSet::new();
    for index in 0..6 {
        let worker = service.clone();
        let task = request(&format!("N{index}"), 10 + index)?;
        workers.spawn(async move { worker.submit(SubmitRequest::new(task)).await.map(drop) });
    }
    for task_id in to_edit.iter().cloned() {
        let worker = service.clone();
        let pages = Pages::new(33)?;
        workers.spawn(async move {
            worker
                .edit(EditRequest::new(task_id).with_pages(pages))
                .await
                .map(drop)
        });
    }
    for task_id in to_finish.iter().cloned() {
        let worker = service.clone();
        workers.spawn(async move { worker.finish(task_id, Utc::now()).await.map(drop) });
    }
    while let Some(joined) = workers.join_next().await {
        joined??;
    }

    ensure_ledger_consistent(&service).await?;
    let open = service
        .search_open(TaskFilter::new(), PageRequest::all())
        .await?;
    eyre::ensure!(open.total == 8, "two edited and six new remain, found {}", open.total);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn mail_log_keeps_failures_with_their_error() -> Result<(), eyre::Report> {
    let Some(db) = TemporaryDatabase::create()? else {
        return Ok(());
    };
    let service = db.service()?;
    seed(&service).await?;
    let entry = |folder: &str, author: Option<ReviewerId>, error: Option<&str>| NewMailLogEntry {
        folder: folder.to_owned(),
        keyword: "submit".to_owned(),
        sender: "someone@example.com".to_owned(),
        author_id: author,
        error: error.map(str::to_owned),
        warnings: vec!["unknown team member q ignored".to_owned()],
        mail: serde_json::json!({ "folder": folder }),
        document: None,
    };

    let failed = service
        .record_mail(entry("m1", None, Some("invalid sender: someone@example.com")))
        .await?;
    let processed = service.record_mail(entry("m2", Some(rid("zoe")?), None)).await?;

    let recent = service.recent_mail_log(10).await?;
    eyre::ensure!(recent == [processed, failed.clone()], "newest first: {recent:?}");
    eyre::ensure!(!failed.succeeded(), "failure kept");
    eyre::ensure!(
        failed.entry.error.as_deref() == Some("invalid sender: someone@example.com"),
        "error text round-trips"
    );
    eyre::ensure!(failed.entry.warnings.len() == 1, "warnings round-trip");
    Ok(())
}
