//! End-to-end consumer tests over in-memory adapters.

use super::helpers::{
    SteppingClock, TestService, codes, id, ledger, request, seeded_store, service_over, start_time,
};
use chrono::{DateTime, Duration, Utc};
use rota::dispatch::adapters::memory::{
    InMemoryCommandStream, InMemoryDocumentReader, InMemoryMailSource, RecordingNotifier,
};
use rota::dispatch::adapters::validator::DirectiveValidator;
use rota::dispatch::domain::{
    Channel, DispatchError, InboundMail, MailOperation, NotificationKind, SubmissionDocument,
};
use rota::dispatch::ports::CommandStream;
use rota::dispatch::services::{ConsumerPorts, ConsumerSettings, ReviewConsumer};
use rota::review::adapters::memory::InMemoryReviewStore;
use rota::review::domain::{Pages, PageRequest, TaskFilter};
use rota::review::services::ReviewLifecycleError;
use rstest::{fixture, rstest};
use std::collections::BTreeMap;
use std::sync::Arc;

struct Harness {
    consumer: ReviewConsumer<InMemoryReviewStore, SteppingClock>,
    service: TestService,
    stream: InMemoryCommandStream,
    mail: InMemoryMailSource,
    documents: InMemoryDocumentReader,
    notifier: RecordingNotifier,
}

impl Harness {
    fn new() -> Self {
        let store = seeded_store();
        let (service, _) = service_over(store.clone());
        let (lifecycle, _) = service_over(store.clone());
        let stream = InMemoryCommandStream::new();
        let mail = InMemoryMailSource::new();
        let documents = InMemoryDocumentReader::new();
        let notifier = RecordingNotifier::new();
        let ports = ConsumerPorts {
            stream: Arc::new(stream.clone()),
            mail: Arc::new(mail.clone()),
            validator: Arc::new(DirectiveValidator::new(Arc::new(store))),
            documents: Arc::new(documents.clone()),
            notifier: Arc::new(notifier.clone()),
        };
        let consumer = ReviewConsumer::new(lifecycle, ports, ConsumerSettings::new("w1"))
            .expect("consumer");
        Self {
            consumer,
            service,
            stream,
            mail,
            documents,
            notifier,
        }
    }

    fn deliver(
        &self,
        folder: &str,
        operation: MailOperation,
        from: &str,
        body: &str,
        list: &[&str],
    ) {
        self.deliver_at(
            folder,
            operation,
            from,
            body,
            list,
            start_time() + Duration::hours(2),
        );
    }

    fn deliver_at(
        &self,
        folder: &str,
        operation: MailOperation,
        from: &str,
        body: &str,
        list: &[&str],
        received_at: DateTime<Utc>,
    ) {
        self.mail
            .deliver(InboundMail {
                folder: folder.to_owned(),
                operation,
                from: from.to_owned(),
                subject: match operation {
                    MailOperation::Submit => "Submit report".to_owned(),
                    MailOperation::Finish => "Finish report".to_owned(),
                },
                body: body.to_owned(),
                received_at,
            })
            .expect("deliver");
        self.documents
            .attach(
                folder,
                SubmissionDocument {
                    codes: codes(list),
                    company: "Acme".to_owned(),
                    pages: Pages::new(40).expect("pages"),
                },
            )
            .expect("attach");
    }

    async fn enqueue(&self, channel: Channel, fields: &[(&str, &str)]) {
        let map: BTreeMap<String, String> = fields
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        self.stream.add("ops", channel, map).await.expect("enqueue");
    }
}

#[fixture]
async fn harness() -> Harness {
    let harness = Harness::new();
    harness.consumer.start().await.expect("start");
    harness
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn received_submission_and_finish_complete_the_lifecycle(
    #[future] harness: Harness,
) -> Result<(), eyre::Report> {
    let harness = harness.await;
    harness.deliver("m1", MailOperation::Submit, "Zoe <zoe@example.com>", "urgent: yes\nteam: a", &["A1", "B2"]);
    harness.enqueue(Channel::Receive, &[]).await;

    let processed = harness.consumer.run_once().await?;
    eyre::ensure!(processed.failure.is_none(), "submit failed: {:?}", processed.failure);
    let sent = harness.notifier.take()?;
    let assigned = sent.first().ok_or_else(|| eyre::eyre!("no notification"))?;
    eyre::ensure!(assigned.kind == NotificationKind::Assigned, "assigned kind");
    eyre::ensure!(assigned.recipient == Some(id("b")), "team member a excluded");
    eyre::ensure!(ledger(&harness.service).await.get("b") == Some(&60), "urgent weight");

    harness.deliver("m2", MailOperation::Finish, "b@example.com", "", &["A1"]);
    harness.enqueue(Channel::Read, &[("folder", "m2")]).await;
    let finished = harness.consumer.run_once().await?;
    eyre::ensure!(finished.failure.is_none(), "finish failed: {:?}", finished.failure);
    let sent_after = harness.notifier.take()?;
    eyre::ensure!(
        sent_after
            .iter()
            .any(|note| note.kind == NotificationKind::Finished && note.recipient == Some(id("zoe"))),
        "author told about the finished review"
    );
    eyre::ensure!(ledger(&harness.service).await.get("b") == Some(&0), "weight released");
    eyre::ensure!(harness.stream.pending(Channel::Read)?.is_empty(), "entry acked");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn one_bad_message_does_not_stop_the_batch(
    #[future] harness: Harness,
) -> Result<(), eyre::Report> {
    let harness = harness.await;
    harness.deliver("m1", MailOperation::Submit, "stranger@example.com", "", &["A1"]);
    harness.deliver("m2", MailOperation::Submit, "zoe@example.com", "", &["B2"]);
    harness.enqueue(Channel::Receive, &[]).await;

    let processed = harness.consumer.run_once().await?;
    eyre::ensure!(processed.failure.is_none(), "batch itself succeeds");
    let kinds: Vec<NotificationKind> = harness
        .notifier
        .take()?
        .into_iter()
        .map(|note| note.kind)
        .collect();
    eyre::ensure!(
        kinds == [NotificationKind::Failure, NotificationKind::Assigned],
        "unexpected notifications {kinds:?}"
    );
    let open = harness
        .service
        .search_open(TaskFilter::new(), PageRequest::default())
        .await?;
    eyre::ensure!(open.total == 1, "second message still processed");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn redelivered_finish_reports_missing_task(
    #[future] harness: Harness,
) -> Result<(), eyre::Report> {
    let harness = harness.await;
    harness.deliver("m1", MailOperation::Submit, "zoe@example.com", "", &["A1"]);
    harness.enqueue(Channel::Read, &[("folder", "m1")]).await;
    harness.consumer.run_once().await?;
    harness.deliver("m2", MailOperation::Finish, "a@example.com", "", &["A1"]);
    harness.enqueue(Channel::Read, &[("folder", "m2")]).await;
    harness.consumer.run_once().await?;
    let before = ledger(&harness.service).await;

    harness.enqueue(Channel::Read, &[("folder", "m2")]).await;
    let replay = harness.consumer.run_once().await?;
    eyre::ensure!(
        matches!(
            replay.failure,
            Some(DispatchError::Lifecycle(ReviewLifecycleError::TaskNotFound(_)))
        ),
        "expected TaskNotFound, got {:?}",
        replay.failure
    );
    eyre::ensure!(ledger(&harness.service).await == before, "ledger unchanged");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn resend_with_unknown_redirect_goes_to_default_recipient(
    #[future] harness: Harness,
) -> Result<(), eyre::Report> {
    let harness = harness.await;
    harness.deliver("m1", MailOperation::Submit, "zoe@example.com", "", &["A1"]);
    harness.enqueue(Channel::Read, &[("folder", "m1")]).await;
    harness.consumer.run_once().await?;
    harness.deliver("m2", MailOperation::Finish, "a@example.com", "", &["A1"]);
    harness.enqueue(Channel::Read, &[("folder", "m2")]).await;
    harness.consumer.run_once().await?;
    harness.notifier.take()?;

    harness
        .enqueue(Channel::Resend, &[("id", "1"), ("redirect", "nobody")])
        .await;
    let processed = harness.consumer.run_once().await?;
    eyre::ensure!(processed.failure.is_none(), "resend failed: {:?}", processed.failure);
    let sent = harness.notifier.take()?;
    let resent = sent.first().ok_or_else(|| eyre::eyre!("no notification"))?;
    eyre::ensure!(resent.kind == NotificationKind::Finished, "closed task resent");
    eyre::ensure!(resent.recipient == Some(id("zoe")), "falls back to author");
    eyre::ensure!(resent.subject.starts_with("(resend) "), "resend prefix");
    eyre::ensure!(resent.warnings.len() == 1, "redirect warning kept");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn malformed_entry_is_acked_and_reported(
    #[future] harness: Harness,
) -> Result<(), eyre::Report> {
    let harness = harness.await;
    harness.enqueue(Channel::Resend, &[]).await;
    let processed = harness.consumer.run_once().await?;
    eyre::ensure!(
        matches!(processed.failure, Some(DispatchError::Command(_))),
        "expected parse failure, got {:?}",
        processed.failure
    );
    eyre::ensure!(harness.stream.pending(Channel::Resend)?.is_empty(), "entry acked");
    let sent = harness.notifier.take()?;
    eyre::ensure!(
        sent.iter().any(|note| note.kind == NotificationKind::Failure && note.body.starts_with("(ops)")),
        "operators told"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn maintenance_trims_and_sends_digest(
    #[future] harness: Harness,
) -> Result<(), eyre::Report> {
    let harness = harness.await;
    for n in 0..12 {
        let folder = format!("missing-{n}");
        harness
            .enqueue(Channel::Read, &[("folder", folder.as_str())])
            .await;
    }
    harness.enqueue(Channel::Resend, &[("id", "2")]).await;

    let report = harness.consumer.run_maintenance(start_time()).await?;
    eyre::ensure!(report.trimmed_entries == 2, "trimmed {}", report.trimmed_entries);
    eyre::ensure!(!report.digest_sent, "nothing open or closed yet");

    harness.service.open(request(&["Z9"], 5, "zoe")).await?;
    let busy = harness.consumer.run_maintenance(start_time()).await?;
    eyre::ensure!(busy.digest_sent, "open work triggers the digest");
    let sent = harness.notifier.take()?;
    eyre::ensure!(
        sent.iter().any(|note| note.kind == NotificationKind::Digest),
        "digest delivered"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn run_until_returns_when_stream_closes(
    #[future] harness: Harness,
) -> Result<(), eyre::Report> {
    let harness = harness.await;
    harness.stream.close()?;
    harness
        .consumer
        .run_until(std::future::pending())
        .await?;
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn mailed_tasks_share_the_closure_time_base(
    #[future] harness: Harness,
) -> Result<(), eyre::Report> {
    let harness = harness.await;
    let at = |hour: u32, minute: u32| -> Result<DateTime<Utc>, eyre::Report> {
        start_time()
            .date_naive()
            .and_hms_opt(hour, minute, 0)
            .map(|naive| naive.and_utc())
            .ok_or_else(|| eyre::eyre!("bad time"))
    };
    harness.deliver_at("m1", MailOperation::Submit, "zoe@example.com", "", &["A1"], at(9, 30)?);
    harness.enqueue(Channel::Read, &[("folder", "m1")]).await;
    harness.consumer.run_once().await?;
    harness.deliver_at("m2", MailOperation::Finish, "a@example.com", "", &["A1"], at(11, 0)?);
    harness.enqueue(Channel::Read, &[("folder", "m2")]).await;
    harness.consumer.run_once().await?;

    harness.deliver_at("m3", MailOperation::Submit, "zoe@example.com", "", &["B2"], at(12, 0)?);
    harness.enqueue(Channel::Read, &[("folder", "m3")]).await;
    harness.consumer.run_once().await?;
    let second = harness
        .service
        .search_open(TaskFilter::new().with_codes(["B2"])?, PageRequest::default())
        .await?
        .rows
        .pop()
        .ok_or_else(|| eyre::eyre!("B2 not open"))?;
    eyre::ensure!(second.opened_at() == at(12, 0)?, "opened at the mail time");
    eyre::ensure!(second.reviewer_id() == Some(&id("b")), "last finisher demoted");

    let queue = harness.service.queue(false).await?;
    let a = queue
        .iter()
        .find(|candidate| candidate.reviewer.id() == &id("a"))
        .ok_or_else(|| eyre::eyre!("a not ranked"))?;
    eyre::ensure!(!a.skipped, "demotion lifted by the task mailed after the closure");

    harness.deliver_at("m4", MailOperation::Submit, "zoe@example.com", "", &["C3"], at(12, 30)?);
    harness.enqueue(Channel::Read, &[("folder", "m4")]).await;
    harness.consumer.run_once().await?;
    let sent = harness.notifier.take()?;
    let last = sent.last().ok_or_else(|| eyre::eyre!("no notification"))?;
    eyre::ensure!(last.recipient == Some(id("a")), "a is back at the front");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn every_message_leaves_a_mail_log_row(
    #[future] harness: Harness,
) -> Result<(), eyre::Report> {
    let harness = harness.await;
    harness.deliver("m1", MailOperation::Submit, "stranger@example.com", "", &["A1"]);
    harness.deliver("m2", MailOperation::Submit, "zoe@example.com", "team: q", &["B2"]);
    harness.enqueue(Channel::Receive, &[]).await;

    let processed = harness.consumer.run_once().await?;
    eyre::ensure!(processed.failure.is_none(), "batch itself succeeds");

    let log = harness.service.recent_mail_log(10).await?;
    let [second, first] = log.as_slice() else {
        eyre::bail!("expected two mail log rows, got {}", log.len());
    };
    eyre::ensure!(first.entry.folder == "m1", "oldest row first in time");
    eyre::ensure!(!first.succeeded(), "stranger mail logged as failed");
    let reason = first.entry.error.as_deref().unwrap_or_default();
    eyre::ensure!(reason.contains("stranger"), "error names the sender: {reason}");
    eyre::ensure!(first.entry.author_id.is_none(), "sender never resolved");
    eyre::ensure!(first.entry.keyword == "submit", "keyword recorded");

    eyre::ensure!(second.entry.folder == "m2", "newest row first");
    eyre::ensure!(second.succeeded(), "valid mail logged as processed");
    eyre::ensure!(second.entry.author_id == Some(id("zoe")), "author resolved");
    eyre::ensure!(second.entry.document.is_some(), "report facts recorded");
    eyre::ensure!(!second.entry.warnings.is_empty(), "unknown teammate warning recorded");
    eyre::ensure!(first.id < second.id, "ids grow");
    Ok(())
}
