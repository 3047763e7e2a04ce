//! Work-queue consumer.
//!
//! The consumer claims one entry at a time, executes it against the
//! lifecycle engine and acknowledges it whatever the outcome. Failed
//! commands are reported to the operators instead of being retried, so a
//! poisoned entry never blocks the queue.

use crate::dispatch::domain::{
    Command, DispatchError, DispatchResult, InboundMail, MailOperation, NotificationRenderer,
    ReceiveKeywords, StreamEntry,
};
use crate::dispatch::ports::{
    CollaboratorError, CommandStream, DocumentReader, MailSource, Notifier, StreamError,
    Validator,
};
use crate::review::domain::{
    NewMailLogEntry, OpenTask, OpenTaskId, PageRequest, ProjectCodes, TaskFilter, TaskRef,
};
use crate::review::ports::ReviewStore;
use crate::review::services::{
    OpenTaskRequest, ReviewLifecycleError, ReviewLifecycleService, SubmitRequest,
};
use crate::roster::domain::ReviewerId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Collaborators the consumer talks to.
#[derive(Clone)]
pub struct ConsumerPorts {
    /// Command stream the consumer claims entries from.
    pub stream: Arc<dyn CommandStream>,
    /// Inbound mail.
    pub mail: Arc<dyn MailSource>,
    /// Sender and directive validation.
    pub validator: Arc<dyn Validator>,
    /// Report extraction.
    pub documents: Arc<dyn DocumentReader>,
    /// Notification delivery.
    pub notifier: Arc<dyn Notifier>,
}

/// Tunables for one consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerSettings {
    /// Name of this consumer within the delivery group.
    pub consumer_name: String,
    /// Entries kept per channel by maintenance trimming.
    pub stream_max_len: u64,
    /// Days after which a reduced availability is reset.
    pub stale_availability_days: u32,
}

impl ConsumerSettings {
    /// Default number of entries kept per channel.
    pub const DEFAULT_STREAM_MAX_LEN: u64 = 10;

    /// Default availability reset threshold in days.
    pub const DEFAULT_STALE_AVAILABILITY_DAYS: u32 = 7;

    /// Creates settings with default limits.
    #[must_use]
    pub fn new(consumer_name: impl Into<String>) -> Self {
        Self {
            consumer_name: consumer_name.into(),
            stream_max_len: Self::DEFAULT_STREAM_MAX_LEN,
            stale_availability_days: Self::DEFAULT_STALE_AVAILABILITY_DAYS,
        }
    }
}

/// Entry handled by [`ReviewConsumer::run_once`].
#[derive(Debug, Clone)]
pub struct ProcessedEntry {
    /// The claimed entry, already acknowledged.
    pub entry: StreamEntry,
    /// Why the command failed, if it did.
    pub failure: Option<DispatchError>,
}

/// Result of one maintenance pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Reviewers whose availability was reset.
    pub availability_resets: usize,
    /// Entries removed from the command stream.
    pub trimmed_entries: u64,
    /// Whether a workload digest was sent.
    pub digest_sent: bool,
}

/// What processing learned about a message before it finished or failed.
#[derive(Debug, Default)]
struct MailTrail {
    author: Option<ReviewerId>,
    warnings: Vec<String>,
    document: Option<serde_json::Value>,
}

/// Consumer driving the review lifecycle from the command stream.
pub struct ReviewConsumer<S, C>
where
    S: ReviewStore,
    C: Clock + Send + Sync,
{
    lifecycle: ReviewLifecycleService<S, C>,
    ports: ConsumerPorts,
    renderer: NotificationRenderer,
    settings: ConsumerSettings,
}

impl<S, C> ReviewConsumer<S, C>
where
    S: ReviewStore,
    C: Clock + Send + Sync,
{
    /// Creates a consumer.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Collaborator`] when the notification
    /// templates fail to compile.
    pub fn new(
        lifecycle: ReviewLifecycleService<S, C>,
        ports: ConsumerPorts,
        settings: ConsumerSettings,
    ) -> DispatchResult<Self> {
        let renderer = NotificationRenderer::new().map_err(CollaboratorError::from)?;
        Ok(Self {
            lifecycle,
            ports,
            renderer,
            settings,
        })
    }

    /// Returns the consumer settings.
    #[must_use]
    pub const fn settings(&self) -> &ConsumerSettings {
        &self.settings
    }

    /// Creates the delivery group on every channel.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Stream`] on stream failure.
    pub async fn start(&self) -> DispatchResult<()> {
        self.ports.stream.ensure_groups().await?;
        info!(consumer = %self.settings.consumer_name, "consumer group ready");
        Ok(())
    }

    /// Claims, executes and acknowledges one entry, waiting for one if the
    /// stream is empty.
    ///
    /// Command failures are reported and returned in
    /// [`ProcessedEntry::failure`]; only stream failures are errors.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Stream`] when the stream cannot be read or
    /// the entry cannot be acknowledged.
    pub async fn run_once(&self) -> DispatchResult<ProcessedEntry> {
        let entry = self
            .ports
            .stream
            .read(&self.settings.consumer_name)
            .await?;
        self.process(entry).await
    }

    /// Processes entries until `shutdown` resolves or the stream closes.
    ///
    /// Shutdown is only observed while waiting for an entry; a claimed entry
    /// is always executed and acknowledged.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Stream`] on stream failure.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> DispatchResult<()> {
        let mut shutdown = pin!(shutdown);
        loop {
            let claimed = tokio::select! {
                () = &mut shutdown => return Ok(()),
                claimed = self.ports.stream.read(&self.settings.consumer_name) => claimed,
            };
            match claimed {
                Ok(entry) => {
                    self.process(entry).await?;
                }
                Err(StreamError::Closed) => return Ok(()),
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Resets stale availability, trims the stream and sends the workload
    /// digest unless the system has been silent.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Lifecycle`] or [`DispatchError::Stream`]
    /// when a step fails; earlier steps are not undone.
    pub async fn run_maintenance(&self, now: DateTime<Utc>) -> DispatchResult<MaintenanceReport> {
        let availability_resets = self
            .lifecycle
            .reset_stale_availability(self.settings.stale_availability_days)
            .await?;
        let trimmed_entries = self.ports.stream.trim(self.settings.stream_max_len).await?;
        let digest = self.lifecycle.digest(now).await?;
        let digest_sent = digest.is_some();
        if let Some(snapshot) = digest {
            let notification = self
                .renderer
                .digest(&snapshot)
                .map_err(CollaboratorError::from)?;
            self.ports.notifier.notify(notification).await?;
        }
        info!(
            availability_resets,
            trimmed_entries, digest_sent, "maintenance finished"
        );
        Ok(MaintenanceReport {
            availability_resets,
            trimmed_entries,
            digest_sent,
        })
    }

    async fn process(&self, entry: StreamEntry) -> DispatchResult<ProcessedEntry> {
        let outcome = self.execute(&entry).await;
        self.ports.stream.ack(entry.channel, &[entry.id]).await?;
        let failure = outcome.err();
        if let Some(err) = &failure {
            error!(
                channel = %entry.channel,
                entry_id = %entry.id,
                source = %entry.source,
                error = %err,
                "command failed"
            );
            self.report_failure(&entry.source, err).await;
        } else {
            info!(channel = %entry.channel, entry_id = %entry.id, "command processed");
        }
        Ok(ProcessedEntry { entry, failure })
    }

    async fn execute(&self, entry: &StreamEntry) -> DispatchResult<()> {
        match Command::parse(entry)? {
            Command::Receive(keywords) => self.receive(&keywords, &entry.source).await,
            Command::Read { folder } => {
                let mail = self.ports.mail.read(&folder).await?;
                self.process_mail(&mail).await
            }
            Command::Resend { task, redirect } => self.resend(task, redirect).await,
        }
    }

    async fn receive(&self, keywords: &ReceiveKeywords, source: &str) -> DispatchResult<()> {
        let inbox = self.ports.mail.receive(keywords).await?;
        info!(messages = inbox.len(), "mail received");
        for mail in &inbox {
            if let Err(err) = self.process_mail(mail).await {
                error!(folder = %mail.folder, error = %err, "message failed");
                self.report_failure(source, &err).await;
            }
        }
        Ok(())
    }

    async fn process_mail(&self, mail: &InboundMail) -> DispatchResult<()> {
        let mut trail = MailTrail::default();
        let outcome = self.handle_mail(mail, &mut trail).await;
        let entry = NewMailLogEntry {
            folder: mail.folder.clone(),
            keyword: mail.operation.as_str().to_owned(),
            sender: mail.from.clone(),
            author_id: trail.author,
            error: outcome.as_ref().err().map(ToString::to_string),
            warnings: trail.warnings,
            mail: serde_json::to_value(mail).unwrap_or_default(),
            document: trail.document,
        };
        if let Err(err) = self.lifecycle.record_mail(entry).await {
            error!(folder = %mail.folder, error = %err, "mail log could not be written");
        }
        outcome
    }

    async fn handle_mail(&self, mail: &InboundMail, trail: &mut MailTrail) -> DispatchResult<()> {
        let author = self.ports.validator.validate_sender(mail).await?;
        trail.author = Some(author.id.clone());
        match mail.operation {
            MailOperation::Submit => {
                let directives = self
                    .ports
                    .validator
                    .validate_directives(mail, &author)
                    .await?;
                trail.warnings.clone_from(&directives.warnings);
                let document = self.ports.documents.read_submission(mail).await?;
                trail.document = serde_json::to_value(&document).ok();
                let task = OpenTaskRequest::new(
                    document.codes,
                    document.company,
                    document.pages,
                    author.id,
                )
                .with_urgent(directives.urgent)
                .with_opened_at(mail.received_at);
                let mut request = SubmitRequest::new(task).with_exclude(directives.exclude);
                if let Some(forced) = directives.forced {
                    request = request.with_reviewer(forced);
                }
                let assigned = self.lifecycle.submit(request).await?;
                let notification = self
                    .renderer
                    .assigned(&assigned, None, directives.warnings, false)
                    .map_err(CollaboratorError::from)?;
                self.ports.notifier.notify(notification).await?;
            }
            MailOperation::Finish => {
                let codes = self.ports.documents.read_finish(mail).await?;
                trail.document = serde_json::to_value(&codes).ok();
                let task = self.find_finished(&codes).await?;
                let closed = self
                    .lifecycle
                    .finish(task.id().clone(), mail.received_at)
                    .await?;
                let notification = self
                    .renderer
                    .finished(&closed, None, Vec::new(), false)
                    .map_err(CollaboratorError::from)?;
                self.ports.notifier.notify(notification).await?;
            }
        }
        Ok(())
    }

    async fn find_finished(&self, codes: &ProjectCodes) -> DispatchResult<OpenTask> {
        let filter = TaskFilter::new()
            .with_codes(codes.codes())
            .map_err(ReviewLifecycleError::from)?;
        let mut page = self
            .lifecycle
            .search_open(filter, PageRequest::default())
            .await?;
        match page.total {
            0 => Err(ReviewLifecycleError::TaskNotFound(OpenTaskId::from_codes(codes)).into()),
            1 => page.rows.pop().ok_or_else(|| {
                ReviewLifecycleError::TaskNotFound(OpenTaskId::from_codes(codes)).into()
            }),
            matches => Err(DispatchError::AmbiguousTask {
                codes: codes.joined(),
                matches,
            }),
        }
    }

    async fn resend(&self, task: TaskRef, redirect: Option<String>) -> DispatchResult<()> {
        let mut warnings = Vec::new();
        let recipient = match redirect {
            Some(name) => {
                let known = match ReviewerId::new(name.as_str()) {
                    Ok(id) => self.lifecycle.fetch_reviewer(id).await?,
                    Err(_) => None,
                };
                if known.is_none() {
                    warn!(redirect = %name, "unknown redirect recipient ignored");
                    warnings.push(format!("unknown redirect recipient {name} ignored"));
                }
                known.map(|reviewer| reviewer.id().clone())
            }
            None => None,
        };
        let notification = match task {
            TaskRef::Open(id) => {
                let open = self
                    .lifecycle
                    .fetch_open(id.clone())
                    .await?
                    .ok_or(ReviewLifecycleError::TaskNotFound(id))?;
                self.renderer.assigned(&open, recipient, warnings, true)
            }
            TaskRef::Closed(id) => {
                let closed = self
                    .lifecycle
                    .fetch_closed(id)
                    .await?
                    .ok_or(ReviewLifecycleError::ClosedTaskNotFound(id))?;
                self.renderer.finished(&closed, recipient, warnings, true)
            }
        }
        .map_err(CollaboratorError::from)?;
        self.ports.notifier.notify(notification).await?;
        Ok(())
    }

    async fn report_failure(&self, source: &str, err: &DispatchError) {
        let notification = match self.renderer.failure(source, &err.to_string()) {
            Ok(notification) => notification,
            Err(render_err) => {
                error!(error = %render_err, "failure notification could not be rendered");
                return;
            }
        };
        if let Err(delivery_err) = self.ports.notifier.notify(notification).await {
            error!(error = %delivery_err, "failure notification could not be delivered");
        }
    }
}
