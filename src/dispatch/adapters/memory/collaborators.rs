//! In-memory mail, document and notification doubles.

use crate::dispatch::domain::{
    InboundMail, MailOperation, Notification, ReceiveKeywords, SubmissionDocument,
};
use crate::dispatch::ports::{
    CollaboratorError, CollaboratorResult, DocumentReader, MailSource, Notifier,
};
use crate::review::domain::ProjectCodes;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

fn poisoned(err: impl std::fmt::Display) -> CollaboratorError {
    CollaboratorError::Mail(format!("lock poisoned: {err}"))
}

/// Mailbox held in memory.
///
/// `receive` hands out each delivered message once, like an unread flag.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMailSource {
    inbox: Arc<Mutex<Vec<InboundMail>>>,
    folders: Arc<Mutex<BTreeMap<String, InboundMail>>>,
}

impl InMemoryMailSource {
    /// Creates an empty mailbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a message to the inbox and stores it in its folder.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Mail`] when a lock is poisoned.
    pub fn deliver(&self, mail: InboundMail) -> CollaboratorResult<()> {
        self.folders
            .lock()
            .map_err(poisoned)?
            .insert(mail.folder.clone(), mail.clone());
        self.inbox.lock().map_err(poisoned)?.push(mail);
        Ok(())
    }
}

#[async_trait]
impl MailSource for InMemoryMailSource {
    async fn receive(&self, keywords: &ReceiveKeywords) -> CollaboratorResult<Vec<InboundMail>> {
        let mut inbox = self.inbox.lock().map_err(poisoned)?;
        let (matching, rest): (Vec<_>, Vec<_>) = inbox.drain(..).partition(|mail| {
            let keyword = match mail.operation {
                MailOperation::Submit => &keywords.submit,
                MailOperation::Finish => &keywords.finish,
            };
            mail.subject
                .to_lowercase()
                .contains(&keyword.to_lowercase())
        });
        *inbox = rest;
        Ok(matching)
    }

    async fn read(&self, folder: &str) -> CollaboratorResult<InboundMail> {
        self.folders
            .lock()
            .map_err(poisoned)?
            .get(folder)
            .cloned()
            .ok_or_else(|| CollaboratorError::Mail(format!("no message in folder {folder}")))
    }
}

/// Report contents keyed by mail folder.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentReader {
    documents: Arc<Mutex<BTreeMap<String, SubmissionDocument>>>,
}

impl InMemoryDocumentReader {
    /// Creates a reader with no documents.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a report to the mail stored in `folder`.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Document`] when the lock is poisoned.
    pub fn attach(&self, folder: &str, document: SubmissionDocument) -> CollaboratorResult<()> {
        self.lock()?.insert(folder.to_owned(), document);
        Ok(())
    }

    fn lock(&self) -> CollaboratorResult<MutexGuard<'_, BTreeMap<String, SubmissionDocument>>> {
        self.documents
            .lock()
            .map_err(|err| CollaboratorError::Document(format!("lock poisoned: {err}")))
    }

    fn document(&self, mail: &InboundMail) -> CollaboratorResult<SubmissionDocument> {
        self.lock()?.get(&mail.folder).cloned().ok_or_else(|| {
            CollaboratorError::Document(format!("no report attached in {}", mail.folder))
        })
    }
}

#[async_trait]
impl DocumentReader for InMemoryDocumentReader {
    async fn read_submission(&self, mail: &InboundMail) -> CollaboratorResult<SubmissionDocument> {
        self.document(mail)
    }

    async fn read_finish(&self, mail: &InboundMail) -> CollaboratorResult<ProjectCodes> {
        Ok(self.document(mail)?.codes)
    }
}

/// Notifier that keeps every notification it is given.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the notifications sent so far.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Delivery`] when the lock is poisoned.
    pub fn sent(&self) -> CollaboratorResult<Vec<Notification>> {
        Ok(self.lock()?.clone())
    }

    /// Removes and returns the notifications sent so far.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Delivery`] when the lock is poisoned.
    pub fn take(&self) -> CollaboratorResult<Vec<Notification>> {
        Ok(std::mem::take(&mut *self.lock()?))
    }

    fn lock(&self) -> CollaboratorResult<MutexGuard<'_, Vec<Notification>>> {
        self.sent
            .lock()
            .map_err(|err| CollaboratorError::Delivery(format!("lock poisoned: {err}")))
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> CollaboratorResult<()> {
        self.lock()?.push(notification);
        Ok(())
    }
}
