//! Ports for the external systems around the consumer.

use crate::dispatch::domain::{
    Author, Directives, InboundMail, Notification, ReceiveKeywords, SubmissionDocument,
};
use crate::review::domain::ProjectCodes;
use crate::review::ports::ReviewStoreError;
use async_trait::async_trait;
use thiserror::Error;

/// Result type for collaborator calls.
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Source of inbound review mail.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Fetches unread messages whose subject carries one of the keywords.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Mail`] when the mailbox cannot be read.
    async fn receive(&self, keywords: &ReceiveKeywords) -> CollaboratorResult<Vec<InboundMail>>;

    /// Loads the message stored in `folder`.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Mail`] when the folder holds no message.
    async fn read(&self, folder: &str) -> CollaboratorResult<InboundMail>;
}

/// Checks who sent a message and what it asks for.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Validator: Send + Sync {
    /// Resolves the sender to a roster member.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::InvalidSender`] when nobody matches.
    async fn validate_sender(&self, mail: &InboundMail) -> CollaboratorResult<Author>;

    /// Parses the directives in the message body.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Roster`] when the roster cannot be read.
    async fn validate_directives(
        &self,
        mail: &InboundMail,
        author: &Author,
    ) -> CollaboratorResult<Directives>;
}

/// Extracts report facts from message attachments.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentReader: Send + Sync {
    /// Reads codes, company and page count from a submitted report.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Document`] when the report is unreadable.
    async fn read_submission(&self, mail: &InboundMail) -> CollaboratorResult<SubmissionDocument>;

    /// Reads the project codes from a finished report.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Document`] when the report is unreadable.
    async fn read_finish(&self, mail: &InboundMail) -> CollaboratorResult<ProjectCodes>;
}

/// Delivers notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends one notification.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Delivery`] when delivery fails.
    async fn notify(&self, notification: Notification) -> CollaboratorResult<()>;
}

/// Errors returned by collaborators.
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    /// The sender is not on the roster.
    #[error("invalid sender: {0}")]
    InvalidSender(String),

    /// The message could not be retrieved.
    #[error("mail error: {0}")]
    Mail(String),

    /// The attached report could not be read.
    #[error("document error: {0}")]
    Document(String),

    /// The notification could not be delivered.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// The notification could not be rendered.
    #[error("render error: {0}")]
    Render(String),

    /// The roster could not be read.
    #[error(transparent)]
    Roster(#[from] ReviewStoreError),
}

impl From<minijinja::Error> for CollaboratorError {
    fn from(err: minijinja::Error) -> Self {
        Self::Render(err.to_string())
    }
}
