//! Error types for the work-queue consumer.

use super::Channel;
use crate::dispatch::ports::{CollaboratorError, StreamError};
use crate::review::domain::ReviewDomainError;
use crate::review::services::ReviewLifecycleError;
use thiserror::Error;

/// Errors returned while parsing a stream entry into a command.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandParseError {
    /// The channel name is not known.
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    /// A required field is absent or blank.
    #[error("{channel} command is missing field {field:?}")]
    MissingField {
        /// Channel of the entry.
        channel: Channel,
        /// Name of the missing field.
        field: &'static str,
    },

    /// The resend id is neither a sequence number nor a fingerprint.
    #[error("invalid task id: {0}")]
    InvalidTaskRef(ReviewDomainError),
}

/// Result type for consumer operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors raised while executing one command.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// The entry could not be parsed.
    #[error(transparent)]
    Command(#[from] CommandParseError),

    /// The lifecycle engine rejected the operation.
    #[error(transparent)]
    Lifecycle(#[from] ReviewLifecycleError),

    /// The command stream failed.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// An external collaborator failed.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// More than one open task matches the codes of a finishing mail.
    #[error("{matches} open tasks match codes {codes}")]
    AmbiguousTask {
        /// Codes read from the mail, joined by `+`.
        codes: String,
        /// Number of matching open tasks.
        matches: u64,
    },
}
