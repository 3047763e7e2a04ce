//! Port contracts for the work-queue consumer.
//!
//! The command stream carries queued commands; the collaborator ports reach
//! mail retrieval, document extraction and notification delivery.

pub mod collaborators;
pub mod stream;

pub use collaborators::{
    CollaboratorError, CollaboratorResult, DocumentReader, MailSource, Notifier, Validator,
};
pub use stream::{CommandStream, StreamError, StreamResult};
