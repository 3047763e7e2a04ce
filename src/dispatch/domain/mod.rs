//! Domain model for queued commands, inbound mail and notifications.

mod command;
mod error;
mod mail;
mod notification;

pub use command::{Channel, Command, EntryId, GROUP_NAME, ReceiveKeywords, StreamEntry};
pub use error::{CommandParseError, DispatchError, DispatchResult};
pub use mail::{Author, Directives, InboundMail, MailOperation, SubmissionDocument};
pub use notification::{Notification, NotificationKind, NotificationRenderer};
