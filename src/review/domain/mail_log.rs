//! Audit trail of processed mail.

use crate::roster::domain::ReviewerId;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Outcome of one processed message, written whether it succeeded or not.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMailLogEntry {
    /// Spool folder of the message.
    pub folder: String,
    /// Operation keyword (`submit` or `finish`).
    pub keyword: String,
    /// Raw sender header.
    pub sender: String,
    /// Roster member the sender resolved to, if it did.
    pub author_id: Option<ReviewerId>,
    /// Why processing failed.
    pub error: Option<String>,
    /// Directive warnings raised while processing.
    pub warnings: Vec<String>,
    /// The message as received.
    pub mail: Value,
    /// Facts extracted from the report, when processing got that far.
    pub document: Option<Value>,
}

/// Stored mail log row.
#[derive(Debug, Clone, PartialEq)]
pub struct MailLogEntry {
    /// Sequence number.
    pub id: i64,
    /// Logged outcome.
    pub entry: NewMailLogEntry,
    /// When the row was written.
    pub recorded_at: DateTime<Utc>,
}

impl MailLogEntry {
    /// Returns `true` when the message was processed without error.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.entry.error.is_none()
    }
}
