//! Inbound mail and the facts extracted from it.

use crate::review::domain::{Pages, ProjectCodes};
use crate::roster::domain::ReviewerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What an inbound message asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailOperation {
    /// A report is submitted for review.
    Submit,
    /// A review has been completed.
    Finish,
}

impl MailOperation {
    /// Keyword naming the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Finish => "finish",
        }
    }
}

/// Message retrieved by a mail source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMail {
    /// Spool folder holding the message and its attachments.
    #[serde(default)]
    pub folder: String,
    /// Requested operation.
    pub operation: MailOperation,
    /// Sender address.
    pub from: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    #[serde(default)]
    pub body: String,
    /// When the message was sent.
    pub received_at: DateTime<Utc>,
}

/// Validated sender of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    /// Roster id of the sender.
    pub id: ReviewerId,
    /// Display name of the sender.
    pub display_name: String,
}

/// Instructions parsed from a submission body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directives {
    /// Whether the report is urgent.
    pub urgent: bool,
    /// Teammates who must not review the report.
    pub exclude: BTreeSet<ReviewerId>,
    /// Reviewer explicitly requested by the author.
    pub forced: Option<ReviewerId>,
    /// Problems found while parsing, reported back to the author.
    pub warnings: Vec<String>,
}

/// Facts read from a submitted report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionDocument {
    /// Project codes and titles.
    pub codes: ProjectCodes,
    /// Client company.
    pub company: String,
    /// Page count.
    pub pages: Pages,
}
