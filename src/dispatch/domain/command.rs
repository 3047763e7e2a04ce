//! Stream entries and the commands they carry.

use super::CommandParseError;
use crate::review::domain::TaskRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the single delivery group shared by all workers.
pub const GROUP_NAME: &str = "worker";

/// Command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Fetch new mail and process it.
    Receive,
    /// Process one already downloaded message.
    Read,
    /// Send a task notification again.
    Resend,
}

impl Channel {
    /// Every channel, in read priority order.
    pub const ALL: [Self; 3] = [Self::Receive, Self::Read, Self::Resend];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Receive => "receive",
            Self::Read => "read",
            Self::Resend => "resend",
        }
    }
}

impl TryFrom<&str> for Channel {
    type Error = CommandParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "receive" => Ok(Self::Receive),
            "read" => Ok(Self::Read),
            "resend" => Ok(Self::Resend),
            other => Err(CommandParseError::UnknownChannel(other.to_owned())),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a stream entry, unique across channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(i64);

impl EntryId {
    /// Wraps a raw entry identifier.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entry claimed from a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    /// Entry identifier.
    pub id: EntryId,
    /// Channel the entry was added to.
    pub channel: Channel,
    /// Who enqueued the command (a user, a scheduler).
    pub source: String,
    /// Command arguments.
    pub fields: BTreeMap<String, String>,
}

/// Subject keywords selecting which inbound mail is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveKeywords {
    /// Keyword of submission mail.
    pub submit: String,
    /// Keyword of finishing mail.
    pub finish: String,
}

impl Default for ReceiveKeywords {
    fn default() -> Self {
        Self {
            submit: "submit".to_owned(),
            finish: "finish".to_owned(),
        }
    }
}

/// Parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch and process new mail.
    Receive(ReceiveKeywords),
    /// Process the message stored in `folder`.
    Read {
        /// Spool folder holding the message.
        folder: String,
    },
    /// Send a task notification again.
    Resend {
        /// Open or closed task.
        task: TaskRef,
        /// Recipient overriding the default one.
        redirect: Option<String>,
    },
}

impl Command {
    /// Parses the fields of a claimed entry.
    ///
    /// # Errors
    ///
    /// Returns [`CommandParseError::MissingField`] when a required field is
    /// absent and [`CommandParseError::InvalidTaskRef`] for a malformed
    /// resend id.
    pub fn parse(entry: &StreamEntry) -> Result<Self, CommandParseError> {
        let field = |name: &str| {
            entry
                .fields
                .get(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let require = |name: &'static str| {
            field(name).ok_or(CommandParseError::MissingField {
                channel: entry.channel,
                field: name,
            })
        };
        match entry.channel {
            Channel::Receive => {
                let defaults = ReceiveKeywords::default();
                Ok(Self::Receive(ReceiveKeywords {
                    submit: field("submit").unwrap_or(defaults.submit),
                    finish: field("finish").unwrap_or(defaults.finish),
                }))
            }
            Channel::Read => Ok(Self::Read {
                folder: require("folder")?,
            }),
            Channel::Resend => {
                let raw = require("id")?;
                let task = TaskRef::parse(&raw).map_err(CommandParseError::InvalidTaskRef)?;
                Ok(Self::Resend {
                    task,
                    redirect: field("redirect"),
                })
            }
        }
    }
}
