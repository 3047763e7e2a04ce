//! Identifier types for open and closed review tasks.

use super::{ProjectCodes, ReviewDomainError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Fingerprint of an open task: lowercase hex SHA-256 of its sorted project
/// codes joined by `+`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpenTaskId(String);

impl OpenTaskId {
    const HEX_LEN: usize = 64;

    /// Derives the fingerprint for a set of project codes.
    #[must_use]
    pub fn from_codes(codes: &ProjectCodes) -> Self {
        let digest = Sha256::digest(codes.joined().as_bytes());
        let mut hex = String::with_capacity(Self::HEX_LEN);
        for byte in digest {
            hex.push_str(&format!("{byte:02x}"));
        }
        Self(hex)
    }

    /// Parses a previously derived fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewDomainError::InvalidOpenTaskId`] unless the value is
    /// exactly 64 lowercase hexadecimal characters.
    pub fn parse(value: impl Into<String>) -> Result<Self, ReviewDomainError> {
        let raw = value.into();
        let candidate = raw.trim();
        let is_valid = candidate.len() == Self::HEX_LEN
            && candidate
                .chars()
                .all(|ch| ch.is_ascii_digit() || ('a'..='f').contains(&ch));
        if !is_valid {
            return Err(ReviewDomainError::InvalidOpenTaskId(raw));
        }
        Ok(Self(candidate.to_owned()))
    }

    /// Returns the fingerprint as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for OpenTaskId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for OpenTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequence number of a closed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClosedTaskId(i64);

impl ClosedTaskId {
    /// Creates a validated closed task identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewDomainError::InvalidClosedTaskId`] for values below 1.
    pub const fn new(value: i64) -> Result<Self, ReviewDomainError> {
        if value < 1 {
            return Err(ReviewDomainError::InvalidClosedTaskId(value));
        }
        Ok(Self(value))
    }

    /// Returns the underlying sequence number.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ClosedTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to either an open or a closed task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TaskRef {
    /// An open task fingerprint.
    Open(OpenTaskId),
    /// A closed task sequence number.
    Closed(ClosedTaskId),
}

impl TaskRef {
    /// Parses a textual task reference.
    ///
    /// A positive integer names a closed task; anything else must be an open
    /// task fingerprint.
    ///
    /// # Errors
    ///
    /// Returns the validation error of whichever identifier the value was
    /// parsed as.
    pub fn parse(value: &str) -> Result<Self, ReviewDomainError> {
        let trimmed = value.trim();
        match trimmed.parse::<i64>() {
            Ok(sequence) => ClosedTaskId::new(sequence).map(Self::Closed),
            Err(_) => OpenTaskId::parse(trimmed).map(Self::Open),
        }
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open(id) => write!(f, "{id}"),
            Self::Closed(id) => write!(f, "{id}"),
        }
    }
}
