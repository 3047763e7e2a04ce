//! Identifier types for the roster domain.

use super::RosterDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle identifying a person on the roster.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewerId(String);

impl ReviewerId {
    /// Longest identifier accepted by the `reviewers.id` column.
    const MAX_LEN: usize = 64;

    /// Creates a validated reviewer identifier.
    ///
    /// # Errors
    ///
    /// Returns [`RosterDomainError::EmptyReviewerId`] when the trimmed value
    /// is empty and [`RosterDomainError::ReviewerIdTooLong`] when it exceeds
    /// the schema limit.
    pub fn new(value: impl Into<String>) -> Result<Self, RosterDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RosterDomainError::EmptyReviewerId);
        }
        if trimmed.chars().count() > Self::MAX_LEN {
            return Err(RosterDomainError::ReviewerIdTooLong(raw));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identifier as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ReviewerId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ReviewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
