//! Reviewer aggregate and the workload ledger counter it carries.

use super::{ParseAvailabilityError, ParseReviewerRoleError, ReviewerId, RosterDomainError};
use chrono::{DateTime, Duration, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Whether a roster member may be ranked for assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerRole {
    /// Member only authors reports and is never ranked.
    AuthorOnly,
    /// Member is eligible to review reports.
    Reviewer,
}

impl ReviewerRole {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_i16(self) -> i16 {
        match self {
            Self::AuthorOnly => 0,
            Self::Reviewer => 1,
        }
    }
}

impl TryFrom<i16> for ReviewerRole {
    type Error = ParseReviewerRoleError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::AuthorOnly),
            1 => Ok(Self::Reviewer),
            other => Err(ParseReviewerRoleError(other)),
        }
    }
}

/// Self-declared availability level.
///
/// Levels are ordered: lower values are more available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Accepts any task, urgent or not.
    AcceptingAll,
    /// Accepts regular tasks but prefers not to take urgent ones.
    NoUrgent,
    /// Does not accept new tasks.
    Unavailable,
}

impl Availability {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_i16(self) -> i16 {
        match self {
            Self::AcceptingAll => 0,
            Self::NoUrgent => 1,
            Self::Unavailable => 2,
        }
    }
}

impl TryFrom<i16> for Availability {
    type Error = ParseAvailabilityError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::AcceptingAll),
            1 => Ok(Self::NoUrgent),
            2 => Ok(Self::Unavailable),
            other => Err(ParseAvailabilityError(other)),
        }
    }
}

/// Roster member together with their weighted workload counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reviewer {
    id: ReviewerId,
    display_name: String,
    email: Option<String>,
    role: ReviewerRole,
    availability: Availability,
    pages_weighted: i64,
    status_since: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted reviewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedReviewerData {
    /// Persisted reviewer identifier.
    pub id: ReviewerId,
    /// Persisted display name.
    pub display_name: String,
    /// Persisted mail address, if any.
    pub email: Option<String>,
    /// Persisted role.
    pub role: ReviewerRole,
    /// Persisted availability level.
    pub availability: Availability,
    /// Persisted weighted page total.
    pub pages_weighted: i64,
    /// Persisted timestamp of the last availability change.
    pub status_since: DateTime<Utc>,
}

impl Reviewer {
    /// Creates a roster member with an empty workload who accepts all tasks.
    ///
    /// # Errors
    ///
    /// Returns [`RosterDomainError::EmptyDisplayName`] when the trimmed display
    /// name is empty.
    pub fn new(
        id: ReviewerId,
        display_name: impl Into<String>,
        role: ReviewerRole,
        clock: &impl Clock,
    ) -> Result<Self, RosterDomainError> {
        let raw = display_name.into();
        let name = raw.trim();
        if name.is_empty() {
            return Err(RosterDomainError::EmptyDisplayName);
        }
        Ok(Self {
            id,
            display_name: name.to_owned(),
            email: None,
            role,
            availability: Availability::AcceptingAll,
            pages_weighted: 0,
            status_since: clock.utc(),
        })
    }

    /// Attaches a mail address used to resolve inbound senders.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into().trim().to_ascii_lowercase());
        self
    }

    /// Reconstructs a reviewer from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedReviewerData) -> Self {
        Self {
            id: data.id,
            display_name: data.display_name,
            email: data.email,
            role: data.role,
            availability: data.availability,
            pages_weighted: data.pages_weighted,
            status_since: data.status_since,
        }
    }

    /// Returns the reviewer identifier.
    #[must_use]
    pub const fn id(&self) -> &ReviewerId {
        &self.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the mail address, if known.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns the role.
    #[must_use]
    pub const fn role(&self) -> ReviewerRole {
        self.role
    }

    /// Returns `true` when the member may be ranked for assignment.
    #[must_use]
    pub const fn is_reviewer(&self) -> bool {
        matches!(self.role, ReviewerRole::Reviewer)
    }

    /// Returns the availability level.
    #[must_use]
    pub const fn availability(&self) -> Availability {
        self.availability
    }

    /// Returns the weighted page total across assigned open tasks.
    #[must_use]
    pub const fn pages_weighted(&self) -> i64 {
        self.pages_weighted
    }

    /// Returns when the availability level last changed.
    #[must_use]
    pub const fn status_since(&self) -> DateTime<Utc> {
        self.status_since
    }

    /// Applies a signed adjustment to the weighted page total.
    ///
    /// # Errors
    ///
    /// Returns [`RosterDomainError::NegativeWorkload`] when the result would
    /// be negative or overflow. The counter is left untouched in that case.
    pub fn adjust_pages(&mut self, delta: i64) -> Result<(), RosterDomainError> {
        let negative = || RosterDomainError::NegativeWorkload {
            reviewer_id: self.id.clone(),
            current: self.pages_weighted,
            delta,
        };
        let next = self.pages_weighted.checked_add(delta).ok_or_else(negative)?;
        if next < 0 {
            return Err(negative());
        }
        self.pages_weighted = next;
        Ok(())
    }

    /// Sets the availability level and refreshes `status_since`.
    pub const fn set_availability(&mut self, level: Availability, now: DateTime<Utc>) {
        self.availability = level;
        self.status_since = now;
    }

    /// Returns `true` when a non-default level has been held for at least
    /// `threshold_days` days at `now`.
    #[must_use]
    pub fn is_stale(&self, threshold_days: u32, now: DateTime<Utc>) -> bool {
        if self.availability == Availability::AcceptingAll {
            return false;
        }
        now - self.status_since >= Duration::days(i64::from(threshold_days))
    }
}
