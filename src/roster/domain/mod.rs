//! Domain model for the reviewer roster.

mod error;
mod ids;
mod reviewer;

pub use error::{ParseAvailabilityError, ParseReviewerRoleError, RosterDomainError};
pub use ids::ReviewerId;
pub use reviewer::{Availability, PersistedReviewerData, Reviewer, ReviewerRole};
