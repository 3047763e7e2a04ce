//! Error types for roster domain validation and parsing.

use super::ReviewerId;
use thiserror::Error;

/// Errors returned while constructing or mutating roster values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RosterDomainError {
    /// The reviewer identifier is empty after trimming.
    #[error("reviewer id must not be empty")]
    EmptyReviewerId,

    /// The reviewer identifier exceeds the storage limit.
    #[error("reviewer id exceeds 64 character limit: {0}")]
    ReviewerIdTooLong(String),

    /// The display name is empty after trimming.
    #[error("reviewer display name must not be empty")]
    EmptyDisplayName,

    /// A ledger adjustment would drive the weighted page total below zero.
    #[error("workload of {reviewer_id} would become negative ({current} {delta:+})")]
    NegativeWorkload {
        /// Reviewer whose counter was adjusted.
        reviewer_id: ReviewerId,
        /// Counter value before the adjustment.
        current: i64,
        /// Requested signed adjustment.
        delta: i64,
    },
}

/// Error returned while parsing availability levels from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown availability level: {0}")]
pub struct ParseAvailabilityError(pub i16);

/// Error returned while parsing reviewer roles from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown reviewer role: {0}")]
pub struct ParseReviewerRoleError(pub i16);
