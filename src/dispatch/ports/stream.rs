//! Command stream port with at-least-once group delivery.

use crate::dispatch::domain::{Channel, EntryId, StreamEntry};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Result type for command stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Append-only command log consumed by the `worker` group.
///
/// Each entry is delivered to exactly one consumer of the group and stays
/// pending until acknowledged.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandStream: Send + Sync {
    /// Creates the consumer group on every channel when missing.
    ///
    /// New groups start after the newest existing entry.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Persistence`] on storage failure.
    async fn ensure_groups(&self) -> StreamResult<()>;

    /// Appends a command and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Persistence`] on storage failure.
    async fn add(
        &self,
        source: &str,
        channel: Channel,
        fields: BTreeMap<String, String>,
    ) -> StreamResult<EntryId>;

    /// Claims the oldest undelivered entry for `consumer`, waiting until one
    /// is available.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Persistence`] on storage failure and
    /// [`StreamError::Closed`] when the stream shuts down.
    async fn read(&self, consumer: &str) -> StreamResult<StreamEntry>;

    /// Acknowledges delivered entries and returns how many were pending.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Persistence`] on storage failure.
    async fn ack(&self, channel: Channel, ids: &[EntryId]) -> StreamResult<u64>;

    /// Drops the oldest entries so each channel keeps at most `max_len`,
    /// returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Persistence`] on storage failure.
    async fn trim(&self, max_len: u64) -> StreamResult<u64>;
}

/// Errors returned by command stream implementations.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// The stream no longer delivers entries.
    #[error("command stream closed")]
    Closed,

    /// A stored entry could not be decoded.
    #[error("malformed stream entry {id}: {reason}")]
    Malformed {
        /// Raw entry id.
        id: i64,
        /// What was wrong with it.
        reason: String,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl StreamError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
