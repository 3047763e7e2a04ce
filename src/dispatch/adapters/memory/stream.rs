//! In-memory command stream.

use crate::dispatch::domain::{Channel, EntryId, StreamEntry};
use crate::dispatch::ports::{CommandStream, StreamError, StreamResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// Thread-safe in-memory command stream with one delivery group.
///
/// Readers park on a [`Notify`] until an entry is added or the stream is
/// closed.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCommandStream {
    state: Arc<Mutex<StreamState>>,
    wakeup: Arc<Notify>,
}

#[derive(Debug, Default)]
struct StreamState {
    last_id: i64,
    entries: BTreeMap<EntryId, StoredEntry>,
    groups: BTreeMap<Channel, EntryId>,
    closed: bool,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    entry: StreamEntry,
    consumer: Option<String>,
    acked: bool,
}

impl InMemoryCommandStream {
    /// Creates an empty stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops delivery; pending and future reads fail with
    /// [`StreamError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Persistence`] when the state lock is poisoned.
    pub fn close(&self) -> StreamResult<()> {
        self.lock()?.closed = true;
        self.wakeup.notify_waiters();
        Ok(())
    }

    /// Returns the number of entries currently stored on `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Persistence`] when the state lock is poisoned.
    pub fn len(&self, channel: Channel) -> StreamResult<usize> {
        Ok(self
            .lock()?
            .entries
            .values()
            .filter(|stored| stored.entry.channel == channel)
            .count())
    }

    /// Returns ids delivered on `channel` but not yet acknowledged.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Persistence`] when the state lock is poisoned.
    pub fn pending(&self, channel: Channel) -> StreamResult<Vec<EntryId>> {
        Ok(self
            .lock()?
            .entries
            .values()
            .filter(|stored| {
                stored.entry.channel == channel && stored.consumer.is_some() && !stored.acked
            })
            .map(|stored| stored.entry.id)
            .collect())
    }

    fn lock(&self) -> StreamResult<MutexGuard<'_, StreamState>> {
        self.state
            .lock()
            .map_err(|err| StreamError::persistence(std::io::Error::other(err.to_string())))
    }

    fn try_claim(&self, consumer: &str) -> StreamResult<Option<StreamEntry>> {
        let mut state = self.lock()?;
        if state.closed {
            return Err(StreamError::Closed);
        }
        let StreamState {
            entries, groups, ..
        } = &mut *state;
        let claimed = entries.values_mut().find(|stored| {
            stored.consumer.is_none()
                && groups
                    .get(&stored.entry.channel)
                    .is_some_and(|start_after| stored.entry.id > *start_after)
        });
        Ok(claimed.map(|stored| {
            stored.consumer = Some(consumer.to_owned());
            stored.entry.clone()
        }))
    }
}

#[async_trait]
impl CommandStream for InMemoryCommandStream {
    async fn ensure_groups(&self) -> StreamResult<()> {
        let mut state = self.lock()?;
        let newest = EntryId::new(state.last_id);
        for channel in Channel::ALL {
            state.groups.entry(channel).or_insert(newest);
        }
        drop(state);
        self.wakeup.notify_waiters();
        Ok(())
    }

    async fn add(
        &self,
        source: &str,
        channel: Channel,
        fields: BTreeMap<String, String>,
    ) -> StreamResult<EntryId> {
        let mut state = self.lock()?;
        state.last_id += 1;
        let id = EntryId::new(state.last_id);
        state.entries.insert(
            id,
            StoredEntry {
                entry: StreamEntry {
                    id,
                    channel,
                    source: source.to_owned(),
                    fields,
                },
                consumer: None,
                acked: false,
            },
        );
        drop(state);
        self.wakeup.notify_waiters();
        Ok(id)
    }

    async fn read(&self, consumer: &str) -> StreamResult<StreamEntry> {
        loop {
            let mut notified = pin!(self.wakeup.notified());
            notified.as_mut().enable();
            if let Some(entry) = self.try_claim(consumer)? {
                return Ok(entry);
            }
            notified.await;
        }
    }

    async fn ack(&self, channel: Channel, ids: &[EntryId]) -> StreamResult<u64> {
        let mut state = self.lock()?;
        let mut acked = 0;
        for id in ids {
            if let Some(stored) = state.entries.get_mut(id)
                && stored.entry.channel == channel
                && stored.consumer.is_some()
                && !stored.acked
            {
                stored.acked = true;
                acked += 1;
            }
        }
        Ok(acked)
    }

    async fn trim(&self, max_len: u64) -> StreamResult<u64> {
        let mut state = self.lock()?;
        let keep = usize::try_from(max_len).unwrap_or(usize::MAX);
        let mut removed = 0;
        for channel in Channel::ALL {
            let ids: Vec<EntryId> = state
                .entries
                .values()
                .filter(|stored| stored.entry.channel == channel)
                .map(|stored| stored.entry.id)
                .collect();
            let excess = ids.len().saturating_sub(keep);
            for id in ids.iter().take(excess) {
                state.entries.remove(id);
                removed += 1;
            }
        }
        Ok(removed)
    }
}
