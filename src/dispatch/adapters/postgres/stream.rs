//! `PostgreSQL` implementation of the command stream.
//!
//! Workers claim entries with `FOR UPDATE SKIP LOCKED` so that concurrent
//! readers never receive the same entry; an empty claim is retried after the
//! poll interval.

use super::{
    blocking::with_connection,
    models::{ClaimedEntryRow, NewStreamEntryRow},
    schema::{stream_deliveries, stream_entries},
};
use crate::dispatch::domain::{Channel, EntryId, GROUP_NAME, StreamEntry};
use crate::dispatch::ports::{CommandStream, StreamError, StreamResult};
use crate::review::adapters::postgres::ReviewPgPool;
use async_trait::async_trait;
use diesel::dsl::now;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Varchar};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default delay between empty claims.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

const ENSURE_GROUP_SQL: &str = concat!(
    "INSERT INTO stream_groups (channel, group_name, start_after) ",
    "SELECT $1, $2, COALESCE(MAX(id), 0) FROM stream_entries ",
    "ON CONFLICT DO NOTHING",
);

const CLAIM_SQL: &str = concat!(
    "WITH candidate AS (",
    "SELECT e.id, e.channel, e.source, e.fields FROM stream_entries e ",
    "JOIN stream_groups g ON g.channel = e.channel AND g.group_name = $1 ",
    "WHERE e.id > g.start_after AND NOT EXISTS (",
    "SELECT 1 FROM stream_deliveries d WHERE d.group_name = $1 AND d.entry_id = e.id) ",
    "ORDER BY e.id LIMIT 1 FOR UPDATE OF e SKIP LOCKED), ",
    "claimed AS (",
    "INSERT INTO stream_deliveries (group_name, entry_id, consumer, delivered_at) ",
    "SELECT $1, id, $2, NOW() FROM candidate ON CONFLICT DO NOTHING RETURNING entry_id) ",
    "SELECT c.id, c.channel, c.source, c.fields FROM candidate c ",
    "JOIN claimed ON claimed.entry_id = c.id",
);

const TRIM_SQL: &str = concat!(
    "DELETE FROM stream_entries WHERE channel = $1 AND id NOT IN (",
    "SELECT id FROM stream_entries WHERE channel = $1 ORDER BY id DESC LIMIT $2)",
);

/// `PostgreSQL`-backed command stream.
#[derive(Debug, Clone)]
pub struct PostgresCommandStream {
    pool: ReviewPgPool,
    poll_interval: Duration,
}

impl PostgresCommandStream {
    /// Creates a stream polling at [`DEFAULT_POLL_INTERVAL`].
    #[must_use]
    pub const fn new(pool: ReviewPgPool) -> Self {
        Self {
            pool,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the delay between empty claims.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    async fn try_claim(&self, consumer: &str) -> StreamResult<Option<StreamEntry>> {
        let consumer_name = consumer.to_owned();
        let row = with_connection(&self.pool, move |conn| {
            diesel::sql_query(CLAIM_SQL)
                .bind::<Varchar, _>(GROUP_NAME)
                .bind::<Varchar, _>(consumer_name)
                .get_result::<ClaimedEntryRow>(conn)
                .optional()
                .map_err(StreamError::persistence)
        })
        .await?;
        row.map(row_to_entry).transpose()
    }
}

#[async_trait]
impl CommandStream for PostgresCommandStream {
    async fn ensure_groups(&self) -> StreamResult<()> {
        with_connection(&self.pool, |conn| {
            for channel in Channel::ALL {
                diesel::sql_query(ENSURE_GROUP_SQL)
                    .bind::<Varchar, _>(channel.as_str())
                    .bind::<Varchar, _>(GROUP_NAME)
                    .execute(conn)
                    .map_err(StreamError::persistence)?;
            }
            Ok(())
        })
        .await
    }

    async fn add(
        &self,
        source: &str,
        channel: Channel,
        fields: BTreeMap<String, String>,
    ) -> StreamResult<EntryId> {
        let row = NewStreamEntryRow {
            channel: channel.as_str().to_owned(),
            fields: serde_json::to_value(fields).map_err(StreamError::persistence)?,
            source: source.to_owned(),
        };
        let id = with_connection(&self.pool, move |conn| {
            diesel::insert_into(stream_entries::table)
                .values(&row)
                .returning(stream_entries::id)
                .get_result::<i64>(conn)
                .map_err(StreamError::persistence)
        })
        .await?;
        Ok(EntryId::new(id))
    }

    async fn read(&self, consumer: &str) -> StreamResult<StreamEntry> {
        loop {
            if let Some(entry) = self.try_claim(consumer).await? {
                return Ok(entry);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn ack(&self, channel: Channel, ids: &[EntryId]) -> StreamResult<u64> {
        let raw_ids: Vec<i64> = ids.iter().map(|id| id.value()).collect();
        let updated = with_connection(&self.pool, move |conn| {
            let on_channel = stream_entries::table
                .filter(stream_entries::channel.eq(channel.as_str()))
                .select(stream_entries::id);
            diesel::update(
                stream_deliveries::table
                    .filter(stream_deliveries::group_name.eq(GROUP_NAME))
                    .filter(stream_deliveries::entry_id.eq_any(raw_ids))
                    .filter(stream_deliveries::entry_id.eq_any(on_channel))
                    .filter(stream_deliveries::acked_at.is_null()),
            )
            .set(stream_deliveries::acked_at.eq(now))
            .execute(conn)
            .map_err(StreamError::persistence)
        })
        .await?;
        Ok(u64::try_from(updated).unwrap_or(u64::MAX))
    }

    async fn trim(&self, max_len: u64) -> StreamResult<u64> {
        let keep = i64::try_from(max_len).unwrap_or(i64::MAX);
        let removed = with_connection(&self.pool, move |conn| {
            let mut removed = 0_usize;
            for channel in Channel::ALL {
                removed += diesel::sql_query(TRIM_SQL)
                    .bind::<Varchar, _>(channel.as_str())
                    .bind::<BigInt, _>(keep)
                    .execute(conn)
                    .map_err(StreamError::persistence)?;
            }
            Ok(removed)
        })
        .await?;
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }
}

fn row_to_entry(row: ClaimedEntryRow) -> StreamResult<StreamEntry> {
    let channel = Channel::try_from(row.channel.as_str()).map_err(|err| StreamError::Malformed {
        id: row.id,
        reason: err.to_string(),
    })?;
    let fields: BTreeMap<String, String> =
        serde_json::from_value(row.fields).map_err(|err| StreamError::Malformed {
            id: row.id,
            reason: err.to_string(),
        })?;
    Ok(StreamEntry {
        id: EntryId::new(row.id),
        channel,
        source: row.source,
        fields,
    })
}
