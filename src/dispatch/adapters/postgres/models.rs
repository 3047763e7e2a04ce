//! Diesel row types for the command stream.

use super::schema::stream_entries;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Jsonb, Varchar};

/// Row inserted when a command is added.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = stream_entries)]
pub(super) struct NewStreamEntryRow {
    pub channel: String,
    pub fields: serde_json::Value,
    pub source: String,
}

/// Entry returned by the claim query.
#[derive(Debug, Clone, QueryableByName)]
pub(super) struct ClaimedEntryRow {
    #[diesel(sql_type = BigInt)]
    pub id: i64,
    #[diesel(sql_type = Varchar)]
    pub channel: String,
    #[diesel(sql_type = Varchar)]
    pub source: String,
    #[diesel(sql_type = Jsonb)]
    pub fields: serde_json::Value,
}
