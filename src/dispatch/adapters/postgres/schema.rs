//! Diesel schema for the command stream tables.
//!
//! `stream_groups` is only reached through raw SQL and has no mapping here.

diesel::table! {
    /// Queued commands across all channels.
    stream_entries (id) {
        /// Monotonic entry id shared by every channel.
        id -> Int8,
        /// Channel name.
        #[max_length = 16]
        channel -> Varchar,
        /// Command arguments as a JSON object of strings.
        fields -> Jsonb,
        /// Who enqueued the command.
        #[max_length = 255]
        source -> Varchar,
        /// When the entry was added.
        enqueued_at -> Timestamptz,
    }
}

diesel::table! {
    /// Entries handed to a consumer, pending until acknowledged.
    stream_deliveries (group_name, entry_id) {
        /// Group name.
        #[max_length = 64]
        group_name -> Varchar,
        /// Delivered entry.
        entry_id -> Int8,
        /// Consumer that claimed the entry.
        #[max_length = 255]
        consumer -> Varchar,
        /// When the entry was claimed.
        delivered_at -> Timestamptz,
        /// When the entry was acknowledged.
        acked_at -> Nullable<Timestamptz>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(stream_entries, stream_deliveries);
