//! `PostgreSQL` adapter for the command stream.

mod blocking;
mod models;
mod schema;
mod stream;

pub use stream::{DEFAULT_POLL_INTERVAL, PostgresCommandStream};
