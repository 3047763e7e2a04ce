//! `PostgreSQL` adapter for the review store.

mod models;
mod schema;
mod store;

pub use store::{PostgresReviewStore, ReviewPgPool};
