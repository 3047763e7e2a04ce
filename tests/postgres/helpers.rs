//! Shared helpers for `PostgreSQL` integration tests.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use mockable::DefaultClock;
use rota::review::adapters::postgres::{PostgresReviewStore, ReviewPgPool};
use rota::review::services::ReviewLifecycleService;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Environment variable naming an administrative connection URL.
pub const DATABASE_URL_VAR: &str = "ROTA_TEST_DATABASE_URL";

/// SQL creating the roster and task tables.
pub const CREATE_REVIEW_TABLES_SQL: &str =
    include_str!("../../migrations/2026-10-01-000000_create_review_tables/up.sql");

/// SQL creating the command stream tables.
pub const CREATE_COMMAND_STREAMS_SQL: &str =
    include_str!("../../migrations/2026-10-01-000001_create_command_streams/up.sql");

/// SQL creating the mail log table.
pub const CREATE_MAIL_LOG_SQL: &str =
    include_str!("../../migrations/2026-10-01-000002_create_mail_log/up.sql");

static NEXT_DATABASE: AtomicUsize = AtomicUsize::new(0);

/// Lifecycle service over the `PostgreSQL` store.
pub type PgService = ReviewLifecycleService<PostgresReviewStore, DefaultClock>;

/// Database created for one test and dropped with it.
pub struct TemporaryDatabase {
    admin_url: String,
    name: String,
    url: String,
}

impl TemporaryDatabase {
    /// Creates a migrated database, or returns `None` when no server is
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or migrated.
    pub fn create() -> Result<Option<Self>, eyre::Report> {
        let Ok(admin_url) = std::env::var(DATABASE_URL_VAR) else {
            return Ok(None);
        };
        let (base, _) = admin_url
            .rsplit_once('/')
            .ok_or_else(|| eyre::eyre!("{DATABASE_URL_VAR} has no database path"))?;
        let name = format!(
            "rota_test_{}_{}",
            std::process::id(),
            NEXT_DATABASE.fetch_add(1, Ordering::Relaxed)
        );
        let url = format!("{base}/{name}");

        let mut admin = PgConnection::establish(&admin_url)?;
        admin.batch_execute(&format!("CREATE DATABASE {name}"))?;
        let mut conn = PgConnection::establish(&url)?;
        conn.batch_execute(CREATE_REVIEW_TABLES_SQL)?;
        conn.batch_execute(CREATE_COMMAND_STREAMS_SQL)?;
        conn.batch_execute(CREATE_MAIL_LOG_SQL)?;
        Ok(Some(Self {
            admin_url,
            name,
            url,
        }))
    }

    /// Builds a small pool over the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be built.
    pub fn pool(&self) -> Result<ReviewPgPool, eyre::Report> {
        Ok(Pool::builder()
            .max_size(4)
            .build(ConnectionManager::<PgConnection>::new(&self.url))?)
    }

    /// Builds a lifecycle service over the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be built.
    pub fn service(&self) -> Result<PgService, eyre::Report> {
        Ok(ReviewLifecycleService::new(
            Arc::new(PostgresReviewStore::new(self.pool()?)),
            Arc::new(DefaultClock),
        ))
    }
}

impl Drop for TemporaryDatabase {
    fn drop(&mut self) {
        let dropped = PgConnection::establish(&self.admin_url).map(|mut admin| {
            admin.batch_execute(&format!("DROP DATABASE IF EXISTS {} WITH (FORCE)", self.name))
        });
        if !matches!(dropped, Ok(Ok(()))) {
            tracing::warn!(database = %self.name, "failed to drop test database");
        }
    }
}
