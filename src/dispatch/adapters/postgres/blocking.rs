//! Offloads synchronous Diesel work from the async executor.

use crate::dispatch::ports::{StreamError, StreamResult};
use crate::review::adapters::postgres::ReviewPgPool;
use diesel::PgConnection;

/// Runs `work` with a pooled connection on the blocking thread pool.
pub(super) async fn with_connection<T, F>(pool: &ReviewPgPool, work: F) -> StreamResult<T>
where
    F: FnOnce(&mut PgConnection) -> StreamResult<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get().map_err(StreamError::persistence)?;
        work(&mut conn)
    })
    .await
    .map_err(StreamError::persistence)?
}
