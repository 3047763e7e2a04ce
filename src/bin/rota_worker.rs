//! Review worker: consumes queued commands and runs periodic maintenance.
//!
//! Configuration comes from `ROTA_*` environment variables (see
//! [`rota::config`]). Several workers may share one database; each entry is
//! claimed by exactly one of them.

use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use mockable::{Clock, DefaultClock};
use rota::config::{ConfigError, RotaConfig};
use rota::dispatch::adapters::notifier::TracingNotifier;
use rota::dispatch::adapters::postgres::PostgresCommandStream;
use rota::dispatch::adapters::spool::{SpoolDocumentReader, SpoolMailSource};
use rota::dispatch::adapters::validator::DirectiveValidator;
use rota::dispatch::domain::DispatchError;
use rota::dispatch::services::{ConsumerPorts, ConsumerSettings, ReviewConsumer};
use rota::review::adapters::postgres::PostgresReviewStore;
use rota::review::services::ReviewLifecycleService;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type Consumer = ReviewConsumer<PostgresReviewStore, DefaultClock>;

#[derive(Debug, Error)]
enum WorkerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to build connection pool: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("failed to build tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

fn main() -> Result<(), BoxError> {
    rota::telemetry::init_tracing();
    let config = RotaConfig::from_env().map_err(WorkerError::from)?;
    let runtime = build_runtime()?;
    runtime.block_on(run(config)).map_err(Into::into)
}

fn build_runtime() -> Result<tokio::runtime::Runtime, WorkerError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(WorkerError::Runtime)
}

async fn run(config: RotaConfig) -> Result<(), WorkerError> {
    let pool = Pool::builder()
        .max_size(config.pool_size)
        .build(ConnectionManager::<PgConnection>::new(config.database_url.as_str()))?;
    let store = Arc::new(PostgresReviewStore::new(pool.clone()));
    let lifecycle = ReviewLifecycleService::new(Arc::clone(&store), Arc::new(DefaultClock));
    let ports = ConsumerPorts {
        stream: Arc::new(
            PostgresCommandStream::new(pool).with_poll_interval(config.poll_interval),
        ),
        mail: Arc::new(SpoolMailSource::new(config.spool_dir.clone())),
        validator: Arc::new(DirectiveValidator::new(store)),
        documents: Arc::new(SpoolDocumentReader::new(config.spool_dir.clone())),
        notifier: Arc::new(TracingNotifier),
    };
    let settings = ConsumerSettings {
        consumer_name: config.consumer_name.clone(),
        stream_max_len: config.stream_max_len,
        stale_availability_days: config.stale_availability_days,
    };
    let consumer = ReviewConsumer::new(lifecycle, ports, settings)?;
    consumer.start().await?;
    info!(consumer = %config.consumer_name, "worker started");

    tokio::select! {
        result = consumer.run_until(shutdown_signal()) => result?,
        () = maintenance_loop(&consumer, config.maintenance_interval) => {}
    }
    info!("worker stopped");
    Ok(())
}

async fn maintenance_loop(consumer: &Consumer, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        if let Err(err) = consumer.run_maintenance(DefaultClock.utc()).await {
            error!(error = %err, "maintenance failed");
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }
}
