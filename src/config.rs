//! Worker configuration loaded from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `ROTA_DATABASE_URL` | required |
//! | `ROTA_POOL_SIZE` | 4 |
//! | `ROTA_CONSUMER_NAME` | `HOSTNAME`, else `rota-worker` |
//! | `ROTA_POLL_INTERVAL_MS` | 500 |
//! | `ROTA_STREAM_MAX_LEN` | 10 |
//! | `ROTA_STALE_AVAILABILITY_DAYS` | 7 |
//! | `ROTA_MAINTENANCE_INTERVAL_SECS` | 3600 |
//! | `ROTA_SPOOL_DIR` | `spool` |

use camino::Utf8PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DATABASE_URL: &str = "ROTA_DATABASE_URL";
const POOL_SIZE: &str = "ROTA_POOL_SIZE";
const CONSUMER_NAME: &str = "ROTA_CONSUMER_NAME";
const POLL_INTERVAL_MS: &str = "ROTA_POLL_INTERVAL_MS";
const STREAM_MAX_LEN: &str = "ROTA_STREAM_MAX_LEN";
const STALE_AVAILABILITY_DAYS: &str = "ROTA_STALE_AVAILABILITY_DAYS";
const MAINTENANCE_INTERVAL_SECS: &str = "ROTA_MAINTENANCE_INTERVAL_SECS";
const SPOOL_DIR: &str = "ROTA_SPOOL_DIR";

const DEFAULT_CONSUMER_NAME: &str = "rota-worker";

/// Errors raised while loading configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A variable holds a value that cannot be used.
    #[error("{key}={value:?}: {reason}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Settings of one worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotaConfig {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// Consumer name within the delivery group.
    pub consumer_name: String,
    /// Delay between empty stream claims.
    pub poll_interval: Duration,
    /// Entries kept per channel when trimming.
    pub stream_max_len: u64,
    /// Days after which reduced availability is reset.
    pub stale_availability_days: u32,
    /// Delay between maintenance passes.
    pub maintenance_interval: Duration,
    /// Directory holding downloaded mail.
    pub spool_dir: Utf8PathBuf,
}

impl RotaConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is missing or malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which returns the value of a
    /// variable when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when the database URL is absent and
    /// [`ConfigError::Invalid`] for unparsable or zero numbers.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let database_url = read(DATABASE_URL).ok_or(ConfigError::Missing(DATABASE_URL))?;
        let consumer_name = read(CONSUMER_NAME)
            .or_else(|| read("HOSTNAME"))
            .unwrap_or_else(|| DEFAULT_CONSUMER_NAME.to_owned());
        Ok(Self {
            database_url,
            pool_size: positive(POOL_SIZE, read(POOL_SIZE), 4)?,
            consumer_name,
            poll_interval: Duration::from_millis(positive(
                POLL_INTERVAL_MS,
                read(POLL_INTERVAL_MS),
                500,
            )?),
            stream_max_len: positive(STREAM_MAX_LEN, read(STREAM_MAX_LEN), 10)?,
            stale_availability_days: positive(
                STALE_AVAILABILITY_DAYS,
                read(STALE_AVAILABILITY_DAYS),
                7,
            )?,
            maintenance_interval: Duration::from_secs(positive(
                MAINTENANCE_INTERVAL_SECS,
                read(MAINTENANCE_INTERVAL_SECS),
                3600,
            )?),
            spool_dir: read(SPOOL_DIR).map_or_else(|| Utf8PathBuf::from("spool"), Utf8PathBuf::from),
        })
    }
}

fn positive<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let Some(value) = raw else {
        return Ok(default);
    };
    match value.parse::<T>() {
        Ok(parsed) if parsed != T::default() => Ok(parsed),
        Ok(_) => Err(ConfigError::Invalid {
            key,
            value,
            reason: "must be greater than zero".to_owned(),
        }),
        Err(err) => Err(ConfigError::Invalid {
            key,
            reason: err.to_string(),
            value,
        }),
    }
}
