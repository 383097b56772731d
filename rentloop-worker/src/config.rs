/// Worker configuration
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 5)
/// - `PROCESSOR_API_BASE`: payment processor base URL (default: `https://api.stripe.com`)
/// - `PROCESSOR_SECRET_KEY`: processor API key (required)
/// - `PROCESSOR_TIMEOUT_SECS`: processor request timeout (default: 10)
/// - `SWEEP_INTERVAL_SECS`: pause between sweeps (default: 600)
/// - `SWEEP_BATCH_SIZE`: payments captured per sweep (default: 50)

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::settlement::SweepConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub processor_api_base: String,
    pub processor_secret_key: String,
    pub processor_timeout: Duration,
    pub sweep: SweepConfig,
}

fn parse_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

impl WorkerConfig {
    /// Loads configuration from the environment (and `.env`, if present)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let interval_secs: u64 = parse_var("SWEEP_INTERVAL_SECS", 600)?;
        if interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "SWEEP_INTERVAL_SECS",
                reason: "must be at least 1".to_string(),
            });
        }

        let batch_size: i64 = parse_var("SWEEP_BATCH_SIZE", 50)?;
        if batch_size < 1 {
            return Err(ConfigError::Invalid {
                name: "SWEEP_BATCH_SIZE",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            database_url: required_var("DATABASE_URL")?,
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5)?,
            processor_api_base: env::var("PROCESSOR_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            processor_secret_key: required_var("PROCESSOR_SECRET_KEY")?,
            processor_timeout: Duration::from_secs(parse_var("PROCESSOR_TIMEOUT_SECS", 10)?),
            sweep: SweepConfig {
                interval: Duration::from_secs(interval_secs),
                batch_size,
            },
        })
    }
}
