/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct. It is built once at startup and shared
/// through [`crate::app::AppState`].
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: bind address (default: 0.0.0.0:8080)
/// - `CORS_ORIGINS`: comma-separated origins, `*` for any (default: `*`)
/// - `PRODUCTION`: enables HSTS (default: false)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `JWT_SECRET`: HS256 signing key, at least 32 characters (required)
/// - `JWT_ACCESS_TTL_MINUTES`: access token lifetime (default: 60)
/// - `CATALOG_API_BASE`: catalog collaborator base URL (default: `http://127.0.0.1:8080/v1`)
/// - `CATALOG_TIMEOUT_SECS`: catalog read timeout (default: 5)
/// - `PROCESSOR_API_BASE`: payment processor base URL (default: `https://api.stripe.com`)
/// - `PROCESSOR_SECRET_KEY`: processor API key (required)
/// - `PROCESSOR_WEBHOOK_SECRET`: webhook signing secret (required)
/// - `PROCESSOR_TIMEOUT_SECS`: processor request timeout (default: 10)
/// - `PLATFORM_FEE_PERCENT`: marketplace fee (default: 8)
/// - `UPLOAD_DIR`: where uploaded images are stored (default: `./uploads`)
/// - `UPLOAD_MAX_BYTES`: request body limit for uploads (default: 10 MiB)
/// - `RUST_LOG`: log level (default: info)
///
/// # Example
///
/// ```no_run
/// use rentloop_api::config::Config;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Catalog collaborator used by rentals and payments
    pub catalog: CatalogConfig,

    /// Payment processor
    pub payments: PaymentsConfig,

    /// Image uploads
    pub uploads: UploadConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; `["*"]` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (adds HSTS)
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    /// Access token lifetime in minutes
    pub access_ttl_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL, e.g. `http://127.0.0.1:8080/v1`
    pub api_base: String,

    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    pub api_base: String,

    #[serde(skip_serializing)]
    pub secret_key: String,

    #[serde(skip_serializing)]
    pub webhook_secret: String,

    pub timeout_secs: u64,

    /// Platform fee taken from every intent, in percent
    pub platform_fee_percent: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var_or(name, default)
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{} has an invalid value: {}", name, e))
}

fn required_var(name: &str) -> anyhow::Result<String> {
    env::var(name).map_err(|_| anyhow::anyhow!("{} environment variable is required", name))
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    /// - `JWT_SECRET` is shorter than 32 characters
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let cors_origins = var_or("CORS_ORIGINS", "*")
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let jwt_secret = required_var("JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let platform_fee_percent: u32 = parse_var("PLATFORM_FEE_PERCENT", "8")?;
        if platform_fee_percent > 100 {
            anyhow::bail!("PLATFORM_FEE_PERCENT must be between 0 and 100");
        }

        Ok(Self {
            api: ApiConfig {
                host: var_or("API_HOST", "0.0.0.0"),
                port: parse_var("API_PORT", "8080")?,
                cors_origins,
                production: parse_var("PRODUCTION", "false")?,
            },
            database: DatabaseConfig {
                url: required_var("DATABASE_URL")?,
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", "10")?,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                access_ttl_minutes: parse_var("JWT_ACCESS_TTL_MINUTES", "60")?,
            },
            catalog: CatalogConfig {
                api_base: var_or("CATALOG_API_BASE", "http://127.0.0.1:8080/v1"),
                timeout_secs: parse_var("CATALOG_TIMEOUT_SECS", "5")?,
            },
            payments: PaymentsConfig {
                api_base: var_or("PROCESSOR_API_BASE", "https://api.stripe.com"),
                secret_key: required_var("PROCESSOR_SECRET_KEY")?,
                webhook_secret: required_var("PROCESSOR_WEBHOOK_SECRET")?,
                timeout_secs: parse_var("PROCESSOR_TIMEOUT_SECS", "10")?,
                platform_fee_percent,
            },
            uploads: UploadConfig {
                dir: PathBuf::from(var_or("UPLOAD_DIR", "./uploads")),
                max_bytes: parse_var("UPLOAD_MAX_BYTES", "10485760")?,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog.timeout_secs)
    }

    pub fn processor_timeout(&self) -> Duration {
        Duration::from_secs(self.payments.timeout_secs)
    }

    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.jwt.access_ttl_minutes)
    }

    /// True when any origin is allowed
    pub fn cors_allows_any(&self) -> bool {
        self.api.cors_origins.is_empty() || self.api.cors_origins.iter().any(|o| o == "*")
    }
}
