/// Embedded schema migrations
///
/// SQL files live in `rentloop-shared/migrations/` and are compiled into the
/// binary with `sqlx::migrate!`, so the API can bring a fresh database up to
/// date on startup.
///
/// # Schema
///
/// ```text
/// users ─┐
///        │ (username)
/// items ─┼── item_categories ── categories
///        │
/// rentals (item_id, renter_username, [start_at, end_at), status)
///        │
/// payments (rental_id, intent_id, captured, refunded)
/// ```

use sqlx::{migrate::MigrateDatabase, postgres::PgPool, Postgres};
use tracing::{info, warn};

/// Applied migration summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaVersion {
    /// Number of successfully applied migrations
    pub applied: usize,

    /// Highest applied version, if any
    pub latest: Option<i64>,
}

/// Applies every pending migration
///
/// # Errors
///
/// Returns the first migration failure; sqlx rolls that migration back.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Applying database migrations");

    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        warn!(error = %e, "Migration failed");
        e
    })?;

    info!("Database schema is current");
    Ok(())
}

/// Number of embedded migrations shipped with this build
pub fn embedded_count() -> usize {
    sqlx::migrate!("./migrations").iter().count()
}

/// Reads what has been applied so far
///
/// Returns an empty summary if the migrations table does not exist yet.
pub async fn schema_version(pool: &PgPool) -> Result<SchemaVersion, sqlx::Error> {
    let has_table: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public' AND table_name = '_sqlx_migrations'
        )",
    )
    .fetch_one(pool)
    .await?;

    if !has_table {
        return Ok(SchemaVersion {
            applied: 0,
            latest: None,
        });
    }

    let (applied, latest): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(version) FROM _sqlx_migrations WHERE success = true",
    )
    .fetch_one(pool)
    .await?;

    Ok(SchemaVersion {
        applied: applied as usize,
        latest,
    })
}

/// Creates the database named in `url` when it is missing
pub async fn ensure_database_exists(url: &str) -> Result<(), sqlx::Error> {
    if !Postgres::database_exists(url).await? {
        info!("Creating database");
        Postgres::create_database(url).await?;
    }
    Ok(())
}
