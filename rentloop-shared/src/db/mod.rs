/// Database plumbing shared by the API and the settlement worker
///
/// - `pool`: Postgres connection pool
/// - `migrations`: embedded schema migrations
///
/// Table models live in [`crate::models`].

pub mod migrations;
pub mod pool;
