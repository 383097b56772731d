/// Item categories
///
/// Categories are a flat list of names linked to items through
/// `item_categories`. A default set is seeded by migration.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i32,
    pub name: String,
}

impl Category {
    /// All categories ordered by name
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name")
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Creates a category; duplicate names violate `categories_name_key`
    pub async fn create(pool: &PgPool, name: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name) VALUES ($1) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(pool)
        .await
    }

    /// Returns the ids in `ids` that do not exist, in input order
    pub async fn find_missing(pool: &PgPool, ids: &[i32]) -> Result<Vec<i32>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let existing: Vec<i32> =
            sqlx::query_scalar("SELECT id FROM categories WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(pool)
                .await?;

        let mut missing: Vec<i32> = ids
            .iter()
            .copied()
            .filter(|id| !existing.contains(id))
            .collect();
        missing.dedup();
        Ok(missing)
    }
}
