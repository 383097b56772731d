/// Catalog items
///
/// Items are owned by a user (by username) and only the owner may change or
/// delete them. Prices are stored in minor units; the API exposes them as
/// `price_per_h` in major units.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE items (
///     id UUID PRIMARY KEY,
///     name VARCHAR(80) NOT NULL,
///     description TEXT,
///     price_per_hour_cents BIGINT NOT NULL CHECK (price_per_hour_cents > 0),
///     owner_username VARCHAR(50) NOT NULL,
///     available BOOLEAN NOT NULL DEFAULT TRUE,
///     image_urls TEXT[] NOT NULL,
///     stock INTEGER NOT NULL DEFAULT 1,
///     condition VARCHAR(10) NOT NULL DEFAULT 'new',
///     shipping_type VARCHAR(10) NOT NULL DEFAULT 'free',
///     tags TEXT[] NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL
/// );
///
/// CREATE TABLE item_categories (item_id UUID, category_id INTEGER);
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use super::category::Category;

const ITEM_COLUMNS: &str = "id, name, description, price_per_hour_cents, owner_username, \
     available, image_urls, stock, condition, shipping_type, tags, created_at, updated_at";

/// Physical condition of an item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCondition {
    #[default]
    New,
    Used,
}

impl ItemCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemCondition::New => "new",
            ItemCondition::Used => "used",
        }
    }
}

/// How the item reaches the renter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShippingType {
    #[default]
    Free,
    Paid,
    Pickup,
}

impl ShippingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingType::Free => "free",
            ShippingType::Paid => "paid",
            ShippingType::Pickup => "pickup",
        }
    }
}

/// A row of `items`
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_per_hour_cents: i64,
    pub owner_username: String,

    /// Master switch read by the rental ledger before booking
    pub available: bool,

    /// Ordered image references; the first one is the cover
    pub image_urls: Vec<String>,

    pub stock: i32,
    pub condition: String,
    pub shipping_type: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`Item::create`] and [`Item::replace`]
#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub description: Option<String>,
    pub price_per_hour_cents: i64,
    pub available: bool,
    pub image_urls: Vec<String>,
    pub stock: i32,
    pub condition: ItemCondition,
    pub shipping_type: ShippingType,
    pub tags: Vec<String>,
    pub category_ids: Vec<i32>,
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_per_hour_cents: Option<i64>,
    pub available: Option<bool>,
    pub image_urls: Option<Vec<String>>,
    pub stock: Option<i32>,
    pub condition: Option<ItemCondition>,
    pub shipping_type: Option<ShippingType>,
    pub tags: Option<Vec<String>>,
    pub category_ids: Option<Vec<i32>>,
}

/// Sortable columns for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemOrderBy {
    Price,
    Name,
    Id,
}

impl ItemOrderBy {
    fn column(&self) -> &'static str {
        match self {
            ItemOrderBy::Price => "price_per_hour_cents",
            ItemOrderBy::Name => "name",
            ItemOrderBy::Id => "id",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn keyword(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Listing filters
///
/// Every filter is optional. `categories` matches items linked to any of
/// the given ids.
#[derive(Debug, Clone)]
pub struct ItemFilter {
    pub skip: i64,
    pub limit: i64,
    pub name: Option<String>,
    pub min_price_cents: Option<i64>,
    pub max_price_cents: Option<i64>,
    pub available: Option<bool>,
    pub categories: Vec<i32>,
    pub order_by: Option<ItemOrderBy>,
    pub order_dir: SortDirection,
}

impl Default for ItemFilter {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 100,
            name: None,
            min_price_cents: None,
            max_price_cents: None,
            available: None,
            categories: Vec::new(),
            order_by: None,
            order_dir: SortDirection::Asc,
        }
    }
}

impl ItemFilter {
    fn order_clause(&self) -> String {
        match self.order_by {
            Some(ItemOrderBy::Id) | None => format!("ORDER BY id {}", self.order_dir.keyword()),
            Some(field) => format!(
                "ORDER BY {} {}, id ASC",
                field.column(),
                self.order_dir.keyword()
            ),
        }
    }

    fn name_pattern(&self) -> Option<String> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(|n| format!("%{}%", escape_like(n)))
    }
}

const FILTER_CLAUSE: &str = r#"
    WHERE ($1::text IS NULL OR name ILIKE $1 OR description ILIKE $1)
      AND ($2::bigint IS NULL OR price_per_hour_cents >= $2)
      AND ($3::bigint IS NULL OR price_per_hour_cents <= $3)
      AND ($4::boolean IS NULL OR available = $4)
      AND (cardinality($5::int[]) = 0 OR EXISTS (
            SELECT 1 FROM item_categories ic
            WHERE ic.item_id = items.id AND ic.category_id = ANY($5)
      ))
"#;

fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(sqlx::FromRow)]
struct ItemCategoryRow {
    item_id: Uuid,
    id: i32,
    name: String,
}

impl Item {
    /// Inserts an item and links its categories
    pub async fn create(pool: &PgPool, owner: &str, data: NewItem) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO items (name, description, price_per_hour_cents, owner_username,
                               available, image_urls, stock, condition, shipping_type, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            ITEM_COLUMNS
        );

        let item = sqlx::query_as::<_, Item>(&sql)
            .bind(&data.name)
            .bind(&data.description)
            .bind(data.price_per_hour_cents)
            .bind(owner)
            .bind(data.available)
            .bind(&data.image_urls)
            .bind(data.stock)
            .bind(data.condition.as_str())
            .bind(data.shipping_type.as_str())
            .bind(&data.tags)
            .fetch_one(&mut *tx)
            .await?;

        link_categories(&mut *tx, item.id, &data.category_ids).await?;
        tx.commit().await?;

        Ok(item)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {} FROM items WHERE id = $1", ITEM_COLUMNS);
        sqlx::query_as::<_, Item>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Filtered page of items plus the total number of matches
    pub async fn list(pool: &PgPool, filter: &ItemFilter) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let pattern = filter.name_pattern();

        let count_sql = format!("SELECT COUNT(*) FROM items {}", FILTER_CLAUSE);
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&pattern)
            .bind(filter.min_price_cents)
            .bind(filter.max_price_cents)
            .bind(filter.available)
            .bind(&filter.categories)
            .fetch_one(pool)
            .await?;

        let page_sql = format!(
            "SELECT {} FROM items {} {} LIMIT $6 OFFSET $7",
            ITEM_COLUMNS,
            FILTER_CLAUSE,
            filter.order_clause()
        );
        let items = sqlx::query_as::<_, Item>(&page_sql)
            .bind(&pattern)
            .bind(filter.min_price_cents)
            .bind(filter.max_price_cents)
            .bind(filter.available)
            .bind(&filter.categories)
            .bind(filter.limit)
            .bind(filter.skip)
            .fetch_all(pool)
            .await?;

        Ok((items, total))
    }

    /// Items owned by `owner`, newest first
    pub async fn list_by_owner(pool: &PgPool, owner: &str) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM items WHERE owner_username = $1 ORDER BY created_at DESC",
            ITEM_COLUMNS
        );
        sqlx::query_as::<_, Item>(&sql)
            .bind(owner)
            .fetch_all(pool)
            .await
    }

    /// Applies a partial update if `owner` owns the item
    ///
    /// Returns `None` when the item is missing or owned by someone else.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        owner: &str,
        patch: ItemPatch,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE items SET
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                price_per_hour_cents = COALESCE($5, price_per_hour_cents),
                available = COALESCE($6, available),
                image_urls = COALESCE($7, image_urls),
                stock = COALESCE($8, stock),
                condition = COALESCE($9, condition),
                shipping_type = COALESCE($10, shipping_type),
                tags = COALESCE($11, tags),
                updated_at = NOW()
            WHERE id = $1 AND owner_username = $2
            RETURNING {}
            "#,
            ITEM_COLUMNS
        );

        let item = sqlx::query_as::<_, Item>(&sql)
            .bind(id)
            .bind(owner)
            .bind(patch.name)
            .bind(patch.description)
            .bind(patch.price_per_hour_cents)
            .bind(patch.available)
            .bind(patch.image_urls)
            .bind(patch.stock)
            .bind(patch.condition.map(|c| c.as_str()))
            .bind(patch.shipping_type.map(|s| s.as_str()))
            .bind(patch.tags)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(item) = item else {
            return Ok(None);
        };

        if let Some(category_ids) = patch.category_ids {
            sqlx::query("DELETE FROM item_categories WHERE item_id = $1")
                .bind(item.id)
                .execute(&mut *tx)
                .await?;
            link_categories(&mut *tx, item.id, &category_ids).await?;
        }

        tx.commit().await?;
        Ok(Some(item))
    }

    /// Replaces every editable field if `owner` owns the item
    pub async fn replace(
        pool: &PgPool,
        id: Uuid,
        owner: &str,
        data: NewItem,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let sql = format!(
            r#"
            UPDATE items SET
                name = $3, description = $4, price_per_hour_cents = $5, available = $6,
                image_urls = $7, stock = $8, condition = $9, shipping_type = $10, tags = $11,
                updated_at = NOW()
            WHERE id = $1 AND owner_username = $2
            RETURNING {}
            "#,
            ITEM_COLUMNS
        );

        let item = sqlx::query_as::<_, Item>(&sql)
            .bind(id)
            .bind(owner)
            .bind(&data.name)
            .bind(&data.description)
            .bind(data.price_per_hour_cents)
            .bind(data.available)
            .bind(&data.image_urls)
            .bind(data.stock)
            .bind(data.condition.as_str())
            .bind(data.shipping_type.as_str())
            .bind(&data.tags)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(item) = item else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM item_categories WHERE item_id = $1")
            .bind(item.id)
            .execute(&mut *tx)
            .await?;
        link_categories(&mut *tx, item.id, &data.category_ids).await?;

        tx.commit().await?;
        Ok(Some(item))
    }

    /// Sets the availability flag if `owner` owns the item
    pub async fn set_availability(
        pool: &PgPool,
        id: Uuid,
        owner: &str,
        available: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        Self::update(
            pool,
            id,
            owner,
            ItemPatch {
                available: Some(available),
                ..Default::default()
            },
        )
        .await
    }

    /// Deletes the item if `owner` owns it; returns whether a row was removed
    pub async fn delete(pool: &PgPool, id: Uuid, owner: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1 AND owner_username = $2")
            .bind(id)
            .bind(owner)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Categories of each item in `ids`
    pub async fn categories_for(
        pool: &PgPool,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Category>>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ItemCategoryRow>(
            r#"
            SELECT ic.item_id, c.id, c.name
            FROM item_categories ic
            JOIN categories c ON c.id = ic.category_id
            WHERE ic.item_id = ANY($1)
            ORDER BY c.name
            "#,
        )
        .bind(ids)
        .fetch_all(pool)
        .await?;

        let mut by_item: HashMap<Uuid, Vec<Category>> = HashMap::new();
        for row in rows {
            by_item.entry(row.item_id).or_default().push(Category {
                id: row.id,
                name: row.name,
            });
        }
        Ok(by_item)
    }

    /// Cover image, if any
    pub fn cover_image(&self) -> Option<&str> {
        self.image_urls.first().map(String::as_str)
    }
}

async fn link_categories(
    conn: &mut PgConnection,
    item_id: Uuid,
    category_ids: &[i32],
) -> Result<(), sqlx::Error> {
    if category_ids.is_empty() {
        return Ok(());
    }

    sqlx::query(
        r#"
        INSERT INTO item_categories (item_id, category_id)
        SELECT $1, unnest($2::int[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(item_id)
    .bind(category_ids)
    .execute(conn)
    .await?;

    Ok(())
}
