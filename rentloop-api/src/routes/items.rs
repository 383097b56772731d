/// Catalog item endpoints
///
/// Items are listed publicly; creating and changing them requires a bearer
/// token, and only the owner may change or delete an item. Requests touching
/// someone else's item get the same 404 as a missing one.
///
/// `GET /v1/items/:id` is also the catalog contract the rental ledger reads
/// through [`rentloop_shared::catalog::HttpCatalogClient`], so its JSON keeps
/// `price_per_h`, `available` and `owner_username` at the top level.
///
/// # Endpoints
///
/// - `POST /v1/items` - Create item
/// - `GET /v1/items` - Filtered, paginated listing
/// - `GET /v1/items/me` - Caller's items
/// - `GET /v1/items/:id` - One item
/// - `PATCH /v1/items/:id` - Partial update
/// - `PUT /v1/items/:id` - Full replacement
/// - `DELETE /v1/items/:id` - Delete
/// - `PUT /v1/items/:id/availability` - Toggle the availability flag
///
/// # Listing
///
/// ```text
/// GET /v1/items?skip=0&limit=20&name=drill&min_price=2&max_price=10
///              &available=true&categories=1,3&order_by=price&order_dir=asc
/// ```
///
/// The response carries `X-Total-Count` and an RFC 5988 `Link` header with
/// `next` / `prev` relations.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use rentloop_shared::{
    auth::middleware::AuthContext,
    models::{
        category::Category,
        item::{
            Item, ItemCondition, ItemFilter, ItemOrderBy, ItemPatch, NewItem, ShippingType,
            SortDirection,
        },
    },
    payments::fees::{to_major_units, to_minor_units},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Largest page size accepted by the listing
pub const MAX_PAGE_SIZE: i64 = 1000;

const DEFAULT_PAGE_SIZE: i64 = 100;
const MAX_IMAGES: usize = 10;

const TOTAL_COUNT: &str = "x-total-count";

/// Image references must point at our upload store or at an http(s) URL
#[allow(clippy::ptr_arg)]
fn validate_image_urls(urls: &Vec<String>) -> Result<(), ValidationError> {
    if urls.len() > MAX_IMAGES {
        return Err(ValidationError::new("too_many_images")
            .with_message(format!("At most {} images", MAX_IMAGES).into()));
    }

    let valid = |url: &String| {
        url.starts_with("/uploads/") || url.starts_with("https://") || url.starts_with("http://")
    };
    if !urls.iter().all(valid) {
        return Err(ValidationError::new("image_url")
            .with_message("Image URLs must be uploaded files or http(s) links".into()));
    }

    Ok(())
}

/// Create or full-replace body
#[derive(Debug, Deserialize, Validate)]
pub struct ItemRequest {
    #[validate(length(min = 1, max = 80, message = "Name must be 1 to 80 characters"))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    /// Major units; must be positive
    pub price_per_h: f64,

    #[serde(default = "default_available")]
    pub available: bool,

    #[serde(default)]
    #[validate(custom(function = "validate_image_urls"))]
    pub image_urls: Vec<String>,

    #[serde(default = "default_stock")]
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,

    #[serde(default)]
    pub condition: ItemCondition,

    #[serde(default)]
    pub shipping_type: ShippingType,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub category_ids: Vec<i32>,
}

fn default_available() -> bool {
    true
}

fn default_stock() -> i32 {
    1
}

/// Partial update body; absent fields are left unchanged
#[derive(Debug, Default, Deserialize, Validate)]
pub struct PatchItemRequest {
    #[validate(length(min = 1, max = 80, message = "Name must be 1 to 80 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    pub price_per_h: Option<f64>,

    pub available: Option<bool>,

    #[validate(custom(function = "validate_image_urls"))]
    pub image_urls: Option<Vec<String>>,

    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: Option<i32>,

    pub condition: Option<ItemCondition>,

    pub shipping_type: Option<ShippingType>,

    pub tags: Option<Vec<String>>,

    pub category_ids: Option<Vec<i32>>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub available: bool,
}

/// Listing query string
#[derive(Debug, Default, Deserialize)]
pub struct ListItemsQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub name: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub available: Option<bool>,

    /// Comma-separated category ids
    pub categories: Option<String>,

    pub order_by: Option<ItemOrderBy>,
    pub order_dir: Option<SortDirection>,
}

/// Item as returned by the API
#[derive(Debug, Serialize, Deserialize)]
pub struct ItemResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,

    /// Major units
    pub price_per_h: f64,

    pub owner_username: String,
    pub available: bool,

    /// Cover image, the first of `image_urls`
    pub image_url: Option<String>,

    pub image_urls: Vec<String>,
    pub stock: i32,
    pub condition: String,
    pub shipping_type: String,
    pub tags: Vec<String>,
    pub categories: Vec<Category>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ItemResponse {
    fn new(item: Item, categories: Vec<Category>) -> Self {
        Self {
            image_url: item.cover_image().map(str::to_string),
            id: item.id,
            name: item.name,
            description: item.description,
            price_per_h: to_major_units(item.price_per_hour_cents),
            owner_username: item.owner_username,
            available: item.available,
            image_urls: item.image_urls,
            stock: item.stock,
            condition: item.condition,
            shipping_type: item.shipping_type,
            tags: item.tags,
            categories,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

fn price_cents(field: &str, major: f64) -> ApiResult<i64> {
    match to_minor_units(major) {
        Some(cents) if cents > 0 => Ok(cents),
        _ => Err(ApiError::invalid_field(field, "Price must be a positive amount")),
    }
}

fn parse_category_list(raw: &str) -> ApiResult<Vec<i32>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i32>()
                .map_err(|_| ApiError::invalid_field("categories", format!("Invalid category id '{}'", s)))
        })
        .collect()
}

async fn ensure_categories_exist(state: &AppState, ids: &[i32]) -> ApiResult<()> {
    let missing = Category::find_missing(&state.db, ids).await?;
    if missing.is_empty() {
        return Ok(());
    }

    let listed: Vec<String> = missing.iter().map(i32::to_string).collect();
    Err(ApiError::BadRequest(format!(
        "Unknown category ids: {}",
        listed.join(", ")
    )))
}

async fn with_categories(state: &AppState, items: Vec<Item>) -> ApiResult<Vec<ItemResponse>> {
    let ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();
    let mut categories: HashMap<Uuid, Vec<Category>> = Item::categories_for(&state.db, &ids).await?;

    Ok(items
        .into_iter()
        .map(|item| {
            let cats = categories.remove(&item.id).unwrap_or_default();
            ItemResponse::new(item, cats)
        })
        .collect())
}

async fn single_response(state: &AppState, item: Item) -> ApiResult<ItemResponse> {
    let mut responses = with_categories(state, vec![item]).await?;
    responses
        .pop()
        .ok_or_else(|| ApiError::InternalError("Item vanished while loading categories".to_string()))
}

fn not_found() -> ApiError {
    ApiError::NotFound("Item not found".to_string())
}

impl ListItemsQuery {
    fn into_filter(self) -> ApiResult<ItemFilter> {
        let skip = self.skip.unwrap_or(0);
        if skip < 0 {
            return Err(ApiError::invalid_field("skip", "skip must be zero or more"));
        }

        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(ApiError::invalid_field(
                "limit",
                format!("limit must be between 1 and {}", MAX_PAGE_SIZE),
            ));
        }

        let to_cents = |field: &str, price: Option<f64>| -> ApiResult<Option<i64>> {
            price
                .map(|p| {
                    to_minor_units(p).ok_or_else(|| {
                        ApiError::invalid_field(field, "Price filters must be zero or more")
                    })
                })
                .transpose()
        };

        let order_dir = match (self.order_dir, self.order_by) {
            (Some(dir), _) => dir,
            (None, Some(_)) => SortDirection::Desc,
            (None, None) => SortDirection::Asc,
        };

        Ok(ItemFilter {
            skip,
            limit,
            min_price_cents: to_cents("min_price", self.min_price)?,
            max_price_cents: to_cents("max_price", self.max_price)?,
            name: self.name,
            available: self.available,
            categories: match self.categories.as_deref() {
                Some(raw) => parse_category_list(raw)?,
                None => Vec::new(),
            },
            order_by: self.order_by,
            order_dir,
        })
    }
}

/// Builds the RFC 5988 `Link` value for a page, keeping the other query parameters
fn pagination_links(path: &str, query: Option<&str>, skip: i64, limit: i64, total: i64) -> Option<String> {
    let kept: Vec<&str> = query
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or_default();
            key != "skip" && key != "limit"
        })
        .collect();

    let link = |skip: i64, rel: &str| {
        let mut params = kept.clone();
        let paging = format!("skip={}&limit={}", skip, limit);
        params.push(&paging);
        format!("<{}?{}>; rel=\"{}\"", path, params.join("&"), rel)
    };

    let mut links = Vec::new();
    let next = skip.saturating_add(limit);
    if next < total {
        links.push(link(next, "next"));
    }
    if skip > 0 {
        links.push(link(skip.saturating_sub(limit).max(0), "prev"));
    }

    (!links.is_empty()).then(|| links.join(", "))
}

/// Create an item owned by the caller
///
/// # Errors
///
/// - `400 Bad Request`: Unknown category ids
/// - `401 Unauthorized`: Not authenticated
/// - `422 Unprocessable Entity`: Validation failed
pub async fn create_item(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<ItemRequest>,
) -> ApiResult<(StatusCode, Json<ItemResponse>)> {
    let data = new_item(req)?;
    ensure_categories_exist(&state, &data.category_ids).await?;

    let item = Item::create(&state.db, &auth.username, data).await?;
    tracing::info!(item_id = %item.id, owner = %auth.username, "Item created");

    Ok((StatusCode::CREATED, Json(single_response(&state, item).await?)))
}

fn new_item(req: ItemRequest) -> ApiResult<NewItem> {
    req.validate()?;

    Ok(NewItem {
        price_per_hour_cents: price_cents("price_per_h", req.price_per_h)?,
        name: req.name.trim().to_string(),
        description: req.description,
        available: req.available,
        image_urls: req.image_urls,
        stock: req.stock,
        condition: req.condition,
        shipping_type: req.shipping_type,
        tags: req.tags,
        category_ids: req.category_ids,
    })
}

/// Public, filtered listing
pub async fn list_items(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<ListItemsQuery>,
) -> ApiResult<(HeaderMap, Json<Vec<ItemResponse>>)> {
    let filter = query.into_filter()?;
    let (items, total) = Item::list(&state.db, &filter).await?;

    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static(TOTAL_COUNT), HeaderValue::from(total));
    if let Some(links) = pagination_links(uri.path(), uri.query(), filter.skip, filter.limit, total) {
        if let Ok(value) = HeaderValue::from_str(&links) {
            headers.insert(header::LINK, value);
        }
    }

    Ok((headers, Json(with_categories(&state, items).await?)))
}

/// Items owned by the caller, newest first
pub async fn my_items(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<ItemResponse>>> {
    let items = Item::list_by_owner(&state.db, &auth.username).await?;
    Ok(Json(with_categories(&state, items).await?))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ItemResponse>> {
    let item = Item::find_by_id(&state.db, id).await?.ok_or_else(not_found)?;
    Ok(Json(single_response(&state, item).await?))
}

/// Partial update by the owner
///
/// # Errors
///
/// - `404 Not Found`: Missing item or not the owner
pub async fn patch_item(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<PatchItemRequest>,
) -> ApiResult<Json<ItemResponse>> {
    req.validate()?;

    let patch = ItemPatch {
        price_per_hour_cents: req
            .price_per_h
            .map(|p| price_cents("price_per_h", p))
            .transpose()?,
        name: req.name.map(|n| n.trim().to_string()),
        description: req.description,
        available: req.available,
        image_urls: req.image_urls,
        stock: req.stock,
        condition: req.condition,
        shipping_type: req.shipping_type,
        tags: req.tags,
        category_ids: req.category_ids,
    };
    if let Some(ids) = &patch.category_ids {
        ensure_categories_exist(&state, ids).await?;
    }

    let item = Item::update(&state.db, id, &auth.username, patch)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(single_response(&state, item).await?))
}

/// Full replacement by the owner
pub async fn replace_item(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<ItemRequest>,
) -> ApiResult<Json<ItemResponse>> {
    let data = new_item(req)?;
    ensure_categories_exist(&state, &data.category_ids).await?;

    let item = Item::replace(&state.db, id, &auth.username, data)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(single_response(&state, item).await?))
}

pub async fn delete_item(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !Item::delete(&state.db, id, &auth.username).await? {
        return Err(not_found());
    }

    tracing::info!(item_id = %id, owner = %auth.username, "Item deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Toggle the availability flag read by the rental ledger
pub async fn set_availability(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<AvailabilityRequest>,
) -> ApiResult<Json<ItemResponse>> {
    let item = Item::set_availability(&state.db, id, &auth.username, req.available)
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(item_id = %id, available = req.available, "Item availability changed");
    Ok(Json(single_response(&state, item).await?))
}
