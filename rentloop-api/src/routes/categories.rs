/// Category endpoints
///
/// - `GET /v1/categories` - All categories, sorted by name
/// - `POST /v1/categories` - Create a category (authenticated)
/// - `GET /v1/categories/:id` - One category

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rentloop_shared::{auth::middleware::AuthContext, models::category::Category};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1 to 50 characters"))]
    pub name: String,
}

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(Category::list(&state.db).await?))
}

/// # Errors
///
/// - `401 Unauthorized`: Not authenticated
/// - `409 Conflict`: Name already exists
pub async fn create_category(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    req.validate()?;

    let category = Category::create(&state.db, req.name.trim()).await?;
    tracing::info!(category_id = category.id, created_by = %auth.username, "Category created");

    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Category>> {
    Category::find_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Category not found".to_string()))
}
