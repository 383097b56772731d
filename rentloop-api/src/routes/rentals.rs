/// Rental endpoints
///
/// Booking itself lives in [`rentloop_shared::ledger`]; these handlers add
/// authentication and the item snapshot shown next to each rental.
///
/// # Endpoints
///
/// - `POST /v1/rentals` - Book an item
/// - `GET /v1/rentals/me` - Caller's rentals, newest first
/// - `POST /v1/rentals/:id/return` - Mark returned (renter only, idempotent)
/// - `GET /v1/rentals/item/:item_id/availability` - Reserved intervals (public)
///
/// # Example
///
/// ```text
/// POST /v1/rentals
/// Authorization: Bearer eyJ...
///
/// { "item_id": "…", "start_at": "2025-01-01T00:00:00Z", "end_at": "2025-01-01T05:00:00Z" }
/// ```
///
/// ```json
/// {
///   "id": "…",
///   "item_id": "…",
///   "renter_username": "ana",
///   "start_at": "2025-01-01T00:00:00Z",
///   "end_at": "2025-01-01T05:00:00Z",
///   "deposit": 60.0,
///   "status": "pending",
///   "returned": false,
///   "item": { "id": "…", "name": "Cordless drill", "price_per_h": 10.0, "available": true }
/// }
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rentloop_shared::{
    auth::middleware::AuthContext,
    catalog::ItemSnapshot,
    ledger,
    models::rental::{OccupiedRange, Rental, RentalStatus},
    payments::fees::to_major_units,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateRentalRequest {
    pub item_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RentalResponse {
    pub id: Uuid,
    pub item_id: Uuid,
    pub renter_username: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,

    /// Major units
    pub deposit: f64,

    pub status: RentalStatus,
    pub returned: bool,
    pub created_at: DateTime<Utc>,

    /// Display snapshot; a placeholder when the catalog could not be read
    pub item: ItemSnapshot,
}

impl RentalResponse {
    fn new(rental: Rental, item: ItemSnapshot) -> Self {
        Self {
            id: rental.id,
            item_id: rental.item_id,
            renter_username: rental.renter_username,
            start_at: rental.start_at,
            end_at: rental.end_at,
            deposit: to_major_units(rental.deposit_cents),
            status: rental.status,
            returned: rental.returned,
            created_at: rental.created_at,
            item,
        }
    }
}

async fn with_item(state: &AppState, rental: Rental) -> RentalResponse {
    let item = state.catalog.item_for_display(rental.item_id).await;
    RentalResponse::new(rental, item)
}

/// Book an item for the caller
///
/// # Errors
///
/// - `400 Bad Request`: `end_at` not after `start_at`
/// - `401 Unauthorized`: Not authenticated
/// - `404 Not Found`: Item does not exist
/// - `409 Conflict`: Item unavailable or window overlaps an active rental
/// - `503 Service Unavailable`: Catalog unreachable or too slow
pub async fn create_rental(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateRentalRequest>,
) -> ApiResult<(StatusCode, Json<RentalResponse>)> {
    let rental = ledger::book_rental(
        &state.db,
        state.catalog.as_ref(),
        &auth.username,
        req.item_id,
        req.start_at,
        req.end_at,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(with_item(&state, rental).await)))
}

pub async fn my_rentals(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<RentalResponse>>> {
    let rentals = Rental::list_by_renter(&state.db, &auth.username).await?;

    // One catalog read per distinct item
    let mut snapshots: HashMap<Uuid, ItemSnapshot> = HashMap::new();
    let mut responses = Vec::with_capacity(rentals.len());
    for rental in rentals {
        let item = match snapshots.get(&rental.item_id) {
            Some(item) => item.clone(),
            None => {
                let item = state.catalog.item_for_display(rental.item_id).await;
                snapshots.insert(rental.item_id, item.clone());
                item
            }
        };
        responses.push(RentalResponse::new(rental, item));
    }

    Ok(Json(responses))
}

/// Mark a rental returned
///
/// Returning twice is the same as returning once.
///
/// # Errors
///
/// - `404 Not Found`: Rental missing or booked by someone else
pub async fn return_rental(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RentalResponse>> {
    let rental = ledger::mark_returned(&state.db, id, &auth.username).await?;
    Ok(Json(with_item(&state, rental).await))
}

pub async fn item_availability(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> ApiResult<Json<Vec<OccupiedRange>>> {
    Ok(Json(Rental::occupied_ranges(&state.db, item_id).await?))
}
