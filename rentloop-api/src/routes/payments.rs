/// Payment endpoints
///
/// - `POST /v1/payments/intents` - Create a manual-capture intent for a rental
/// - `GET /v1/payments/:id` - One payment, visible to payer and owner
///
/// Funds are authorized when the renter confirms the intent client-side and
/// captured later, by the processor webhook or the settlement sweep. The
/// platform fee is `PLATFORM_FEE_PERCENT` of the amount, rounded half-up.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rentloop_shared::{
    auth::middleware::AuthContext,
    models::{
        payment::{NewPayment, Payment},
        rental::Rental,
    },
    payments::{
        fees::{calc_app_fee, to_minor_units},
        processor::IntentRequest,
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

const DEFAULT_CURRENCY: &str = "eur";

#[derive(Debug, Deserialize, Validate)]
pub struct CreateIntentRequest {
    pub rental_id: Uuid,

    /// Major units
    pub amount: f64,

    #[validate(length(equal = 3, message = "Currency must be an ISO 4217 code"))]
    pub currency: Option<String>,

    /// Connected account of the item owner
    #[validate(length(min = 1, max = 255, message = "Destination account is required"))]
    pub destination_account: String,
}

#[derive(Debug, Serialize)]
pub struct CreateIntentResponse {
    pub payment: Payment,

    /// Handed to the client to confirm the intent
    pub client_secret: Option<String>,
}

/// Create a payment intent for one of the caller's rentals
///
/// # Errors
///
/// - `404 Not Found`: Rental missing or booked by someone else
/// - `409 Conflict`: Rental already returned
/// - `422 Unprocessable Entity`: Non-positive amount, bad currency
/// - `503 Service Unavailable`: Catalog or processor failure
pub async fn create_intent(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateIntentRequest>,
) -> ApiResult<(StatusCode, Json<CreateIntentResponse>)> {
    req.validate()?;

    let amount_cents = to_minor_units(req.amount)
        .filter(|cents| *cents > 0)
        .ok_or_else(|| ApiError::invalid_field("amount", "Amount must be positive"))?;

    let rental = Rental::find_by_id(&state.db, req.rental_id)
        .await?
        .filter(|r| r.renter_username == auth.username)
        .ok_or_else(|| ApiError::NotFound("Rental not found".to_string()))?;

    if rental.status.is_terminal() {
        return Err(ApiError::Conflict("Rental already returned".to_string()));
    }

    let item = state.catalog.fetch_item(rental.item_id).await?;
    let owner_username = item.owner_username.ok_or_else(|| {
        ApiError::ServiceUnavailable("Catalog did not report the item owner".to_string())
    })?;

    let currency = req
        .currency
        .as_deref()
        .unwrap_or(DEFAULT_CURRENCY)
        .to_lowercase();

    let intent = state
        .processor
        .create_intent(&IntentRequest {
            rental_id: rental.id,
            amount_cents,
            currency: currency.clone(),
            application_fee_cents: calc_app_fee(
                amount_cents,
                state.config.payments.platform_fee_percent,
            ),
            destination_account: req.destination_account,
        })
        .await?;

    let payment = Payment::create(
        &state.db,
        NewPayment {
            rental_id: rental.id,
            payer_username: auth.username,
            owner_username,
            amount_cents,
            currency,
            intent_id: intent.id,
        },
    )
    .await?;

    tracing::info!(
        payment_id = %payment.id,
        rental_id = %payment.rental_id,
        intent_id = %payment.intent_id,
        amount_cents,
        "Payment intent created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateIntentResponse {
            payment,
            client_secret: intent.client_secret,
        }),
    ))
}

pub async fn get_payment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Payment>> {
    Payment::find_by_id(&state.db, id)
        .await?
        .filter(|p| p.payer_username == auth.username || p.owner_username == auth.username)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Payment not found".to_string()))
}
