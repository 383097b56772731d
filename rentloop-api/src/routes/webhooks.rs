/// Processor webhook ingestion
///
/// # Endpoint
///
/// ```text
/// POST /v1/webhooks/processor
/// Stripe-Signature: t=1700000000,v1=5257a869e7ec...
///
/// {"id": "evt_1", "type": "payment_intent.succeeded", "data": {"object": {"id": "pi_1"}}}
/// ```
///
/// The signature is checked against the raw body before anything is parsed.
/// A bad signature gets `400` and changes nothing. Once the signature is
/// good the answer is always `200 {"received": true}`; failures while
/// applying the event are logged, and the processor's redelivery plus the
/// guarded updates in [`rentloop_shared::payments::settlement`] make replays
/// harmless.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::HeaderMap, Json};
use bytes::Bytes;
use chrono::Utc;
use rentloop_shared::payments::{
    settlement::{apply_event, EventOutcome},
    webhook::{
        verify_signature, ProcessorEvent, SignatureError, DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER,
    },
};
use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

pub async fn processor_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let verified = match headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) {
        Some(signature) => verify_signature(
            &body,
            signature,
            &state.config.payments.webhook_secret,
            Utc::now().timestamp(),
            DEFAULT_TOLERANCE_SECS,
        ),
        None => Err(SignatureError::MissingHeader),
    };

    verified.map_err(|e| {
        warn!(error = %e, "Rejected processor webhook");
        ApiError::BadRequest(format!("Invalid signature: {}", e))
    })?;

    match ProcessorEvent::parse(&body) {
        Ok(event) => match apply_event(&state.db, &event).await {
            Ok(EventOutcome::Ignored) => {}
            Ok(outcome) => info!(kind = event.kind(), ?outcome, "Processor event applied"),
            Err(e) => error!(kind = event.kind(), error = %e, "Failed to apply processor event"),
        },
        Err(e) => error!(error = %e, "Undecodable processor event"),
    }

    Ok(Json(WebhookAck { received: true }))
}
