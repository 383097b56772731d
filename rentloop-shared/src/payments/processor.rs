/// Payment processor integration
///
/// The marketplace holds the renter's money with a manual-capture payment
/// intent routed to the owner's connected account, minus the platform fee.
/// Capture happens later (webhook or settlement sweep).
///
/// [`StripeProcessor`] speaks the Stripe-compatible form-encoded API:
///
/// ```text
/// POST {api_base}/v1/payment_intents
///   amount, currency, capture_method=manual, payment_method_types[]=card,
///   application_fee_amount, on_behalf_of, transfer_data[destination],
///   metadata[rental_id]
/// POST {api_base}/v1/payment_intents/{id}/capture
/// ```

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Errors from the processor
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    /// Timeouts, connection failures, 429 and 5xx; worth retrying later
    #[error("processor temporarily unavailable: {0}")]
    Transient(String),

    /// The processor refused the request; retrying will not help
    #[error("processor rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Response could not be understood
    #[error("malformed processor response: {0}")]
    Malformed(String),
}

impl ProcessorError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProcessorError::Transient(_))
    }
}

/// Parameters for a new payment intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRequest {
    pub rental_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub application_fee_cents: i64,
    /// Connected account receiving the funds
    pub destination_account: String,
}

/// A payment intent as returned by the processor
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Operations the marketplace needs from a payment processor
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Creates a manual-capture intent
    async fn create_intent(&self, request: &IntentRequest) -> Result<CreatedIntent, ProcessorError>;

    /// Captures a previously authorized intent
    async fn capture_intent(&self, intent_id: &str) -> Result<(), ProcessorError>;
}

/// Stripe-compatible HTTP processor client
#[derive(Debug, Clone)]
pub struct StripeProcessor {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl StripeProcessor {
    pub fn new(
        api_base: impl Into<String>,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProcessorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProcessorError::Transient(e.to_string()))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<reqwest::Response, ProcessorError> {
        let response = self
            .client
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(|e| ProcessorError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorEnvelope>()
            .await
            .ok()
            .and_then(|envelope| envelope.error.message)
            .unwrap_or_else(|| status.to_string());

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(ProcessorError::Transient(message))
        } else {
            Err(ProcessorError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// Form fields for a manual-capture intent
pub fn intent_form(request: &IntentRequest) -> Vec<(&'static str, String)> {
    vec![
        ("amount", request.amount_cents.to_string()),
        ("currency", request.currency.to_lowercase()),
        ("capture_method", "manual".to_string()),
        ("payment_method_types[]", "card".to_string()),
        ("application_fee_amount", request.application_fee_cents.to_string()),
        ("on_behalf_of", request.destination_account.clone()),
        ("transfer_data[destination]", request.destination_account.clone()),
        ("metadata[rental_id]", request.rental_id.to_string()),
    ]
}

#[async_trait]
impl PaymentProcessor for StripeProcessor {
    async fn create_intent(&self, request: &IntentRequest) -> Result<CreatedIntent, ProcessorError> {
        let response = self
            .post_form("/v1/payment_intents", &intent_form(request))
            .await?;

        let intent: CreatedIntent = response
            .json()
            .await
            .map_err(|e| ProcessorError::Malformed(e.to_string()))?;

        info!(
            intent_id = %intent.id,
            rental_id = %request.rental_id,
            amount_cents = request.amount_cents,
            fee_cents = request.application_fee_cents,
            "Payment intent created"
        );

        Ok(intent)
    }

    async fn capture_intent(&self, intent_id: &str) -> Result<(), ProcessorError> {
        let path = format!("/v1/payment_intents/{}/capture", intent_id);
        match self.post_form(&path, &[]).await {
            Ok(_) => {
                info!(%intent_id, "Payment intent captured");
                Ok(())
            }
            Err(e) => {
                warn!(%intent_id, error = %e, "Capture failed");
                Err(e)
            }
        }
    }
}
