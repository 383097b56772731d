/// HTTP contract tests for the payment processor client

use httpmock::prelude::*;
use rentloop_shared::payments::processor::{
    IntentRequest, PaymentProcessor, ProcessorError, StripeProcessor,
};
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

fn processor(server: &MockServer) -> StripeProcessor {
    StripeProcessor::new(server.base_url(), "sk_test_123", Duration::from_secs(2)).unwrap()
}

fn request() -> IntentRequest {
    IntentRequest {
        rental_id: Uuid::new_v4(),
        amount_cents: 4200,
        currency: "eur".to_string(),
        application_fee_cents: 336,
        destination_account: "acct_owner".to_string(),
    }
}

#[tokio::test]
async fn test_create_intent() {
    let server = MockServer::start_async().await;

    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/payment_intents")
                .header("authorization", "Bearer sk_test_123");
            then.status(200).json_body(json!({
                "id": "pi_abc",
                "client_secret": "pi_abc_secret_xyz",
                "status": "requires_payment_method",
            }));
        })
        .await;

    let intent = processor(&server).create_intent(&request()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(intent.id, "pi_abc");
    assert_eq!(intent.client_secret.as_deref(), Some("pi_abc_secret_xyz"));
}

#[tokio::test]
async fn test_card_error_is_permanent() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/payment_intents");
            then.status(402)
                .json_body(json!({"error": {"message": "Your card was declined."}}));
        })
        .await;

    let err = processor(&server).create_intent(&request()).await.unwrap_err();
    match err {
        ProcessorError::Rejected { status, message } => {
            assert_eq!(status, 402);
            assert_eq!(message, "Your card was declined.");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_capture_server_error_is_transient() {
    let server = MockServer::start_async().await;

    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/payment_intents/pi_abc/capture");
            then.status(503);
        })
        .await;

    let err = processor(&server).capture_intent("pi_abc").await.unwrap_err();

    mock.assert_async().await;
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_capture_success() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/payment_intents/pi_ok/capture");
            then.status(200).json_body(json!({"id": "pi_ok", "status": "succeeded"}));
        })
        .await;

    assert!(processor(&server).capture_intent("pi_ok").await.is_ok());
}
