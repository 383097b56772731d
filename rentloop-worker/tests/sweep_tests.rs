/// Database-backed tests for the settlement sweep
///
/// Skipped unless DATABASE_URL points at a PostgreSQL instance.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rentloop_shared::catalog::{CatalogClient, CatalogError, ItemSnapshot};
use rentloop_shared::db::{
    migrations::run_migrations,
    pool::{connect, PoolSettings},
};
use rentloop_shared::ledger::{book_rental, mark_returned};
use rentloop_shared::models::payment::{NewPayment, Payment};
use rentloop_shared::payments::processor::{
    CreatedIntent, IntentRequest, PaymentProcessor, ProcessorError,
};
use rentloop_worker::settlement::{settle_payment, sweep_once, SettleOutcome};
use sqlx::PgPool;
use std::sync::Mutex;
use uuid::Uuid;

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = connect(&PoolSettings::from_url(url, 5))
        .await
        .expect("DATABASE_URL is set but the database is unreachable");
    run_migrations(&pool).await.expect("migrations should apply");
    Some(pool)
}

struct AlwaysBookable;

#[async_trait]
impl CatalogClient for AlwaysBookable {
    async fn fetch_item(&self, item_id: Uuid) -> Result<ItemSnapshot, CatalogError> {
        Ok(ItemSnapshot::bookable(item_id, 10.0))
    }
}

/// Captures only the intents it owns; everything else looks like an outage
///
/// Keeps concurrently running tests from settling each other's payments.
struct ScopedProcessor {
    owned: Vec<String>,
    reject_owned: bool,
    captured: Mutex<Vec<String>>,
}

impl ScopedProcessor {
    fn accepting(owned: &str) -> Self {
        Self {
            owned: vec![owned.to_string()],
            reject_owned: false,
            captured: Mutex::new(Vec::new()),
        }
    }

    fn rejecting(owned: &str) -> Self {
        Self {
            reject_owned: true,
            ..Self::accepting(owned)
        }
    }
}

#[async_trait]
impl PaymentProcessor for ScopedProcessor {
    async fn create_intent(&self, _: &IntentRequest) -> Result<CreatedIntent, ProcessorError> {
        unreachable!("the sweep only captures")
    }

    async fn capture_intent(&self, intent_id: &str) -> Result<(), ProcessorError> {
        if !self.owned.iter().any(|id| id == intent_id) {
            return Err(ProcessorError::Transient("not ours".to_string()));
        }
        if self.reject_owned {
            return Err(ProcessorError::Rejected {
                status: 400,
                message: "This PaymentIntent could not be captured".to_string(),
            });
        }
        self.captured.lock().unwrap().push(intent_id.to_string());
        Ok(())
    }
}

/// A returned rental with an uncaptured payment; returns the intent id
async fn returned_rental_payment(pool: &PgPool) -> String {
    let renter = format!("renter_{}", &Uuid::new_v4().simple().to_string()[..12]);
    let start = Utc::now() + Duration::days(90);
    let rental = book_rental(
        pool,
        &AlwaysBookable,
        &renter,
        Uuid::new_v4(),
        start,
        start + Duration::hours(2),
    )
    .await
    .unwrap();
    mark_returned(pool, rental.id, &renter).await.unwrap();

    let intent_id = format!("pi_{}", Uuid::new_v4().simple());
    Payment::create(
        pool,
        NewPayment {
            rental_id: rental.id,
            payer_username: renter,
            owner_username: "owner".to_string(),
            amount_cents: 2400,
            currency: "eur".to_string(),
            intent_id: intent_id.clone(),
        },
    )
    .await
    .unwrap();

    intent_id
}

#[tokio::test]
async fn test_sweep_captures_returned_rental_payment() {
    let Some(pool) = test_pool().await else { return };
    let intent_id = returned_rental_payment(&pool).await;
    let processor = ScopedProcessor::accepting(&intent_id);

    let report = sweep_once(&pool, &processor, 10_000).await.unwrap();

    assert!(report.captured >= 1);
    assert_eq!(*processor.captured.lock().unwrap(), vec![intent_id.clone()]);
    let payment = Payment::find_by_intent(&pool, &intent_id).await.unwrap().unwrap();
    assert!(payment.captured);

    // Nothing left for this payment on the next sweep
    let again = ScopedProcessor::accepting(&intent_id);
    sweep_once(&pool, &again, 10_000).await.unwrap();
    assert!(again.captured.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_capture_leaves_payment_uncaptured() {
    let Some(pool) = test_pool().await else { return };
    let intent_id = returned_rental_payment(&pool).await;
    let payment = Payment::find_by_intent(&pool, &intent_id).await.unwrap().unwrap();

    let outcome = settle_payment(&pool, &ScopedProcessor::rejecting(&intent_id), &payment)
        .await
        .unwrap();

    assert_eq!(outcome, SettleOutcome::Failed);
    let payment = Payment::find_by_intent(&pool, &intent_id).await.unwrap().unwrap();
    assert!(!payment.captured);
}

#[tokio::test]
async fn test_transient_failure_is_deferred() {
    let Some(pool) = test_pool().await else { return };
    let intent_id = returned_rental_payment(&pool).await;
    let payment = Payment::find_by_intent(&pool, &intent_id).await.unwrap().unwrap();

    let outcome = settle_payment(&pool, &ScopedProcessor::accepting("pi_other"), &payment)
        .await
        .unwrap();

    assert_eq!(outcome, SettleOutcome::Deferred);
    assert!(!Payment::find_by_intent(&pool, &intent_id).await.unwrap().unwrap().captured);

    // The next attempt succeeds
    let outcome = settle_payment(&pool, &ScopedProcessor::accepting(&intent_id), &payment)
        .await
        .unwrap();
    assert_eq!(outcome, SettleOutcome::Captured);
}

#[tokio::test]
async fn test_capture_recorded_by_webhook_first() {
    let Some(pool) = test_pool().await else { return };
    let intent_id = returned_rental_payment(&pool).await;
    let payment = Payment::find_by_intent(&pool, &intent_id).await.unwrap().unwrap();

    let mut conn = pool.acquire().await.unwrap();
    Payment::mark_captured(&mut conn, &intent_id).await.unwrap();
    drop(conn);

    let outcome = settle_payment(&pool, &ScopedProcessor::accepting(&intent_id), &payment)
        .await
        .unwrap();
    assert_eq!(outcome, SettleOutcome::AlreadyRecorded);
}
