/// Applying processor events to local state
///
/// Webhook deliveries are at-least-once and may arrive in any order, so
/// every step here is a guarded, monotonic update. A capture also confirms
/// the rental it pays for; that propagation lives in [`propagate_capture`].

use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use super::webhook::ProcessorEvent;
use crate::models::payment::Payment;
use crate::models::rental::{Rental, RentalEvent, RentalStatus};

/// What applying an event changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Payment newly captured; rental status after propagation
    Captured {
        payment_id: Uuid,
        rental_status: Option<RentalStatus>,
    },

    /// Payment newly refunded
    Refunded { payment_id: Uuid },

    /// Event had already been applied
    AlreadyApplied,

    /// No payment with that intent id
    UnknownPayment,

    /// Recognized but requires no state change, or not recognized
    Ignored,
}

/// Applies a verified processor event
pub async fn apply_event(pool: &PgPool, event: &ProcessorEvent) -> Result<EventOutcome, sqlx::Error> {
    match event {
        ProcessorEvent::PaymentSucceeded { intent_id } => record_capture(pool, intent_id).await,
        ProcessorEvent::ChargeRefunded {
            intent_id: Some(intent_id),
        } => record_refund(pool, intent_id).await,
        ProcessorEvent::ChargeRefunded { intent_id: None } => {
            warn!("charge.refunded without payment_intent");
            Ok(EventOutcome::Ignored)
        }
        ProcessorEvent::PaymentFailed { intent_id } => {
            warn!(%intent_id, "Payment failed at processor");
            Ok(EventOutcome::Ignored)
        }
        ProcessorEvent::Other { kind } => {
            info!(kind = %kind, "Ignoring processor event");
            Ok(EventOutcome::Ignored)
        }
    }
}

/// Marks the payment captured and confirms its rental, atomically
pub async fn record_capture(pool: &PgPool, intent_id: &str) -> Result<EventOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let Some(payment) = Payment::mark_captured(&mut tx, intent_id).await? else {
        tx.rollback().await?;
        return classify_noop(pool, intent_id).await;
    };

    let rental = propagate_capture(&mut tx, payment.rental_id).await?;
    tx.commit().await?;

    info!(
        payment_id = %payment.id,
        rental_id = %payment.rental_id,
        %intent_id,
        "Payment captured"
    );

    Ok(EventOutcome::Captured {
        payment_id: payment.id,
        rental_status: rental.map(|r| r.status),
    })
}

/// Advances a rental to confirmed after its payment was captured
///
/// Only pending rentals move. A rental that is already confirmed or
/// returned is left alone and returned as-is.
pub async fn propagate_capture(
    conn: &mut PgConnection,
    rental_id: Uuid,
) -> Result<Option<Rental>, sqlx::Error> {
    let Some(rental) = Rental::lock_for_update(conn, rental_id).await? else {
        warn!(%rental_id, "Captured payment references a missing rental");
        return Ok(None);
    };

    match rental.status.transition(RentalEvent::PaymentCaptured) {
        Ok(next) if next != rental.status => {
            let confirmed = Rental::set_status(conn, rental_id, next).await?;
            info!(%rental_id, "Rental confirmed");
            Ok(Some(confirmed))
        }
        Ok(_) => Ok(Some(rental)),
        Err(e) => {
            info!(%rental_id, reason = %e, "Capture does not change rental status");
            Ok(Some(rental))
        }
    }
}

/// Marks the payment refunded
pub async fn record_refund(pool: &PgPool, intent_id: &str) -> Result<EventOutcome, sqlx::Error> {
    let mut conn = pool.acquire().await?;

    let refunded = Payment::mark_refunded(&mut conn, intent_id).await?;
    // Release before classify_noop acquires its own connection
    drop(conn);

    match refunded {
        Some(payment) => {
            info!(payment_id = %payment.id, %intent_id, "Payment refunded");
            Ok(EventOutcome::Refunded {
                payment_id: payment.id,
            })
        }
        None => classify_noop(pool, intent_id).await,
    }
}

async fn classify_noop(pool: &PgPool, intent_id: &str) -> Result<EventOutcome, sqlx::Error> {
    if Payment::find_by_intent(pool, intent_id).await?.is_some() {
        Ok(EventOutcome::AlreadyApplied)
    } else {
        warn!(%intent_id, "Event for unknown payment intent");
        Ok(EventOutcome::UnknownPayment)
    }
}
