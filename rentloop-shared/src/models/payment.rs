/// Payments backing rentals
///
/// One row per processor payment intent. `captured` and `refunded` only
/// ever flip from false to true; the `mark_*` updates are guarded so that a
/// replayed webhook or a racing settlement sweep changes nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = "id, rental_id, payer_username, owner_username, amount_cents, \
     currency, intent_id, captured, refunded, created_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub rental_id: Uuid,

    /// Renter who pays
    pub payer_username: String,

    /// Item owner who receives the funds
    pub owner_username: String,

    pub amount_cents: i64,

    /// ISO 4217, lowercase
    pub currency: String,

    /// Processor payment-intent id; the webhook correlation key
    pub intent_id: String,

    pub captured: bool,
    pub refunded: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub rental_id: Uuid,
    pub payer_username: String,
    pub owner_username: String,
    pub amount_cents: i64,
    pub currency: String,
    pub intent_id: String,
}

impl Payment {
    pub async fn create(pool: &PgPool, data: NewPayment) -> Result<Self, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO payments (rental_id, payer_username, owner_username, amount_cents,
                                  currency, intent_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );

        sqlx::query_as::<_, Payment>(&sql)
            .bind(data.rental_id)
            .bind(data.payer_username)
            .bind(data.owner_username)
            .bind(data.amount_cents)
            .bind(data.currency)
            .bind(data.intent_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS);
        sqlx::query_as::<_, Payment>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_intent(
        pool: &PgPool,
        intent_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {} FROM payments WHERE intent_id = $1", PAYMENT_COLUMNS);
        sqlx::query_as::<_, Payment>(&sql)
            .bind(intent_id)
            .fetch_optional(pool)
            .await
    }

    /// Flips `captured` to true
    ///
    /// Returns `None` when the payment is unknown or was already captured.
    pub async fn mark_captured(
        conn: &mut PgConnection,
        intent_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE payments SET captured = TRUE
            WHERE intent_id = $1 AND captured = FALSE
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );

        sqlx::query_as::<_, Payment>(&sql)
            .bind(intent_id)
            .fetch_optional(conn)
            .await
    }

    /// Flips `refunded` to true
    ///
    /// Returns `None` when the payment is unknown or was already refunded.
    pub async fn mark_refunded(
        conn: &mut PgConnection,
        intent_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE payments SET refunded = TRUE
            WHERE intent_id = $1 AND refunded = FALSE
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );

        sqlx::query_as::<_, Payment>(&sql)
            .bind(intent_id)
            .fetch_optional(conn)
            .await
    }

    /// Uncaptured, unrefunded payments whose rental has been returned
    ///
    /// Oldest first, at most `limit`.
    pub async fn list_capturable(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {} FROM payments p
            WHERE p.captured = FALSE AND p.refunded = FALSE
              AND EXISTS (
                  SELECT 1 FROM rentals r
                  WHERE r.id = p.rental_id AND r.status = 'returned'
              )
            ORDER BY p.created_at
            LIMIT $1
            "#,
            PAYMENT_COLUMNS
        );

        sqlx::query_as::<_, Payment>(&sql)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
