/// Rentals (bookings) and their status lifecycle
///
/// A rental reserves an item for a half-open window `[start_at, end_at)`.
/// While it is not returned, no other rental of the same item may overlap
/// it. This is checked in code by [`crate::booking::check_booking`] inside a
/// serializable transaction and enforced again by the `rentals_no_overlap`
/// exclusion constraint.
///
/// # Status lifecycle
///
/// ```text
/// pending ──(payment captured)──> confirmed ──(renter returns)──> returned
///    └──────────────(renter returns)─────────────────────────────────┘
/// ```
///
/// Status never moves backward. `returned` is terminal and the legacy
/// `returned` boolean always mirrors `status = 'returned'`.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE rental_status AS ENUM ('pending', 'confirmed', 'returned');
///
/// CREATE TABLE rentals (
///     id UUID PRIMARY KEY,
///     item_id UUID NOT NULL,
///     renter_username VARCHAR(50) NOT NULL,
///     start_at TIMESTAMPTZ NOT NULL,
///     end_at TIMESTAMPTZ NOT NULL CHECK (end_at > start_at),
///     deposit_cents BIGINT NOT NULL,
///     status rental_status NOT NULL DEFAULT 'pending',
///     returned BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::booking::BookingWindow;

const RENTAL_COLUMNS: &str =
    "id, item_id, renter_username, start_at, end_at, deposit_cents, status, returned, created_at";

/// Rental status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "rental_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RentalStatus {
    /// Booked, payment not yet captured
    Pending,

    /// Payment captured
    Confirmed,

    /// Item handed back; terminal
    Returned,
}

/// Something that happened to a rental
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RentalEvent {
    /// The processor captured the rental's payment
    PaymentCaptured,

    /// The renter handed the item back
    Returned,
}

/// Rejected status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rental cannot go from {from} on {event:?}")]
pub struct StatusTransitionError {
    pub from: RentalStatus,
    pub event: RentalEvent,
}

impl RentalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RentalStatus::Pending => "pending",
            RentalStatus::Confirmed => "confirmed",
            RentalStatus::Returned => "returned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RentalStatus::Returned)
    }

    /// Whether `self -> target` is a forward move
    pub fn can_transition_to(&self, target: RentalStatus) -> bool {
        matches!(
            (self, target),
            (RentalStatus::Pending, RentalStatus::Confirmed)
                | (RentalStatus::Pending, RentalStatus::Returned)
                | (RentalStatus::Confirmed, RentalStatus::Returned)
        )
    }

    /// Status after `event`
    ///
    /// Replaying an event that already took effect yields the current
    /// status. A capture arriving after return is rejected rather than
    /// moving the rental backward.
    pub fn transition(self, event: RentalEvent) -> Result<RentalStatus, StatusTransitionError> {
        let target = match event {
            RentalEvent::PaymentCaptured => RentalStatus::Confirmed,
            RentalEvent::Returned => RentalStatus::Returned,
        };

        if self == target || self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(StatusTransitionError { from: self, event })
        }
    }
}

impl std::fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of `rentals`
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Rental {
    pub id: Uuid,
    pub item_id: Uuid,
    pub renter_username: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,

    /// `hours * price * 1.2`, in minor units
    pub deposit_cents: i64,

    pub status: RentalStatus,

    /// Mirrors `status == Returned`
    pub returned: bool,

    pub created_at: DateTime<Utc>,
}

/// Input for [`Rental::insert`]
#[derive(Debug, Clone)]
pub struct NewRental {
    pub item_id: Uuid,
    pub renter_username: String,
    pub window: BookingWindow,
    pub deposit_cents: i64,
}

/// A reserved interval, as shown on availability calendars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OccupiedRange {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

impl Rental {
    /// Takes the per-item lock used to serialize bookings
    ///
    /// Released automatically when the surrounding transaction ends.
    pub async fn lock_item(conn: &mut PgConnection, item_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(item_id.to_string())
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Windows held by non-returned rentals of `item_id`
    pub async fn active_windows(
        conn: &mut PgConnection,
        item_id: Uuid,
    ) -> Result<Vec<BookingWindow>, sqlx::Error> {
        let ranges = sqlx::query_as::<_, OccupiedRange>(
            r#"
            SELECT start_at, end_at FROM rentals
            WHERE item_id = $1 AND status <> 'returned'
            ORDER BY start_at
            "#,
        )
        .bind(item_id)
        .fetch_all(conn)
        .await?;

        Ok(ranges
            .into_iter()
            .filter_map(|r| BookingWindow::new(r.start_at, r.end_at).ok())
            .collect())
    }

    /// Inserts a pending rental
    pub async fn insert(conn: &mut PgConnection, data: NewRental) -> Result<Self, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO rentals (item_id, renter_username, start_at, end_at, deposit_cents)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            RENTAL_COLUMNS
        );

        sqlx::query_as::<_, Rental>(&sql)
            .bind(data.item_id)
            .bind(data.renter_username)
            .bind(data.window.start())
            .bind(data.window.end())
            .bind(data.deposit_cents)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {} FROM rentals WHERE id = $1", RENTAL_COLUMNS);
        sqlx::query_as::<_, Rental>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Rentals booked by `renter`, newest first
    pub async fn list_by_renter(pool: &PgPool, renter: &str) -> Result<Vec<Self>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM rentals WHERE renter_username = $1 ORDER BY created_at DESC",
            RENTAL_COLUMNS
        );
        sqlx::query_as::<_, Rental>(&sql)
            .bind(renter)
            .fetch_all(pool)
            .await
    }

    /// Intervals held by non-returned rentals of an item, by start time
    pub async fn occupied_ranges(
        pool: &PgPool,
        item_id: Uuid,
    ) -> Result<Vec<OccupiedRange>, sqlx::Error> {
        sqlx::query_as::<_, OccupiedRange>(
            r#"
            SELECT start_at, end_at FROM rentals
            WHERE item_id = $1 AND status <> 'returned'
            ORDER BY start_at
            "#,
        )
        .bind(item_id)
        .fetch_all(pool)
        .await
    }

    /// Locks a rental row for a status change
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {} FROM rentals WHERE id = $1 FOR UPDATE", RENTAL_COLUMNS);
        sqlx::query_as::<_, Rental>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Writes a new status, keeping `returned` in sync
    pub async fn set_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: RentalStatus,
    ) -> Result<Self, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE rentals SET status = $2, returned = ($2 = 'returned'::rental_status)
            WHERE id = $1
            RETURNING {}
            "#,
            RENTAL_COLUMNS
        );

        sqlx::query_as::<_, Rental>(&sql)
            .bind(id)
            .bind(status)
            .fetch_one(conn)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert_eq!(
            RentalStatus::Pending.transition(RentalEvent::PaymentCaptured),
            Ok(RentalStatus::Confirmed)
        );
        assert_eq!(
            RentalStatus::Pending.transition(RentalEvent::Returned),
            Ok(RentalStatus::Returned)
        );
        assert_eq!(
            RentalStatus::Confirmed.transition(RentalEvent::Returned),
            Ok(RentalStatus::Returned)
        );
    }

    #[test]
    fn test_replayed_events_are_noops() {
        assert_eq!(
            RentalStatus::Returned.transition(RentalEvent::Returned),
            Ok(RentalStatus::Returned)
        );
        assert_eq!(
            RentalStatus::Confirmed.transition(RentalEvent::PaymentCaptured),
            Ok(RentalStatus::Confirmed)
        );
    }

    #[test]
    fn test_no_backward_moves() {
        let err = RentalStatus::Returned
            .transition(RentalEvent::PaymentCaptured)
            .unwrap_err();
        assert_eq!(err.from, RentalStatus::Returned);

        assert!(!RentalStatus::Confirmed.can_transition_to(RentalStatus::Pending));
        assert!(!RentalStatus::Returned.can_transition_to(RentalStatus::Confirmed));
        assert!(!RentalStatus::Returned.can_transition_to(RentalStatus::Pending));
    }

    #[test]
    fn test_terminal() {
        assert!(RentalStatus::Returned.is_terminal());
        assert!(!RentalStatus::Pending.is_terminal());
        assert_eq!(RentalStatus::Confirmed.to_string(), "confirmed");
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(RentalStatus::Pending).unwrap(),
            serde_json::json!("pending")
        );
    }
}
