/// Rental ledger operations
///
/// Booking runs in three steps:
///
/// 1. validate the window (no I/O)
/// 2. read the item from the catalog collaborator; any failure refuses the
///    booking
/// 3. in one `SERIALIZABLE` transaction holding the item's advisory lock,
///    load the active windows, run [`check_booking`] and insert
///
/// Database-level conflicts (serialization failure, exclusion constraint)
/// surface as [`LedgerError::Conflict`].

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::booking::{check_booking, BookingError, BookingWindow};
use crate::catalog::{CatalogClient, CatalogError};
use crate::models::rental::{NewRental, Rental, RentalEvent, StatusTransitionError};

const SERIALIZATION_FAILURE: &str = "40001";
const EXCLUSION_VIOLATION: &str = "23P01";

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Rental missing or not owned by the caller
    #[error("rental not found")]
    NotFound,

    #[error(transparent)]
    Transition(#[from] StatusTransitionError),

    /// A concurrent booking won the race
    #[error("booking conflicts with a concurrent reservation")]
    Conflict,

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(code) = db_err.code() {
                if code == SERIALIZATION_FAILURE || code == EXCLUSION_VIOLATION {
                    return LedgerError::Conflict;
                }
            }
        }
        LedgerError::Database(err)
    }
}

/// Books `item_id` for `renter` over `[start, end)`
pub async fn book_rental(
    pool: &PgPool,
    catalog: &dyn CatalogClient,
    renter: &str,
    item_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Rental, LedgerError> {
    let window = BookingWindow::new(start, end)?;
    let item = catalog.fetch_item(item_id).await?;

    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        .execute(&mut *tx)
        .await?;
    Rental::lock_item(&mut tx, item_id).await?;

    let active = Rental::active_windows(&mut tx, item_id).await?;
    let quote = check_booking(&item, window, &active)?;

    let rental = Rental::insert(
        &mut tx,
        NewRental {
            item_id,
            renter_username: renter.to_string(),
            window: quote.window,
            deposit_cents: quote.deposit_cents,
        },
    )
    .await?;

    tx.commit().await?;

    info!(
        rental_id = %rental.id,
        %item_id,
        renter,
        deposit_cents = rental.deposit_cents,
        "Rental booked"
    );

    Ok(rental)
}

/// Marks a rental as returned on behalf of its renter
///
/// Idempotent: a rental that is already returned comes back unchanged.
/// Rentals belonging to someone else are reported as not found.
pub async fn mark_returned(
    pool: &PgPool,
    rental_id: Uuid,
    renter: &str,
) -> Result<Rental, LedgerError> {
    let mut tx = pool.begin().await?;

    let rental = Rental::lock_for_update(&mut tx, rental_id)
        .await?
        .filter(|r| r.renter_username == renter)
        .ok_or(LedgerError::NotFound)?;

    let next = rental.status.transition(RentalEvent::Returned)?;
    if next == rental.status {
        tx.commit().await?;
        return Ok(rental);
    }

    let updated = Rental::set_status(&mut tx, rental_id, next).await?;
    tx.commit().await?;

    info!(%rental_id, renter, "Rental returned");
    Ok(updated)
}
