/// Database-backed tests for booking and returning rentals
///
/// Skipped unless DATABASE_URL points at a PostgreSQL instance.

mod common;

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{test_pool, unique_name, DownCatalog, FixedCatalog};
use rentloop_shared::booking::BookingError;
use rentloop_shared::catalog::ItemSnapshot;
use rentloop_shared::ledger::{book_rental, mark_returned, LedgerError};
use rentloop_shared::models::rental::{Rental, RentalStatus};
use std::sync::Arc;
use uuid::Uuid;

fn at(hour: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 3, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
}

fn catalog(price: f64) -> FixedCatalog {
    FixedCatalog(ItemSnapshot::bookable(Uuid::nil(), price))
}

#[tokio::test]
async fn test_booking_computes_deposit_and_starts_pending() {
    let Some(pool) = test_pool().await else { return };
    let renter = unique_name("renter");

    let rental = book_rental(&pool, &catalog(10.0), &renter, Uuid::new_v4(), at(0), at(5))
        .await
        .expect("booking should succeed");

    assert_eq!(rental.deposit_cents, 6000);
    assert_eq!(rental.status, RentalStatus::Pending);
    assert!(!rental.returned);
    assert_eq!(rental.renter_username, renter);
}

#[tokio::test]
async fn test_overlap_rejected_and_touching_accepted() {
    let Some(pool) = test_pool().await else { return };
    let item_id = Uuid::new_v4();
    let catalog = catalog(10.0);

    book_rental(&pool, &catalog, "x_renter", item_id, at(10), at(12))
        .await
        .unwrap();

    let err = book_rental(&pool, &catalog, "y_renter", item_id, at(11), at(13))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Booking(BookingError::Overlap { .. })
    ));

    book_rental(&pool, &catalog, "y_renter", item_id, at(12), at(14))
        .await
        .expect("touching window should be accepted");

    let ranges = Rental::occupied_ranges(&pool, item_id).await.unwrap();
    assert_eq!(ranges.len(), 2);
    assert_eq!(ranges[0].start_at, at(10));
    assert_eq!(ranges[1].start_at, at(12));
}

#[tokio::test]
async fn test_unavailable_or_unreachable_catalog_refuses() {
    let Some(pool) = test_pool().await else { return };
    let item_id = Uuid::new_v4();

    let mut snapshot = ItemSnapshot::bookable(item_id, 10.0);
    snapshot.available = Some(false);
    let err = book_rental(&pool, &FixedCatalog(snapshot), "r", item_id, at(0), at(1))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Booking(BookingError::ItemUnavailable)));

    let err = book_rental(&pool, &DownCatalog, "r", item_id, at(0), at(1))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Catalog(_)));

    assert!(Rental::occupied_ranges(&pool, item_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_window_never_reaches_catalog() {
    let Some(pool) = test_pool().await else { return };

    let err = book_rental(&pool, &DownCatalog, "r", Uuid::new_v4(), at(3), at(3))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Booking(BookingError::InvalidWindow)));
}

#[tokio::test]
async fn test_concurrent_bookings_admit_exactly_one() {
    let Some(pool) = test_pool().await else { return };
    let item_id = Uuid::new_v4();
    let catalog = Arc::new(catalog(2.0));

    let mut handles = Vec::new();
    for n in 0..8 {
        let pool = pool.clone();
        let catalog = catalog.clone();
        handles.push(tokio::spawn(async move {
            let renter = format!("racer{}", n);
            book_rental(&pool, catalog.as_ref(), &renter, item_id, at(20), at(22)).await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(LedgerError::Conflict) | Err(LedgerError::Booking(BookingError::Overlap { .. })) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(accepted, 1);
}

#[tokio::test]
async fn test_mark_returned_is_idempotent_and_renter_only() {
    let Some(pool) = test_pool().await else { return };
    let item_id = Uuid::new_v4();
    let renter = unique_name("renter");

    let rental = book_rental(&pool, &catalog(4.0), &renter, item_id, at(30), at(34))
        .await
        .unwrap();

    let err = mark_returned(&pool, rental.id, "someone_else").await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound));
    let untouched = Rental::find_by_id(&pool, rental.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, RentalStatus::Pending);
    assert!(!untouched.returned);

    let first = mark_returned(&pool, rental.id, &renter).await.unwrap();
    let second = mark_returned(&pool, rental.id, &renter).await.unwrap();
    assert_eq!(first.status, RentalStatus::Returned);
    assert!(first.returned);
    assert_eq!(second.status, first.status);
    assert_eq!(second.returned, first.returned);

    // Returned rentals free their window.
    book_rental(&pool, &catalog(4.0), "next_renter", item_id, at(31), at(33))
        .await
        .expect("window should be free after return");
}

#[tokio::test]
async fn test_mark_returned_unknown_rental() {
    let Some(pool) = test_pool().await else { return };
    let err = mark_returned(&pool, Uuid::new_v4(), "anyone").await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound));
}
