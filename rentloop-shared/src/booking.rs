/// Booking conflict detection and deposit calculation
///
/// This is the decision core of the rental ledger. It is pure: given the
/// catalog's view of an item, the requested window and the windows already
/// held by non-returned rentals of that item, it either produces a
/// [`BookingQuote`] or explains why the booking must be refused.
///
/// Windows are half-open, `[start, end)`. Two windows conflict iff
/// `a.start < b.end && a.end > b.start`, so a booking may begin exactly when
/// another one ends.
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use rentloop_shared::booking::{check_booking, BookingWindow};
/// use rentloop_shared::catalog::ItemSnapshot;
/// use uuid::Uuid;
///
/// let at = |h| Utc.with_ymd_and_hms(2025, 7, 1, h, 0, 0).unwrap();
/// let item = ItemSnapshot::bookable(Uuid::new_v4(), 10.0);
///
/// let held = [BookingWindow::new(at(10), at(12)).unwrap()];
/// let wanted = BookingWindow::new(at(12), at(14)).unwrap();
///
/// let quote = check_booking(&item, wanted, &held).unwrap();
/// assert_eq!(quote.deposit_cents, 2400);
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::ItemSnapshot;
use crate::payments::fees::to_minor_units;

/// Why a booking was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    /// `end` is not strictly after `start`
    #[error("end_at must be after start_at")]
    InvalidWindow,

    /// Catalog reports the item as not available
    #[error("item unavailable")]
    ItemUnavailable,

    /// An active rental already holds part of the window
    #[error("item already booked from {start} to {end}")]
    Overlap {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// A validated half-open time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl BookingWindow {
    /// Builds a window, rejecting empty or inverted ranges
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, BookingError> {
        if end <= start {
            return Err(BookingError::InvalidWindow);
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Length of the window in whole seconds
    pub fn duration_seconds(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }

    /// True when the two windows share any instant
    pub fn overlaps(&self, other: &BookingWindow) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// Outcome of an accepted booking check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingQuote {
    pub window: BookingWindow,
    pub deposit_cents: i64,
}

/// Deposit for a rental: `hours * price * 1.2`, rounded half-up to the cent
///
/// Worked in integer arithmetic:
/// `seconds / 3600 * price_cents * 12 / 10 = seconds * price_cents * 12 / 36000`.
/// Non-positive inputs yield zero.
pub fn calc_deposit_cents(duration_seconds: i64, price_per_hour_cents: i64) -> i64 {
    if duration_seconds <= 0 || price_per_hour_cents <= 0 {
        return 0;
    }

    let numerator = duration_seconds as i128 * price_per_hour_cents as i128 * 12;
    let cents = (numerator + 18_000) / 36_000;
    i64::try_from(cents).unwrap_or(i64::MAX)
}

/// Decides whether `window` may be booked
///
/// Checks run in order: availability, then overlap against `active`.
/// `active` must only contain windows of non-returned rentals of the same
/// item. The item snapshot must come from a successful catalog read; a
/// display placeholder is never bookable.
pub fn check_booking(
    item: &ItemSnapshot,
    window: BookingWindow,
    active: &[BookingWindow],
) -> Result<BookingQuote, BookingError> {
    if !item.is_bookable() {
        return Err(BookingError::ItemUnavailable);
    }

    let price_cents = match to_minor_units(item.price_per_h) {
        Some(cents) if cents > 0 => cents,
        _ => return Err(BookingError::ItemUnavailable),
    };

    if let Some(held) = active.iter().find(|held| held.overlaps(&window)) {
        return Err(BookingError::Overlap {
            start: held.start,
            end: held.end,
        });
    }

    Ok(BookingQuote {
        window,
        deposit_cents: calc_deposit_cents(window.duration_seconds(), price_cents),
    })
}
