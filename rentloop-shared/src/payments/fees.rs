/// Money arithmetic in integer minor units
///
/// Amounts cross the API boundary as decimal major units (`12.50` euros) and
/// are stored and sent to the processor as minor units (`1250` cents). All
/// rounding is half-up, which for the non-negative amounts handled here is
/// the same as rounding half away from zero.
///
/// # Example
///
/// ```
/// use rentloop_shared::payments::fees::{calc_app_fee, to_major_units, to_minor_units};
///
/// let amount = to_minor_units(12.5).unwrap();
/// assert_eq!(amount, 1250);
/// assert_eq!(calc_app_fee(amount, 8), 100);
/// assert_eq!(to_major_units(amount), 12.5);
/// ```

/// Platform fee for `amount_minor` at `percent`, rounded half-up
///
/// Negative amounts are treated as zero.
pub fn calc_app_fee(amount_minor: i64, percent: u32) -> i64 {
    if amount_minor <= 0 {
        return 0;
    }

    let scaled = amount_minor as i128 * percent as i128;
    ((scaled + 50) / 100) as i64
}

/// Converts a major-unit amount to minor units
///
/// Returns `None` for negative, non-finite or absurdly large inputs.
pub fn to_minor_units(major: f64) -> Option<i64> {
    if !major.is_finite() || major < 0.0 {
        return None;
    }

    let minor = (major * 100.0).round();
    if minor > i64::MAX as f64 {
        return None;
    }

    Some(minor as i64)
}

/// Converts minor units back to a major-unit number for JSON output
pub fn to_major_units(minor: i64) -> f64 {
    minor as f64 / 100.0
}
