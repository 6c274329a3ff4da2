//! Conversion between storefront prices and minor currency units.
//!
//! Every amount that is stored or sent to Stripe goes through `to_minor_units`
//! exactly once, so the stored order total and the charged amount are derived
//! from the same rounded integers.

use crate::models::LineItem;

const MINOR_UNITS_PER_MAJOR: f64 = 100.0;

/// Convert a decimal price (e.g. `15.99`) into minor units (`1599`).
///
/// Rounds half away from zero. Returns `None` for NaN, infinities, and values
/// that do not fit in an `i64`.
pub fn to_minor_units(amount: f64) -> Option<i64> {
    let scaled = (amount * MINOR_UNITS_PER_MAJOR).round();
    if !scaled.is_finite() || scaled.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(scaled as i64)
}

/// Sum of `unit_amount * quantity`; `None` on overflow.
pub fn order_total(items: &[LineItem]) -> Option<i64> {
    items
        .iter()
        .try_fold(0i64, |total, item| total.checked_add(item.subtotal()?))
}
