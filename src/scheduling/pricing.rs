use rust_decimal::{Decimal, RoundingStrategy};

/// Scale a type's base price to the booked length:
/// `base_price × actual_minutes / type_minutes`, rounded to cents.
///
/// Returns `None` when the type has no usable duration.
pub fn prorated_price(base_price: Decimal, type_minutes: i32, actual_minutes: i64) -> Option<Decimal> {
    if type_minutes <= 0 {
        return None;
    }
    let scaled = base_price * Decimal::from(actual_minutes) / Decimal::from(type_minutes);
    Some(scaled.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}
