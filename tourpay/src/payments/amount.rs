//! Conversion between major currency units (rubles) and the minor units (kopecks) the gateway
//! transacts in.
//!
//! Amounts are carried as [`Decimal`] so that `999.99` is exact. Conversion rounds half away
//! from zero.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

const MINOR_UNITS_PER_MAJOR: u32 = 100;

/// Convert a major-unit amount to minor units.
///
/// Returns `None` when the result does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    amount
        .checked_mul(Decimal::from(MINOR_UNITS_PER_MAJOR))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Convert a minor-unit amount back to major units.
pub fn to_major_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_representative_amounts_round_trip() {
        for (major, minor) in [("1500.00", 150000), ("999.99", 99999), ("0.01", 1), ("1500", 150000)] {
            let converted = to_minor_units(dec(major)).unwrap();
            assert_eq!(converted, minor, "converting {major}");
            assert_eq!(to_major_units(converted), dec(major), "recovering {major}");
        }
    }

    #[test]
    fn test_half_rounds_away_from_zero() {
        assert_eq!(to_minor_units(dec("10.005")), Some(1001));
        assert_eq!(to_minor_units(dec("10.015")), Some(1002));
        assert_eq!(to_minor_units(dec("10.004")), Some(1000));
        assert_eq!(to_minor_units(dec("-10.005")), Some(-1001));
    }

    #[test]
    fn test_overflow_is_reported() {
        assert_eq!(to_minor_units(Decimal::MAX), None);
    }
}
