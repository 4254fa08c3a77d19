//! Cook County assessment levels, as market-value multipliers.
//!
//! | major class                    | level | multiplier |
//! |--------------------------------|-------|------------|
//! | 1, 2, 3 residential; 9 incentive multi-family | 10% | 10 |
//! | 4 not-for-profit               | 20%   | 5          |
//! | 5 commercial/industrial; 6-8 incentive | 25% | 4   |
//! | 0, `EX`, `RR` exempt           | 0%    | 0          |
//!
//! Missing or unrecognised classes are treated as residential.

use crate::unit::ParcelUnit;

pub const DEFAULT_MULTIPLIER: f64 = 10.0;

/// Multiplier turning an assessed value into a market value.
pub fn market_value_multiplier(class: Option<&str>) -> f64 {
    let Some(class) = class.map(str::trim).filter(|c| !c.is_empty()) else {
        return DEFAULT_MULTIPLIER;
    };

    if matches!(class, "EX" | "RR") {
        return 0.0;
    }

    match class.as_bytes()[0] {
        b'1' | b'2' | b'3' | b'9' => 10.0,
        b'4' => 5.0,
        b'5' | b'6' | b'7' | b'8' => 4.0,
        b'0' => 0.0,
        _ => DEFAULT_MULTIPLIER,
    }
}

/// Set `market_value` from `assessed_value` and the unit's classification.
pub fn price(unit: &mut ParcelUnit) {
    unit.market_value =
        unit.assessed_value * market_value_multiplier(unit.classification.as_deref());
}
