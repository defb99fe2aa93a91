//! Remaining life expectancy by age for the RMD strategy.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// (age, remaining years) anchor points, interpolated linearly in between.
const LIFE_TABLE: [(u32, Decimal); 11] = [
    (50, dec!(31.6)),
    (55, dec!(27.2)),
    (60, dec!(23.0)),
    (65, dec!(19.1)),
    (70, dec!(15.4)),
    (75, dec!(11.9)),
    (80, dec!(8.8)),
    (85, dec!(6.2)),
    (90, dec!(4.2)),
    (95, dec!(2.9)),
    (100, dec!(2.1)),
];

/// Extra remaining years per year of age below the first anchor.
const YOUNGER_SLOPE: Decimal = dec!(0.95);

/// Remaining life expectancy at `age`, never below one year.
pub fn life_expectancy(age: u32) -> Decimal {
    let (first_age, first_years) = LIFE_TABLE[0];
    if age <= first_age {
        return first_years + YOUNGER_SLOPE * Decimal::from(first_age - age);
    }
    for pair in LIFE_TABLE.windows(2) {
        let (a0, y0) = pair[0];
        let (a1, y1) = pair[1];
        if age <= a1 {
            let t = Decimal::from(age - a0) / Decimal::from(a1 - a0);
            return (y0 + (y1 - y0) * t).max(Decimal::ONE);
        }
    }
    let (_, last_years) = LIFE_TABLE[LIFE_TABLE.len() - 1];
    last_years.max(Decimal::ONE)
}

/// Divisor for an RMD year; an override replaces the table but is still
/// floored at one year.
pub fn rmd_divisor(age: u32, override_years: Option<Decimal>) -> Decimal {
    override_years
        .unwrap_or_else(|| life_expectancy(age))
        .max(Decimal::ONE)
}
