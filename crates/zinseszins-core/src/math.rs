//! Small Decimal helpers shared by the simulators and analytics.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::types::Rate;

/// Compute (1 + r)^n via iterative multiplication (avoids Decimal::powd drift).
pub fn compound(rate: Rate, n: u32) -> Decimal {
    let mut result = Decimal::ONE;
    let factor = Decimal::ONE + rate;
    for _ in 0..n {
        result *= factor;
    }
    result
}

/// Growth factor for holding a position `months` months at an annual rate.
/// Whole years use exact multiplication; partial years fall back to `powd`.
/// A loss of 100% or more wipes the position out; the factor never goes
/// below zero.
pub fn growth_factor(annual_rate: Rate, months: u32) -> Decimal {
    if months == 0 {
        return Decimal::ONE;
    }
    let base = Decimal::ONE + annual_rate;
    if base <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    if months == 12 {
        return base;
    }
    let exponent = Decimal::from(months) / dec!(12);
    base.powd(exponent)
}

pub fn sqrt_decimal(val: Decimal) -> Decimal {
    if val <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    val.sqrt().unwrap_or(Decimal::ZERO)
}

pub fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().sum::<Decimal>() / Decimal::from(values.len() as i64)
}

/// Sample standard deviation (n - 1 denominator); zero below two points.
pub fn sample_std_dev(values: &[Decimal]) -> Decimal {
    if values.len() < 2 {
        return Decimal::ZERO;
    }
    let m = mean(values);
    let sum_sq: Decimal = values.iter().map(|v| (v - m) * (v - m)).sum();
    sqrt_decimal(sum_sq / Decimal::from((values.len() - 1) as i64))
}

/// Percentile of a **sorted** slice using linear interpolation, `p` in 0..=100.
pub fn percentile_sorted(sorted: &[Decimal], p: Decimal) -> Decimal {
    if sorted.is_empty() {
        return Decimal::ZERO;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / Decimal::ONE_HUNDRED * Decimal::from((sorted.len() - 1) as i64);
    let lower = rank.floor();
    let upper = rank.ceil();
    let lower_idx = lower.to_usize().unwrap_or(0).min(sorted.len() - 1);
    let upper_idx = upper.to_usize().unwrap_or(0).min(sorted.len() - 1);
    if lower_idx == upper_idx {
        sorted[lower_idx]
    } else {
        let frac = rank - lower;
        sorted[lower_idx] * (Decimal::ONE - frac) + sorted[upper_idx] * frac
    }
}
