use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::rmd::rmd_divisor;
use crate::error::ValidationIssue;
use crate::tax::{effective_flat_rate, TaxConfig};
use crate::types::{Money, Rate};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Guardrails for the fixed monthly strategy: when the prior-year return
/// deviates from `expected_return` by more than `threshold`, the withdrawal
/// is scaled by `1 ± adjustment`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guardrails {
    pub threshold: Rate,
    pub adjustment: Rate,
    /// Baseline return; the segment's expected return when absent.
    #[serde(default)]
    pub expected_return: Option<Rate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMode {
    /// Keep the effective tax rate at or below the target.
    MinimizeTaxes,
    /// Withdraw at least enough to use the Freibetrag.
    MaximizeAfterTax,
    #[default]
    Balanced,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceFrequency {
    /// Optimize every year.
    #[default]
    Yearly,
    /// Optimize only in years where the plain base withdrawal would exceed the
    /// target tax rate.
    AsNeeded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WithdrawalStrategyConfig {
    /// Fixed share of current capital every year.
    FixedPercent { rate: Rate },
    /// Fixed monthly amount, inflation-adjusted, optionally with guardrails.
    FixedMonthly {
        monthly_amount: Money,
        #[serde(default)]
        guardrails: Option<Guardrails>,
    },
    /// Share of current capital that moves with the prior-year return.
    Dynamic {
        base_rate: Rate,
        upper_threshold: Rate,
        upper_adjustment: Rate,
        lower_threshold: Rate,
        lower_adjustment: Rate,
    },
    /// Capital divided by remaining life expectancy.
    Rmd {
        start_age: u32,
        #[serde(default)]
        life_expectancy_override: Option<Decimal>,
    },
    /// Base share of capital, shaped around the Freibetrag and a target
    /// effective tax rate.
    TaxOptimized {
        base_rate: Rate,
        target_tax_rate: Rate,
        #[serde(default)]
        optimization_mode: OptimizationMode,
        /// Share of the remaining Freibetrag to fill, 0..=1.
        freibetrag_utilization_target: Rate,
        #[serde(default)]
        rebalance_frequency: RebalanceFrequency,
    },
    /// 3% / 4% rule: share of the starting capital, then inflation-adjusted.
    StandardRule { percent: Rate },
}

/// Inputs for one year's withdrawal amount.
#[derive(Debug, Clone)]
pub struct StrategyContext<'a> {
    pub capital: Money,
    /// Years since the segment started (0 in its first year).
    pub years_elapsed: u32,
    /// Return of the previous year; `None` in the first withdrawal year.
    pub previous_return: Option<Rate>,
    /// Expected return of the segment's return model.
    pub expected_return: Rate,
    /// Cumulative inflation since the segment started.
    pub inflation_index: Decimal,
    /// Unrealized gain share of the capital.
    pub gain_ratio: Rate,
    pub freibetrag_remaining: Money,
    pub tax: &'a TaxConfig,
}

/// State carried across the years of one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyState {
    /// Capital at the segment start.
    pub initial_capital: Money,
    /// Cumulative guardrail multiplier.
    pub guardrail_factor: Decimal,
}

impl StrategyState {
    pub fn new(initial_capital: Money) -> Self {
        Self {
            initial_capital,
            guardrail_factor: Decimal::ONE,
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

impl WithdrawalStrategyConfig {
    pub fn label(&self) -> String {
        match self {
            WithdrawalStrategyConfig::FixedPercent { rate } => {
                format!("{}-Regel", crate::types::format_percent(*rate))
            }
            WithdrawalStrategyConfig::FixedMonthly { guardrails, .. } => match guardrails {
                Some(_) => "Monatlich fest (mit Guardrails)".into(),
                None => "Monatlich fest".into(),
            },
            WithdrawalStrategyConfig::Dynamic { .. } => "Dynamisch".into(),
            WithdrawalStrategyConfig::Rmd { .. } => "RMD (Lebenserwartung)".into(),
            WithdrawalStrategyConfig::TaxOptimized { .. } => "Steueroptimiert".into(),
            WithdrawalStrategyConfig::StandardRule { percent } => {
                format!("{}-Regel (inflationsangepasst)", crate::types::format_percent(*percent))
            }
        }
    }

    /// Gross withdrawal the strategy asks for this year, before costs and the
    /// clamp to available capital.
    pub fn amount(&self, ctx: &StrategyContext, state: &mut StrategyState) -> Money {
        let amount = match self {
            WithdrawalStrategyConfig::FixedPercent { rate } => ctx.capital * rate,
            WithdrawalStrategyConfig::StandardRule { percent } => {
                state.initial_capital * percent * ctx.inflation_index
            }
            WithdrawalStrategyConfig::FixedMonthly {
                monthly_amount,
                guardrails,
            } => {
                if let (Some(g), Some(prev)) = (guardrails, ctx.previous_return) {
                    let expected = g.expected_return.unwrap_or(ctx.expected_return);
                    state.guardrail_factor *=
                        guardrail_multiplier(prev, expected, g.threshold, g.adjustment);
                }
                *monthly_amount * Decimal::from(12) * ctx.inflation_index * state.guardrail_factor
            }
            WithdrawalStrategyConfig::Dynamic {
                base_rate,
                upper_threshold,
                upper_adjustment,
                lower_threshold,
                lower_adjustment,
            } => {
                let rate = dynamic_rate(
                    *base_rate,
                    ctx.previous_return,
                    *upper_threshold,
                    *upper_adjustment,
                    *lower_threshold,
                    *lower_adjustment,
                );
                ctx.capital * rate
            }
            WithdrawalStrategyConfig::Rmd {
                start_age,
                life_expectancy_override,
            } => {
                let age = start_age + ctx.years_elapsed;
                ctx.capital / rmd_divisor(age, *life_expectancy_override)
            }
            WithdrawalStrategyConfig::TaxOptimized {
                base_rate,
                target_tax_rate,
                optimization_mode,
                freibetrag_utilization_target,
                rebalance_frequency,
            } => tax_optimized_amount(
                ctx,
                *base_rate,
                *target_tax_rate,
                *optimization_mode,
                *freibetrag_utilization_target,
                *rebalance_frequency,
            ),
        };
        amount.max(Decimal::ZERO)
    }

    pub fn validate(&self, field: &str) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let fraction = |value: Rate, name: &str| -> Option<ValidationIssue> {
            (value < Decimal::ZERO || value > Decimal::ONE).then(|| {
                ValidationIssue::new(format!("{field}.{name}"), "Wert muss zwischen 0 und 1 liegen.")
            })
        };
        match self {
            WithdrawalStrategyConfig::FixedPercent { rate } => issues.extend(fraction(*rate, "rate")),
            WithdrawalStrategyConfig::StandardRule { percent } => issues.extend(fraction(*percent, "percent")),
            WithdrawalStrategyConfig::FixedMonthly {
                monthly_amount,
                guardrails,
            } => {
                if let Some(g) = guardrails {
                    issues.extend(fraction(g.threshold, "guardrails.threshold"));
                    issues.extend(fraction(g.adjustment, "guardrails.adjustment"));
                }
                if *monthly_amount < Decimal::ZERO {
                    issues.push(ValidationIssue::new(
                        format!("{field}.monthly_amount"),
                        "Monatlicher Betrag darf nicht negativ sein.",
                    ));
                }
            }
            WithdrawalStrategyConfig::Dynamic {
                base_rate,
                upper_threshold,
                lower_threshold,
                ..
            } => {
                issues.extend(fraction(*base_rate, "base_rate"));
                if lower_threshold > upper_threshold {
                    issues.push(ValidationIssue::new(
                        format!("{field}.lower_threshold"),
                        "Untere Schwelle liegt über der oberen Schwelle.",
                    ));
                }
            }
            WithdrawalStrategyConfig::Rmd {
                start_age,
                life_expectancy_override,
            } => {
                if *start_age > 120 {
                    issues.push(ValidationIssue::new(
                        format!("{field}.start_age"),
                        "Alter muss zwischen 0 und 120 liegen.",
                    ));
                }
                if life_expectancy_override.is_some_and(|y| y <= Decimal::ZERO) {
                    issues.push(ValidationIssue::new(
                        format!("{field}.life_expectancy_override"),
                        "Lebenserwartung muss positiv sein.",
                    ));
                }
            }
            WithdrawalStrategyConfig::TaxOptimized {
                base_rate,
                target_tax_rate,
                freibetrag_utilization_target,
                ..
            } => {
                issues.extend(fraction(*base_rate, "base_rate"));
                issues.extend(fraction(*target_tax_rate, "target_tax_rate"));
                issues.extend(fraction(*freibetrag_utilization_target, "freibetrag_utilization_target"));
            }
        }
        issues
    }
}

/// Guardrail step for one year: `1 + adjustment` above the band,
/// `1 - adjustment` below it, `1` inside. Depends only on its inputs.
pub fn guardrail_multiplier(
    previous_return: Rate,
    expected_return: Rate,
    threshold: Rate,
    adjustment: Rate,
) -> Decimal {
    let deviation = previous_return - expected_return;
    if deviation > threshold {
        Decimal::ONE + adjustment
    } else if deviation < -threshold {
        Decimal::ONE - adjustment
    } else {
        Decimal::ONE
    }
}

/// Withdrawal rate of the dynamic strategy, floored at zero.
pub fn dynamic_rate(
    base_rate: Rate,
    previous_return: Option<Rate>,
    upper_threshold: Rate,
    upper_adjustment: Rate,
    lower_threshold: Rate,
    lower_adjustment: Rate,
) -> Rate {
    let rate = match previous_return {
        Some(r) if r > upper_threshold => base_rate * (Decimal::ONE + upper_adjustment),
        Some(r) if r < lower_threshold => base_rate * (Decimal::ONE - lower_adjustment.abs()),
        _ => base_rate,
    };
    rate.max(Decimal::ZERO)
}

/// Taxable share of one euro withdrawn after Teilfreistellung.
fn taxable_share(ctx: &StrategyContext) -> Rate {
    ctx.gain_ratio * (Decimal::ONE - ctx.tax.teilfreistellungsquote)
}

/// Effective flat tax rate of withdrawing `amount` this year.
fn effective_tax_rate(ctx: &StrategyContext, amount: Money) -> Rate {
    if amount <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let taxable = (amount * taxable_share(ctx) - ctx.freibetrag_remaining).max(Decimal::ZERO);
    taxable * effective_flat_rate(ctx.tax) / amount
}

fn tax_optimized_amount(
    ctx: &StrategyContext,
    base_rate: Rate,
    target_tax_rate: Rate,
    mode: OptimizationMode,
    utilization: Rate,
    frequency: RebalanceFrequency,
) -> Money {
    let base = ctx.capital * base_rate;
    let share = taxable_share(ctx);
    if share <= Decimal::ZERO {
        // nothing taxable to steer
        return base;
    }
    if frequency == RebalanceFrequency::AsNeeded && effective_tax_rate(ctx, base) <= target_tax_rate {
        return base;
    }

    let freibetrag = ctx.freibetrag_remaining;
    let flat = effective_flat_rate(ctx.tax);
    let fill = freibetrag * utilization / share;
    // withdrawal at which the effective rate reaches the target
    let cap = if share * flat > target_tax_rate {
        Some(freibetrag * flat / (share * flat - target_tax_rate))
    } else {
        None
    };

    let minimize = cap.map_or(base, |c| base.min(c));
    let maximize = base.max(fill);
    let amount = match mode {
        OptimizationMode::MinimizeTaxes => minimize,
        OptimizationMode::MaximizeAfterTax => maximize,
        OptimizationMode::Balanced => (minimize + maximize) / Decimal::TWO,
    };
    amount.min(ctx.capital)
}
