use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::EngineError;
use crate::math::{mean, percentile_sorted, sample_std_dev, sqrt_decimal};
use crate::results::SimulationResult;
use crate::types::{with_metadata, ComputationOutput, Money, Rate, Year};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskInput {
    /// Portfolio values, one per period, oldest first.
    pub values: Vec<Money>,
    /// Period labels; `0..n` when absent.
    #[serde(default)]
    pub years: Option<Vec<Year>>,
    #[serde(default)]
    pub risk_free_rate: Rate,
    /// Minimum acceptable return for the Sortino ratio.
    #[serde(default)]
    pub target_return: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownPoint {
    pub year: Year,
    pub value: Money,
    pub peak: Money,
    pub drawdown: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Historical 5% VaR of period returns, as a positive loss.
    pub value_at_risk_5: Rate,
    pub value_at_risk_1: Rate,
    pub max_drawdown: Rate,
    pub sharpe_ratio: Decimal,
    pub sortino_ratio: Decimal,
    pub calmar_ratio: Decimal,
    pub volatility: Rate,
    pub annualized_return: Rate,
    pub drawdown_series: Vec<DrawdownPoint>,
}

// ---------------------------------------------------------------------------
// Building blocks
// ---------------------------------------------------------------------------

/// Period-over-period returns; periods starting from a non-positive value
/// are skipped.
pub fn period_returns(values: &[Money]) -> Vec<Rate> {
    values
        .windows(2)
        .filter(|w| w[0] > Decimal::ZERO)
        .map(|w| w[1] / w[0] - Decimal::ONE)
        .collect()
}

/// Largest peak-to-trough decline as a fraction of the running peak.
pub fn max_drawdown(values: &[Money]) -> Rate {
    let mut peak = Decimal::ZERO;
    let mut max_dd = Decimal::ZERO;
    for v in values {
        if *v > peak {
            peak = *v;
        }
        if peak > Decimal::ZERO {
            max_dd = max_dd.max((peak - v) / peak);
        }
    }
    max_dd
}

pub fn drawdown_series(values: &[Money], years: &[Year]) -> Vec<DrawdownPoint> {
    let mut peak = Decimal::ZERO;
    values
        .iter()
        .zip(years)
        .map(|(v, y)| {
            peak = peak.max(*v);
            let drawdown = if peak > Decimal::ZERO {
                (peak - v) / peak
            } else {
                Decimal::ZERO
            };
            DrawdownPoint {
                year: *y,
                value: *v,
                peak,
                drawdown,
            }
        })
        .collect()
}

/// Historical VaR at `percentile` (e.g. 5) as a positive loss. Not clamped:
/// a negative VaR means even the tail period gained.
pub fn historical_var(returns: &[Rate], percentile: Decimal) -> Rate {
    if returns.is_empty() {
        return Decimal::ZERO;
    }
    let mut sorted = returns.to_vec();
    sorted.sort();
    -percentile_sorted(&sorted, percentile)
}

pub fn sharpe_ratio(returns: &[Rate], risk_free_rate: Rate) -> Decimal {
    let vol = sample_std_dev(returns);
    if vol.is_zero() {
        return Decimal::ZERO;
    }
    (mean(returns) - risk_free_rate) / vol
}

/// Sortino ratio with downside deviation `sqrt(mean(min(0, r - target)^2))`.
pub fn sortino_ratio(returns: &[Rate], target: Rate) -> Decimal {
    if returns.is_empty() {
        return Decimal::ZERO;
    }
    let downside: Vec<Decimal> = returns
        .iter()
        .map(|r| {
            let d = (r - target).min(Decimal::ZERO);
            d * d
        })
        .collect();
    let downside_dev = sqrt_decimal(mean(&downside));
    if downside_dev.is_zero() {
        return Decimal::ZERO;
    }
    (mean(returns) - target) / downside_dev
}

/// Compound annual growth between the first and last value.
pub fn annualized_return(values: &[Money]) -> Rate {
    let (Some(first), Some(last)) = (values.first(), values.last()) else {
        return Decimal::ZERO;
    };
    let periods = values.len().saturating_sub(1);
    if periods == 0 || *first <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    if *last <= Decimal::ZERO {
        return Decimal::NEGATIVE_ONE;
    }
    let growth = last / first;
    if periods == 1 {
        return growth - Decimal::ONE;
    }
    growth.powd(Decimal::ONE / Decimal::from(periods as u64)) - Decimal::ONE
}

pub fn calmar_ratio(annualized: Rate, max_dd: Rate) -> Decimal {
    if max_dd.is_zero() {
        return Decimal::ZERO;
    }
    annualized / max_dd
}

// ---------------------------------------------------------------------------
// Core functions
// ---------------------------------------------------------------------------

/// All risk metrics of a value series. At least two values are required.
pub fn compute_risk_metrics(
    values: &[Money],
    years: &[Year],
    risk_free_rate: Rate,
    target_return: Rate,
) -> EngineResult<RiskMetrics> {
    if values.len() < 2 {
        return Err(EngineError::InsufficientData(
            "At least 2 values required for risk metrics".into(),
        ));
    }
    let returns = period_returns(values);
    let max_dd = max_drawdown(values);
    let annualized = annualized_return(values);
    Ok(RiskMetrics {
        value_at_risk_5: historical_var(&returns, dec!(5)),
        value_at_risk_1: historical_var(&returns, dec!(1)),
        max_drawdown: max_dd,
        sharpe_ratio: sharpe_ratio(&returns, risk_free_rate),
        sortino_ratio: sortino_ratio(&returns, target_return),
        calmar_ratio: calmar_ratio(annualized, max_dd),
        volatility: sample_std_dev(&returns),
        annualized_return: annualized,
        drawdown_series: drawdown_series(values, years),
    })
}

/// Risk metrics over the end capital of a simulated trajectory.
pub fn risk_metrics_for_results(
    results: &[SimulationResult],
    risk_free_rate: Rate,
) -> EngineResult<RiskMetrics> {
    let values: Vec<Money> = results.iter().map(|r| r.end_capital).collect();
    let years: Vec<Year> = results.iter().map(|r| r.year).collect();
    compute_risk_metrics(&values, &years, risk_free_rate, Decimal::ZERO)
}

pub fn calculate_risk_metrics(input: &RiskInput) -> EngineResult<ComputationOutput<RiskMetrics>> {
    let start = Instant::now();
    let years: Vec<Year> = match &input.years {
        Some(years) => {
            if years.len() != input.values.len() {
                return Err(EngineError::InvalidInput {
                    field: "years".into(),
                    reason: "years must have the same length as values".into(),
                });
            }
            years.clone()
        }
        None => (0..input.values.len() as Year).collect(),
    };
    let metrics = compute_risk_metrics(
        &input.values,
        &years,
        input.risk_free_rate,
        input.target_return,
    )?;

    let mut warnings = Vec::new();
    if input.values.len() < 10 {
        warnings.push("Weniger als 10 Perioden: Kennzahlen sind wenig aussagekräftig".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Risk metrics (historical VaR, drawdown, Sharpe, Sortino, Calmar)",
        &serde_json::json!({
            "periods": input.values.len(),
            "risk_free_rate": input.risk_free_rate.to_string(),
            "target_return": input.target_return.to_string(),
            "var_method": "historical, linear interpolation",
        }),
        warnings,
        elapsed,
        metrics,
    ))
}
