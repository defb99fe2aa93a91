use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use std::collections::BTreeMap;

use super::historical::HistoricalIndex;
use crate::error::{EngineError, ValidationIssue};
use crate::math::mean;
use crate::types::{Rate, Year};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What to do when a by-year return table has no entry for a requested year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum MissingRatePolicy {
    /// Fail with `MissingRateData`.
    #[default]
    Fail,
    /// Use the arithmetic mean of all known years.
    AverageOfKnown,
    /// Use a fixed rate.
    Constant { rate: Rate },
}

/// Return model for a phase or segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReturnConfig {
    /// Same rate every year.
    Fixed { rate: Rate },
    /// Normal(average_return, standard_deviation) draws; same seed, same sequence.
    Random {
        average_return: Rate,
        standard_deviation: Rate,
        #[serde(default)]
        seed: Option<u64>,
    },
    /// User-supplied rate per year.
    Variable {
        rates: BTreeMap<Year, Rate>,
        #[serde(default)]
        fallback: MissingRatePolicy,
    },
    /// Historical index returns, optionally overridden per year (black swan).
    Historical {
        #[serde(default)]
        rates: BTreeMap<Year, Rate>,
        #[serde(default)]
        index: Option<HistoricalIndex>,
        #[serde(default)]
        fallback: MissingRatePolicy,
    },
}

impl ReturnConfig {
    /// Expected rate used as a baseline by guardrail rules.
    pub fn expected_rate(&self) -> Rate {
        match self {
            ReturnConfig::Fixed { rate } => *rate,
            ReturnConfig::Random { average_return, .. } => *average_return,
            ReturnConfig::Variable { rates, .. } => mean(&rates.values().copied().collect::<Vec<_>>()),
            ReturnConfig::Historical { .. } => {
                let rates = self.historical_table();
                mean(&rates.values().copied().collect::<Vec<_>>())
            }
        }
    }

    fn historical_table(&self) -> BTreeMap<Year, Rate> {
        match self {
            ReturnConfig::Historical { rates, index, .. } => {
                let mut table = index.map(|i| i.annual_returns()).unwrap_or_default();
                table.extend(rates.iter().map(|(y, r)| (*y, *r)));
                table
            }
            ReturnConfig::Variable { rates, .. } => rates.clone(),
            _ => BTreeMap::new(),
        }
    }
}

/// Per-year return rates for a contiguous year range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnSequence {
    pub rates: BTreeMap<Year, Rate>,
}

impl ReturnSequence {
    pub fn constant(rate: Rate, start_year: Year, end_year: Year) -> Self {
        Self {
            rates: (start_year..=end_year).map(|y| (y, rate)).collect(),
        }
    }

    pub fn rate(&self, year: Year) -> EngineResult<Rate> {
        self.rates
            .get(&year)
            .copied()
            .ok_or(EngineError::MissingRateData { year })
    }

    /// Replace the rates of the given years (black swan / stress overrides).
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<Year, Rate>) {
        for (year, rate) in overrides {
            if let Some(slot) = self.rates.get_mut(year) {
                *slot = *rate;
            }
        }
    }

    pub fn merge(&mut self, other: ReturnSequence) {
        self.rates.extend(other.rates);
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Produce the per-year return sequence for `[start_year, end_year]`.
///
/// Random configs without a seed draw from OS entropy and are therefore not
/// reproducible; every other config is fully deterministic.
pub fn generate_returns(
    config: &ReturnConfig,
    start_year: Year,
    end_year: Year,
) -> EngineResult<ReturnSequence> {
    let mut rng = match config {
        ReturnConfig::Random { seed: Some(s), .. } => StdRng::seed_from_u64(*s),
        ReturnConfig::Random { seed: None, .. } => {
            log::warn!("random return model without seed; results are not reproducible");
            StdRng::from_entropy()
        }
        _ => StdRng::seed_from_u64(0),
    };
    generate_returns_with_rng(config, start_year, end_year, &mut rng)
}

/// Same as [`generate_returns`] but draws random returns from the caller's
/// generator, so tests and Monte Carlo runs can inject their own source.
pub fn generate_returns_with_rng<R: Rng + ?Sized>(
    config: &ReturnConfig,
    start_year: Year,
    end_year: Year,
    rng: &mut R,
) -> EngineResult<ReturnSequence> {
    if end_year < start_year {
        return Ok(ReturnSequence::default());
    }
    match config {
        ReturnConfig::Fixed { rate } => Ok(ReturnSequence::constant(*rate, start_year, end_year)),
        ReturnConfig::Random {
            average_return,
            standard_deviation,
            ..
        } => draw_normal_returns(*average_return, *standard_deviation, start_year, end_year, rng),
        ReturnConfig::Variable { rates, fallback } => {
            lookup_returns(rates, fallback, start_year, end_year)
        }
        ReturnConfig::Historical { fallback, .. } => {
            let table = config.historical_table();
            lookup_returns(&table, fallback, start_year, end_year)
        }
    }
}

fn draw_normal_returns<R: Rng + ?Sized>(
    average: Rate,
    std_dev: Rate,
    start_year: Year,
    end_year: Year,
    rng: &mut R,
) -> EngineResult<ReturnSequence> {
    if std_dev < Decimal::ZERO {
        return Err(EngineError::InvalidInput {
            field: "standard_deviation".into(),
            reason: "Standard deviation must be >= 0".into(),
        });
    }
    if std_dev.is_zero() {
        return Ok(ReturnSequence::constant(average, start_year, end_year));
    }

    let mean_f = average.to_f64().unwrap_or(0.0);
    let sd_f = std_dev.to_f64().unwrap_or(0.0);
    let normal = Normal::new(mean_f, sd_f).map_err(|e| EngineError::InvalidInput {
        field: "random".into(),
        reason: format!("Invalid Normal parameters: {e}"),
    })?;

    let mut rates = BTreeMap::new();
    for year in start_year..=end_year {
        let draw: f64 = rng.sample(normal);
        // A year cannot lose more than everything.
        let rate = Decimal::from_f64(draw)
            .map(|d| d.round_dp(10))
            .unwrap_or(average)
            .max(Decimal::NEGATIVE_ONE);
        rates.insert(year, rate);
    }
    Ok(ReturnSequence { rates })
}

fn lookup_returns(
    table: &BTreeMap<Year, Rate>,
    fallback: &MissingRatePolicy,
    start_year: Year,
    end_year: Year,
) -> EngineResult<ReturnSequence> {
    let average = mean(&table.values().copied().collect::<Vec<_>>());
    let mut rates = BTreeMap::new();
    for year in start_year..=end_year {
        let rate = match table.get(&year) {
            Some(r) => *r,
            None => match fallback {
                MissingRatePolicy::Fail => return Err(EngineError::MissingRateData { year }),
                MissingRatePolicy::AverageOfKnown => {
                    if table.is_empty() {
                        return Err(EngineError::MissingRateData { year });
                    }
                    log::debug!("no return for {year}, using average of known years");
                    average
                }
                MissingRatePolicy::Constant { rate } => *rate,
            },
        };
        rates.insert(year, rate);
    }
    Ok(ReturnSequence { rates })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Collect configuration problems without failing on the first one.
pub fn validate_return_config(config: &ReturnConfig, field: &str) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    match config {
        ReturnConfig::Fixed { rate } => {
            issues.extend(check_rate(*rate, format!("{field}.rate")));
        }
        ReturnConfig::Random {
            average_return,
            standard_deviation,
            ..
        } => {
            issues.extend(check_rate(*average_return, format!("{field}.average_return")));
            if *standard_deviation < Decimal::ZERO {
                issues.push(ValidationIssue::new(
                    format!("{field}.standard_deviation"),
                    "Standardabweichung darf nicht negativ sein.",
                ));
            }
        }
        ReturnConfig::Variable { rates, fallback }
        | ReturnConfig::Historical { rates, fallback, .. } => {
            for (year, rate) in rates {
                issues.extend(check_rate(*rate, format!("{field}.rates.{year}")));
            }
            if let MissingRatePolicy::Constant { rate } = fallback {
                issues.extend(check_rate(*rate, format!("{field}.fallback.rate")));
            }
        }
    }
    issues
}

fn check_rate(rate: Rate, field: String) -> Option<ValidationIssue> {
    (rate < Decimal::NEGATIVE_ONE)
        .then(|| ValidationIssue::new(field, "Rendite darf nicht unter -100% liegen."))
}
