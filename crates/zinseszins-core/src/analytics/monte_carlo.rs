use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::engine::{plan_returns_with_rng, run_plan, validate_engine_config, EngineConfig};
use crate::error::{EngineError, ValidationIssue};
use crate::math::{mean, percentile_sorted};
use crate::returns::ReturnConfig;
use crate::types::{with_metadata, ComputationOutput, Money, PhaseStatus, Rate, Year};
use crate::withdrawal::segments::WithdrawalSegment;
use crate::EngineResult;

const MAX_SIMULATIONS: u32 = 100_000;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloInput {
    pub config: EngineConfig,
    #[serde(default = "default_num_simulations")]
    pub num_simulations: u32,
    /// Run `i` is seeded with `seed + i`.
    #[serde(default)]
    pub seed: u64,
}

fn default_num_simulations() -> u32 {
    1_000
}

/// Percentile summary of a capital distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalPercentiles {
    pub p5: Money,
    pub p25: Money,
    pub p50: Money,
    pub p75: Money,
    pub p95: Money,
}

impl CapitalPercentiles {
    fn from_values(values: &mut [Decimal]) -> Self {
        values.sort();
        CapitalPercentiles {
            p5: percentile_sorted(values, dec!(5)),
            p25: percentile_sorted(values, dec!(25)),
            p50: percentile_sorted(values, dec!(50)),
            p75: percentile_sorted(values, dec!(75)),
            p95: percentile_sorted(values, dec!(95)),
        }
    }
}

/// End-capital distribution for one calendar year across all runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearBand {
    pub year: Year,
    #[serde(flatten)]
    pub percentiles: CapitalPercentiles,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloOutput {
    pub num_simulations: u32,
    pub bands: Vec<YearBand>,
    pub final_capital: CapitalPercentiles,
    pub final_capital_mean: Money,
    /// Share of runs whose capital lasted to the end year.
    pub success_rate: Rate,
    pub depleted_runs: u32,
}

// ---------------------------------------------------------------------------
// Core function
// ---------------------------------------------------------------------------

fn is_random(config: &ReturnConfig) -> bool {
    matches!(config, ReturnConfig::Random { .. })
}

fn has_random_returns(config: &EngineConfig, segments: &[WithdrawalSegment]) -> bool {
    (config.has_accumulation() && is_random(&config.accumulation_returns))
        || segments.iter().any(|s| is_random(&s.return_config))
}

/// Run the full pipeline `num_simulations` times with independently seeded
/// return draws. Runs share nothing but the configuration.
pub fn run_monte_carlo(input: &MonteCarloInput) -> EngineResult<ComputationOutput<MonteCarloOutput>> {
    let start = Instant::now();
    let mut issues = validate_engine_config(&input.config);
    if input.num_simulations == 0 || input.num_simulations > MAX_SIMULATIONS {
        issues.push(ValidationIssue::new(
            "num_simulations",
            format!("Anzahl Simulationen muss zwischen 1 und {MAX_SIMULATIONS} liegen."),
        ));
    }
    EngineError::from_issues(issues)?;

    let config = &input.config;
    let mut warnings = Vec::new();
    if !has_random_returns(config, &config.withdrawal_segments()) {
        warnings.push("Keine Zufallsrenditen konfiguriert; alle Läufe sind identisch".to_string());
    }

    let years: Vec<Year> = (config.start_year..=config.end_year).collect();
    let mut per_year: Vec<Vec<Decimal>> = vec![Vec::with_capacity(input.num_simulations as usize); years.len()];
    let mut finals = Vec::with_capacity(input.num_simulations as usize);
    let mut depleted_runs = 0u32;

    for i in 0..input.num_simulations {
        let mut rng = StdRng::seed_from_u64(input.seed.wrapping_add(u64::from(i)));
        let returns = plan_returns_with_rng(config, &mut rng)?;
        let rows = run_plan(config, &returns)?;

        if rows.iter().any(|r| r.status == PhaseStatus::Depleted) {
            depleted_runs += 1;
        }
        // depleted runs stop early and hold zero capital afterwards
        for (idx, year) in years.iter().enumerate() {
            let value = rows
                .iter()
                .find(|r| r.year == *year)
                .map(|r| r.end_capital)
                .unwrap_or(Decimal::ZERO);
            per_year[idx].push(value);
        }
        finals.push(rows.last().map(|r| r.end_capital).unwrap_or(Decimal::ZERO));
    }

    let bands = years
        .iter()
        .zip(per_year.iter_mut())
        .map(|(year, values)| YearBand {
            year: *year,
            percentiles: CapitalPercentiles::from_values(values),
        })
        .collect();
    let final_capital_mean = mean(&finals);
    let final_capital = CapitalPercentiles::from_values(&mut finals);
    let n = Decimal::from(input.num_simulations);
    let success_rate = (n - Decimal::from(depleted_runs)) / n;

    log::debug!(
        "monte carlo: {} runs, success rate {}",
        input.num_simulations,
        success_rate.round_dp(4)
    );

    let output = MonteCarloOutput {
        num_simulations: input.num_simulations,
        bands,
        final_capital,
        final_capital_mean,
        success_rate,
        depleted_runs,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Monte Carlo projection (independently seeded return paths through the full pipeline)",
        &serde_json::json!({
            "num_simulations": input.num_simulations,
            "seed": input.seed,
            "start_year": config.start_year,
            "end_year": config.end_year,
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costs::WithdrawalCosts;
    use crate::engine::WithdrawalPlan;
    use crate::tax::{BasiszinsTable, TaxConfig};
    use crate::types::Granularity;
    use crate::withdrawal::strategy::WithdrawalStrategyConfig;
    use std::collections::BTreeMap;

    fn random_returns() -> ReturnConfig {
        ReturnConfig::Random {
            average_return: dec!(0.05),
            standard_deviation: dec!(0.15),
            seed: None,
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            plans: Vec::new(),
            start_year: 2030,
            retirement_year: 2030,
            end_year: 2049,
            granularity: Granularity::Yearly,
            accumulation_returns: ReturnConfig::Fixed { rate: dec!(0.05) },
            accumulation_inflation: None,
            withdrawal: WithdrawalPlan::Single {
                strategy: WithdrawalStrategyConfig::FixedPercent { rate: dec!(0.05) },
                returns: random_returns(),
                inflation: None,
                income_tax_rate: None,
            },
            tax: TaxConfig::default(),
            basiszins: BasiszinsTable::default(),
            costs: WithdrawalCosts::default(),
            other_income: BTreeMap::new(),
            black_swan: None,
            return_overrides: BTreeMap::new(),
            include_risk: false,
            risk_free_rate: Decimal::ZERO,
        }
    }

    fn input(n: u32) -> MonteCarloInput {
        let mut config = config();
        // start capital comes from a one-time payment the year before
        config.start_year = 2029;
        config.plans.push(crate::accumulation::plans::SavingsPlan {
            id: "lump".into(),
            start: chrono::NaiveDate::from_ymd_opt(2029, 1, 1).unwrap(),
            end: chrono::NaiveDate::from_ymd_opt(2029, 1, 1),
            annual_amount: dec!(500_000),
            ter: None,
            transaction_cost_percent: None,
            transaction_cost_absolute: None,
            inflation_adjusted: false,
        });
        MonteCarloInput {
            config,
            num_simulations: n,
            seed: 42,
        }
    }

    #[test]
    fn test_same_seed_same_result() {
        let a = run_monte_carlo(&input(50)).unwrap().result;
        let b = run_monte_carlo(&input(50)).unwrap().result;
        assert_eq!(a.final_capital, b.final_capital);
        assert_eq!(a.success_rate, b.success_rate);
    }

    #[test]
    fn test_bands_are_ordered() {
        let out = run_monte_carlo(&input(100)).unwrap().result;
        assert_eq!(out.bands.len(), 21);
        for band in &out.bands {
            let p = &band.percentiles;
            assert!(p.p5 <= p.p25 && p.p25 <= p.p50 && p.p50 <= p.p75 && p.p75 <= p.p95);
        }
        // the accumulation year has a fixed return, so no spread
        assert_eq!(out.bands[0].percentiles.p5, out.bands[0].percentiles.p95);
        assert!(out.bands[20].percentiles.p5 < out.bands[20].percentiles.p95);
    }

    #[test]
    fn test_success_rate_bounds() {
        let out = run_monte_carlo(&input(100)).unwrap().result;
        assert!(out.success_rate >= Decimal::ZERO && out.success_rate <= Decimal::ONE);
        assert_eq!(
            out.success_rate,
            Decimal::from(100 - out.depleted_runs) / dec!(100)
        );
    }

    #[test]
    fn test_deterministic_config_warns() {
        let mut inp = input(5);
        inp.config.withdrawal = WithdrawalPlan::Single {
            strategy: WithdrawalStrategyConfig::FixedPercent { rate: dec!(0.04) },
            returns: ReturnConfig::Fixed { rate: dec!(0.05) },
            inflation: None,
            income_tax_rate: None,
        };
        let out = run_monte_carlo(&inp).unwrap();
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.result.final_capital.p5, out.result.final_capital.p95);
        assert_eq!(out.result.success_rate, Decimal::ONE);
    }

    #[test]
    fn test_zero_simulations_rejected() {
        assert!(run_monte_carlo(&input(0)).is_err());
    }
}
