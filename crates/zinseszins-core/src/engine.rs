use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use crate::accumulation::plans::SavingsPlan;
use crate::accumulation::simulate::{run_accumulation, validate_accumulation, AccumulationInput};
use crate::costs::WithdrawalCosts;
use crate::error::{EngineError, ValidationIssue};
use crate::results::SimulationResult;
use crate::returns::historical::find_black_swan_event;
use crate::returns::scenarios::{describe_black_swan, BlackSwanSummary};
use crate::returns::{generate_returns, generate_returns_with_rng, ReturnConfig, ReturnSequence};
use crate::tax::{AccountState, BasiszinsTable, TaxConfig};
use crate::types::{with_metadata, ComputationOutput, Granularity, Money, Phase, PhaseStatus, Rate, Year};
use crate::withdrawal::segments::WithdrawalSegment;
use crate::withdrawal::simulate::{
    duration_label, run_withdrawal, segment_returns, segment_returns_with_rng,
    validate_segmented_withdrawal, SegmentedWithdrawalInput,
};
use crate::withdrawal::strategy::WithdrawalStrategyConfig;
use crate::EngineResult;

#[cfg(feature = "risk")]
use crate::analytics::risk::{risk_metrics_for_results, RiskMetrics};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How the withdrawal phase is driven.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WithdrawalPlan {
    Single {
        strategy: WithdrawalStrategyConfig,
        returns: ReturnConfig,
        #[serde(default)]
        inflation: Option<Rate>,
        #[serde(default)]
        income_tax_rate: Option<Rate>,
    },
    Segmented { segments: Vec<WithdrawalSegment> },
}

/// Black swan event placed on a calendar year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackSwanSelection {
    pub event_id: String,
    pub start_year: Year,
}

/// Fully resolved configuration of a savings and withdrawal plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub plans: Vec<SavingsPlan>,
    /// First year of the accumulation phase.
    pub start_year: Year,
    /// First year of the withdrawal phase; accumulation ends the year before.
    pub retirement_year: Year,
    /// Last year of the withdrawal phase.
    pub end_year: Year,
    #[serde(default)]
    pub granularity: Granularity,
    pub accumulation_returns: ReturnConfig,
    #[serde(default)]
    pub accumulation_inflation: Option<Rate>,
    pub withdrawal: WithdrawalPlan,
    #[serde(default)]
    pub tax: TaxConfig,
    #[serde(default)]
    pub basiszins: BasiszinsTable,
    #[serde(default)]
    pub costs: WithdrawalCosts,
    /// Other taxable income per year, reducing Grundfreibetrag room.
    #[serde(default)]
    pub other_income: BTreeMap<Year, Money>,
    #[serde(default)]
    pub black_swan: Option<BlackSwanSelection>,
    /// Explicit per-year return overrides, applied after the black swan.
    #[serde(default)]
    pub return_overrides: BTreeMap<Year, Rate>,
    #[serde(default)]
    pub include_risk: bool,
    #[serde(default)]
    pub risk_free_rate: Rate,
}

/// Aggregates over a trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub final_capital: Money,
    pub capital_at_retirement: Money,
    pub total_contributions: Money,
    pub total_withdrawn: Money,
    pub total_costs: Money,
    pub total_tax_paid: Money,
    pub total_interest: Money,
    /// Withdrawal years until depletion; `None` when the capital lasts.
    pub duration_years: Option<u32>,
    pub duration: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanOutput {
    pub years: Vec<SimulationResult>,
    pub summary: SimulationSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black_swan: Option<BlackSwanSummary>,
    #[cfg(feature = "risk")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskMetrics>,
}

impl EngineConfig {
    pub fn accumulation_end_year(&self) -> Year {
        self.retirement_year - 1
    }

    pub fn has_accumulation(&self) -> bool {
        self.start_year <= self.accumulation_end_year()
    }

    fn accumulation_input(&self) -> AccumulationInput {
        AccumulationInput {
            plans: self.plans.clone(),
            returns: self.accumulation_returns.clone(),
            tax: self.tax.clone(),
            basiszins: self.basiszins.clone(),
            start_year: self.start_year,
            end_year: self.accumulation_end_year(),
            granularity: self.granularity,
            inflation_rate: self.accumulation_inflation,
        }
    }

    /// Withdrawal segments; a single strategy becomes one segment spanning
    /// the whole withdrawal phase.
    pub fn withdrawal_segments(&self) -> Vec<WithdrawalSegment> {
        match &self.withdrawal {
            WithdrawalPlan::Single {
                strategy,
                returns,
                inflation,
                income_tax_rate,
            } => vec![WithdrawalSegment {
                id: "main".into(),
                name: strategy.label(),
                start_year: self.retirement_year,
                end_year: self.end_year,
                strategy: strategy.clone(),
                return_config: returns.clone(),
                inflation: *inflation,
                income_tax_rate: *income_tax_rate,
                steuer_reduziert_endkapital: self.tax.steuer_reduziert_endkapital_entsparphase,
            }],
            WithdrawalPlan::Segmented { segments } => segments.clone(),
        }
    }

    fn withdrawal_input(&self, start_capital: Money, cost_basis: Money) -> SegmentedWithdrawalInput {
        SegmentedWithdrawalInput {
            start_capital,
            cost_basis: Some(cost_basis),
            segments: self.withdrawal_segments(),
            tax: self.tax.clone(),
            basiszins: self.basiszins.clone(),
            costs: self.costs.clone(),
        }
    }

    /// Returns forced by the selected black swan event, if any.
    pub fn black_swan_overrides(&self) -> Option<BTreeMap<Year, Rate>> {
        let sel = self.black_swan.as_ref()?;
        find_black_swan_event(&sel.event_id).map(|e| e.overrides_from(sel.start_year))
    }

    /// Every return override in effect: the black swan event first, then
    /// explicit overrides.
    pub fn overrides(&self) -> BTreeMap<Year, Rate> {
        let mut overrides = self.black_swan_overrides().unwrap_or_default();
        overrides.extend(self.return_overrides.iter().map(|(y, r)| (*y, *r)));
        overrides
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// All configuration problems of a plan, collected before any simulation.
pub fn validate_engine_config(config: &EngineConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if config.retirement_year < config.start_year {
        issues.push(ValidationIssue::new(
            "retirement_year",
            "Beginn der Entnahmephase liegt vor dem Beginn der Sparphase.",
        ));
    }
    if config.end_year < config.retirement_year {
        issues.push(ValidationIssue::new(
            "end_year",
            "Ende der Entnahmephase liegt vor ihrem Beginn.",
        ));
    }
    if config.has_accumulation() {
        issues.extend(validate_accumulation(&config.accumulation_input()));
    } else {
        for (i, plan) in config.plans.iter().enumerate() {
            issues.extend(plan.validate(i));
        }
        issues.extend(config.tax.validate());
        issues.extend(config.basiszins.validate());
    }

    let withdrawal = config.withdrawal_input(Decimal::ZERO, Decimal::ZERO);
    for issue in validate_segmented_withdrawal(&withdrawal, Some(config.retirement_year)) {
        if !issues.contains(&issue) {
            issues.push(issue);
        }
    }
    if let Some(last) = withdrawal.segments.last() {
        if last.end_year != config.end_year {
            issues.push(ValidationIssue::new(
                "segments",
                format!("Letztes Segment muss {} enden.", config.end_year),
            ));
        }
    }

    if let Some(sel) = &config.black_swan {
        if find_black_swan_event(&sel.event_id).is_none() {
            issues.push(ValidationIssue::new(
                "black_swan.event_id",
                format!("Unbekanntes Ereignis '{}'.", sel.event_id),
            ));
        }
    }
    for (year, rate) in &config.return_overrides {
        if *rate < Decimal::NEGATIVE_ONE {
            issues.push(ValidationIssue::new(
                format!("return_overrides.{year}"),
                "Rendite darf nicht unter -100% liegen.",
            ));
        }
    }
    issues
}

// ---------------------------------------------------------------------------
// Returns
// ---------------------------------------------------------------------------

/// Return sequence for both phases with overrides applied.
pub fn plan_returns(config: &EngineConfig) -> EngineResult<ReturnSequence> {
    let mut returns = if config.has_accumulation() {
        generate_returns(
            &config.accumulation_returns,
            config.start_year,
            config.accumulation_end_year(),
        )?
    } else {
        ReturnSequence::default()
    };
    returns.merge(segment_returns(&config.withdrawal_segments())?);
    returns.apply_overrides(&config.overrides());
    Ok(returns)
}

/// Like [`plan_returns`] but every random draw comes from `rng`.
pub fn plan_returns_with_rng<R: Rng + ?Sized>(
    config: &EngineConfig,
    rng: &mut R,
) -> EngineResult<ReturnSequence> {
    let mut returns = if config.has_accumulation() {
        generate_returns_with_rng(
            &config.accumulation_returns,
            config.start_year,
            config.accumulation_end_year(),
            rng,
        )?
    } else {
        ReturnSequence::default()
    };
    returns.merge(segment_returns_with_rng(&config.withdrawal_segments(), rng)?);
    returns.apply_overrides(&config.overrides());
    Ok(returns)
}

// ---------------------------------------------------------------------------
// Core functions
// ---------------------------------------------------------------------------

/// Aggregate a trajectory. Depends only on the rows, so summarizing the same
/// rows twice gives the same summary.
pub fn summarize(years: &[SimulationResult]) -> SimulationSummary {
    let final_capital = years.last().map(|r| r.end_capital).unwrap_or(Decimal::ZERO);
    let capital_at_retirement = years
        .iter()
        .rev()
        .find(|r| r.phase == Phase::Accumulation)
        .map(|r| r.end_capital)
        .or_else(|| {
            years
                .iter()
                .find(|r| r.phase == Phase::Withdrawal)
                .map(|r| r.start_capital)
        })
        .unwrap_or(Decimal::ZERO);

    let withdrawal_years = years.iter().filter(|r| r.phase == Phase::Withdrawal).count() as u32;
    let depleted = years.iter().any(|r| r.status == PhaseStatus::Depleted);
    let duration_years = depleted.then_some(withdrawal_years);

    SimulationSummary {
        final_capital,
        capital_at_retirement,
        total_contributions: years.iter().map(|r| r.contribution).sum(),
        total_withdrawn: years.iter().map(|r| r.withdrawal).sum(),
        total_costs: years.iter().map(|r| r.costs).sum(),
        total_tax_paid: years.iter().map(|r| r.tax_paid).sum(),
        total_interest: years.iter().map(|r| r.interest_earned).sum(),
        duration_years,
        duration: duration_label(duration_years),
    }
}

/// Accumulation then withdrawal over a given return sequence, sharing one tax
/// state. The configuration must already be validated.
pub fn run_plan(config: &EngineConfig, returns: &ReturnSequence) -> EngineResult<Vec<SimulationResult>> {
    let mut state = AccountState {
        other_income: config.other_income.clone(),
        ..AccountState::new()
    };

    let (mut years, capital, basis) = if config.has_accumulation() {
        let acc = run_accumulation(&config.accumulation_input(), returns, &mut state)?;
        (acc.years, acc.final_capital, acc.cost_basis)
    } else {
        (Vec::new(), Decimal::ZERO, Decimal::ZERO)
    };

    let withdrawal = run_withdrawal(&config.withdrawal_input(capital, basis), returns, &mut state)?;
    years.extend(withdrawal.years);
    Ok(years)
}

/// Full pipeline: validation, accumulation, withdrawal, summary and, when
/// requested, risk metrics over the combined trajectory.
pub fn simulate_plan(config: &EngineConfig) -> EngineResult<ComputationOutput<PlanOutput>> {
    let start = Instant::now();
    EngineError::from_issues(validate_engine_config(config))?;

    let returns = plan_returns(config)?;
    let years = run_plan(config, &returns)?;
    let summary = summarize(&years);
    let black_swan = describe_black_swan(config.black_swan_overrides().as_ref());

    let mut warnings = Vec::new();
    if let Some(y) = summary.duration_years {
        warnings.push(format!("Kapital nach {y} Jahren Entnahme aufgebraucht"));
    }

    #[cfg(feature = "risk")]
    let risk = if config.include_risk {
        match risk_metrics_for_results(&years, config.risk_free_rate) {
            Ok(m) => Some(m),
            Err(e) => {
                warnings.push(format!("Risikokennzahlen nicht berechnet: {e}"));
                None
            }
        }
    } else {
        None
    };
    #[cfg(not(feature = "risk"))]
    if config.include_risk {
        warnings.push("Risikokennzahlen nicht verfügbar (Feature 'risk' deaktiviert)".into());
    }

    log::debug!(
        "plan {}-{}: final capital {}, duration {}",
        config.start_year,
        config.end_year,
        summary.final_capital.round_dp(2),
        summary.duration
    );

    let output = PlanOutput {
        years,
        summary,
        black_swan,
        #[cfg(feature = "risk")]
        risk,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Savings and withdrawal projection (accumulation, withdrawal, German capital gains tax)",
        &serde_json::json!({
            "start_year": config.start_year,
            "retirement_year": config.retirement_year,
            "end_year": config.end_year,
            "granularity": config.granularity,
            "plans": config.plans.len(),
            "withdrawal_segments": config.withdrawal_segments().len(),
            "black_swan": config.black_swan.as_ref().map(|b| b.event_id.clone()),
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn default_config() -> EngineConfig {
        EngineConfig {
            plans: vec![SavingsPlan {
                id: "etf".into(),
                start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                end: Some(NaiveDate::from_ymd_opt(2039, 12, 31).unwrap()),
                annual_amount: dec!(24_000),
                ter: Some(dec!(0.002)),
                transaction_cost_percent: None,
                transaction_cost_absolute: None,
                inflation_adjusted: false,
            }],
            start_year: 2025,
            retirement_year: 2040,
            end_year: 2069,
            granularity: Granularity::Yearly,
            accumulation_returns: ReturnConfig::Fixed { rate: dec!(0.06) },
            accumulation_inflation: None,
            withdrawal: WithdrawalPlan::Single {
                strategy: WithdrawalStrategyConfig::StandardRule { percent: dec!(0.03) },
                returns: ReturnConfig::Fixed { rate: dec!(0.05) },
                inflation: Some(dec!(0.02)),
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

    #[test]
    fn test_pipeline_continuity_at_retirement() {
        let out = simulate_plan(&default_config()).unwrap().result;
        assert_eq!(out.years.len(), 45);
        let last_acc = &out.years[14];
        let first_wd = &out.years[15];
        assert_eq!(last_acc.phase, Phase::Accumulation);
        assert_eq!(first_wd.phase, Phase::Withdrawal);
        assert_eq!(last_acc.end_capital, first_wd.start_capital);
        assert_eq!(out.summary.capital_at_retirement, last_acc.end_capital);
    }

    #[test]
    fn test_summary_is_idempotent() {
        let out = simulate_plan(&default_config()).unwrap().result;
        assert_eq!(summarize(&out.years), out.summary);
        assert_eq!(summarize(&out.years), summarize(&out.years));
    }

    #[test]
    fn test_summary_totals() {
        let out = simulate_plan(&default_config()).unwrap().result;
        assert_eq!(out.summary.total_contributions, dec!(360_000));
        assert_eq!(out.summary.duration, "unbegrenzt");
        assert!(out.summary.total_tax_paid > Decimal::ZERO);
    }

    #[test]
    fn test_black_swan_lowers_final_capital() {
        let base = simulate_plan(&default_config()).unwrap().result;
        let mut config = default_config();
        config.black_swan = Some(BlackSwanSelection {
            event_id: "dotcom-crash".into(),
            start_year: 2038,
        });
        let out = simulate_plan(&config).unwrap().result;
        assert!(out.summary.final_capital < base.summary.final_capital);
        assert_eq!(out.years[13].return_rate, dec!(-0.075));
        assert_eq!(out.years[15].return_rate, dec!(-0.439));
        let swan = out.black_swan.unwrap();
        assert_eq!(swan.years, 3);
        assert_eq!(swan.first_year, 2038);
    }

    #[test]
    fn test_total_loss_year_never_turns_capital_negative() {
        let mut config = default_config();
        config.return_overrides.insert(2026, dec!(-1));
        let out = simulate_plan(&config).unwrap().result;
        assert_eq!(out.years[1].end_capital, Decimal::ZERO);
        for row in &out.years {
            assert!(row.start_capital >= Decimal::ZERO, "year {}", row.year);
            assert!(row.end_capital >= Decimal::ZERO, "year {}", row.year);
            let residual = (row.end_capital - row.expected_end_capital()).abs();
            assert!(residual < dec!(0.000001), "year {}", row.year);
        }
    }

    #[test]
    fn test_unknown_black_swan_rejected() {
        let mut config = default_config();
        config.black_swan = Some(BlackSwanSelection {
            event_id: "meteor".into(),
            start_year: 2030,
        });
        match simulate_plan(&config) {
            Err(EngineError::InvalidConfiguration(issues)) => {
                assert_eq!(issues[0].field, "black_swan.event_id")
            }
            other => panic!("expected InvalidConfiguration, got {other:?}"),
        }
    }

    #[test]
    fn test_segments_must_cover_horizon() {
        let mut config = default_config();
        let mut segments = config.withdrawal_segments();
        segments[0].end_year = 2060;
        config.withdrawal = WithdrawalPlan::Segmented { segments };
        let err = simulate_plan(&config).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_no_accumulation_phase() {
        let mut config = default_config();
        config.start_year = 2040;
        config.plans.clear();
        let out = simulate_plan(&config).unwrap().result;
        assert_eq!(out.years[0].phase, Phase::Withdrawal);
        assert_eq!(out.summary.final_capital, Decimal::ZERO);
        assert_eq!(out.summary.duration_years, Some(1));
    }

    #[cfg(feature = "risk")]
    #[test]
    fn test_risk_metrics_included_on_request() {
        let mut config = default_config();
        config.include_risk = true;
        let out = simulate_plan(&config).unwrap().result;
        let risk = out.risk.unwrap();
        assert_eq!(risk.drawdown_series.len(), 45);
        assert!(risk.max_drawdown >= Decimal::ZERO);
    }
}
