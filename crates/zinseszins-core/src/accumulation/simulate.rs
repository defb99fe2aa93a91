use chrono::Datelike;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::plans::{expand_plans, ElementYearResult, SavingsPlan, SimulationElement};
use crate::error::{EngineError, ValidationIssue};
use crate::math::{compound, growth_factor};
use crate::results::SimulationResult;
use crate::returns::model::validate_return_config;
use crate::returns::{generate_returns, ReturnConfig, ReturnSequence};
use crate::tax::{calculate_vorabpauschale, AccountState, BasiszinsTable, TaxConfig, VorabpauschaleDetails};
use crate::types::{with_metadata, ComputationOutput, Granularity, Money, Phase, Rate, Year};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccumulationInput {
    pub plans: Vec<SavingsPlan>,
    pub returns: ReturnConfig,
    #[serde(default)]
    pub tax: TaxConfig,
    #[serde(default)]
    pub basiszins: BasiszinsTable,
    pub start_year: Year,
    pub end_year: Year,
    #[serde(default)]
    pub granularity: Granularity,
    /// Used for inflation-adjusted plans and real end capital.
    #[serde(default)]
    pub inflation_rate: Option<Rate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccumulationOutput {
    pub years: Vec<SimulationResult>,
    pub elements: Vec<SimulationElement>,
    pub final_capital: Money,
    /// Acquisition cost of everything still held, including taxed
    /// Vorabpauschalen.
    pub cost_basis: Money,
    pub total_contributions: Money,
    pub total_costs: Money,
    pub total_interest: Money,
    pub total_tax_paid: Money,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate_accumulation(input: &AccumulationInput) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if input.end_year < input.start_year {
        issues.push(ValidationIssue::new(
            "end_year",
            "Ende der Sparphase liegt vor dem Beginn.",
        ));
    }
    for (i, plan) in input.plans.iter().enumerate() {
        issues.extend(plan.validate(i));
    }
    issues.extend(validate_return_config(&input.returns, "returns"));
    issues.extend(input.tax.validate());
    issues.extend(input.basiszins.validate());
    issues
}

// ---------------------------------------------------------------------------
// Core function
// ---------------------------------------------------------------------------

/// Project the accumulation phase year by year.
pub fn simulate_accumulation(
    input: &AccumulationInput,
) -> EngineResult<ComputationOutput<AccumulationOutput>> {
    let start = Instant::now();
    EngineError::from_issues(validate_accumulation(input))?;

    let returns = generate_returns(&input.returns, input.start_year, input.end_year)?;
    let mut state = AccountState::new();
    let output = run_accumulation(input, &returns, &mut state)?;

    let mut warnings = Vec::new();
    if output.elements.is_empty() {
        warnings.push("Keine Einzahlungen im Simulationszeitraum".to_string());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Accumulation phase (per-contribution compounding, TER, Vorabpauschale)",
        &serde_json::json!({
            "start_year": input.start_year,
            "end_year": input.end_year,
            "granularity": input.granularity,
            "plans": input.plans.len(),
            "tax_reduces_capital": input.tax.steuer_reduziert_endkapital_sparphase,
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Accumulation loop over a pre-generated return sequence and a caller-owned
/// tax state, shared with the withdrawal phase by the pipeline.
pub fn run_accumulation(
    input: &AccumulationInput,
    returns: &ReturnSequence,
    state: &mut AccountState,
) -> EngineResult<AccumulationOutput> {
    let inflation = input.inflation_rate.unwrap_or(Decimal::ZERO);
    let mut elements = expand_plans(
        &input.plans,
        input.start_year,
        input.end_year,
        input.granularity,
        inflation,
    );
    let tax_reduces = input.tax.steuer_reduziert_endkapital_sparphase;

    let mut years = Vec::new();
    for year in input.start_year..=input.end_year {
        let rate = returns.rate(year)?;
        let basiszins = input.basiszins.rate_for_year(year);
        let mut row = SimulationResult::empty(year, Phase::Accumulation, rate);
        row.tax_reduces_capital = tax_reduces;
        let mut vorab = VorabpauschaleDetails {
            basiszins,
            months_held: 12,
            ..VorabpauschaleDetails::default()
        };

        // elements are date-ordered, so the Freibetrag is consumed
        // chronologically
        for element in elements.iter_mut().filter(|e| e.date.year() <= year) {
            let step = step_element(element, year, rate, basiszins, &input.tax, state);
            row.start_capital += step.start_capital;
            row.contribution += step.contribution;
            row.costs += step.costs;
            row.interest_earned += step.interest_earned;
            row.tax_paid += step.tax_paid;
            row.end_capital += step.end_capital;
            let d = &step.vorabpauschale_details;
            vorab.basisertrag += d.basisertrag;
            vorab.actual_gain += d.actual_gain;
            vorab.vorabpauschale += d.vorabpauschale;
            vorab.tax_owed += d.tax_owed;
            vorab.freibetrag_used += d.freibetrag_used;
            element.results.insert(year, step);
        }

        if let Some(infl) = input.inflation_rate {
            let periods = (year - input.start_year + 1) as u32;
            row.end_capital_real = Some(row.end_capital / compound(infl, periods));
        }
        row.vorabpauschale_details = Some(vorab);
        years.push(row);
    }

    let final_capital = years.last().map(|r| r.end_capital).unwrap_or(Decimal::ZERO);
    let cost_basis = elements.iter().map(|e| e.cost_basis).sum();
    let total_contributions = years.iter().map(|r| r.contribution).sum();
    let total_costs = years.iter().map(|r| r.costs).sum();
    let total_interest = years.iter().map(|r| r.interest_earned).sum();
    let total_tax_paid = years.iter().map(|r| r.tax_paid).sum();

    log::debug!(
        "accumulation {}-{}: {} elements, final capital {}",
        input.start_year,
        input.end_year,
        elements.len(),
        final_capital.round_dp(2)
    );

    Ok(AccumulationOutput {
        years,
        elements,
        final_capital,
        cost_basis,
        total_contributions,
        total_costs,
        total_interest,
        total_tax_paid,
    })
}

/// Advance one element through `year`: credit the contribution in its first
/// year, compound at `rate - ter`, then tax the Vorabpauschale.
fn step_element(
    element: &mut SimulationElement,
    year: Year,
    rate: Rate,
    basiszins: Rate,
    tax: &TaxConfig,
    state: &mut AccountState,
) -> ElementYearResult {
    let first_year = element.date.year() == year;
    let start_capital = element.capital;
    let (contribution, costs, months) = if first_year {
        (element.net_amount, element.costs, element.first_year_months)
    } else {
        (Decimal::ZERO, Decimal::ZERO, 12)
    };

    let invested = start_capital + contribution;
    let grown = invested * growth_factor(rate - element.ter, months);
    let interest_earned = grown - invested;

    let details = calculate_vorabpauschale(invested, grown, basiszins, months, year, tax, state);
    let tax_paid = details.tax_owed;
    let end_capital = if tax.steuer_reduziert_endkapital_sparphase {
        grown - tax_paid
    } else {
        grown
    };

    element.capital = end_capital;
    element.cost_basis += contribution + details.vorabpauschale;

    ElementYearResult {
        start_capital,
        contribution,
        costs,
        interest_earned,
        tax_paid,
        vorabpauschale_details: details,
        end_capital,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn default_input() -> AccumulationInput {
        AccumulationInput {
            plans: vec![SavingsPlan {
                id: "etf".into(),
                start: date(2025, 1, 1),
                end: Some(date(2034, 12, 31)),
                annual_amount: dec!(12_000),
                ter: None,
                transaction_cost_percent: None,
                transaction_cost_absolute: None,
                inflation_adjusted: false,
            }],
            returns: ReturnConfig::Fixed { rate: dec!(0.05) },
            tax: TaxConfig::default(),
            basiszins: BasiszinsTable::default(),
            start_year: 2025,
            end_year: 2034,
            granularity: Granularity::Yearly,
            inflation_rate: None,
        }
    }

    fn untaxed(mut input: AccumulationInput) -> AccumulationInput {
        input.basiszins = BasiszinsTable::empty();
        input
    }

    #[test]
    fn test_no_tax_matches_annuity_due() {
        let input = untaxed(default_input());
        let out = simulate_accumulation(&input).unwrap().result;
        assert_eq!(out.years.len(), 10);
        // contributions at period start: 12000 * ((1.05^10 - 1) / 0.05) * 1.05
        let expected = dec!(12_000) * (compound(dec!(0.05), 10) - Decimal::ONE) / dec!(0.05) * dec!(1.05);
        assert!((out.final_capital - expected).abs() < dec!(0.000001));
        assert_eq!(out.total_tax_paid, Decimal::ZERO);
    }

    #[test]
    fn test_year_rows_balance_and_chain() {
        let out = simulate_accumulation(&default_input()).unwrap().result;
        for row in &out.years {
            let residual = (row.end_capital - row.expected_end_capital()).abs();
            assert!(residual < dec!(0.000001), "year {}", row.year);
        }
        for pair in out.years.windows(2) {
            assert_eq!(pair[0].end_capital, pair[1].start_capital);
        }
        assert_eq!(out.years[0].start_capital, Decimal::ZERO);
    }

    #[test]
    fn test_vorabpauschale_taxed_beyond_freibetrag() {
        let mut input = default_input();
        input.plans[0].annual_amount = dec!(500_000);
        let out = simulate_accumulation(&input).unwrap().result;
        let first = &out.years[0];
        let details = first.vorabpauschale_details.as_ref().unwrap();
        // 500000 * 0.0253 * 0.7
        assert_eq!(details.basisertrag, dec!(8855));
        assert!(first.tax_paid > Decimal::ZERO);
        assert_eq!(first.tax_paid, details.tax_owed);
    }

    #[test]
    fn test_tax_tracked_outside_portfolio() {
        let mut input = default_input();
        input.plans[0].annual_amount = dec!(500_000);
        input.tax.steuer_reduziert_endkapital_sparphase = false;
        let out = simulate_accumulation(&input).unwrap().result;
        let untaxed_out = simulate_accumulation(&untaxed(input.clone())).unwrap().result;
        assert!(out.total_tax_paid > Decimal::ZERO);
        assert_eq!(out.final_capital, untaxed_out.final_capital);
        for row in &out.years {
            assert!(!row.tax_reduces_capital);
            assert!((row.end_capital - row.expected_end_capital()).abs() < dec!(0.000001));
        }
    }

    #[test]
    fn test_ter_lowers_return() {
        let base = simulate_accumulation(&untaxed(default_input())).unwrap().result;
        let mut input = untaxed(default_input());
        input.plans[0].ter = Some(dec!(0.002));
        let with_ter = simulate_accumulation(&input).unwrap().result;
        assert!(with_ter.final_capital < base.final_capital);
    }

    #[test]
    fn test_monthly_first_year_pro_rata() {
        let mut input = untaxed(default_input());
        input.granularity = Granularity::Monthly;
        input.end_year = 2025;
        let out = simulate_accumulation(&input).unwrap().result;
        let row = &out.years[0];
        assert_eq!(row.contribution, dec!(12_000));
        // monthly deposits earn less than one deposit on January 1
        assert!(row.interest_earned < dec!(600));
        assert!(row.interest_earned > dec!(300));
        assert_eq!(out.elements.len(), 12);
    }

    #[test]
    fn test_gap_free_with_late_plan_start() {
        let mut input = default_input();
        input.plans[0].start = date(2028, 1, 1);
        let out = simulate_accumulation(&input).unwrap().result;
        let years: Vec<Year> = out.years.iter().map(|r| r.year).collect();
        assert_eq!(years, (2025..=2034).collect::<Vec<_>>());
        assert_eq!(out.years[2].end_capital, Decimal::ZERO);
    }

    #[test]
    fn test_missing_rate_data_propagates() {
        let mut input = default_input();
        let mut rates = BTreeMap::new();
        rates.insert(2025, dec!(0.05));
        input.returns = ReturnConfig::Variable {
            rates,
            fallback: Default::default(),
        };
        let err = simulate_accumulation(&input).unwrap_err();
        assert!(matches!(err, EngineError::MissingRateData { year: 2026 }));
    }

    #[test]
    fn test_invalid_plan_rejected_before_simulation() {
        let mut input = default_input();
        input.plans[0].end = Some(date(2020, 1, 1));
        input.plans[0].annual_amount = dec!(-1);
        match simulate_accumulation(&input) {
            Err(EngineError::InvalidConfiguration(issues)) => assert_eq!(issues.len(), 2),
            other => panic!("expected InvalidConfiguration, got {other:?}"),
        }
    }

    #[test]
    fn test_total_loss_year_with_ter_clamps_at_zero() {
        let mut input = untaxed(default_input());
        input.plans[0].ter = Some(dec!(0.005));
        input.end_year = 2027;
        let mut rates = BTreeMap::new();
        rates.insert(2025, dec!(0.05));
        rates.insert(2026, dec!(-1));
        rates.insert(2027, dec!(0.05));
        input.returns = ReturnConfig::Variable {
            rates,
            fallback: Default::default(),
        };
        let out = simulate_accumulation(&input).unwrap().result;
        for row in &out.years {
            assert!(row.end_capital >= Decimal::ZERO, "year {}", row.year);
            assert!((row.end_capital - row.expected_end_capital()).abs() < dec!(0.000001));
        }
        assert_eq!(out.years[1].end_capital, Decimal::ZERO);
        assert!(out.final_capital >= Decimal::ZERO);
    }

    #[test]
    fn test_real_end_capital_reported_with_inflation() {
        let mut input = untaxed(default_input());
        input.inflation_rate = Some(dec!(0.02));
        let out = simulate_accumulation(&input).unwrap().result;
        let last = out.years.last().unwrap();
        assert!(last.end_capital_real.unwrap() < last.end_capital);
    }
}
