use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::segments::{segment_index_for_year, validate_segments, WithdrawalSegment};
use super::strategy::{StrategyContext, StrategyState, WithdrawalStrategyConfig};
use crate::costs::WithdrawalCosts;
use crate::error::{EngineError, ValidationIssue};
use crate::results::SimulationResult;
use crate::returns::model::validate_return_config;
use crate::returns::{generate_returns, generate_returns_with_rng, ReturnConfig, ReturnSequence};
use crate::tax::{calculate_vorabpauschale, compute_tax, AccountState, BasiszinsTable, TaxConfig};
use crate::types::{with_metadata, ComputationOutput, Money, Phase, PhaseStatus, Rate, Year};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Withdrawal phase driven by a single strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalInput {
    pub start_capital: Money,
    /// Acquisition cost of the holding; equal to `start_capital` (no embedded
    /// gain) when absent.
    #[serde(default)]
    pub cost_basis: Option<Money>,
    pub start_year: Year,
    pub end_year: Year,
    pub strategy: WithdrawalStrategyConfig,
    pub returns: ReturnConfig,
    #[serde(default)]
    pub inflation: Option<Rate>,
    #[serde(default)]
    pub income_tax_rate: Option<Rate>,
    #[serde(default)]
    pub tax: TaxConfig,
    #[serde(default)]
    pub basiszins: BasiszinsTable,
    #[serde(default)]
    pub costs: WithdrawalCosts,
}

/// Withdrawal phase split into consecutive segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentedWithdrawalInput {
    pub start_capital: Money,
    #[serde(default)]
    pub cost_basis: Option<Money>,
    pub segments: Vec<WithdrawalSegment>,
    #[serde(default)]
    pub tax: TaxConfig,
    #[serde(default)]
    pub basiszins: BasiszinsTable,
    #[serde(default)]
    pub costs: WithdrawalCosts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalOutput {
    pub years: Vec<SimulationResult>,
    pub final_capital: Money,
    pub total_withdrawn: Money,
    pub total_costs: Money,
    pub total_tax_paid: Money,
    /// Year in which the capital ran out.
    pub depleted_in: Option<Year>,
    /// Years the capital lasted; `None` when it lasted the whole horizon.
    pub duration_years: Option<u32>,
    pub duration_label: String,
}

impl WithdrawalInput {
    /// The same plan as a one-segment segmented plan.
    pub fn to_segmented(&self) -> SegmentedWithdrawalInput {
        SegmentedWithdrawalInput {
            start_capital: self.start_capital,
            cost_basis: self.cost_basis,
            segments: vec![WithdrawalSegment {
                id: "main".into(),
                name: self.strategy.label(),
                start_year: self.start_year,
                end_year: self.end_year,
                strategy: self.strategy.clone(),
                return_config: self.returns.clone(),
                inflation: self.inflation,
                income_tax_rate: self.income_tax_rate,
                steuer_reduziert_endkapital: self.tax.steuer_reduziert_endkapital_entsparphase,
            }],
            tax: self.tax.clone(),
            basiszins: self.basiszins.clone(),
            costs: self.costs.clone(),
        }
    }
}

/// Human-readable duration: `"unbegrenzt"` or `"N Jahre"`.
pub fn duration_label(duration_years: Option<u32>) -> String {
    match duration_years {
        None => "unbegrenzt".into(),
        Some(1) => "1 Jahr".into(),
        Some(n) => format!("{n} Jahre"),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_shared(
    start_capital: Money,
    cost_basis: Option<Money>,
    tax: &TaxConfig,
    basiszins: &BasiszinsTable,
    costs: &WithdrawalCosts,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if start_capital < Decimal::ZERO {
        issues.push(ValidationIssue::new(
            "start_capital",
            "Startkapital darf nicht negativ sein.",
        ));
    }
    if cost_basis.is_some_and(|b| b < Decimal::ZERO) {
        issues.push(ValidationIssue::new(
            "cost_basis",
            "Anschaffungskosten dürfen nicht negativ sein.",
        ));
    }
    issues.extend(tax.validate());
    issues.extend(basiszins.validate());
    issues.extend(costs.validate());
    issues
}

pub fn validate_withdrawal(input: &WithdrawalInput) -> Vec<ValidationIssue> {
    let mut issues = validate_shared(
        input.start_capital,
        input.cost_basis,
        &input.tax,
        &input.basiszins,
        &input.costs,
    );
    if input.end_year < input.start_year {
        issues.push(ValidationIssue::new(
            "end_year",
            "Ende der Entnahmephase liegt vor dem Beginn.",
        ));
    }
    issues.extend(input.strategy.validate("strategy"));
    issues.extend(validate_return_config(&input.returns, "returns"));
    if input.inflation.is_some_and(|i| i <= Decimal::NEGATIVE_ONE) {
        issues.push(ValidationIssue::new(
            "inflation",
            "Inflationsrate muss größer als -100% sein.",
        ));
    }
    if input
        .income_tax_rate
        .is_some_and(|r| r < Decimal::ZERO || r > Decimal::ONE)
    {
        issues.push(ValidationIssue::new(
            "income_tax_rate",
            "Wert muss zwischen 0 und 1 liegen.",
        ));
    }
    issues
}

pub fn validate_segmented_withdrawal(
    input: &SegmentedWithdrawalInput,
    expected_start: Option<Year>,
) -> Vec<ValidationIssue> {
    let mut issues = validate_shared(
        input.start_capital,
        input.cost_basis,
        &input.tax,
        &input.basiszins,
        &input.costs,
    );
    issues.extend(validate_segments(&input.segments, expected_start));
    issues
}

// ---------------------------------------------------------------------------
// Returns
// ---------------------------------------------------------------------------

/// Return sequence covering every segment, each generated from its own
/// model (random models seeded per segment).
pub fn segment_returns(segments: &[WithdrawalSegment]) -> EngineResult<ReturnSequence> {
    let mut returns = ReturnSequence::default();
    for segment in segments {
        returns.merge(generate_returns(
            &segment.return_config,
            segment.start_year,
            segment.end_year,
        )?);
    }
    Ok(returns)
}

/// Like [`segment_returns`] but every random draw comes from `rng`.
pub fn segment_returns_with_rng<R: Rng + ?Sized>(
    segments: &[WithdrawalSegment],
    rng: &mut R,
) -> EngineResult<ReturnSequence> {
    let mut returns = ReturnSequence::default();
    for segment in segments {
        returns.merge(generate_returns_with_rng(
            &segment.return_config,
            segment.start_year,
            segment.end_year,
            rng,
        )?);
    }
    Ok(returns)
}

// ---------------------------------------------------------------------------
// Core functions
// ---------------------------------------------------------------------------

/// Simulate a single-strategy withdrawal phase.
pub fn simulate_withdrawal(input: &WithdrawalInput) -> EngineResult<ComputationOutput<WithdrawalOutput>> {
    let start = Instant::now();
    EngineError::from_issues(validate_withdrawal(input))?;

    let segmented = input.to_segmented();
    let returns = segment_returns(&segmented.segments)?;
    let mut state = AccountState::new();
    let output = run_withdrawal(&segmented, &returns, &mut state)?;
    let warnings = depletion_warnings(&output);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Withdrawal phase (strategy amount, costs, realized-gain tax, Vorabpauschale, return)",
        &serde_json::json!({
            "strategy": input.strategy.label(),
            "start_year": input.start_year,
            "end_year": input.end_year,
            "start_capital": input.start_capital.to_string(),
            "inflation": input.inflation.map(|i| i.to_string()),
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Simulate a segmented withdrawal phase.
pub fn simulate_segmented_withdrawal(
    input: &SegmentedWithdrawalInput,
) -> EngineResult<ComputationOutput<WithdrawalOutput>> {
    let start = Instant::now();
    EngineError::from_issues(validate_segmented_withdrawal(input, None))?;

    let returns = segment_returns(&input.segments)?;
    let mut state = AccountState::new();
    let output = run_withdrawal(input, &returns, &mut state)?;
    let warnings = depletion_warnings(&output);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Segmented withdrawal phase (per-segment strategy, returns and inflation)",
        &serde_json::json!({
            "segments": input.segments.iter().map(|s| &s.id).collect::<Vec<_>>(),
            "start_capital": input.start_capital.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn depletion_warnings(output: &WithdrawalOutput) -> Vec<String> {
    output
        .depleted_in
        .map(|year| vec![format!("Kapital im Jahr {year} aufgebraucht")])
        .unwrap_or_default()
}

/// Withdrawal state machine over pre-generated returns and a caller-owned
/// tax state. Segments must already be validated.
///
/// Per year: strategy amount plus costs is withdrawn at the start of the
/// year (clamped to capital), the realized gain share is taxed, the
/// remaining holding earns the year's return and its Vorabpauschale is taxed.
/// Capital that reaches zero ends the run as `Depleted`.
pub fn run_withdrawal(
    input: &SegmentedWithdrawalInput,
    returns: &ReturnSequence,
    state: &mut AccountState,
) -> EngineResult<WithdrawalOutput> {
    let mut years: Vec<SimulationResult> = Vec::new();
    let mut capital = input.start_capital.max(Decimal::ZERO);
    let mut basis = input.cost_basis.unwrap_or(capital).max(Decimal::ZERO);
    let mut previous_return: Option<Rate> = None;
    let mut price_level = Decimal::ONE;
    let report_real = input.segments.iter().any(|s| s.inflation.is_some());
    let first_year = input.segments.first().map(|s| s.start_year).unwrap_or_default();
    let last_year = input.segments.last().map(|s| s.end_year).unwrap_or(first_year - 1);
    let mut depleted_in = None;
    let mut current: Option<usize> = None;
    let mut strategy_state = StrategyState::new(capital);
    let mut inflation_index = Decimal::ONE;

    for year in first_year..=last_year {
        // segments are validated contiguous, so every year has one
        let Some(index) = segment_index_for_year(&input.segments, year) else {
            continue;
        };
        let segment = &input.segments[index];
        let tax = input.tax.with_personal_rate(segment.income_tax_rate);
        let inflation = segment.inflation.unwrap_or(Decimal::ZERO);
        let expected_return = segment.return_config.expected_rate();
        if current == Some(index) {
            inflation_index *= Decimal::ONE + inflation;
        } else {
            current = Some(index);
            strategy_state = StrategyState::new(capital);
            inflation_index = Decimal::ONE;
        }
        price_level *= Decimal::ONE + inflation;
        let rate = returns.rate(year)?;

        let start_capital = capital;
        let gain_ratio = if capital > Decimal::ZERO {
            ((capital - basis) / capital).max(Decimal::ZERO)
        } else {
            Decimal::ZERO
        };
        let allowance = tax.freibetrag_for_year(year);
        let ctx = StrategyContext {
            capital,
            years_elapsed: (year - segment.start_year) as u32,
            previous_return,
            expected_return,
            inflation_index,
            gain_ratio,
            freibetrag_remaining: state.freibetrag.remaining(year, allowance),
            tax: &tax,
        };
        let desired = segment.strategy.amount(&ctx, &mut strategy_state);
        let costs_due = input.costs.for_year(year);
        let withdrawal = (desired + costs_due).min(capital).max(Decimal::ZERO);
        let costs = costs_due.min(withdrawal);

        if capital > Decimal::ZERO && basis > Decimal::ZERO {
            basis -= basis * withdrawal / capital;
        }
        let sale = compute_tax(withdrawal * gain_ratio, year, &tax, state);

        let remaining = capital - withdrawal;
        let grown = remaining * (Decimal::ONE + rate);
        let vorab = calculate_vorabpauschale(
            remaining,
            grown,
            input.basiszins.rate_for_year(year),
            12,
            year,
            &tax,
            state,
        );
        basis += vorab.vorabpauschale;

        let interest_earned = grown - remaining;
        let mut tax_paid = sale.tax_owed + vorab.tax_owed;
        let tax_reduces = segment.steuer_reduziert_endkapital;
        let mut end_capital = if tax_reduces { grown - tax_paid } else { grown };
        if tax_reduces && end_capital < Decimal::ZERO {
            // the portfolio cannot pay more tax than it holds
            tax_paid = grown;
            end_capital = Decimal::ZERO;
        }

        let depleted = end_capital <= Decimal::ZERO;
        let status = if depleted {
            PhaseStatus::Depleted
        } else if year == last_year {
            PhaseStatus::Completed
        } else {
            PhaseStatus::Active
        };

        years.push(SimulationResult {
            year,
            phase: Phase::Withdrawal,
            start_capital,
            contribution: Decimal::ZERO,
            withdrawal,
            costs,
            interest_earned,
            tax_paid,
            vorabpauschale_details: Some(vorab),
            end_capital,
            end_capital_real: report_real.then(|| end_capital / price_level),
            return_rate: rate,
            status,
            tax_reduces_capital: tax_reduces,
            segment_id: Some(segment.id.clone()),
        });

        previous_return = Some(rate);
        capital = end_capital;
        if depleted {
            log::warn!("capital depleted in {year} (segment '{}')", segment.id);
            depleted_in = Some(year);
            break;
        }
    }

    let duration_years = depleted_in.map(|y| (y - first_year + 1) as u32);
    let total_withdrawn = years.iter().map(|r| r.withdrawal).sum();
    let total_costs = years.iter().map(|r| r.costs).sum();
    let total_tax_paid = years.iter().map(|r| r.tax_paid).sum();
    log::debug!(
        "withdrawal {first_year}-{last_year}: {} years, final capital {}",
        years.len(),
        capital.round_dp(2)
    );

    Ok(WithdrawalOutput {
        years,
        final_capital: capital,
        total_withdrawn,
        total_costs,
        total_tax_paid,
        depleted_in,
        duration_years,
        duration_label: duration_label(duration_years),
    })
}
