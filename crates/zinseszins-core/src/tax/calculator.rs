use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::basiszins::BasiszinsTable;
use super::capital_gains::{compute_tax, TaxComputation};
use super::config::TaxConfig;
use super::ledger::AccountState;
use super::vorabpauschale::{calculate_vorabpauschale, VorabpauschaleDetails};
use crate::error::{EngineError, ValidationIssue};
use crate::types::{with_metadata, ComputationOutput, Money, Rate, Year};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A single realized gain to be taxed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxInput {
    pub gain: Money,
    pub year: Year,
    #[serde(default)]
    pub tax: TaxConfig,
    /// Other taxable income in `year`.
    #[serde(default)]
    pub other_income: Option<Money>,
}

/// One holding of an accumulating fund over (part of) a year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VorabpauschaleInput {
    pub start_value: Money,
    pub end_value: Money,
    pub year: Year,
    #[serde(default = "full_year")]
    pub months_held: u32,
    /// Explicit Basiszins; looked up in `basiszins_table` when absent.
    #[serde(default)]
    pub basiszins: Option<Rate>,
    #[serde(default)]
    pub basiszins_table: BasiszinsTable,
    #[serde(default)]
    pub tax: TaxConfig,
}

fn full_year() -> u32 {
    12
}

// ---------------------------------------------------------------------------
// Core functions
// ---------------------------------------------------------------------------

pub fn calculate_tax(input: &TaxInput) -> EngineResult<ComputationOutput<TaxComputation>> {
    let start = Instant::now();
    let mut issues = input.tax.validate();
    if input.other_income.is_some_and(|i| i < Decimal::ZERO) {
        issues.push(ValidationIssue::new(
            "other_income",
            "Einkommen darf nicht negativ sein.",
        ));
    }
    EngineError::from_issues(issues)?;

    let mut state = AccountState::new();
    if let Some(income) = input.other_income {
        state.other_income.insert(input.year, income);
    }
    let result = compute_tax(input.gain, input.year, &input.tax, &mut state);

    let mut warnings = Vec::new();
    if input.gain < Decimal::ZERO {
        warnings.push("Verluste werden nicht verrechnet".to_string());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "German capital gains tax (Teilfreistellung, Sparerpauschbetrag, Abgeltungsteuer)",
        &serde_json::json!({
            "year": input.year,
            "capital_gains_tax_rate": input.tax.capital_gains_tax_rate.to_string(),
            "teilfreistellungsquote": input.tax.teilfreistellungsquote.to_string(),
            "freibetrag": input.tax.freibetrag_for_year(input.year).to_string(),
        }),
        warnings,
        elapsed,
        result,
    ))
}

pub fn compute_vorabpauschale(
    input: &VorabpauschaleInput,
) -> EngineResult<ComputationOutput<VorabpauschaleDetails>> {
    let start = Instant::now();
    let mut issues = input.tax.validate();
    issues.extend(input.basiszins_table.validate());
    if input.months_held == 0 || input.months_held > 12 {
        issues.push(ValidationIssue::new(
            "months_held",
            "Haltedauer muss zwischen 1 und 12 Monaten liegen.",
        ));
    }
    if input.start_value < Decimal::ZERO {
        issues.push(ValidationIssue::new(
            "start_value",
            "Wert darf nicht negativ sein.",
        ));
    }
    EngineError::from_issues(issues)?;

    let basiszins = input
        .basiszins
        .unwrap_or_else(|| input.basiszins_table.rate_for_year(input.year));
    let mut state = AccountState::new();
    let result = calculate_vorabpauschale(
        input.start_value,
        input.end_value,
        basiszins,
        input.months_held,
        input.year,
        &input.tax,
        &mut state,
    );

    let mut warnings = Vec::new();
    if basiszins <= Decimal::ZERO {
        warnings.push(format!("Basiszins {} nicht positiv: keine Vorabpauschale", input.year));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Vorabpauschale (Basiszins x 0.7, capped at actual gain, pro rata by months)",
        &serde_json::json!({
            "year": input.year,
            "basiszins": basiszins.to_string(),
            "months_held": input.months_held,
        }),
        warnings,
        elapsed,
        result,
    ))
}
