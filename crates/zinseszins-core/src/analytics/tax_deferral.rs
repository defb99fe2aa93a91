use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::{EngineError, ValidationIssue};
use crate::tax::{calculate_vorabpauschale, compute_tax, AccountState, BasiszinsTable, TaxConfig};
use crate::types::{with_metadata, ComputationOutput, Money, Rate, Year};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxDeferralInput {
    pub initial_investment: Money,
    pub annual_return: Rate,
    pub start_year: Year,
    /// Holding period; the fund is sold at the end of the last year.
    pub years: u32,
    #[serde(default)]
    pub tax: TaxConfig,
    #[serde(default)]
    pub basiszins: BasiszinsTable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxDeferralYear {
    pub year: Year,
    /// Accumulating fund value after the Vorabpauschale tax.
    pub accumulating_value: Money,
    pub accumulating_tax: Money,
    /// Value when the full gain is taxed every year.
    pub annual_value: Money,
    pub annual_tax: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxDeferralOutput {
    pub years: Vec<TaxDeferralYear>,
    pub accumulating_value_before_sale: Money,
    pub sale_tax: Money,
    /// Accumulating fund after selling and paying the remaining gain tax.
    pub accumulating_net: Money,
    pub accumulating_total_tax: Money,
    pub annual_net: Money,
    pub annual_total_tax: Money,
    /// `accumulating_net - annual_net`.
    pub deferral_advantage: Money,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Longest horizon the analysis accepts.
pub const MAX_YEARS: u32 = 200;

pub fn validate_tax_deferral(input: &TaxDeferralInput) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if input.initial_investment <= Decimal::ZERO {
        issues.push(ValidationIssue::new(
            "initial_investment",
            "Anlagebetrag muss positiv sein.",
        ));
    }
    if input.annual_return <= Decimal::NEGATIVE_ONE {
        issues.push(ValidationIssue::new(
            "annual_return",
            "Rendite muss größer als -100% sein.",
        ));
    }
    if input.years == 0 {
        issues.push(ValidationIssue::new("years", "Anlagedauer muss mindestens 1 Jahr sein."));
    } else if input.years > MAX_YEARS {
        issues.push(ValidationIssue::new(
            "years",
            format!("Anlagedauer darf höchstens {MAX_YEARS} Jahre betragen."),
        ));
    }
    issues.extend(input.tax.validate());
    issues.extend(input.basiszins.validate());
    issues
}

// ---------------------------------------------------------------------------
// Core function
// ---------------------------------------------------------------------------

/// Compare an accumulating fund (yearly Vorabpauschale, remaining gain taxed
/// at sale) with taxing the whole gain every year. Both variants pay their
/// taxes out of the investment and get their own allowance ledger.
pub fn analyze_tax_deferral(input: &TaxDeferralInput) -> EngineResult<ComputationOutput<TaxDeferralOutput>> {
    let start = Instant::now();
    EngineError::from_issues(validate_tax_deferral(input))?;

    let tax = &input.tax;
    let growth = Decimal::ONE + input.annual_return;
    // bounded by MAX_YEARS
    let last_year = input.start_year + input.years as Year - 1;

    let mut acc_state = AccountState::new();
    let mut acc_value = input.initial_investment;
    let mut acc_basis = input.initial_investment;
    let mut acc_tax_total = Decimal::ZERO;

    let mut ann_state = AccountState::new();
    let mut ann_value = input.initial_investment;
    let mut ann_tax_total = Decimal::ZERO;

    let mut years = Vec::with_capacity(input.years as usize);
    for year in input.start_year..=last_year {
        let grown = acc_value * growth;
        let vorab = calculate_vorabpauschale(
            acc_value,
            grown,
            input.basiszins.rate_for_year(year),
            12,
            year,
            tax,
            &mut acc_state,
        );
        acc_basis += vorab.vorabpauschale;
        acc_value = grown - vorab.tax_owed;
        acc_tax_total += vorab.tax_owed;

        let gain = ann_value * input.annual_return;
        let ann_tax = compute_tax(gain, year, tax, &mut ann_state).tax_owed;
        ann_value = ann_value + gain - ann_tax;
        ann_tax_total += ann_tax;

        years.push(TaxDeferralYear {
            year,
            accumulating_value: acc_value,
            accumulating_tax: vorab.tax_owed,
            annual_value: ann_value,
            annual_tax: ann_tax,
        });
    }

    let sale_tax = compute_tax(acc_value - acc_basis, last_year, tax, &mut acc_state).tax_owed;
    let accumulating_net = acc_value - sale_tax;
    acc_tax_total += sale_tax;

    let mut warnings = Vec::new();
    if input.annual_return < Decimal::ZERO {
        warnings.push("Negative Rendite: es fällt keine Steuer an".to_string());
    }

    let output = TaxDeferralOutput {
        years,
        accumulating_value_before_sale: acc_value,
        sale_tax,
        accumulating_net,
        accumulating_total_tax: acc_tax_total,
        annual_net: ann_value,
        annual_total_tax: ann_tax_total,
        deferral_advantage: accumulating_net - ann_value,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Tax deferral: accumulating fund with Vorabpauschale vs. annual taxation",
        &serde_json::json!({
            "initial_investment": input.initial_investment.to_string(),
            "annual_return": input.annual_return.to_string(),
            "start_year": input.start_year,
            "years": input.years,
        }),
        warnings,
        elapsed,
        output,
    ))
}
