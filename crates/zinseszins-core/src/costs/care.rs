use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::{EngineError, ValidationIssue};
use crate::math::compound;
use crate::types::{with_metadata, ComputationOutput, Money, Rate, Year};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Long-term care costs (Pflegekosten) for one person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareCostConfig {
    pub start_year: Year,
    #[serde(default)]
    pub end_year: Option<Year>,
    /// Pflegegrad 1 to 5.
    pub care_level: u8,
    /// Monthly cost in the start year; the typical cost of the level when
    /// absent.
    #[serde(default)]
    pub monthly_cost: Option<Money>,
    #[serde(default)]
    pub inflation_rate: Rate,
    /// Monthly statutory Pflegegeld; the statutory amount of the level when
    /// absent.
    #[serde(default)]
    pub statutory_benefits: Option<Money>,
    /// Monthly benefit of a private care insurance.
    #[serde(default)]
    pub private_monthly_benefit: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareCostYear {
    pub year: Year,
    pub gross_cost: Money,
    pub statutory_benefit: Money,
    pub private_benefit: Money,
    pub net_cost: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareCostInput {
    pub care: CareCostConfig,
    /// Projection horizon; capped by the config's own end year.
    pub start_year: Year,
    pub end_year: Year,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareCostOutput {
    pub years: Vec<CareCostYear>,
    pub total_gross_cost: Money,
    pub total_benefits: Money,
    pub total_net_cost: Money,
}

/// Monthly Pflegegeld by care level (§ 37 SGB XI, 2024).
pub fn statutory_benefit_for_level(level: u8) -> Money {
    match level {
        2 => dec!(332),
        3 => dec!(573),
        4 => dec!(765),
        5 => dec!(947),
        _ => Decimal::ZERO,
    }
}

/// Typical monthly cost of care by level.
pub fn typical_monthly_cost(level: u8) -> Money {
    match level {
        1 => dec!(300),
        2 => dec!(1200),
        3 => dec!(2000),
        4 => dec!(3000),
        5 => dec!(3500),
        _ => Decimal::ZERO,
    }
}

impl CareCostConfig {
    pub fn is_active(&self, year: Year) -> bool {
        year >= self.start_year && self.end_year.map_or(true, |end| year <= end)
    }

    pub fn for_year(&self, year: Year) -> CareCostYear {
        if !self.is_active(year) {
            return CareCostYear {
                year,
                gross_cost: Decimal::ZERO,
                statutory_benefit: Decimal::ZERO,
                private_benefit: Decimal::ZERO,
                net_cost: Decimal::ZERO,
            };
        }
        let monthly = self
            .monthly_cost
            .unwrap_or_else(|| typical_monthly_cost(self.care_level));
        let growth = compound(self.inflation_rate, (year - self.start_year) as u32);
        let gross_cost = monthly * dec!(12) * growth;
        let statutory_benefit = self
            .statutory_benefits
            .unwrap_or_else(|| statutory_benefit_for_level(self.care_level))
            * dec!(12);
        let private_benefit = self.private_monthly_benefit * dec!(12);
        let net_cost = (gross_cost - statutory_benefit - private_benefit).max(Decimal::ZERO);
        CareCostYear {
            year,
            gross_cost,
            statutory_benefit,
            private_benefit,
            net_cost,
        }
    }

    /// Net cost the portfolio has to cover in `year`.
    pub fn net_cost_for_year(&self, year: Year) -> Money {
        self.for_year(year).net_cost
    }

    pub fn validate(&self, field: &str) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if !(1..=5).contains(&self.care_level) {
            issues.push(ValidationIssue::new(
                format!("{field}.care_level"),
                "Pflegegrad muss zwischen 1 und 5 liegen.",
            ));
        }
        if self.monthly_cost.is_some_and(|c| c < Decimal::ZERO) {
            issues.push(ValidationIssue::new(
                format!("{field}.monthly_cost"),
                "Monatliche Kosten dürfen nicht negativ sein.",
            ));
        }
        if self.statutory_benefits.is_some_and(|b| b < Decimal::ZERO) {
            issues.push(ValidationIssue::new(
                format!("{field}.statutory_benefits"),
                "Leistungen dürfen nicht negativ sein.",
            ));
        }
        if self.private_monthly_benefit < Decimal::ZERO {
            issues.push(ValidationIssue::new(
                format!("{field}.private_monthly_benefit"),
                "Leistungen dürfen nicht negativ sein.",
            ));
        }
        if self.inflation_rate < dec!(-0.1) || self.inflation_rate > dec!(0.2) {
            issues.push(ValidationIssue::new(
                format!("{field}.inflation_rate"),
                "Kostensteigerung muss zwischen -10% und 20% liegen.",
            ));
        }
        if self.end_year.is_some_and(|end| end < self.start_year) {
            issues.push(ValidationIssue::new(
                format!("{field}.end_year"),
                "Endjahr liegt vor dem Startjahr.",
            ));
        }
        issues
    }
}

// ---------------------------------------------------------------------------
// Core function
// ---------------------------------------------------------------------------

/// Year-by-year care cost projection.
pub fn simulate_care_costs(input: &CareCostInput) -> EngineResult<ComputationOutput<CareCostOutput>> {
    let start = Instant::now();
    let mut issues = input.care.validate("care");
    if input.end_year < input.start_year {
        issues.push(ValidationIssue::new("end_year", "Endjahr liegt vor dem Startjahr."));
    }
    EngineError::from_issues(issues)?;

    let mut warnings = Vec::new();
    if input.care.monthly_cost.is_none() {
        warnings.push(format!(
            "Typische Kosten für Pflegegrad {} angenommen",
            input.care.care_level
        ));
    }

    let years: Vec<CareCostYear> = (input.start_year..=input.end_year)
        .map(|y| input.care.for_year(y))
        .collect();
    let total_gross_cost = years.iter().map(|y| y.gross_cost).sum();
    let total_benefits = years
        .iter()
        .map(|y| y.statutory_benefit + y.private_benefit)
        .sum();
    let total_net_cost = years.iter().map(|y| y.net_cost).sum();

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Care cost projection (gross cost less statutory and private benefits)",
        &serde_json::json!({
            "care_level": input.care.care_level,
            "inflation_rate": input.care.inflation_rate.to_string(),
        }),
        warnings,
        elapsed,
        CareCostOutput {
            years,
            total_gross_cost,
            total_benefits,
            total_net_cost,
        },
    ))
}
