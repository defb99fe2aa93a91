use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ValidationIssue;
use crate::math::compound;
use crate::tax::VorabpauschaleDetails;
use crate::types::{Granularity, Money, Rate, Year};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A recurring savings plan (Sparplan) or, when `start == end`, a one-time
/// payment (Einmalzahlung).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsPlan {
    pub id: String,
    pub start: NaiveDate,
    #[serde(default)]
    pub end: Option<NaiveDate>,
    /// Yearly amount for recurring plans, the full amount for one-time payments.
    pub annual_amount: Money,
    /// Total expense ratio, subtracted from the annual return.
    #[serde(default)]
    pub ter: Option<Rate>,
    #[serde(default)]
    pub transaction_cost_percent: Option<Rate>,
    /// Fixed cost per execution.
    #[serde(default)]
    pub transaction_cost_absolute: Option<Money>,
    /// Contributions grow with the accumulation inflation rate from the
    /// plan's start year.
    #[serde(default)]
    pub inflation_adjusted: bool,
}

/// Result of one element for one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementYearResult {
    pub start_capital: Money,
    pub contribution: Money,
    pub costs: Money,
    pub interest_earned: Money,
    pub tax_paid: Money,
    pub vorabpauschale_details: VorabpauschaleDetails,
    pub end_capital: Money,
}

/// One contribution event on the calendar with its own capital trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationElement {
    pub id: String,
    pub plan_id: String,
    pub date: NaiveDate,
    pub gross_amount: Money,
    pub costs: Money,
    /// Amount actually invested.
    pub net_amount: Money,
    pub ter: Rate,
    /// Months the contribution is invested in its first year.
    pub first_year_months: u32,
    pub capital: Money,
    /// Acquisition cost plus taxed Vorabpauschalen.
    pub cost_basis: Money,
    pub results: BTreeMap<Year, ElementYearResult>,
}

impl SavingsPlan {
    pub fn is_one_time(&self) -> bool {
        self.end == Some(self.start)
    }

    fn costs_for(&self, amount: Money) -> Money {
        let pct = self.transaction_cost_percent.unwrap_or(Decimal::ZERO);
        let abs = self.transaction_cost_absolute.unwrap_or(Decimal::ZERO);
        (amount * pct + abs).min(amount).max(Decimal::ZERO)
    }

    fn element(&self, id: String, date: NaiveDate, amount: Money, first_year_months: u32) -> SimulationElement {
        let costs = self.costs_for(amount);
        SimulationElement {
            id,
            plan_id: self.id.clone(),
            date,
            gross_amount: amount,
            costs,
            net_amount: amount - costs,
            ter: self.ter.unwrap_or(Decimal::ZERO),
            first_year_months,
            capital: Decimal::ZERO,
            cost_basis: Decimal::ZERO,
            results: BTreeMap::new(),
        }
    }

    fn inflation_factor(&self, year: Year, inflation: Rate) -> Decimal {
        if !self.inflation_adjusted {
            return Decimal::ONE;
        }
        let years = (year - self.start.year()).max(0) as u32;
        compound(inflation, years)
    }

    /// Collect configuration problems for the plan at `index`.
    pub fn validate(&self, index: usize) -> Vec<ValidationIssue> {
        let field = |name: &str| format!("plans[{index}].{name}");
        let mut issues = Vec::new();
        if self.id.trim().is_empty() {
            issues.push(ValidationIssue::new(field("id"), "Sparplan braucht eine ID."));
        }
        if let Some(end) = self.end {
            if end < self.start {
                issues.push(ValidationIssue::new(
                    field("end"),
                    "Enddatum liegt vor dem Startdatum.",
                ));
            }
        }
        if self.annual_amount < Decimal::ZERO {
            issues.push(ValidationIssue::new(
                field("annual_amount"),
                "Betrag darf nicht negativ sein.",
            ));
        }
        if let Some(ter) = self.ter {
            if ter < Decimal::ZERO || ter > dec!(0.1) {
                issues.push(ValidationIssue::new(
                    field("ter"),
                    "TER muss zwischen 0 und 0.1 liegen.",
                ));
            }
        }
        if let Some(pct) = self.transaction_cost_percent {
            if pct < Decimal::ZERO || pct > Decimal::ONE {
                issues.push(ValidationIssue::new(
                    field("transaction_cost_percent"),
                    "Transaktionskosten müssen zwischen 0 und 1 liegen.",
                ));
            }
        }
        if self.transaction_cost_absolute.is_some_and(|c| c < Decimal::ZERO) {
            issues.push(ValidationIssue::new(
                field("transaction_cost_absolute"),
                "Transaktionskosten dürfen nicht negativ sein.",
            ));
        }
        issues
    }
}

// ---------------------------------------------------------------------------
// Expansion
// ---------------------------------------------------------------------------

/// Expand plans into contribution events inside `[start_year, end_year]`,
/// ordered by date (ties keep plan order).
///
/// Yearly: one event per plan and year on January 1 worth
/// `annual_amount * active_months / 12`, invested the whole year.
/// Monthly: one event per active month on its first day worth
/// `annual_amount / 12`, invested `13 - month` months in its first year.
/// One-time payments before `start_year` are credited on January 1 of
/// `start_year`.
pub fn expand_plans(
    plans: &[SavingsPlan],
    start_year: Year,
    end_year: Year,
    granularity: Granularity,
    inflation_rate: Rate,
) -> Vec<SimulationElement> {
    let mut elements = Vec::new();
    for plan in plans {
        if plan.annual_amount.is_zero() {
            continue;
        }
        if plan.is_one_time() {
            expand_one_time(plan, start_year, end_year, granularity, &mut elements);
            continue;
        }
        let first = plan.start.year().max(start_year);
        let last = plan.end.map(|e| e.year()).unwrap_or(end_year).min(end_year);
        for year in first..=last {
            let from_month = if year == plan.start.year() { plan.start.month() } else { 1 };
            let to_month = match plan.end {
                Some(end) if end.year() == year => end.month(),
                _ => 12,
            };
            if to_month < from_month {
                continue;
            }
            let factor = plan.inflation_factor(year, inflation_rate);
            match granularity {
                Granularity::Yearly => {
                    let months = to_month - from_month + 1;
                    let amount = plan.annual_amount * Decimal::from(months) / dec!(12) * factor;
                    if let Some(date) = NaiveDate::from_ymd_opt(year, 1, 1) {
                        elements.push(plan.element(format!("{}-{year}", plan.id), date, amount, 12));
                    }
                }
                Granularity::Monthly => {
                    let amount = plan.annual_amount / dec!(12) * factor;
                    for month in from_month..=to_month {
                        if let Some(date) = NaiveDate::from_ymd_opt(year, month, 1) {
                            elements.push(plan.element(
                                format!("{}-{year}-{month:02}", plan.id),
                                date,
                                amount,
                                13 - month,
                            ));
                        }
                    }
                }
            }
        }
    }
    // stable: same-date events stay in plan order
    elements.sort_by_key(|e| e.date);
    elements
}

fn expand_one_time(
    plan: &SavingsPlan,
    start_year: Year,
    end_year: Year,
    granularity: Granularity,
    out: &mut Vec<SimulationElement>,
) {
    if plan.start.year() > end_year {
        return;
    }
    let (date, months) = if plan.start.year() < start_year {
        match NaiveDate::from_ymd_opt(start_year, 1, 1) {
            Some(d) => (d, 12),
            None => return,
        }
    } else {
        match granularity {
            Granularity::Yearly => match NaiveDate::from_ymd_opt(plan.start.year(), 1, 1) {
                Some(d) => (d, 12),
                None => return,
            },
            Granularity::Monthly => (plan.start, 13 - plan.start.month()),
        }
    };
    out.push(plan.element(plan.id.clone(), date, plan.annual_amount, months));
}
