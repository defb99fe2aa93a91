use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::tax::VorabpauschaleDetails;
use crate::types::{Money, Phase, PhaseStatus, Rate, Year};

/// One simulated year, in either phase.
///
/// `end_capital == start_capital + contribution - withdrawal + interest_earned
/// - tax_paid` when `tax_reduces_capital` is set; otherwise tax is settled
/// outside the portfolio and the last term is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub year: Year,
    pub phase: Phase,
    pub start_capital: Money,
    /// Net contribution after transaction costs.
    pub contribution: Money,
    /// Total outflow from the portfolio, including `costs` in the withdrawal
    /// phase.
    pub withdrawal: Money,
    /// Transaction costs (accumulation) or care/insurance/fixed costs
    /// (withdrawal).
    pub costs: Money,
    pub interest_earned: Money,
    pub tax_paid: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vorabpauschale_details: Option<VorabpauschaleDetails>,
    pub end_capital: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_capital_real: Option<Money>,
    pub return_rate: Rate,
    pub status: PhaseStatus,
    pub tax_reduces_capital: bool,
    /// Withdrawal segment that drove this year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_id: Option<String>,
}

impl SimulationResult {
    pub fn empty(year: Year, phase: Phase, return_rate: Rate) -> Self {
        Self {
            year,
            phase,
            start_capital: Decimal::ZERO,
            contribution: Decimal::ZERO,
            withdrawal: Decimal::ZERO,
            costs: Decimal::ZERO,
            interest_earned: Decimal::ZERO,
            tax_paid: Decimal::ZERO,
            vorabpauschale_details: None,
            end_capital: Decimal::ZERO,
            end_capital_real: None,
            return_rate,
            status: PhaseStatus::Active,
            tax_reduces_capital: true,
            segment_id: None,
        }
    }

    /// End capital implied by the flows of the year.
    pub fn expected_end_capital(&self) -> Money {
        let base = self.start_capital + self.contribution - self.withdrawal + self.interest_earned;
        if self.tax_reduces_capital {
            base - self.tax_paid
        } else {
            base
        }
    }
}
