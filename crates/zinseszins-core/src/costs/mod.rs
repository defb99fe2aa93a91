pub mod care;
pub mod other;

use serde::{Deserialize, Serialize};

pub use care::{simulate_care_costs, CareCostConfig, CareCostInput, CareCostOutput, CareCostYear};
pub use other::CostSchedule;

use crate::error::ValidationIssue;
use crate::types::{Money, Year};

/// Costs paid out of the portfolio during the withdrawal phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalCosts {
    #[serde(default)]
    pub schedules: Vec<CostSchedule>,
    #[serde(default)]
    pub care: Option<CareCostConfig>,
}

impl WithdrawalCosts {
    pub fn for_year(&self, year: Year) -> Money {
        let fixed: Money = self.schedules.iter().map(|c| c.amount_for_year(year)).sum();
        let care = self
            .care
            .as_ref()
            .map(|c| c.net_cost_for_year(year))
            .unwrap_or_default();
        fixed + care
    }

    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues: Vec<ValidationIssue> = self
            .schedules
            .iter()
            .enumerate()
            .flat_map(|(i, c)| c.validate(&format!("costs.schedules[{i}]")))
            .collect();
        if let Some(care) = &self.care {
            issues.extend(care.validate("costs.care"));
        }
        issues
    }
}
