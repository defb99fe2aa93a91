use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationIssue;
use crate::math::compound;
use crate::types::{Money, Rate, Year};

/// A recurring cost paid out of the portfolio during the withdrawal phase
/// (insurance premiums, fixed living costs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostSchedule {
    pub name: String,
    pub start_year: Year,
    /// Last year the cost is paid; open-ended when absent.
    #[serde(default)]
    pub end_year: Option<Year>,
    /// Amount in the start year.
    pub annual_amount: Money,
    #[serde(default)]
    pub inflation_rate: Rate,
}

impl CostSchedule {
    pub fn is_active(&self, year: Year) -> bool {
        year >= self.start_year && self.end_year.map_or(true, |end| year <= end)
    }

    /// Cost for `year`, grown geometrically from the start year.
    pub fn amount_for_year(&self, year: Year) -> Money {
        if !self.is_active(year) {
            return Decimal::ZERO;
        }
        self.annual_amount * compound(self.inflation_rate, (year - self.start_year) as u32)
    }

    pub fn validate(&self, field: &str) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.annual_amount < Decimal::ZERO {
            issues.push(ValidationIssue::new(
                format!("{field}.annual_amount"),
                "Kosten dürfen nicht negativ sein.",
            ));
        }
        if self.end_year.is_some_and(|end| end < self.start_year) {
            issues.push(ValidationIssue::new(
                format!("{field}.end_year"),
                "Endjahr liegt vor dem Startjahr.",
            ));
        }
        if self.inflation_rate <= Decimal::NEGATIVE_ONE {
            issues.push(ValidationIssue::new(
                format!("{field}.inflation_rate"),
                "Inflationsrate muss größer als -100% sein.",
            ));
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn premium() -> CostSchedule {
        CostSchedule {
            name: "Krankenversicherung".into(),
            start_year: 2040,
            end_year: Some(2045),
            annual_amount: dec!(3000),
            inflation_rate: dec!(0.03),
        }
    }

    #[test]
    fn test_amount_inflates_from_start() {
        let c = premium();
        assert_eq!(c.amount_for_year(2040), dec!(3000));
        assert_eq!(c.amount_for_year(2042), dec!(3182.7));
    }

    #[test]
    fn test_inactive_outside_range() {
        let c = premium();
        assert_eq!(c.amount_for_year(2039), Decimal::ZERO);
        assert_eq!(c.amount_for_year(2046), Decimal::ZERO);
        let open = CostSchedule {
            end_year: None,
            ..premium()
        };
        assert!(open.amount_for_year(2090) > Decimal::ZERO);
    }

    #[test]
    fn test_validate_reversed_range() {
        let c = CostSchedule {
            end_year: Some(2030),
            ..premium()
        };
        let issues = c.validate("costs[0]");
        assert_eq!(issues[0].field, "costs[0].end_year");
    }
}
