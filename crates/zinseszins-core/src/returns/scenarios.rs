use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{format_percent, Rate, Year};

/// z-score of the 95th percentile of the standard normal distribution.
pub const Z_95: Decimal = dec!(1.645);
/// z-score of the 75th percentile of the standard normal distribution.
pub const Z_75: Decimal = dec!(0.674);

/// One of the five canonical return scenarios shown next to a Monte Carlo
/// projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileScenario {
    pub percentile: u8,
    pub label: String,
    pub z_score: Decimal,
    pub return_rate: Rate,
    pub description: String,
}

/// Input for percentile scenario generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioInput {
    pub average_return: Rate,
    pub standard_deviation: Rate,
}

/// Build the 5/25/50/75/95 percentile scenarios of a Normal return model.
pub fn create_scenarios(input: &ScenarioInput) -> Vec<PercentileScenario> {
    let avg = input.average_return;
    let sd = input.standard_deviation;
    let levels: [(u8, &str, Decimal); 5] = [
        (5, "Worst Case (5% Perzentil)", -Z_95),
        (25, "Pessimistisch (25% Perzentil)", -Z_75),
        (50, "Median (50% Perzentil)", Decimal::ZERO),
        (75, "Optimistisch (75% Perzentil)", Z_75),
        (95, "Best Case (95% Perzentil)", Z_95),
    ];

    levels.iter()
        .map(|(percentile, label, z)| {
            let return_rate = avg + *z * sd;
            PercentileScenario {
                percentile: *percentile,
                label: (*label).to_string(),
                z_score: *z,
                return_rate,
                description: format!(
                    "{label}: {} Rendite p.a.",
                    format_percent(return_rate)
                ),
            }
        })
        .collect()
}

/// Summary of a black swan override map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackSwanSummary {
    pub cumulative_return: Rate,
    pub years: u32,
    pub first_year: Year,
    pub last_year: Year,
    pub label: String,
}

/// Compounded return ∏(1 + rᵢ) - 1 over all override years; `None` for an
/// absent or empty map.
pub fn cumulative_black_swan_return(overrides: Option<&BTreeMap<Year, Rate>>) -> Option<Rate> {
    let map = overrides?;
    if map.is_empty() {
        return None;
    }
    let product = map
        .values()
        .fold(Decimal::ONE, |acc, r| acc * (Decimal::ONE + r));
    Some(product - Decimal::ONE)
}

pub fn describe_black_swan(overrides: Option<&BTreeMap<Year, Rate>>) -> Option<BlackSwanSummary> {
    let cumulative_return = cumulative_black_swan_return(overrides)?;
    let map = overrides?;
    let first_year = *map.keys().next()?;
    let last_year = *map.keys().next_back()?;
    let years = map.len() as u32;
    let duration = if years == 1 {
        "1 Jahr".to_string()
    } else {
        format!("{years} Jahre")
    };
    let range = if first_year == last_year {
        first_year.to_string()
    } else {
        format!("{first_year}-{last_year}")
    };
    Some(BlackSwanSummary {
        cumulative_return,
        years,
        first_year,
        last_year,
        label: format!(
            "{duration} ({range}), kumulierter Verlust {}",
            format_percent(cumulative_return)
        ),
    })
}
