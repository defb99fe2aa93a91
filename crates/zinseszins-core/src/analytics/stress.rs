use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::{EngineError, ValidationIssue};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Whether the scenario replays a real crash or is hypothetical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    Historical,
    Hypothetical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

/// A one-off loss applied to the whole portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressScenario {
    pub id: String,
    pub name: String,
    pub kind: ScenarioKind,
    /// Peak-to-trough loss as a fraction (0.37 = 37%).
    pub loss_percent: Rate,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressTestInput {
    pub portfolio_value: Money,
    /// Built-in scenarios when absent.
    #[serde(default)]
    pub scenarios: Option<Vec<StressScenario>>,
    /// Annual return assumed for the recovery estimate.
    #[serde(default = "default_recovery_return")]
    pub expected_return: Rate,
}

fn default_recovery_return() -> Rate {
    dec!(0.07)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioImpact {
    pub id: String,
    pub name: String,
    pub kind: ScenarioKind,
    pub loss_percent: Rate,
    pub stressed_value: Money,
    pub absolute_loss: Money,
    pub severity: Severity,
    /// Years to regain the pre-crash value; `None` when it never recovers at
    /// the expected return.
    pub recovery_years: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressTestOutput {
    pub results: Vec<ScenarioImpact>,
    pub worst_case: ScenarioImpact,
    pub average_loss: Money,
}

// ---------------------------------------------------------------------------
// Built-in scenarios
// ---------------------------------------------------------------------------

fn scenario(id: &str, name: &str, kind: ScenarioKind, loss: Rate, description: &str) -> StressScenario {
    StressScenario {
        id: id.into(),
        name: name.into(),
        kind,
        loss_percent: loss,
        description: description.into(),
    }
}

/// Five historical crashes and three hypothetical shocks.
pub fn predefined_scenarios() -> Vec<StressScenario> {
    use ScenarioKind::{Historical, Hypothetical};
    vec![
        scenario(
            "black-monday-1987",
            "Schwarzer Montag 1987",
            Historical,
            dec!(0.22),
            "Eintägiger Kurssturz an den Weltbörsen",
        ),
        scenario(
            "dotcom-2000",
            "Dotcom-Crash 2000-2003",
            Historical,
            dec!(0.49),
            "Platzen der Technologieblase",
        ),
        scenario(
            "financial-crisis-2008",
            "Finanzkrise 2008",
            Historical,
            dec!(0.37),
            "Globale Banken- und Finanzkrise",
        ),
        scenario(
            "euro-crisis-2011",
            "Euro-Krise 2011",
            Historical,
            dec!(0.22),
            "Staatsschuldenkrise im Euroraum",
        ),
        scenario(
            "covid-2020",
            "Corona-Crash 2020",
            Historical,
            dec!(0.34),
            "Pandemiebedingter Einbruch im Frühjahr 2020",
        ),
        scenario(
            "moderate-correction",
            "Moderate Korrektur",
            Hypothetical,
            dec!(0.10),
            "Übliche Marktkorrektur",
        ),
        scenario(
            "severe-recession",
            "Schwere Rezession",
            Hypothetical,
            dec!(0.30),
            "Längere wirtschaftliche Abschwungphase",
        ),
        scenario(
            "extreme",
            "Extremes Szenario",
            Hypothetical,
            dec!(0.60),
            "Verlust deutlich über historischen Crashs",
        ),
    ]
}

// ---------------------------------------------------------------------------
// Building blocks
// ---------------------------------------------------------------------------

/// Mild below 20% loss, moderate below 40%, severe from 40%.
pub fn severity_for_loss(loss: Rate) -> Severity {
    if loss < dec!(0.2) {
        Severity::Mild
    } else if loss < dec!(0.4) {
        Severity::Moderate
    } else {
        Severity::Severe
    }
}

pub fn stressed_value(value: Money, loss: Rate) -> Money {
    value * (Decimal::ONE - loss)
}

/// `ln(1 / (1 - loss)) / ln(1 + r)`.
pub fn recovery_years(loss: Rate, annual_return: Rate) -> Option<Decimal> {
    if loss <= Decimal::ZERO {
        return Some(Decimal::ZERO);
    }
    if loss >= Decimal::ONE || annual_return <= Decimal::ZERO {
        return None;
    }
    let needed = (Decimal::ONE / (Decimal::ONE - loss)).ln();
    let per_year = (Decimal::ONE + annual_return).ln();
    if per_year.is_zero() {
        return None;
    }
    Some(needed / per_year)
}

fn validate(input: &StressTestInput, scenarios: &[StressScenario]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if input.portfolio_value < Decimal::ZERO {
        issues.push(ValidationIssue::new(
            "portfolio_value",
            "Portfoliowert darf nicht negativ sein.",
        ));
    }
    if scenarios.is_empty() {
        issues.push(ValidationIssue::new(
            "scenarios",
            "Mindestens ein Szenario ist erforderlich.",
        ));
    }
    for (i, s) in scenarios.iter().enumerate() {
        if s.loss_percent < Decimal::ZERO || s.loss_percent > Decimal::ONE {
            issues.push(ValidationIssue::new(
                format!("scenarios[{i}].loss_percent"),
                "Verlust muss zwischen 0 und 1 liegen.",
            ));
        }
    }
    issues
}

// ---------------------------------------------------------------------------
// Core function
// ---------------------------------------------------------------------------

pub fn run_stress_test(input: &StressTestInput) -> EngineResult<ComputationOutput<StressTestOutput>> {
    let start = Instant::now();
    let scenarios = input.scenarios.clone().unwrap_or_else(predefined_scenarios);
    EngineError::from_issues(validate(input, &scenarios))?;

    let results: Vec<ScenarioImpact> = scenarios
        .iter()
        .map(|s| {
            let stressed = stressed_value(input.portfolio_value, s.loss_percent);
            ScenarioImpact {
                id: s.id.clone(),
                name: s.name.clone(),
                kind: s.kind,
                loss_percent: s.loss_percent,
                stressed_value: stressed,
                absolute_loss: input.portfolio_value - stressed,
                severity: severity_for_loss(s.loss_percent),
                recovery_years: recovery_years(s.loss_percent, input.expected_return),
            }
        })
        .collect();

    // first of equally bad scenarios wins
    let mut worst_case = results[0].clone();
    for r in &results[1..] {
        if r.loss_percent > worst_case.loss_percent {
            worst_case = r.clone();
        }
    }
    let average_loss =
        results.iter().map(|r| r.absolute_loss).sum::<Decimal>() / Decimal::from(results.len() as u64);

    let mut warnings = Vec::new();
    if input.expected_return <= Decimal::ZERO {
        warnings.push("Keine Erholung bei nicht-positiver erwarteter Rendite".to_string());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Stress test (one-off portfolio loss per scenario, log recovery time)",
        &serde_json::json!({
            "portfolio_value": input.portfolio_value.to_string(),
            "scenarios": results.len(),
            "expected_return": input.expected_return.to_string(),
        }),
        warnings,
        elapsed,
        StressTestOutput {
            results,
            worst_case,
            average_loss,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_input() -> StressTestInput {
        StressTestInput {
            portfolio_value: dec!(500_000),
            scenarios: None,
            expected_return: dec!(0.07),
        }
    }

    #[test]
    fn test_predefined_scenarios() {
        let s = predefined_scenarios();
        assert_eq!(s.len(), 8);
        assert_eq!(s.iter().filter(|x| x.kind == ScenarioKind::Historical).count(), 5);
    }

    #[test]
    fn test_severity_cutoffs() {
        assert_eq!(severity_for_loss(dec!(0.10)), Severity::Mild);
        assert_eq!(severity_for_loss(dec!(0.2)), Severity::Moderate);
        assert_eq!(severity_for_loss(dec!(0.37)), Severity::Moderate);
        assert_eq!(severity_for_loss(dec!(0.4)), Severity::Severe);
    }

    #[test]
    fn test_financial_crisis_impact() {
        let out = run_stress_test(&default_input()).unwrap().result;
        let gfc = out.results.iter().find(|r| r.id == "financial-crisis-2008").unwrap();
        assert_eq!(gfc.stressed_value, dec!(315_000));
        assert_eq!(gfc.absolute_loss, dec!(185_000));
        assert_eq!(out.worst_case.id, "extreme");
    }

    #[test]
    fn test_recovery_years() {
        // halving needs ln(2)/ln(1.07) ~ 10.24 years
        let years = recovery_years(dec!(0.5), dec!(0.07)).unwrap();
        assert!((years - dec!(10.2448)).abs() < dec!(0.001));
        assert_eq!(recovery_years(dec!(0.5), Decimal::ZERO), None);
        assert_eq!(recovery_years(Decimal::ONE, dec!(0.07)), None);
        assert_eq!(recovery_years(Decimal::ZERO, dec!(0.07)), Some(Decimal::ZERO));
    }

    #[test]
    fn test_invalid_loss_rejected() {
        let mut input = default_input();
        input.scenarios = Some(vec![StressScenario {
            id: "x".into(),
            name: "x".into(),
            kind: ScenarioKind::Hypothetical,
            loss_percent: dec!(1.5),
            description: String::new(),
        }]);
        assert!(matches!(
            run_stress_test(&input),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }
}
