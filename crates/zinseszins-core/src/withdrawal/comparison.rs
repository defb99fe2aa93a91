use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Instant;

use super::segments::WithdrawalSegment;
use super::simulate::{
    run_withdrawal, segment_returns, validate_segmented_withdrawal, validate_withdrawal, WithdrawalInput,
    WithdrawalOutput,
};
use super::strategy::WithdrawalStrategyConfig;
use crate::error::{EngineError, ValidationIssue};
use crate::tax::AccountState;
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingCriterion {
    #[default]
    FinalCapital,
    TotalWithdrawal,
    /// Longest-lasting first; never depleted beats any finite duration.
    Duration,
}

/// What a candidate runs against the shared starting capital.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CandidatePlan {
    /// One strategy over the base horizon and base returns.
    Strategy { strategy: WithdrawalStrategyConfig },
    /// A complete segmented plan; it must span the base horizon.
    Segmented { segments: Vec<WithdrawalSegment> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyCandidate {
    /// Display name; derived from the strategy or segments when absent.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub plan: CandidatePlan,
}

impl StrategyCandidate {
    pub fn single(name: impl Into<String>, strategy: WithdrawalStrategyConfig) -> Self {
        Self {
            name: Some(name.into()),
            plan: CandidatePlan::Strategy { strategy },
        }
    }

    pub fn segmented(name: impl Into<String>, segments: Vec<WithdrawalSegment>) -> Self {
        Self {
            name: Some(name.into()),
            plan: CandidatePlan::Segmented { segments },
        }
    }

    fn label(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match &self.plan {
            CandidatePlan::Strategy { strategy } => strategy.label(),
            CandidatePlan::Segmented { segments } => segments
                .iter()
                .map(|s| if s.name.is_empty() { s.id.as_str() } else { s.name.as_str() })
                .collect::<Vec<_>>()
                .join(" + "),
        }
    }
}

/// Several strategies or segmented plans run against the same starting
/// capital, tax setup and horizon. Strategy candidates share one return
/// path from `base.returns`; segmented candidates use their segments'
/// return models. `base.strategy` is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonInput {
    pub base: WithdrawalInput,
    pub strategies: Vec<StrategyCandidate>,
    #[serde(default)]
    pub rank_by: RankingCriterion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyComparison {
    pub rank: usize,
    pub strategy: String,
    pub final_capital: Money,
    pub total_withdrawal: Money,
    pub average_annual_withdrawal: Money,
    pub duration_years: Option<u32>,
    pub duration: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonOutput {
    pub rank_by: RankingCriterion,
    pub results: Vec<StrategyComparison>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate_comparison(input: &ComparisonInput) -> Vec<ValidationIssue> {
    let mut issues: Vec<ValidationIssue> = Vec::new();
    if input.strategies.is_empty() {
        issues.push(ValidationIssue::new(
            "strategies",
            "Mindestens eine Strategie ist erforderlich.",
        ));
    }
    let mut push = |issue: ValidationIssue| {
        if !issues.contains(&issue) {
            issues.push(issue);
        }
    };
    for (i, candidate) in input.strategies.iter().enumerate() {
        match &candidate.plan {
            CandidatePlan::Strategy { strategy } => {
                let run = WithdrawalInput {
                    strategy: strategy.clone(),
                    ..input.base.clone()
                };
                for mut issue in validate_withdrawal(&run) {
                    if issue.field.starts_with("strategy") {
                        issue.field = format!("strategies[{i}].{}", issue.field);
                    }
                    push(issue);
                }
            }
            CandidatePlan::Segmented { segments } => {
                let mut base = input.base.to_segmented();
                base.segments = segments.clone();
                for mut issue in validate_segmented_withdrawal(&base, Some(input.base.start_year)) {
                    if issue.field.starts_with("segments") {
                        issue.field = format!("strategies[{i}].{}", issue.field);
                    }
                    push(issue);
                }
                if let Some(last) = segments.last() {
                    if last.end_year != input.base.end_year {
                        push(ValidationIssue::new(
                            format!("strategies[{i}].segments[{}].end_year", segments.len() - 1),
                            format!("Letztes Segment muss {} enden.", input.base.end_year),
                        ));
                    }
                }
            }
        }
    }
    issues
}

// ---------------------------------------------------------------------------
// Core function
// ---------------------------------------------------------------------------

/// Run each candidate independently and rank the summaries. Ties keep input
/// order.
pub fn compare_strategies(input: &ComparisonInput) -> EngineResult<ComputationOutput<ComparisonOutput>> {
    let start = Instant::now();
    EngineError::from_issues(validate_comparison(input))?;

    // one return path for all strategy candidates so only the strategy differs
    let base = input.base.to_segmented();
    let shared_returns = segment_returns(&base.segments)?;

    let mut results = Vec::with_capacity(input.strategies.len());
    for candidate in &input.strategies {
        let mut plan = base.clone();
        let output = match &candidate.plan {
            CandidatePlan::Strategy { strategy } => {
                for segment in &mut plan.segments {
                    segment.strategy = strategy.clone();
                }
                run_withdrawal(&plan, &shared_returns, &mut AccountState::new())?
            }
            CandidatePlan::Segmented { segments } => {
                plan.segments = segments.clone();
                let returns = segment_returns(&plan.segments)?;
                run_withdrawal(&plan, &returns, &mut AccountState::new())?
            }
        };
        results.push(summarize_run(candidate.label(), &output));
    }

    rank(&mut results, input.rank_by);

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Withdrawal comparison (identical starting capital, independent tax state)",
        &serde_json::json!({
            "strategies": input.strategies.len(),
            "rank_by": input.rank_by,
            "start_capital": input.base.start_capital.to_string(),
        }),
        Vec::new(),
        elapsed,
        ComparisonOutput {
            rank_by: input.rank_by,
            results,
        },
    ))
}

fn summarize_run(strategy: String, output: &WithdrawalOutput) -> StrategyComparison {
    let years = output.years.len();
    let average_annual_withdrawal = if years > 0 {
        output.total_withdrawn / Decimal::from(years as u64)
    } else {
        Decimal::ZERO
    };
    StrategyComparison {
        rank: 0,
        strategy,
        final_capital: output.final_capital,
        total_withdrawal: output.total_withdrawn,
        average_annual_withdrawal,
        duration_years: output.duration_years,
        duration: output.duration_label.clone(),
    }
}

/// Sort best-first by `criterion` (stable) and assign 1-based ranks.
pub fn rank(results: &mut [StrategyComparison], criterion: RankingCriterion) {
    results.sort_by(|a, b| compare(b, a, criterion));
    for (i, r) in results.iter_mut().enumerate() {
        r.rank = i + 1;
    }
}

fn compare(a: &StrategyComparison, b: &StrategyComparison, criterion: RankingCriterion) -> Ordering {
    match criterion {
        RankingCriterion::FinalCapital => a.final_capital.cmp(&b.final_capital),
        RankingCriterion::TotalWithdrawal => a.total_withdrawal.cmp(&b.total_withdrawal),
        RankingCriterion::Duration => match (a.duration_years, b.duration_years) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => x.cmp(&y),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costs::WithdrawalCosts;
    use crate::returns::ReturnConfig;
    use crate::tax::{BasiszinsTable, TaxConfig};
    use crate::types::{Rate, Year};
    use rust_decimal_macros::dec;

    fn default_input() -> ComparisonInput {
        ComparisonInput {
            base: WithdrawalInput {
                start_capital: dec!(500_000),
                cost_basis: None,
                start_year: 2040,
                end_year: 2069,
                strategy: WithdrawalStrategyConfig::FixedPercent { rate: dec!(0.04) },
                returns: ReturnConfig::Fixed { rate: dec!(0.03) },
                inflation: None,
                income_tax_rate: None,
                tax: TaxConfig::default(),
                basiszins: BasiszinsTable::empty(),
                costs: WithdrawalCosts::default(),
            },
            strategies: vec![
                StrategyCandidate::single("3%", WithdrawalStrategyConfig::FixedPercent { rate: dec!(0.03) }),
                StrategyCandidate::single("5%", WithdrawalStrategyConfig::FixedPercent { rate: dec!(0.05) }),
                StrategyCandidate::single(
                    "monatlich",
                    WithdrawalStrategyConfig::FixedMonthly {
                        monthly_amount: dec!(4000),
                        guardrails: None,
                    },
                ),
            ],
            rank_by: RankingCriterion::FinalCapital,
        }
    }

    fn two_phase(id: &str, early_rate: Rate, late_rate: Rate) -> Vec<WithdrawalSegment> {
        let segment = |suffix: &str, start: Year, end: Year, rate: Rate| WithdrawalSegment {
            id: format!("{id}-{suffix}"),
            name: String::new(),
            start_year: start,
            end_year: end,
            strategy: WithdrawalStrategyConfig::FixedPercent { rate },
            return_config: ReturnConfig::Fixed { rate: dec!(0.03) },
            inflation: None,
            income_tax_rate: None,
            steuer_reduziert_endkapital: true,
        };
        vec![
            segment("early", 2040, 2054, early_rate),
            segment("late", 2055, 2069, late_rate),
        ]
    }

    #[test]
    fn test_rank_by_final_capital() {
        let out = compare_strategies(&default_input()).unwrap().result;
        let names: Vec<_> = out.results.iter().map(|r| r.strategy.as_str()).collect();
        assert_eq!(names, vec!["3%", "5%", "monatlich"]);
        assert_eq!(out.results[0].rank, 1);
        assert!(out.results[2].duration_years.is_some());
    }

    #[test]
    fn test_rank_by_total_withdrawal() {
        let mut input = default_input();
        input.rank_by = RankingCriterion::TotalWithdrawal;
        let out = compare_strategies(&input).unwrap().result;
        for pair in out.results.windows(2) {
            assert!(pair[0].total_withdrawal >= pair[1].total_withdrawal);
        }
    }

    #[test]
    fn test_rank_by_duration_prefers_unlimited() {
        let mut input = default_input();
        input.rank_by = RankingCriterion::Duration;
        let out = compare_strategies(&input).unwrap().result;
        assert_eq!(out.results[0].duration, "unbegrenzt");
        assert_eq!(out.results[2].strategy, "monatlich");
    }

    #[test]
    fn test_ties_keep_input_order() {
        let mut input = default_input();
        input.strategies = vec![
            StrategyCandidate::single("a", WithdrawalStrategyConfig::FixedPercent { rate: dec!(0.04) }),
            StrategyCandidate::single("b", WithdrawalStrategyConfig::FixedPercent { rate: dec!(0.04) }),
        ];
        let out = compare_strategies(&input).unwrap().result;
        assert_eq!(out.results[0].strategy, "a");
        assert_eq!(out.results[1].strategy, "b");
    }

    #[test]
    fn test_empty_candidate_list_rejected() {
        let mut input = default_input();
        input.strategies.clear();
        assert!(matches!(
            compare_strategies(&input),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_rank_segmented_plans() {
        let mut input = default_input();
        input.strategies = vec![
            StrategyCandidate::segmented("offensiv", two_phase("off", dec!(0.06), dec!(0.04))),
            StrategyCandidate::segmented("vorsichtig", two_phase("vor", dec!(0.03), dec!(0.03))),
        ];
        let out = compare_strategies(&input).unwrap().result;
        assert_eq!(out.results[0].strategy, "vorsichtig");
        assert_eq!(out.results[0].rank, 1);
        assert_eq!(out.results[1].strategy, "offensiv");
        assert!(out.results[0].final_capital > out.results[1].final_capital);
        // 500000 * (0.97 * 1.03)^30
        let expected = dec!(500_000) * crate::math::compound(dec!(-0.0009), 30);
        assert!((out.results[0].final_capital - expected).abs() < dec!(0.0001));
    }

    #[test]
    fn test_segmented_and_single_candidates_ranked_together() {
        let mut input = default_input();
        input.strategies = vec![
            StrategyCandidate::single("5%", WithdrawalStrategyConfig::FixedPercent { rate: dec!(0.05) }),
            StrategyCandidate {
                name: None,
                plan: CandidatePlan::Segmented {
                    segments: two_phase("vor", dec!(0.03), dec!(0.03)),
                },
            },
        ];
        let out = compare_strategies(&input).unwrap().result;
        assert_eq!(out.results[0].strategy, "vor-early + vor-late");
        assert_eq!(out.results[1].strategy, "5%");
    }

    #[test]
    fn test_segmented_candidate_must_span_horizon() {
        let mut input = default_input();
        let mut segments = two_phase("kurz", dec!(0.03), dec!(0.03));
        segments[1].end_year = 2060;
        input.strategies = vec![StrategyCandidate::segmented("kurz", segments)];
        match compare_strategies(&input) {
            Err(EngineError::InvalidConfiguration(issues)) => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].field, "strategies[0].segments[1].end_year");
            }
            other => panic!("expected InvalidConfiguration, got {other:?}"),
        }
    }

    #[test]
    fn test_segmented_candidate_json_shape() {
        let json = serde_json::json!({
            "name": "zwei Phasen",
            "type": "segmented",
            "segments": two_phase("json", dec!(0.04), dec!(0.03)),
        });
        let candidate: StrategyCandidate = serde_json::from_value(json).unwrap();
        assert!(matches!(candidate.plan, CandidatePlan::Segmented { ref segments } if segments.len() == 2));
    }
}
