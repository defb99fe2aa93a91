use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

use zinseszins_core::accumulation::SavingsPlan;
use zinseszins_core::costs::WithdrawalCosts;
use zinseszins_core::engine::{simulate_plan, summarize, BlackSwanSelection, EngineConfig, WithdrawalPlan};
use zinseszins_core::returns::ReturnConfig;
use zinseszins_core::tax::{BasiszinsTable, TaxConfig};
use zinseszins_core::withdrawal::{WithdrawalSegment, WithdrawalStrategyConfig};
use zinseszins_core::{EngineError, Granularity, Phase, PhaseStatus, SimulationResult};

// ===========================================================================
// Fixtures
// ===========================================================================

fn monthly_plan() -> SavingsPlan {
    SavingsPlan {
        id: "msci-world".into(),
        start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        end: Some(NaiveDate::from_ymd_opt(2044, 12, 31).unwrap()),
        annual_amount: dec!(12_000),
        ter: Some(dec!(0.002)),
        transaction_cost_percent: None,
        transaction_cost_absolute: None,
        inflation_adjusted: false,
    }
}

fn random(seed: u64) -> ReturnConfig {
    ReturnConfig::Random {
        average_return: dec!(0.07),
        standard_deviation: dec!(0.15),
        seed: Some(seed),
    }
}

fn config() -> EngineConfig {
    EngineConfig {
        plans: vec![monthly_plan()],
        start_year: 2025,
        retirement_year: 2045,
        end_year: 2074,
        granularity: Granularity::Monthly,
        accumulation_returns: random(11),
        accumulation_inflation: Some(dec!(0.02)),
        withdrawal: WithdrawalPlan::Segmented {
            segments: vec![
                WithdrawalSegment {
                    id: "early".into(),
                    name: "Frühe Rente".into(),
                    start_year: 2045,
                    end_year: 2059,
                    strategy: WithdrawalStrategyConfig::FixedPercent { rate: dec!(0.05) },
                    return_config: ReturnConfig::Fixed { rate: dec!(0.04) },
                    inflation: Some(dec!(0.02)),
                    income_tax_rate: None,
                    steuer_reduziert_endkapital: true,
                },
                WithdrawalSegment {
                    id: "late".into(),
                    name: "Späte Rente".into(),
                    start_year: 2060,
                    end_year: 2074,
                    strategy: WithdrawalStrategyConfig::StandardRule { percent: dec!(0.03) },
                    return_config: ReturnConfig::Fixed { rate: dec!(0.03) },
                    inflation: None,
                    income_tax_rate: None,
                    steuer_reduziert_endkapital: true,
                },
            ],
        },
        tax: TaxConfig::default(),
        basiszins: BasiszinsTable::default(),
        costs: WithdrawalCosts::default(),
        other_income: BTreeMap::new(),
        black_swan: None,
        return_overrides: BTreeMap::new(),
        include_risk: true,
        risk_free_rate: dec!(0.02),
    }
}

fn assert_close(a: Decimal, b: Decimal, what: &str) {
    assert!((a - b).abs() < dec!(0.000001), "{what}: {a} != {b}");
}

fn assert_continuous(years: &[SimulationResult]) {
    for pair in years.windows(2) {
        assert_close(
            pair[0].end_capital,
            pair[1].start_capital,
            &format!("capital between {} and {}", pair[0].year, pair[1].year),
        );
    }
}

// ===========================================================================
// Pipeline
// ===========================================================================

#[test]
fn test_seeded_pipeline_is_deterministic() {
    let a = simulate_plan(&config()).unwrap().result;
    let b = simulate_plan(&config()).unwrap().result;
    assert_eq!(a.years, b.years);
    assert_eq!(a.summary, b.summary);
}

#[test]
fn test_different_seeds_differ() {
    let a = simulate_plan(&config()).unwrap().result;
    let mut other = config();
    other.accumulation_returns = random(99);
    let b = simulate_plan(&other).unwrap().result;
    assert!(a.summary.capital_at_retirement != b.summary.capital_at_retirement);
}

#[test]
fn test_capital_is_continuous_across_phases_and_segments() {
    let out = simulate_plan(&config()).unwrap().result;
    assert_continuous(&out.years);

    assert_eq!(out.years.len(), 50);
    let idx = out
        .years
        .iter()
        .position(|r| r.segment_id.as_deref() == Some("late"))
        .unwrap();
    assert_eq!(out.years[idx].year, 2060);
    assert_eq!(out.years[idx - 1].segment_id.as_deref(), Some("early"));
    assert!(out.years.iter().all(|r| r.status != PhaseStatus::Depleted));
}

#[test]
fn test_years_are_ordered_and_phased() {
    let out = simulate_plan(&config()).unwrap().result;
    for pair in out.years.windows(2) {
        assert_eq!(pair[0].year + 1, pair[1].year);
    }
    assert!(out.years[..20].iter().all(|r| r.phase == Phase::Accumulation));
    assert!(out.years[20..].iter().all(|r| r.phase == Phase::Withdrawal));
    assert!(out.years[..20].iter().all(|r| r.segment_id.is_none()));
}

#[test]
fn test_standard_rule_resets_at_segment_start() {
    let out = simulate_plan(&config()).unwrap().result;
    let late: Vec<&SimulationResult> = out
        .years
        .iter()
        .filter(|r| r.segment_id.as_deref() == Some("late"))
        .collect();
    assert_eq!(late.len(), 15);
    assert_eq!(late.last().unwrap().status, PhaseStatus::Completed);
    let expected = late[0].start_capital * dec!(0.03);
    assert_close(late[0].withdrawal, expected, "first late withdrawal");
    assert_close(late[1].withdrawal, expected, "second late withdrawal");
    assert!(late[0].start_capital != out.years[20].start_capital);
}

#[test]
fn test_single_strategy_equals_one_segment_plan() {
    let strategy = WithdrawalStrategyConfig::FixedPercent { rate: dec!(0.04) };
    let mut single = config();
    single.withdrawal = WithdrawalPlan::Single {
        strategy: strategy.clone(),
        returns: random(12),
        inflation: Some(dec!(0.02)),
        income_tax_rate: None,
    };
    let mut segmented = config();
    segmented.withdrawal = WithdrawalPlan::Segmented {
        segments: vec![WithdrawalSegment {
            id: "ruhestand".into(),
            name: "Ruhestand".into(),
            start_year: 2045,
            end_year: 2074,
            strategy,
            return_config: random(12),
            inflation: Some(dec!(0.02)),
            income_tax_rate: None,
            steuer_reduziert_endkapital: true,
        }],
    };

    let a = simulate_plan(&single).unwrap().result;
    let b = simulate_plan(&segmented).unwrap().result;
    assert_eq!(a.summary, b.summary);
    assert_eq!(a.years.len(), b.years.len());
    let without_segment = |r: &SimulationResult| SimulationResult {
        segment_id: None,
        ..r.clone()
    };
    for (x, y) in a.years.iter().zip(&b.years) {
        assert_eq!(without_segment(x), without_segment(y));
    }
    assert_eq!(b.years.last().unwrap().segment_id.as_deref(), Some("ruhestand"));
}

#[test]
fn test_summary_is_idempotent_and_matches_rows() {
    let out = simulate_plan(&config()).unwrap().result;
    let again = summarize(&out.years);
    assert_eq!(again, out.summary);
    assert_eq!(summarize(&out.years), again);

    let withdrawn: Decimal = out.years.iter().map(|r| r.withdrawal).sum();
    assert_eq!(out.summary.total_withdrawn, withdrawn);
    assert_eq!(out.summary.final_capital, out.years.last().unwrap().end_capital);
    assert_eq!(out.summary.total_contributions, dec!(240_000));
}

#[test]
fn test_risk_metrics_cover_whole_trajectory() {
    let out = simulate_plan(&config()).unwrap().result;
    let risk = out.risk.unwrap();
    assert_eq!(risk.drawdown_series.len(), out.years.len());
    assert!(risk.max_drawdown >= Decimal::ZERO && risk.max_drawdown <= Decimal::ONE);
}

#[test]
fn test_black_swan_and_override_precedence() {
    let mut cfg = config();
    cfg.black_swan = Some(BlackSwanSelection {
        event_id: "finanzkrise".into(),
        start_year: 2046,
    });
    cfg.return_overrides.insert(2047, dec!(0.25));
    let out = simulate_plan(&cfg).unwrap().result;
    let rate = |year: i32| out.years.iter().find(|r| r.year == year).unwrap().return_rate;
    assert_eq!(rate(2046), dec!(-0.404));
    assert_eq!(rate(2047), dec!(0.25));

    let swan = out.black_swan.unwrap();
    assert_eq!(swan.years, 1);
    assert_eq!(swan.cumulative_return, dec!(-0.404));
}

#[test]
fn test_gap_between_segments_is_rejected() {
    let mut cfg = config();
    if let WithdrawalPlan::Segmented { segments } = &mut cfg.withdrawal {
        segments[1].start_year = 2061;
    }
    match simulate_plan(&cfg) {
        Err(EngineError::InvalidConfiguration(issues)) => {
            assert!(issues.iter().any(|i| i.field.starts_with("segments")), "{issues:?}");
        }
        other => panic!("expected InvalidConfiguration, got {other:?}"),
    }
}

#[test]
fn test_withdrawal_must_start_at_retirement() {
    let mut cfg = config();
    cfg.retirement_year = 2046;
    assert!(matches!(
        simulate_plan(&cfg),
        Err(EngineError::InvalidConfiguration(_))
    ));
}

// ===========================================================================
// Configuration format
// ===========================================================================

#[test]
fn test_config_from_json() {
    let json = r#"{
        "plans": [
            {"id": "etf", "start": "2025-01-01", "end": "2034-12-31", "annual_amount": "6000"},
            {"id": "bonus", "start": "2030-06-01", "end": "2030-06-01", "annual_amount": "10000"}
        ],
        "start_year": 2025,
        "retirement_year": 2035,
        "end_year": 2054,
        "granularity": "yearly",
        "accumulation_returns": {"type": "fixed", "rate": "0.06"},
        "withdrawal": {
            "type": "single",
            "strategy": {"type": "standard_rule", "percent": "0.04"},
            "returns": {"type": "fixed", "rate": "0.04"},
            "inflation": "0.02"
        },
        "black_swan": {"event_id": "dotcom-crash", "start_year": 2032}
    }"#;
    let cfg: EngineConfig = serde_json::from_str(json).unwrap();
    assert_eq!(cfg.plans.len(), 2);
    assert!(cfg.plans[1].is_one_time());
    assert_eq!(cfg.withdrawal_segments().len(), 1);
    assert_eq!(cfg.withdrawal_segments()[0].id, "main");

    let out = simulate_plan(&cfg).unwrap().result;
    assert_eq!(out.years.len(), 30);
    assert_eq!(out.summary.total_contributions, dec!(70_000));
    assert_eq!(out.black_swan.unwrap().years, 3);
}
