use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use zinseszins_core::costs::{CostSchedule, WithdrawalCosts};
use zinseszins_core::returns::ReturnConfig;
use zinseszins_core::tax::{BasiszinsTable, TaxConfig};
use zinseszins_core::withdrawal::comparison::StrategyCandidate;
use zinseszins_core::withdrawal::{
    compare_strategies, simulate_withdrawal, ComparisonInput,
    RankingCriterion, WithdrawalInput, WithdrawalStrategyConfig,
};
use zinseszins_core::PhaseStatus;

fn base(strategy: WithdrawalStrategyConfig) -> WithdrawalInput {
    WithdrawalInput {
        start_capital: dec!(300_000),
        cost_basis: Some(dec!(200_000)),
        start_year: 2030,
        end_year: 2059,
        strategy,
        returns: ReturnConfig::Fixed { rate: dec!(0.05) },
        inflation: None,
        income_tax_rate: None,
        tax: TaxConfig::default(),
        basiszins: BasiszinsTable::default(),
        costs: WithdrawalCosts::default(),
    }
}

fn monthly(amount: Decimal) -> WithdrawalStrategyConfig {
    WithdrawalStrategyConfig::FixedMonthly {
        monthly_amount: amount,
        guardrails: None,
    }
}

#[test]
fn test_higher_withdrawal_never_lasts_longer() {
    let durations: Vec<Option<u32>> = [1000, 2000, 3000, 4000]
        .into_iter()
        .map(|m| {
            simulate_withdrawal(&base(monthly(Decimal::from(m))))
                .unwrap()
                .result
                .duration_years
        })
        .collect();

    // None (never depleted) counts as longest
    let as_len = |d: &Option<u32>| d.unwrap_or(u32::MAX);
    for pair in durations.windows(2) {
        assert!(as_len(&pair[0]) >= as_len(&pair[1]), "{durations:?}");
    }
    assert_eq!(durations[0], None);
    assert!(durations[3].is_some());
}

#[test]
fn test_depletion_row_is_last_and_zero() {
    let out = simulate_withdrawal(&base(monthly(dec!(4000)))).unwrap().result;
    let last = out.years.last().unwrap();
    assert_eq!(last.status, PhaseStatus::Depleted);
    assert_eq!(last.end_capital, Decimal::ZERO);
    assert_eq!(out.depleted_in, Some(last.year));
    assert_eq!(out.duration_years, Some(out.years.len() as u32));
    assert!(out.years[..out.years.len() - 1]
        .iter()
        .all(|r| r.status == PhaseStatus::Active));
}

#[test]
fn test_costs_are_paid_from_capital() {
    let mut input = base(WithdrawalStrategyConfig::FixedPercent { rate: dec!(0.04) });
    let plain = simulate_withdrawal(&input).unwrap().result;
    input.costs.schedules.push(CostSchedule {
        name: "Versicherung".into(),
        start_year: 2030,
        end_year: None,
        annual_amount: dec!(1200),
        inflation_rate: Decimal::ZERO,
    });
    let with_costs = simulate_withdrawal(&input).unwrap().result;

    let first = &with_costs.years[0];
    assert_eq!(first.costs, dec!(1200));
    assert_eq!(first.withdrawal, plain.years[0].withdrawal + dec!(1200));
    assert!(with_costs.final_capital < plain.final_capital);
}

#[test]
fn test_comparison_ranks_by_final_capital() {
    let input = ComparisonInput {
        base: base(WithdrawalStrategyConfig::FixedPercent { rate: dec!(0.04) }),
        strategies: vec![
            StrategyCandidate::single("5%", WithdrawalStrategyConfig::FixedPercent { rate: dec!(0.05) }),
            StrategyCandidate::single("3%", WithdrawalStrategyConfig::FixedPercent { rate: dec!(0.03) }),
            StrategyCandidate::single("4%", WithdrawalStrategyConfig::FixedPercent { rate: dec!(0.04) }),
        ],
        rank_by: RankingCriterion::FinalCapital,
    };
    let out = compare_strategies(&input).unwrap().result;
    let names: Vec<&str> = out.results.iter().map(|r| r.strategy.as_str()).collect();
    assert_eq!(names, vec!["3%", "4%", "5%"]);
    let ranks: Vec<usize> = out.results.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
}

#[test]
fn test_comparison_by_duration_prefers_lasting_capital() {
    let input = ComparisonInput {
        base: base(monthly(dec!(1000))),
        strategies: vec![
            StrategyCandidate::single("hoch", monthly(dec!(4000))),
            StrategyCandidate::single("niedrig", monthly(dec!(1000))),
        ],
        rank_by: RankingCriterion::Duration,
    };
    let out = compare_strategies(&input).unwrap().result;
    assert_eq!(out.results[0].strategy, "niedrig");
    assert_eq!(out.results[0].duration, "unbegrenzt");
    assert!(out.results[1].duration_years.is_some());
}

#[test]
fn test_embedded_gain_is_taxed_on_withdrawal() {
    let mut no_gain = base(WithdrawalStrategyConfig::FixedPercent { rate: dec!(0.04) });
    no_gain.cost_basis = None;
    let with_gain = base(WithdrawalStrategyConfig::FixedPercent { rate: dec!(0.04) });
    let a = simulate_withdrawal(&no_gain).unwrap().result;
    let b = simulate_withdrawal(&with_gain).unwrap().result;
    assert!(b.total_tax_paid > a.total_tax_paid);
}
