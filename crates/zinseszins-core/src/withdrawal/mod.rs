pub mod comparison;
pub mod rmd;
pub mod segments;
pub mod simulate;
pub mod strategy;

pub use comparison::{
    compare_strategies, CandidatePlan, ComparisonInput, ComparisonOutput, RankingCriterion, StrategyCandidate,
};
pub use segments::WithdrawalSegment;
pub use simulate::{
    run_withdrawal, simulate_segmented_withdrawal, simulate_withdrawal, SegmentedWithdrawalInput,
    WithdrawalInput, WithdrawalOutput,
};
pub use strategy::WithdrawalStrategyConfig;
