use clap::Args;
use serde_json::Value;

use zinseszins_core::accumulation::{simulate_accumulation, AccumulationInput};
use zinseszins_core::engine::{simulate_plan, EngineConfig};
use zinseszins_core::withdrawal::{
    compare_strategies, simulate_segmented_withdrawal, simulate_withdrawal, ComparisonInput,
    SegmentedWithdrawalInput, WithdrawalInput,
};

use crate::input;

/// Arguments for the full savings and withdrawal projection
#[derive(Args)]
pub struct SimulateArgs {
    /// Path to JSON plan configuration
    #[arg(long)]
    pub input: Option<String>,

    /// Only print the summary, not the per-year rows
    #[arg(long)]
    pub summary_only: bool,
}

/// Arguments for the accumulation phase
#[derive(Args)]
pub struct AccumulateArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the withdrawal phase
#[derive(Args)]
pub struct WithdrawArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Input describes a segmented withdrawal plan
    #[arg(long)]
    pub segmented: bool,
}

/// Arguments for comparing withdrawal strategies
#[derive(Args)]
pub struct CompareArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_simulate(args: SimulateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let config: EngineConfig = input::read_input(args.input.as_deref(), "simulate")?;
    let result = simulate_plan(&config)?;
    let mut value = serde_json::to_value(result)?;
    if args.summary_only {
        if let Some(Value::Object(res)) = value.get_mut("result") {
            res.remove("years");
        }
    }
    Ok(value)
}

pub fn run_accumulate(args: AccumulateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let acc_input: AccumulationInput = input::read_input(args.input.as_deref(), "accumulation")?;
    let result = simulate_accumulation(&acc_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_withdraw(args: WithdrawArgs) -> Result<Value, Box<dyn std::error::Error>> {
    if args.segmented {
        let wd_input: SegmentedWithdrawalInput =
            input::read_input(args.input.as_deref(), "segmented withdrawal")?;
        let result = simulate_segmented_withdrawal(&wd_input)?;
        return Ok(serde_json::to_value(result)?);
    }
    let wd_input: WithdrawalInput = input::read_input(args.input.as_deref(), "withdrawal")?;
    let result = simulate_withdrawal(&wd_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_compare(args: CompareArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let cmp_input: ComparisonInput = input::read_input(args.input.as_deref(), "strategy comparison")?;
    let result = compare_strategies(&cmp_input)?;
    Ok(serde_json::to_value(result)?)
}
