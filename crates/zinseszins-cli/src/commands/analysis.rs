use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use zinseszins_core::analytics::monte_carlo::{run_monte_carlo, MonteCarloInput};
use zinseszins_core::analytics::risk::{calculate_risk_metrics, RiskInput};
use zinseszins_core::analytics::stress::{run_stress_test, StressTestInput};
use zinseszins_core::analytics::tax_deferral::{analyze_tax_deferral, TaxDeferralInput};
use zinseszins_core::tax::{BasiszinsTable, TaxConfig};

use crate::input;

/// Arguments for risk metrics over a value series
#[derive(Args)]
pub struct RiskArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Comma-separated portfolio values, oldest first
    #[arg(long, value_delimiter = ',')]
    pub values: Option<Vec<Decimal>>,

    /// Risk-free rate for the Sharpe ratio
    #[arg(long, default_value = "0")]
    pub risk_free_rate: Decimal,

    /// Minimum acceptable return for the Sortino ratio
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub target_return: Decimal,
}

/// Arguments for portfolio stress testing
#[derive(Args)]
pub struct StressTestArgs {
    /// Path to JSON input file (custom scenarios)
    #[arg(long)]
    pub input: Option<String>,

    /// Portfolio value to stress with the built-in scenarios
    #[arg(long)]
    pub portfolio_value: Option<Decimal>,

    /// Annual return assumed for recovery estimates
    #[arg(long, default_value = "0.07")]
    pub expected_return: Decimal,
}

/// Arguments for Monte Carlo projection
#[derive(Args)]
pub struct MonteCarloArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Override the number of simulation runs
    #[arg(long)]
    pub simulations: Option<u32>,

    /// Override the base seed
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for the tax deferral comparison
#[derive(Args)]
pub struct TaxDeferralArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Amount invested at the start
    #[arg(long)]
    pub amount: Option<Decimal>,

    /// Annual return
    #[arg(long, default_value = "0.07", allow_hyphen_values = true)]
    pub annual_return: Decimal,

    /// First year of the holding period
    #[arg(long, default_value = "2025")]
    pub start_year: i32,

    /// Holding period in years
    #[arg(long, default_value = "20")]
    pub years: u32,
}

pub fn run_risk(args: RiskArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let risk_input = match args.values {
        Some(values) => RiskInput {
            values,
            years: None,
            risk_free_rate: args.risk_free_rate,
            target_return: args.target_return,
        },
        None => input::read_input(args.input.as_deref(), "risk metrics")?,
    };
    let result = calculate_risk_metrics(&risk_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_stress(args: StressTestArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let stress_input = match args.portfolio_value {
        Some(portfolio_value) => StressTestInput {
            portfolio_value,
            scenarios: None,
            expected_return: args.expected_return,
        },
        None => input::read_input(args.input.as_deref(), "stress test")?,
    };
    let result = run_stress_test(&stress_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_mc(args: MonteCarloArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut mc_input: MonteCarloInput = input::read_input(args.input.as_deref(), "Monte Carlo")?;
    if let Some(n) = args.simulations {
        mc_input.num_simulations = n;
    }
    if let Some(seed) = args.seed {
        mc_input.seed = seed;
    }
    let result = run_monte_carlo(&mc_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_tax_deferral(args: TaxDeferralArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let td_input = match args.amount {
        Some(initial_investment) => TaxDeferralInput {
            initial_investment,
            annual_return: args.annual_return,
            start_year: args.start_year,
            years: args.years,
            tax: TaxConfig::default(),
            basiszins: BasiszinsTable::default(),
        },
        None => input::read_input(args.input.as_deref(), "tax deferral")?,
    };
    let result = analyze_tax_deferral(&td_input)?;
    Ok(serde_json::to_value(result)?)
}
