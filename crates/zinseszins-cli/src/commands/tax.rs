use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use zinseszins_core::costs::{simulate_care_costs, CareCostInput};
use zinseszins_core::tax::{
    calculate_tax, compute_vorabpauschale, BasiszinsTable, TaxConfig, TaxInput, VorabpauschaleInput,
};

use crate::input;

/// Arguments for capital gains tax on a realized gain
#[derive(Args)]
pub struct TaxArgs {
    /// Path to JSON tax configuration (defaults when absent)
    #[arg(long)]
    pub input: Option<String>,

    /// Realized gain before Teilfreistellung
    #[arg(long, allow_hyphen_values = true)]
    pub gain: Decimal,

    /// Tax year
    #[arg(long, default_value = "2025")]
    pub year: i32,

    /// Other taxable income in the year (reduces Grundfreibetrag room)
    #[arg(long)]
    pub other_income: Option<Decimal>,
}

/// Arguments for the Vorabpauschale of one holding
#[derive(Args)]
pub struct VorabpauschaleArgs {
    /// Path to JSON tax configuration (defaults when absent)
    #[arg(long)]
    pub input: Option<String>,

    /// Value at the start of the year (or at purchase)
    #[arg(long)]
    pub start_value: Decimal,

    /// Value at the end of the year
    #[arg(long)]
    pub end_value: Decimal,

    /// Tax year
    #[arg(long, default_value = "2025")]
    pub year: i32,

    /// Months held in the year
    #[arg(long, default_value = "12")]
    pub months: u32,

    /// Basiszins override; the built-in table is used when absent
    #[arg(long, allow_hyphen_values = true)]
    pub basiszins: Option<Decimal>,
}

/// Arguments for care cost projection
#[derive(Args)]
pub struct CareCostsArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_tax(args: TaxArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let tax: TaxConfig = input::read_input_or(args.input.as_deref(), TaxConfig::default())?;
    let result = calculate_tax(&TaxInput {
        gain: args.gain,
        year: args.year,
        tax,
        other_income: args.other_income,
    })?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_vorabpauschale(args: VorabpauschaleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let tax: TaxConfig = input::read_input_or(args.input.as_deref(), TaxConfig::default())?;
    let result = compute_vorabpauschale(&VorabpauschaleInput {
        start_value: args.start_value,
        end_value: args.end_value,
        year: args.year,
        months_held: args.months,
        basiszins: args.basiszins,
        basiszins_table: BasiszinsTable::default(),
        tax,
    })?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_care_costs(args: CareCostsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let care_input: CareCostInput = input::read_input(args.input.as_deref(), "care costs")?;
    let result = simulate_care_costs(&care_input)?;
    Ok(serde_json::to_value(result)?)
}
