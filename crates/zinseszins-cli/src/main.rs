mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::analysis::{MonteCarloArgs, RiskArgs, StressTestArgs, TaxDeferralArgs};
use commands::market::{BlackSwanArgs, ScenariosArgs};
use commands::plan::{AccumulateArgs, CompareArgs, SimulateArgs, WithdrawArgs};
use commands::tax::{CareCostsArgs, TaxArgs, VorabpauschaleArgs};

/// German savings and withdrawal projections
#[derive(Parser)]
#[command(
    name = "zinseszins",
    version,
    about = "German savings and withdrawal projections",
    long_about = "Projects savings plans through accumulation and withdrawal with German \
                  capital gains taxation (Abgeltungsteuer, Teilfreistellung, Sparerpauschbetrag, \
                  Vorabpauschale) in decimal precision. Includes strategy comparison, \
                  risk metrics, stress tests and Monte Carlo runs."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log progress to stderr (same as RUST_LOG=debug)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Full projection: accumulation, withdrawal, summary
    Simulate(SimulateArgs),
    /// Accumulation phase only
    Accumulate(AccumulateArgs),
    /// Withdrawal phase only (single strategy or segmented)
    Withdraw(WithdrawArgs),
    /// Compare withdrawal strategies or segmented plans on the same starting capital
    Compare(CompareArgs),
    /// Risk metrics of a value series (VaR, drawdown, Sharpe, Sortino)
    Risk(RiskArgs),
    /// Apply crisis scenarios to a portfolio value
    StressTest(StressTestArgs),
    /// Monte Carlo runs of a full projection
    MonteCarlo(MonteCarloArgs),
    /// Percentile return scenarios from average and standard deviation
    Scenarios(ScenariosArgs),
    /// List or describe black swan events
    BlackSwan(BlackSwanArgs),
    /// Capital gains tax on a realized gain
    Tax(TaxArgs),
    /// Vorabpauschale of an accumulating fund for one year
    Vorabpauschale(VorabpauschaleArgs),
    /// Project care costs (Pflegekosten) and benefits
    CareCosts(CareCostsArgs),
    /// Accumulating fund vs. annual taxation
    TaxDeferral(TaxDeferralArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Simulate(args) => commands::plan::run_simulate(args),
        Commands::Accumulate(args) => commands::plan::run_accumulate(args),
        Commands::Withdraw(args) => commands::plan::run_withdraw(args),
        Commands::Compare(args) => commands::plan::run_compare(args),
        Commands::Risk(args) => commands::analysis::run_risk(args),
        Commands::StressTest(args) => commands::analysis::run_stress(args),
        Commands::MonteCarlo(args) => commands::analysis::run_mc(args),
        Commands::Scenarios(args) => commands::market::run_scenarios(args),
        Commands::BlackSwan(args) => commands::market::run_black_swan(args),
        Commands::Tax(args) => commands::tax::run_tax(args),
        Commands::Vorabpauschale(args) => commands::tax::run_vorabpauschale(args),
        Commands::CareCosts(args) => commands::tax::run_care_costs(args),
        Commands::TaxDeferral(args) => commands::analysis::run_tax_deferral(args),
        Commands::Version => {
            println!("zinseszins {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
