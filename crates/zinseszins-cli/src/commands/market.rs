use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use zinseszins_core::returns::historical::{black_swan_events, find_black_swan_event};
use zinseszins_core::returns::scenarios::{create_scenarios, describe_black_swan, ScenarioInput};

/// Arguments for percentile return scenarios
#[derive(Args)]
pub struct ScenariosArgs {
    /// Average annual return (e.g. 0.07)
    #[arg(long, allow_hyphen_values = true)]
    pub average_return: Decimal,

    /// Standard deviation of annual returns (e.g. 0.15)
    #[arg(long)]
    pub std_dev: Decimal,
}

/// Arguments for black swan events
#[derive(Args)]
pub struct BlackSwanArgs {
    /// Event id; lists all events when absent
    #[arg(long)]
    pub event: Option<String>,

    /// First year the event is placed on
    #[arg(long, requires = "event")]
    pub start_year: Option<i32>,
}

pub fn run_scenarios(args: ScenariosArgs) -> Result<Value, Box<dyn std::error::Error>> {
    if args.std_dev < Decimal::ZERO {
        return Err("--std-dev must not be negative".into());
    }
    let scenarios = create_scenarios(&ScenarioInput {
        average_return: args.average_return,
        standard_deviation: args.std_dev,
    });
    Ok(serde_json::to_value(scenarios)?)
}

pub fn run_black_swan(args: BlackSwanArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let Some(id) = args.event else {
        return Ok(serde_json::to_value(black_swan_events())?);
    };
    let event = find_black_swan_event(&id).ok_or_else(|| {
        let known: Vec<String> = black_swan_events().into_iter().map(|e| e.id).collect();
        format!("Unknown event '{}'. Known: {}", id, known.join(", "))
    })?;
    let start_year = args.start_year.unwrap_or(2000);
    let overrides = event.overrides_from(start_year);
    Ok(json!({
        "result": {
            "event": event,
            "overrides": overrides,
            "summary": describe_black_swan(Some(&overrides)),
        }
    }))
}
