use serde_json::Value;

use super::{format_scalar, result_of};

/// Key answer fields, most specific first. Dotted paths descend into nested
/// objects.
const PRIORITY_KEYS: [&str; 12] = [
    "summary.final_capital",
    "final_capital",
    "success_rate",
    "deferral_advantage",
    "total_net_cost",
    "worst_case.stressed_value",
    "value_at_risk_5",
    "vorabpauschale",
    "tax_owed",
    "summary.label",
    "results.0.strategy",
    "duration",
];

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    let result = result_of(value);

    for key in PRIORITY_KEYS {
        if let Some(val) = lookup(result, key).filter(|v| !v.is_null()) {
            println!("{}", format_scalar(val));
            return;
        }
    }

    if let Value::Object(map) = result {
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_scalar(val));
            return;
        }
    }
    println!("{}", format_scalar(result));
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, part| match current {
        Value::Object(map) => map.get(part),
        Value::Array(arr) => part.parse::<usize>().ok().and_then(|i| arr.get(i)),
        _ => None,
    })
}
