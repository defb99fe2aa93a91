use serde_json::Value;
use tabled::{builder::Builder, Table};

use super::{format_scalar, result_of, rows_of};

/// Format output as tables: the per-year rows (if any), then the remaining
/// scalar fields, warnings and methodology.
pub fn print_table(value: &Value) {
    let result = result_of(value);
    match result {
        Value::Array(arr) => print_array_table(arr),
        Value::Object(map) => {
            let row_key = rows_of(result).map(|(key, rows)| {
                print_array_table(rows);
                key
            });
            let mut builder = Builder::default();
            builder.push_record(["Field", "Value"]);
            let mut any = false;
            for (key, val) in map.iter().filter(|(k, _)| Some(k.as_str()) != row_key) {
                builder.push_record([key.as_str(), &format_value(val)]);
                any = true;
            }
            if any {
                if row_key.is_some() {
                    println!();
                }
                println!("{}", Table::from(builder));
            }
        }
        _ => println!("{}", format_scalar(result)),
    }

    let Some(envelope) = value.as_object() else {
        return;
    };
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }
    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_array_table(arr: &[Value]) {
    let Some(Value::Object(first)) = arr.first() else {
        if arr.is_empty() {
            println!("(empty)");
        }
        for item in arr {
            println!("{}", format_value(item));
        }
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(&headers);
    for item in arr {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                .collect();
            builder.push_record(row);
        }
    }
    println!("{}", Table::from(builder));
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::Array(arr) if arr.iter().all(|v| !v.is_object()) => {
            arr.iter().map(format_scalar).collect::<Vec<_>>().join(", ")
        }
        Value::Object(_) | Value::Array(_) => serde_json::to_string(value).unwrap_or_default(),
        _ => format_scalar(value),
    }
}
