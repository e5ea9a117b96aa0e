//! Trailing `--key value` flags turned into a JSON configuration layer.

use heck::ToLowerCamelCase;
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};

/// Configuration key for a flag or env variable name. `manifest-variables`
/// and `MANIFEST_VARIABLES` both become `manifestVariables`, `USERNAME`
/// becomes `username`; names that are already camelCase pass through.
pub fn config_key(name: &str) -> String {
    let shouting = !name.chars().any(|c| c.is_ascii_lowercase());
    if shouting || name.contains('-') || name.contains('_') {
        name.to_lower_camel_case()
    } else {
        name.to_string()
    }
}

/// Auto-insert `--` before the step options of a step command.
///
/// Global flags written after the step name are moved in front of the
/// separator, so `deploystep xs-deploy --mode BGDeploy --verbose` and
/// `deploystep --verbose xs-deploy --mode BGDeploy` parse the same.
/// `globals` lists each known flag and whether it takes a value.
/// If `--` is already present, args pass through unchanged.
pub fn normalize_step_args(args: Vec<String>, steps: &[&str], globals: &[(&str, bool)]) -> Vec<String> {
    if args.iter().any(|a| a == "--") {
        return args;
    }

    let takes_value = |arg: &str| -> Option<bool> {
        let name = arg.split_once('=').map(|(n, _)| n).unwrap_or(arg);
        globals
            .iter()
            .find(|(flag, _)| *flag == name)
            .map(|(_, value)| *value && !arg.contains('='))
    };

    let mut position = None;
    let mut i = 1;
    while i < args.len() {
        let arg = args[i].as_str();
        if steps.contains(&arg) {
            position = Some(i);
            break;
        }
        i += if takes_value(arg) == Some(true) { 2 } else { 1 };
    }
    let Some(position) = position else {
        return args;
    };

    let mut result: Vec<String> = args[..=position].to_vec();
    let mut rest = Vec::new();
    let mut iter = args[position + 1..].iter();
    while let Some(arg) = iter.next() {
        match takes_value(arg) {
            Some(has_value) => {
                result.push(arg.clone());
                if has_value {
                    if let Some(value) = iter.next() {
                        result.push(value.clone());
                    }
                }
            }
            None => rest.push(arg.clone()),
        }
    }
    if !rest.is_empty() {
        result.push("--".to_string());
        result.extend(rest);
    }
    result
}

/// Parse `--key value` pairs (also `--key=value`) into a JSON object.
/// A repeated key collects its values into an array.
pub fn parse_kv_flags(extra: &[String]) -> Result<Value> {
    let mut obj = Map::new();
    let mut iter = extra.iter();

    while let Some(arg) = iter.next() {
        let Some(flag) = arg.strip_prefix("--") else {
            return Err(Error::validation_invalid_argument(
                "args",
                format!("Unexpected argument '{}', expected --<key> <value>", arg),
                None,
            ));
        };
        let (name, raw) = match flag.split_once('=') {
            Some((name, raw)) => (name, raw.to_string()),
            None => {
                let raw = iter.next().ok_or_else(|| {
                    Error::validation_invalid_argument(
                        flag,
                        format!("Missing value for flag --{}", flag),
                        None,
                    )
                })?;
                (flag, raw.clone())
            }
        };
        insert_accumulating(&mut obj, config_key(name), parse_value(&raw));
    }

    Ok(Value::Object(obj))
}

fn insert_accumulating(obj: &mut Map<String, Value>, key: String, value: Value) {
    match obj.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            obj.insert(key, value);
        }
    }
}

/// Parse a string value into appropriate JSON type.
/// Order: JSON literal → bool → number → string
pub fn parse_value(s: &str) -> Value {
    if let Ok(v) = serde_json::from_str(s) {
        return v;
    }
    if s == "true" {
        return json!(true);
    }
    if s == "false" {
        return json!(false);
    }
    if let Ok(n) = s.parse::<i64>() {
        return json!(n);
    }
    if let Ok(n) = s.parse::<f64>() {
        return json!(n);
    }
    json!(s)
}
