//! Built-in function whitelist
//!
//! The only functions an expression can call besides the custom functions of
//! its mapping configuration. All of them are pure.

use crate::error::{Result, RuntimeError};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use ratewire_core::Value;

/// Names callable from expressions
pub const BUILTINS: &[&str] = &[
    "abs", "age", "avg", "ceil", "coalesce", "concat", "contains", "date_diff_days", "default",
    "ends_with", "floor", "is_empty", "is_null", "join", "len", "length", "lower", "max", "min",
    "number", "pow", "replace", "round", "split", "starts_with", "string", "substring", "sum",
    "to_number", "to_string", "trim", "upper", "year",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Round half away from zero to `decimals` places
pub(crate) fn round_to(n: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals.min(12) as i32);
    (n * factor).round() / factor
}

/// Parse an ISO date, an RFC 3339 timestamp or a naive ISO timestamp
pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|d| d.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|d| d.date())
        })
}

/// Call a built-in by name
pub fn call_builtin(name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "abs" => unary_number(name, args, f64::abs),
        "ceil" => unary_number(name, args, f64::ceil),
        "floor" => unary_number(name, args, f64::floor),
        "round" => {
            arity(name, args, 1, 2)?;
            if args[0].is_null() {
                return Ok(Value::Null);
            }
            let decimals = match args.get(1) {
                Some(d) => number_arg(name, d)?.max(0.0) as u32,
                None => 0,
            };
            Ok(Value::Number(round_to(number_arg(name, &args[0])?, decimals)))
        }
        "pow" => {
            arity(name, args, 2, 2)?;
            Ok(Value::Number(
                number_arg(name, &args[0])?.powf(number_arg(name, &args[1])?),
            ))
        }
        "min" | "max" | "sum" | "avg" => aggregate(name, args),
        "number" | "to_number" => {
            arity(name, args, 1, 1)?;
            if args[0].is_null() {
                return Ok(Value::Null);
            }
            args[0].to_number().map(Value::Number).ok_or_else(|| {
                RuntimeError::TypeError(format!("'{}' is not numeric", args[0]))
            })
        }
        "string" | "to_string" => {
            arity(name, args, 1, 1)?;
            Ok(Value::String(args[0].to_display_string()))
        }
        "upper" => unary_string(name, args, |s| s.to_uppercase()),
        "lower" => unary_string(name, args, |s| s.to_lowercase()),
        "trim" => unary_string(name, args, |s| s.trim().to_string()),
        "len" | "length" => {
            arity(name, args, 1, 1)?;
            let len = match &args[0] {
                Value::Null => 0,
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                other => other.to_display_string().chars().count(),
            };
            Ok(Value::Number(len as f64))
        }
        "substring" => {
            arity(name, args, 2, 3)?;
            let text = string_arg(name, &args[0])?;
            let start = number_arg(name, &args[1])?.max(0.0) as usize;
            let chars = text.chars().skip(start);
            let out: String = match args.get(2) {
                Some(len) => chars.take(number_arg(name, len)?.max(0.0) as usize).collect(),
                None => chars.collect(),
            };
            Ok(Value::String(out))
        }
        "replace" => {
            arity(name, args, 3, 3)?;
            Ok(Value::String(string_arg(name, &args[0])?.replace(
                &string_arg(name, &args[1])?,
                &string_arg(name, &args[2])?,
            )))
        }
        "concat" => Ok(Value::String(
            args.iter()
                .filter(|a| !a.is_null())
                .map(Value::to_display_string)
                .collect(),
        )),
        "split" => {
            arity(name, args, 2, 2)?;
            let text = string_arg(name, &args[0])?;
            let separator = string_arg(name, &args[1])?;
            if separator.is_empty() {
                return Err(RuntimeError::InvalidOperation(
                    "split separator must not be empty".to_string(),
                ));
            }
            Ok(Value::Array(
                text.split(separator.as_str()).map(Value::from).collect(),
            ))
        }
        "join" => {
            arity(name, args, 1, 2)?;
            let items = args[0].as_array().ok_or_else(|| {
                RuntimeError::TypeError(format!("join expects an array, got {}", args[0].type_name()))
            })?;
            let separator = match args.get(1) {
                Some(s) => string_arg(name, s)?,
                None => String::new(),
            };
            Ok(Value::String(
                items
                    .iter()
                    .map(Value::to_display_string)
                    .collect::<Vec<_>>()
                    .join(&separator),
            ))
        }
        "contains" | "starts_with" | "ends_with" => {
            arity(name, args, 2, 2)?;
            let found = match (name, &args[0], &args[1]) {
                ("contains", Value::Array(items), needle) => items.contains(needle),
                ("contains", Value::String(s), needle) => s.contains(&needle.to_display_string()),
                ("starts_with", Value::String(s), p) => s.starts_with(&p.to_display_string()),
                ("ends_with", Value::String(s), p) => s.ends_with(&p.to_display_string()),
                (_, Value::Null, _) => false,
                (_, other, _) => {
                    return Err(RuntimeError::TypeError(format!(
                        "{} does not apply to {}",
                        name,
                        other.type_name()
                    )))
                }
            };
            Ok(Value::Bool(found))
        }
        "coalesce" => Ok(args.iter().find(|a| !a.is_null()).cloned().unwrap_or_default()),
        "default" => {
            arity(name, args, 2, 2)?;
            Ok(if args[0].is_null() { args[1].clone() } else { args[0].clone() })
        }
        "is_null" => {
            arity(name, args, 1, 1)?;
            Ok(Value::Bool(args[0].is_null()))
        }
        "is_empty" => {
            arity(name, args, 1, 1)?;
            let empty = match &args[0] {
                Value::Null => true,
                Value::String(s) => s.trim().is_empty(),
                Value::Array(items) => items.is_empty(),
                Value::Object(map) => map.is_empty(),
                _ => false,
            };
            Ok(Value::Bool(empty))
        }
        "year" => {
            arity(name, args, 1, 1)?;
            Ok(Value::Number(date_arg(name, &args[0])?.year() as f64))
        }
        "date_diff_days" => {
            arity(name, args, 2, 2)?;
            let from = date_arg(name, &args[0])?;
            let to = date_arg(name, &args[1])?;
            Ok(Value::Number((to - from).num_days() as f64))
        }
        "age" => {
            arity(name, args, 2, 2)?;
            let born = date_arg(name, &args[0])?;
            let on = date_arg(name, &args[1])?;
            let mut years = on.year() - born.year();
            if (on.month(), on.day()) < (born.month(), born.day()) {
                years -= 1;
            }
            Ok(Value::Number(years as f64))
        }
        _ => Err(RuntimeError::UnknownFunction(name.to_string())),
    }
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{}-{}", min, max)
        };
        return Err(RuntimeError::InvalidOperation(format!(
            "{} expects {} argument(s), got {}",
            name,
            expected,
            args.len()
        )));
    }
    Ok(())
}

fn number_arg(name: &str, value: &Value) -> Result<f64> {
    value.to_number().ok_or_else(|| {
        RuntimeError::TypeError(format!("{} expects a number, got {}", name, value.type_name()))
    })
}

fn string_arg(name: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(_) | Value::Bool(_) => Ok(value.to_display_string()),
        other => Err(RuntimeError::TypeError(format!(
            "{} expects a string, got {}",
            name,
            other.type_name()
        ))),
    }
}

fn date_arg(name: &str, value: &Value) -> Result<NaiveDate> {
    value
        .as_str()
        .and_then(parse_date)
        .ok_or_else(|| RuntimeError::TypeError(format!("{} expects a date, got '{}'", name, value)))
}

fn unary_number(name: &str, args: &[Value], f: fn(f64) -> f64) -> Result<Value> {
    arity(name, args, 1, 1)?;
    if args[0].is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::Number(f(number_arg(name, &args[0])?)))
}

fn unary_string(name: &str, args: &[Value], f: impl Fn(&str) -> String) -> Result<Value> {
    arity(name, args, 1, 1)?;
    match &args[0] {
        Value::Null => Ok(Value::Null),
        other => Ok(Value::String(f(&string_arg(name, other)?))),
    }
}

/// min/max/sum/avg over variadic arguments or a single array
fn aggregate(name: &str, args: &[Value]) -> Result<Value> {
    let items: &[Value] = match args {
        [Value::Array(items)] => items,
        _ => args,
    };
    let numbers = items
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| number_arg(name, v))
        .collect::<Result<Vec<f64>>>()?;

    if numbers.is_empty() {
        return Ok(match name {
            "sum" => Value::Number(0.0),
            _ => Value::Null,
        });
    }

    let result = match name {
        "min" => numbers.iter().copied().fold(f64::INFINITY, f64::min),
        "max" => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        "sum" => numbers.iter().sum(),
        _ => numbers.iter().sum::<f64>() / numbers.len() as f64,
    };
    Ok(Value::Number(result))
}
