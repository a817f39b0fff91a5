//! Binary operator execution (arithmetic, string and membership)

use super::comparison::loose_equal;
use crate::error::{Result, RuntimeError};
use ratewire_core::ast::Operator;
use ratewire_core::Value;

/// Execute a non-logical binary operation
pub(crate) fn execute_binary_op(left: &Value, op: Operator, right: &Value) -> Result<Value> {
    match op {
        Operator::Add | Operator::Sub | Operator::Mul | Operator::Div | Operator::Mod => {
            arithmetic(left, op, right)
        }
        Operator::Contains => contains(left, right).map(Value::Bool),
        Operator::In => contains(right, left).map(Value::Bool),
        Operator::NotIn => contains(right, left).map(|found| Value::Bool(!found)),
        Operator::StartsWith | Operator::EndsWith => match (left, right) {
            (Value::Null, _) | (_, Value::Null) => Ok(Value::Bool(false)),
            (Value::String(l), Value::String(r)) => Ok(Value::Bool(if op == Operator::StartsWith {
                l.starts_with(r.as_str())
            } else {
                l.ends_with(r.as_str())
            })),
            _ => Err(incompatible(left, op, right)),
        },
        _ => Err(RuntimeError::InvalidOperation(format!(
            "'{}' is not a binary value operator",
            op.symbol()
        ))),
    }
}

fn arithmetic(left: &Value, op: Operator, right: &Value) -> Result<Value> {
    // Missing operands propagate as null
    if left.is_null() || right.is_null() {
        tracing::debug!(op = op.symbol(), "Null operand in arithmetic, returning Null");
        return Ok(Value::Null);
    }

    if op == Operator::Add {
        if let (Value::String(_), _) | (_, Value::String(_)) = (left, right) {
            return Ok(Value::String(format!(
                "{}{}",
                left.to_display_string(),
                right.to_display_string()
            )));
        }
    }

    let (Some(l), Some(r)) = (numeric(left), numeric(right)) else {
        return Err(incompatible(left, op, right));
    };

    match op {
        Operator::Add => Ok(Value::Number(l + r)),
        Operator::Sub => Ok(Value::Number(l - r)),
        Operator::Mul => Ok(Value::Number(l * r)),
        Operator::Div if r == 0.0 => Err(RuntimeError::DivisionByZero),
        Operator::Div => Ok(Value::Number(l / r)),
        Operator::Mod if r == 0.0 => Err(RuntimeError::DivisionByZero),
        Operator::Mod => Ok(Value::Number(l % r)),
        _ => Err(incompatible(left, op, right)),
    }
}

/// Numbers and numeric strings; booleans are not arithmetic operands
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::String(_) => value.to_number(),
        _ => None,
    }
}

/// Membership test of `needle` in `haystack`
fn contains(haystack: &Value, needle: &Value) -> Result<bool> {
    match (haystack, needle) {
        (Value::Null, _) => Ok(false),
        (Value::Array(items), needle) => Ok(items.iter().any(|item| loose_equal(item, needle))),
        (Value::String(s), Value::String(sub)) => Ok(s.contains(sub.as_str())),
        (Value::String(s), Value::Number(_)) => Ok(s.contains(&needle.to_display_string())),
        (Value::Object(map), Value::String(key)) => Ok(map.contains_key(key)),
        _ => Err(RuntimeError::InvalidOperation(format!(
            "cannot test whether {} contains {}",
            haystack.type_name(),
            needle.type_name()
        ))),
    }
}

fn incompatible(left: &Value, op: Operator, right: &Value) -> RuntimeError {
    RuntimeError::InvalidOperation(format!(
        "cannot apply '{}' to {} and {}",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}
