//! Comparison operator execution

use crate::error::{Result, RuntimeError};
use ratewire_core::ast::Operator;
use ratewire_core::Value;
use std::cmp::Ordering;

/// Equality that treats a number and its numeric string form as equal
pub(crate) fn loose_equal(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    match (left, right) {
        (Value::Number(n), Value::String(_)) => right.to_number() == Some(*n),
        (Value::String(_), Value::Number(n)) => left.to_number() == Some(*n),
        _ => false,
    }
}

/// Execute a comparison operation
pub(crate) fn execute_compare(left: &Value, op: Operator, right: &Value) -> Result<bool> {
    match op {
        Operator::Eq => return Ok(loose_equal(left, right)),
        Operator::Ne => return Ok(!loose_equal(left, right)),
        _ => {}
    }

    // Missing values never satisfy an ordering
    if left.is_null() || right.is_null() {
        tracing::debug!(op = op.symbol(), "Null in ordering comparison, returning false");
        return Ok(false);
    }

    let ordering = order(left, right).ok_or_else(|| {
        RuntimeError::InvalidOperation(format!(
            "cannot compare {} and {} with '{}'",
            left.type_name(),
            right.type_name(),
            op.symbol()
        ))
    })?;

    match op {
        Operator::Gt => Ok(ordering == Ordering::Greater),
        Operator::Ge => Ok(ordering != Ordering::Less),
        Operator::Lt => Ok(ordering == Ordering::Less),
        Operator::Le => Ok(ordering != Ordering::Greater),
        _ => Err(RuntimeError::InvalidOperation(format!(
            "'{}' is not a comparison operator",
            op.symbol()
        ))),
    }
}

fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.partial_cmp(r),
        (Value::Number(l), Value::String(_)) => l.partial_cmp(&right.to_number()?),
        (Value::String(_), Value::Number(r)) => left.to_number()?.partial_cmp(r),
        // ISO dates order correctly as strings
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => None,
    }
}
