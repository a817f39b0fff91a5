//! Unary operator execution

use crate::error::{Result, RuntimeError};
use ratewire_core::ast::UnaryOperator;
use ratewire_core::Value;

/// Execute a unary operation
pub(crate) fn execute_unary_op(operand: &Value, op: UnaryOperator) -> Result<Value> {
    match op {
        UnaryOperator::Not => Ok(Value::Bool(!operand.is_truthy())),
        UnaryOperator::Negate => match operand {
            Value::Null => Ok(Value::Null),
            Value::Number(n) => Ok(Value::Number(-n)),
            Value::String(_) => operand
                .to_number()
                .map(|n| Value::Number(-n))
                .ok_or_else(|| RuntimeError::TypeError(format!("cannot negate '{}'", operand))),
            other => Err(RuntimeError::TypeError(format!(
                "cannot negate {}",
                other.type_name()
            ))),
        },
    }
}
