//! Operator execution modules
//!
//! Shared by the expression evaluator and by conditional rule conditions.

mod binary;
mod comparison;
mod unary;

pub(crate) use binary::execute_binary_op;
pub(crate) use comparison::{execute_compare, loose_equal};
pub(crate) use unary::execute_unary_op;
