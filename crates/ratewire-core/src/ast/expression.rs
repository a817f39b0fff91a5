//! Expression AST nodes
//!
//! The formula language used by expression/conditional transformations,
//! custom functions and computed rule actions. No assignments, loops or host
//! calls: only the nodes below and the runtime's built-in functions.

use super::operator::Operator;
use crate::types::Value;
use serde::{Deserialize, Serialize};

/// Expression AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// Literal value
    Literal(Value),

    /// Field access (e.g., value, policy.limit, drivers.0.age)
    FieldAccess(Vec<String>),

    /// List literal (e.g., ["CA", "NY"])
    List(Vec<Expression>),

    /// Binary operation
    Binary {
        left: Box<Expression>,
        op: Operator,
        right: Box<Expression>,
    },

    /// Unary operation
    Unary {
        op: UnaryOperator,
        operand: Box<Expression>,
    },

    /// Function call
    FunctionCall { name: String, args: Vec<Expression> },

    /// Ternary conditional (condition ? true_expr : false_expr)
    Ternary {
        condition: Box<Expression>,
        true_expr: Box<Expression>,
        false_expr: Box<Expression>,
    },
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// Logical NOT (!)
    Not,
    /// Arithmetic negation (-)
    Negate,
}

impl Expression {
    /// Create a literal expression
    pub fn literal(value: Value) -> Self {
        Expression::Literal(value)
    }

    /// Create a field access expression
    pub fn field_access(path: Vec<String>) -> Self {
        Expression::FieldAccess(path)
    }

    /// Create a binary expression
    pub fn binary(left: Expression, op: Operator, right: Expression) -> Self {
        Expression::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Create a function call expression
    pub fn function_call(name: String, args: Vec<Expression>) -> Self {
        Expression::FunctionCall { name, args }
    }

    /// Create a unary expression
    pub fn unary(op: UnaryOperator, operand: Expression) -> Self {
        Expression::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Create a ternary expression
    pub fn ternary(condition: Expression, true_expr: Expression, false_expr: Expression) -> Self {
        Expression::Ternary {
            condition: Box::new(condition),
            true_expr: Box::new(true_expr),
            false_expr: Box::new(false_expr),
        }
    }

    /// Nesting depth of the tree
    pub fn depth(&self) -> usize {
        match self {
            Expression::Literal(_) | Expression::FieldAccess(_) => 1,
            Expression::List(items) => 1 + items.iter().map(Expression::depth).max().unwrap_or(0),
            Expression::Binary { left, right, .. } => 1 + left.depth().max(right.depth()),
            Expression::Unary { operand, .. } => 1 + operand.depth(),
            Expression::FunctionCall { args, .. } => {
                1 + args.iter().map(Expression::depth).max().unwrap_or(0)
            }
            Expression::Ternary {
                condition,
                true_expr,
                false_expr,
            } => 1 + condition.depth().max(true_expr.depth()).max(false_expr.depth()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_expression() {
        // policy.limit > 1000000
        let expr = Expression::binary(
            Expression::field_access(vec!["policy".to_string(), "limit".to_string()]),
            Operator::Gt,
            Expression::literal(Value::Number(1_000_000.0)),
        );

        match expr {
            Expression::Binary { left, op, right } => {
                assert_eq!(op, Operator::Gt);
                assert_eq!(
                    *left,
                    Expression::FieldAccess(vec!["policy".to_string(), "limit".to_string()])
                );
                assert_eq!(*right, Expression::Literal(Value::Number(1_000_000.0)));
            }
            _ => panic!("Expected Binary expression"),
        }
    }

    #[test]
    fn test_depth() {
        // (value + 3) * 2
        let expr = Expression::binary(
            Expression::binary(
                Expression::field_access(vec!["value".to_string()]),
                Operator::Add,
                Expression::literal(Value::Number(3.0)),
            ),
            Operator::Mul,
            Expression::literal(Value::Number(2.0)),
        );
        assert_eq!(expr.depth(), 3);

        let call = Expression::function_call("round".to_string(), vec![expr]);
        assert_eq!(call.depth(), 4);
    }

    #[test]
    fn test_ternary_expression() {
        // value < 18 ? 0 : 100
        let expr = Expression::ternary(
            Expression::binary(
                Expression::field_access(vec!["value".to_string()]),
                Operator::Lt,
                Expression::literal(Value::Number(18.0)),
            ),
            Expression::literal(Value::Number(0.0)),
            Expression::literal(Value::Number(100.0)),
        );

        match expr {
            Expression::Ternary {
                condition,
                true_expr,
                false_expr,
            } => {
                assert!(matches!(*condition, Expression::Binary { .. }));
                assert_eq!(*true_expr, Expression::Literal(Value::Number(0.0)));
                assert_eq!(*false_expr, Expression::Literal(Value::Number(100.0)));
            }
            _ => panic!("Expected Ternary expression"),
        }
    }
}
