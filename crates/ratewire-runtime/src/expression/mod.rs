//! Restricted expression interpreter
//!
//! Evaluates the expression AST produced by `ratewire_parser::ExpressionParser`
//! against a layered scope. Only the whitelisted built-ins and the custom
//! functions of the calling configuration can be invoked.

pub mod builtins;
pub(crate) mod operators;

use crate::error::{Result, RuntimeError};
use operators::{execute_binary_op, execute_compare, execute_unary_op};
use ratewire_core::ast::{CustomFunction, Expression, Operator};
use ratewire_core::{FieldPath, Value};
use ratewire_parser::ExpressionParser;
use std::collections::BTreeMap;

/// Combined limit for expression nesting and custom function recursion
pub const MAX_EVAL_DEPTH: usize = 64;

/// Name resolution for field access.
///
/// Layers are searched in order; the first layer in which the whole path
/// resolves wins.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    layers: Vec<&'a Value>,
}

impl<'a> Scope<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self { layers: vec![root] }
    }

    /// Add a layer searched after the existing ones
    pub fn with_fallback(mut self, layer: &'a Value) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn resolve(&self, path: &[String]) -> Option<&'a Value> {
        let path = FieldPath::from_keys(path.iter().cloned());
        self.layers.iter().find_map(|layer| path.resolve(*layer))
    }
}

/// Expression evaluator
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionEvaluator<'f> {
    functions: Option<&'f BTreeMap<String, CustomFunction>>,
}

impl<'f> ExpressionEvaluator<'f> {
    /// Evaluator with built-ins only
    pub fn new() -> Self {
        Self { functions: None }
    }

    /// Evaluator that also resolves the given custom functions
    pub fn with_functions(functions: &'f BTreeMap<String, CustomFunction>) -> Self {
        Self {
            functions: Some(functions),
        }
    }

    /// Parse and evaluate an expression string
    pub fn evaluate_str(&self, source: &str, scope: &Scope<'_>) -> Result<Value> {
        let expr = ExpressionParser::parse(source)?;
        self.evaluate(&expr, scope)
    }

    /// Evaluate a parsed expression
    pub fn evaluate(&self, expr: &Expression, scope: &Scope<'_>) -> Result<Value> {
        self.eval(expr, scope, 0)
    }

    /// Invoke a custom function (or built-in) with explicit bindings.
    ///
    /// `value`, `context` and `args` are bound alongside the declared
    /// parameters.
    pub fn call_function(
        &self,
        name: &str,
        value: &Value,
        context: &Value,
        args: &[Value],
    ) -> Result<Value> {
        match self.functions.and_then(|f| f.get(name)) {
            Some(function) => {
                let mut bindings = BTreeMap::new();
                bindings.insert("value".to_string(), value.clone());
                bindings.insert("context".to_string(), context.clone());
                bindings.insert("args".to_string(), Value::Array(args.to_vec()));
                bind_params(&mut bindings, function, args);
                let bindings = Value::Object(bindings);
                let scope = Scope::new(&bindings).with_fallback(context);
                self.run_body(name, function, &scope, 1)
            }
            None => {
                let mut call_args = Vec::with_capacity(args.len() + 1);
                call_args.push(value.clone());
                call_args.extend_from_slice(args);
                builtins::call_builtin(name, &call_args)
            }
        }
    }

    fn eval(&self, expr: &Expression, scope: &Scope<'_>, depth: usize) -> Result<Value> {
        if depth > MAX_EVAL_DEPTH {
            return Err(RuntimeError::DepthExceeded(MAX_EVAL_DEPTH));
        }
        let next = depth + 1;

        match expr {
            Expression::Literal(value) => Ok(value.clone()),

            Expression::FieldAccess(path) => Ok(scope.resolve(path).cloned().unwrap_or_default()),

            Expression::List(items) => items
                .iter()
                .map(|item| self.eval(item, scope, next))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),

            Expression::Binary { left, op, right } => match op {
                Operator::And => {
                    let l = self.eval(left, scope, next)?;
                    if !l.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                    Ok(Value::Bool(self.eval(right, scope, next)?.is_truthy()))
                }
                Operator::Or => {
                    let l = self.eval(left, scope, next)?;
                    if l.is_truthy() {
                        return Ok(Value::Bool(true));
                    }
                    Ok(Value::Bool(self.eval(right, scope, next)?.is_truthy()))
                }
                op if op.is_comparison() => {
                    let l = self.eval(left, scope, next)?;
                    let r = self.eval(right, scope, next)?;
                    execute_compare(&l, *op, &r).map(Value::Bool)
                }
                op => {
                    let l = self.eval(left, scope, next)?;
                    let r = self.eval(right, scope, next)?;
                    execute_binary_op(&l, *op, &r)
                }
            },

            Expression::Unary { op, operand } => {
                let value = self.eval(operand, scope, next)?;
                execute_unary_op(&value, *op)
            }

            Expression::Ternary {
                condition,
                true_expr,
                false_expr,
            } => {
                if self.eval(condition, scope, next)?.is_truthy() {
                    self.eval(true_expr, scope, next)
                } else {
                    self.eval(false_expr, scope, next)
                }
            }

            Expression::FunctionCall { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, scope, next))
                    .collect::<Result<Vec<_>>>()?;

                match self.functions.and_then(|f| f.get(name)) {
                    Some(function) => {
                        let mut bindings = BTreeMap::new();
                        bindings.insert("args".to_string(), Value::Array(args.clone()));
                        bind_params(&mut bindings, function, &args);
                        let bindings = Value::Object(bindings);
                        let mut inner = Scope::new(&bindings);
                        inner.layers.extend(scope.layers.iter().copied());
                        self.run_body(name, function, &inner, next)
                    }
                    None => builtins::call_builtin(name, &args),
                }
            }
        }
    }

    fn run_body(
        &self,
        name: &str,
        function: &CustomFunction,
        scope: &Scope<'_>,
        depth: usize,
    ) -> Result<Value> {
        let body = ExpressionParser::parse(&function.expression)?;
        tracing::trace!(function = name, "Calling custom function");
        self.eval(&body, scope, depth)
    }
}

fn bind_params(bindings: &mut BTreeMap<String, Value>, function: &CustomFunction, args: &[Value]) {
    for (index, param) in function.params.iter().enumerate() {
        bindings.insert(param.clone(), args.get(index).cloned().unwrap_or_default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> Value {
        Value::from(serde_json::json!({
            "state": "CA",
            "limit": 2000000,
            "drivers": [{"age": 34}, {"age": 19}],
            "premium": "1,250.00"
        }))
    }

    fn eval(source: &str) -> Result<Value> {
        let facts = facts();
        ExpressionEvaluator::new().evaluate_str(source, &Scope::new(&facts))
    }

    #[test]
    fn test_field_access_and_arithmetic() {
        assert_eq!(eval("limit / 1000").unwrap(), Value::Number(2000.0));
        assert_eq!(eval("drivers[1].age + 1").unwrap(), Value::Number(20.0));
        assert_eq!(eval("premium * 2").unwrap(), Value::Number(2500.0));
        assert_eq!(eval("missing + 1").unwrap(), Value::Null);
    }

    #[test]
    fn test_logic_and_ternary() {
        assert_eq!(
            eval(r#"state == "CA" && limit > 1000000 ? "high" : "std""#).unwrap(),
            Value::from("high")
        );
        assert_eq!(eval(r#"state in ["NY", "NJ"]"#).unwrap(), Value::Bool(false));
        // Short circuit skips the failing right side
        assert_eq!(eval("false && (1 / 0)").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_builtin_calls() {
        assert_eq!(eval("round(limit * 0.00123, 2)").unwrap(), Value::Number(2460.0));
        assert_eq!(eval("lower(state)").unwrap(), Value::from("ca"));
        assert!(matches!(eval("system(\"rm\")"), Err(RuntimeError::UnknownFunction(_))));
    }

    #[test]
    fn test_custom_functions() {
        let mut functions = BTreeMap::new();
        functions.insert(
            "surcharge".to_string(),
            CustomFunction {
                params: vec!["base".to_string(), "rate".to_string()],
                expression: "round(base * rate, 2)".to_string(),
            },
        );
        functions.insert(
            "with_fee".to_string(),
            CustomFunction {
                params: vec!["amount".to_string()],
                expression: "surcharge(amount, 1.1) + 25".to_string(),
            },
        );
        let evaluator = ExpressionEvaluator::with_functions(&functions);
        let facts = facts();
        let scope = Scope::new(&facts);

        assert_eq!(
            evaluator.evaluate_str("with_fee(100)", &scope).unwrap(),
            Value::Number(135.0)
        );

        let result = evaluator
            .call_function("surcharge", &Value::Null, &facts, &[Value::Number(10.0), Value::Number(0.5)])
            .unwrap();
        assert_eq!(result, Value::Number(5.0));

        // Built-in fallback receives the value as first argument
        let result = evaluator
            .call_function("upper", &Value::from("ny"), &facts, &[])
            .unwrap();
        assert_eq!(result, Value::from("NY"));
    }

    #[test]
    fn test_runaway_recursion_is_bounded() {
        let mut functions = BTreeMap::new();
        functions.insert(
            "loop".to_string(),
            CustomFunction {
                params: vec!["n".to_string()],
                expression: "loop(n + 1)".to_string(),
            },
        );
        let evaluator = ExpressionEvaluator::with_functions(&functions);
        let facts = facts();
        let result = evaluator.evaluate_str("loop(0)", &Scope::new(&facts));
        assert!(matches!(result, Err(RuntimeError::DepthExceeded(_))));
    }

    #[test]
    fn test_scope_layers() {
        let bindings = Value::from(serde_json::json!({"value": 10}));
        let facts = facts();
        let scope = Scope::new(&bindings).with_fallback(&facts);
        let result = ExpressionEvaluator::new()
            .evaluate_str("value + limit", &scope)
            .unwrap();
        assert_eq!(result, Value::Number(2_000_010.0));
    }
}
