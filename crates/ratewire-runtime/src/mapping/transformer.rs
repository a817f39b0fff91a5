//! Field transformer
//!
//! A pure function from (field mapping, source document) to the value that
//! should be written at the mapping's target path. `Ok(None)` means the value
//! is undefined and nothing is written.

use super::format::{format_value, FormatSpec};
use super::FieldError;
use crate::error::ErrorCode;
use crate::expression::{ExpressionEvaluator, Scope};
use ratewire_core::ast::{
    CustomFunction, FieldMapping, LookupTable, MappingConfiguration, Transformation,
};
use ratewire_core::path::lookup;
use ratewire_core::Value;
use std::collections::BTreeMap;

/// Everything a transformation may read besides the field mapping itself
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    pub source: &'a Value,
    pub lookup_tables: &'a BTreeMap<String, LookupTable>,
    pub functions: &'a BTreeMap<String, CustomFunction>,
}

impl<'a> TransformContext<'a> {
    pub fn new(config: &'a MappingConfiguration, source: &'a Value) -> Self {
        Self {
            source,
            lookup_tables: &config.lookup_tables,
            functions: &config.functions,
        }
    }
}

/// Field transformer
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldTransformer;

impl FieldTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Transform one field
    pub fn transform(
        &self,
        mapping: &FieldMapping,
        context: &TransformContext<'_>,
    ) -> Result<Option<Value>, FieldError> {
        let value = mapping
            .source_path
            .as_deref()
            .and_then(|path| lookup(context.source, path));

        if mapping.required && mapping.source_path.is_some() && value.map_or(true, Value::is_null) {
            return Err(FieldError::new(
                &mapping.target_path,
                ErrorCode::RequiredFieldMissing,
                format!(
                    "required source '{}' is missing",
                    mapping.source_path.as_deref().unwrap_or_default()
                ),
            ));
        }

        let fail = |message: String| {
            FieldError::new(&mapping.target_path, ErrorCode::TransformationError, message)
        };
        let evaluator = ExpressionEvaluator::with_functions(context.functions);

        match &mapping.transformation {
            Transformation::Direct => Ok(value.cloned()),

            Transformation::Constant { value } => Ok(Some(value.clone())),

            Transformation::Lookup {
                table: table_name,
                key,
                default,
            } => {
                let table = context
                    .lookup_tables
                    .get(table_name)
                    .ok_or_else(|| fail(format!("unknown lookup table '{}'", table_name)))?;

                let lookup_key = match key {
                    Some(key) => value.and_then(|v| v.get(key)),
                    None => value,
                };
                // An absent key falls through the defaults but never fails
                let Some(lookup_key) = lookup_key.filter(|v| !v.is_null()) else {
                    return Ok(default.as_ref().or(table.default.as_ref()).cloned());
                };

                let lookup_key = lookup_key.to_display_string();
                table
                    .entries
                    .get(&lookup_key)
                    .or(default.as_ref())
                    .or(table.default.as_ref())
                    .cloned()
                    .map(Some)
                    .ok_or_else(|| {
                        fail(format!("no entry for '{}' in table '{}'", lookup_key, table_name))
                    })
            }

            Transformation::Expression { expression } => {
                let bindings = bindings(value, context.source);
                let scope = Scope::new(&bindings).with_fallback(context.source);
                evaluator
                    .evaluate_str(expression, &scope)
                    .map(Some)
                    .map_err(|e| fail(e.to_string()))
            }

            Transformation::Function { function, args } => evaluator
                .call_function(function, value.unwrap_or(&Value::Null), context.source, args)
                .map(Some)
                .map_err(|e| fail(e.to_string())),

            Transformation::Conditional {
                condition,
                then_value,
                else_value,
            } => {
                let bindings = bindings(value, context.source);
                let scope = Scope::new(&bindings).with_fallback(context.source);
                let holds = evaluator
                    .evaluate_str(condition, &scope)
                    .map_err(|e| fail(e.to_string()))?
                    .is_truthy();
                if holds {
                    Ok(then_value.clone().or_else(|| value.cloned()))
                } else {
                    Ok(else_value.clone())
                }
            }

            Transformation::Concat { fields, separator } => {
                let mut parts = Vec::with_capacity(fields.len());
                for field in fields {
                    match lookup(context.source, field) {
                        None | Some(Value::Null) => continue,
                        Some(Value::Array(_)) | Some(Value::Object(_)) => {
                            return Err(fail(format!("cannot concatenate container field '{}'", field)))
                        }
                        Some(part) => parts.push(part.to_display_string()),
                    }
                }
                Ok((!parts.is_empty()).then(|| Value::String(parts.join(separator))))
            }

            Transformation::Split { separator, index } => {
                let text = match value {
                    None | Some(Value::Null) => return Ok(None),
                    Some(Value::String(s)) => s,
                    Some(other) => {
                        return Err(fail(format!("cannot split {}", other.type_name())))
                    }
                };
                if separator.is_empty() {
                    return Err(fail("split separator must not be empty".to_string()));
                }
                let mut parts = text.split(separator.as_str()).map(|p| Value::String(p.to_string()));
                Ok(match index {
                    Some(index) => parts.nth(*index),
                    None => Some(Value::Array(parts.collect())),
                })
            }

            Transformation::Format {
                format,
                pattern,
                input_pattern,
                decimals,
                currency_symbol,
            } => {
                let Some(value) = value.filter(|v| !v.is_null()) else {
                    return Ok(None);
                };
                let spec = FormatSpec {
                    kind: *format,
                    pattern: pattern.as_deref(),
                    input_pattern: input_pattern.as_deref(),
                    decimals: *decimals,
                    currency_symbol: currency_symbol.as_deref(),
                };
                format_value(&spec, value, context.source).map(Some).map_err(fail)
            }

            Transformation::Default { default } => Ok(Some(
                value
                    .filter(|v| !v.is_null())
                    .cloned()
                    .unwrap_or_else(|| default.clone()),
            )),
        }
    }
}

/// `value` and `context` bound for expressions and conditions
fn bindings(value: Option<&Value>, source: &Value) -> Value {
    let mut bindings = BTreeMap::new();
    bindings.insert("value".to_string(), value.cloned().unwrap_or_default());
    bindings.insert("context".to_string(), source.clone());
    Value::Object(bindings)
}
