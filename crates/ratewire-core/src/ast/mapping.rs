//! Mapping configuration AST
//!
//! A mapping configuration translates documents between an external system
//! and the canonical form. Each field mapping names a source path, a target
//! path and one transformation:
//!
//! ```yaml
//! mapping:
//!   id: acme_auto_request
//!   source_system: acme
//!   target_system: canonical
//!   direction: to_canonical
//!   product_line: auto
//!   mappings:
//!     - source_path: $.policy.state
//!       target_path: risk.state
//!       transformation: lookup
//!       table: states
//!       required: true
//!     - source_path: $.policy.limit
//!       target_path: coverage.limit
//!       transformation: format
//!       format: number
//!       validators: ["min:0"]
//!   lookup_tables:
//!     states:
//!       entries: { California: CA, "New York": NY }
//! ```

use crate::error::{CoreError, Result};
use crate::path::FieldPath;
use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Translation direction relative to the canonical form
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    ToCanonical,
    FromCanonical,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ToCanonical => f.write_str("to_canonical"),
            Direction::FromCanonical => f.write_str("from_canonical"),
        }
    }
}

/// Registry key of a mapping configuration
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MappingKey {
    pub source_system: String,
    pub target_system: String,
    pub product_line: Option<String>,
    pub direction: Direction,
}

impl MappingKey {
    pub fn new(
        source_system: impl Into<String>,
        target_system: impl Into<String>,
        product_line: Option<&str>,
        direction: Direction,
    ) -> Self {
        Self {
            source_system: source_system.into(),
            target_system: target_system.into(),
            product_line: product_line.map(str::to_string),
            direction,
        }
    }

    /// Same key without product line scoping
    pub fn unscoped(&self) -> Self {
        Self {
            product_line: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} [{}] ({})",
            self.source_system,
            self.target_system,
            self.product_line.as_deref().unwrap_or("*"),
            self.direction
        )
    }
}

/// A mapping configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingConfiguration {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub source_system: String,
    pub target_system: String,
    pub direction: Direction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_line: Option<String>,

    #[serde(default = "default_version")]
    pub version: u32,

    /// Field mappings in execution order
    #[serde(default)]
    pub mappings: Vec<FieldMapping>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub lookup_tables: BTreeMap<String, LookupTable>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub functions: BTreeMap<String, CustomFunction>,
}

fn default_version() -> u32 {
    1
}

impl MappingConfiguration {
    pub fn key(&self) -> MappingKey {
        MappingKey::new(
            &self.source_system,
            &self.target_system,
            self.product_line.as_deref(),
            self.direction,
        )
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| CoreError::invalid_definition("mapping", &self.id, message);

        if self.id.trim().is_empty() {
            return Err(invalid("id must not be empty".to_string()));
        }

        for (index, field) in self.mappings.iter().enumerate() {
            if field.target_path.trim().is_empty() {
                return Err(invalid(format!("mapping {} has no target_path", index)));
            }
            FieldPath::parse(&field.target_path).map_err(|e| invalid(e.to_string()))?;
            if let Some(source) = &field.source_path {
                FieldPath::parse(source).map_err(|e| invalid(e.to_string()))?;
            }
        }

        for (name, function) in &self.functions {
            let mut seen = BTreeSet::new();
            for param in &function.params {
                if matches!(param.as_str(), "value" | "context" | "args") {
                    return Err(invalid(format!(
                        "function '{}' shadows reserved name '{}'",
                        name, param
                    )));
                }
                if !seen.insert(param) {
                    return Err(invalid(format!(
                        "function '{}' declares '{}' twice",
                        name, param
                    )));
                }
            }
        }

        Ok(())
    }
}

/// One field of a mapping configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Absent for transformations that ignore the source (constant, concat)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,

    pub target_path: String,

    #[serde(flatten)]
    pub transformation: Transformation,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<ValidatorSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldMapping {
    pub fn new(
        source_path: Option<&str>,
        target_path: impl Into<String>,
        transformation: Transformation,
    ) -> Self {
        Self {
            source_path: source_path.map(str::to_string),
            target_path: target_path.into(),
            transformation,
            required: false,
            validators: Vec::new(),
            description: None,
        }
    }

    pub fn direct(source_path: &str, target_path: impl Into<String>) -> Self {
        Self::new(Some(source_path), target_path, Transformation::Direct)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_validators(mut self, validators: Vec<ValidatorSpec>) -> Self {
        self.validators = validators;
        self
    }
}

/// Transformation applied to a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transformation", rename_all = "snake_case")]
pub enum Transformation {
    /// Pass the source value through
    Direct,

    /// Emit a fixed value
    Constant { value: Value },

    /// Translate through a named lookup table
    Lookup {
        table: String,
        /// Sub-key read from an object source value
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Value>,
    },

    /// Evaluate an expression with `value` and `context` bound
    Expression { expression: String },

    /// Call a custom function of the configuration, or a built-in
    Function {
        function: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<Value>,
    },

    /// Test a condition; the source passes through when no branch value is given
    Conditional {
        condition: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        then_value: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        else_value: Option<Value>,
    },

    /// Join several source fields
    Concat {
        fields: Vec<String>,
        #[serde(default)]
        separator: String,
    },

    /// Split a string source
    Split {
        separator: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
    },

    Format {
        format: FormatKind,
        /// Output pattern (`%Y-%m-%d` for dates, `{name}` template for custom)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        /// Parse pattern for date inputs that are not ISO-8601
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input_pattern: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        decimals: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        currency_symbol: Option<String>,
    },

    /// Substitute a value for null or missing sources
    Default { default: Value },
}

impl Transformation {
    pub fn kind(&self) -> &'static str {
        match self {
            Transformation::Direct => "direct",
            Transformation::Constant { .. } => "constant",
            Transformation::Lookup { .. } => "lookup",
            Transformation::Expression { .. } => "expression",
            Transformation::Function { .. } => "function",
            Transformation::Conditional { .. } => "conditional",
            Transformation::Concat { .. } => "concat",
            Transformation::Split { .. } => "split",
            Transformation::Format { .. } => "format",
            Transformation::Default { .. } => "default",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    Date,
    Currency,
    Number,
    Phone,
    Custom,
}

/// Named lookup table of a configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LookupTable {
    #[serde(default)]
    pub entries: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Configuration-local function with a restricted expression body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFunction {
    /// Names bound to the call arguments, in order
    #[serde(default)]
    pub params: Vec<String>,

    pub expression: String,
}

/// Validator declared on a field, written as `name` or `name:param`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ValidatorSpec {
    Required,
    Min(f64),
    Max(f64),
    MinLength(usize),
    MaxLength(usize),
    Pattern(String),
    Email,
    /// Optional chrono format; ISO-8601 when absent
    Date(Option<String>),
    Numeric,
    OneOf(Vec<String>),
    /// Unrecognized name or unusable parameter, kept verbatim
    Unknown(String),
}

impl From<String> for ValidatorSpec {
    fn from(raw: String) -> Self {
        let (name, param) = match raw.split_once(':') {
            Some((name, param)) => (name.trim(), Some(param.trim())),
            None => (raw.trim(), None),
        };

        let parsed = match (name, param) {
            ("required", None) => Some(ValidatorSpec::Required),
            ("min", Some(p)) => p.parse().ok().map(ValidatorSpec::Min),
            ("max", Some(p)) => p.parse().ok().map(ValidatorSpec::Max),
            ("min_length", Some(p)) => p.parse().ok().map(ValidatorSpec::MinLength),
            ("max_length", Some(p)) => p.parse().ok().map(ValidatorSpec::MaxLength),
            ("pattern", Some(p)) => Some(ValidatorSpec::Pattern(p.to_string())),
            ("email", None) => Some(ValidatorSpec::Email),
            ("date", p) => Some(ValidatorSpec::Date(p.map(str::to_string))),
            ("numeric", None) => Some(ValidatorSpec::Numeric),
            ("one_of", Some(p)) => Some(ValidatorSpec::OneOf(
                p.split(',').map(|s| s.trim().to_string()).collect(),
            )),
            _ => None,
        };

        parsed.unwrap_or(ValidatorSpec::Unknown(raw))
    }
}

impl From<&str> for ValidatorSpec {
    fn from(raw: &str) -> Self {
        ValidatorSpec::from(raw.to_string())
    }
}

impl From<ValidatorSpec> for String {
    fn from(spec: ValidatorSpec) -> Self {
        match spec {
            ValidatorSpec::Required => "required".to_string(),
            ValidatorSpec::Min(n) => format!("min:{}", Value::Number(n)),
            ValidatorSpec::Max(n) => format!("max:{}", Value::Number(n)),
            ValidatorSpec::MinLength(n) => format!("min_length:{}", n),
            ValidatorSpec::MaxLength(n) => format!("max_length:{}", n),
            ValidatorSpec::Pattern(p) => format!("pattern:{}", p),
            ValidatorSpec::Email => "email".to_string(),
            ValidatorSpec::Date(None) => "date".to_string(),
            ValidatorSpec::Date(Some(f)) => format!("date:{}", f),
            ValidatorSpec::Numeric => "numeric".to_string(),
            ValidatorSpec::OneOf(values) => format!("one_of:{}", values.join(",")),
            ValidatorSpec::Unknown(raw) => raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
id: acme_auto_request
source_system: acme
target_system: canonical
direction: to_canonical
product_line: auto
mappings:
  - source_path: $.policy.state
    target_path: risk.state
    transformation: lookup
    table: states
    required: true
  - source_path: $.policy.limit
    target_path: coverage.limit
    transformation: format
    format: number
    decimals: 2
    validators: ["min:0", "max:5000000"]
  - target_path: meta.source
    transformation: constant
    value: acme
  - source_path: insured.name
    target_path: insured.name
    transformation: direct
lookup_tables:
  states:
    entries: { California: CA, "New York": NY }
functions:
  double:
    params: [n]
    expression: n * 2
"#;

    #[test]
    fn test_parse_mapping_configuration() {
        let config: MappingConfiguration = serde_yaml::from_str(CONFIG).unwrap();
        config.validate().unwrap();

        assert_eq!(config.direction, Direction::ToCanonical);
        assert_eq!(config.mappings.len(), 4);
        assert_eq!(config.mappings[0].transformation.kind(), "lookup");
        assert!(config.mappings[0].required);
        assert_eq!(
            config.mappings[1].validators,
            vec![ValidatorSpec::Min(0.0), ValidatorSpec::Max(5_000_000.0)]
        );
        assert_eq!(
            config.mappings[2].transformation,
            Transformation::Constant { value: Value::from("acme") }
        );
        assert_eq!(config.mappings[3].transformation, Transformation::Direct);
        assert_eq!(config.functions["double"].params, vec!["n"]);
        assert_eq!(
            config.key(),
            MappingKey::new("acme", "canonical", Some("auto"), Direction::ToCanonical)
        );
    }

    #[test]
    fn test_unknown_transformation_is_rejected() {
        let yaml = "target_path: a\ntransformation: javascript\n";
        assert!(serde_yaml::from_str::<FieldMapping>(yaml).is_err());
    }

    #[test]
    fn test_validator_spec_parsing() {
        assert_eq!(ValidatorSpec::from("required"), ValidatorSpec::Required);
        assert_eq!(ValidatorSpec::from("min_length:3"), ValidatorSpec::MinLength(3));
        assert_eq!(
            ValidatorSpec::from("pattern:^[A-Z]{2}:\\d+$"),
            ValidatorSpec::Pattern("^[A-Z]{2}:\\d+$".to_string())
        );
        assert_eq!(
            ValidatorSpec::from("one_of:CA, NY,TX"),
            ValidatorSpec::OneOf(vec!["CA".into(), "NY".into(), "TX".into()])
        );
        assert_eq!(ValidatorSpec::from("date"), ValidatorSpec::Date(None));
        assert_eq!(
            ValidatorSpec::from("min:abc"),
            ValidatorSpec::Unknown("min:abc".to_string())
        );
        assert_eq!(
            ValidatorSpec::from("luhn"),
            ValidatorSpec::Unknown("luhn".to_string())
        );
        assert_eq!(String::from(ValidatorSpec::Min(0.0)), "min:0");
    }

    #[test]
    fn test_validate_rejects_bad_target_path() {
        let mut config: MappingConfiguration = serde_yaml::from_str(CONFIG).unwrap();
        config.mappings[0].target_path = "risk..state".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_reserved_param() {
        let mut config: MappingConfiguration = serde_yaml::from_str(CONFIG).unwrap();
        config.functions.insert(
            "bad".to_string(),
            CustomFunction {
                params: vec!["value".to_string()],
                expression: "value".to_string(),
            },
        );
        assert!(config.validate().is_err());
    }
}
