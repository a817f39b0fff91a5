//! Field paths
//!
//! Paths address values inside facts and documents. Two spellings are
//! accepted and normalize to the same segments:
//! - root-relative: `$.policy.drivers[0].age`, `$['policy']['effective date']`
//! - dotted: `policy.drivers.0.age`
//!
//! Reads never fail: a path that does not resolve yields `None`. Writes create
//! intermediate objects and arrays as needed.

use crate::error::{CoreError, Result};
use crate::types::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Upper bound for array indices created by writes
const MAX_WRITE_INDEX: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A parsed field path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Parse a path expression
    pub fn parse(input: &str) -> Result<Self> {
        let raw = input.trim();
        let mut rest = raw;

        if let Some(stripped) = rest.strip_prefix('$') {
            rest = stripped.strip_prefix('.').unwrap_or(stripped);
        }

        let invalid = |message: &str| CoreError::InvalidPath {
            path: raw.to_string(),
            message: message.to_string(),
        };

        let chars: Vec<char> = rest.chars().collect();
        let mut segments = Vec::new();
        let mut i = 0;
        let mut expect_segment = !chars.is_empty();

        while i < chars.len() {
            match chars[i] {
                '.' => {
                    if expect_segment {
                        return Err(invalid("empty segment"));
                    }
                    expect_segment = true;
                    i += 1;
                }
                '[' => {
                    i += 1;
                    let quote = chars.get(i).copied().filter(|c| *c == '\'' || *c == '"');
                    if let Some(q) = quote {
                        i += 1;
                        let start = i;
                        while i < chars.len() && chars[i] != q {
                            i += 1;
                        }
                        if i >= chars.len() {
                            return Err(invalid("unterminated quoted key"));
                        }
                        let key: String = chars[start..i].iter().collect();
                        i += 1;
                        if chars.get(i) != Some(&']') {
                            return Err(invalid("expected ']'"));
                        }
                        segments.push(PathSegment::Key(key));
                    } else {
                        let start = i;
                        while i < chars.len() && chars[i] != ']' {
                            i += 1;
                        }
                        if i >= chars.len() {
                            return Err(invalid("unterminated index"));
                        }
                        let text: String = chars[start..i].iter().collect();
                        let index = text
                            .trim()
                            .parse::<usize>()
                            .map_err(|_| invalid("index must be a non-negative integer"))?;
                        segments.push(PathSegment::Index(index));
                    }
                    i += 1;
                    expect_segment = false;
                }
                _ => {
                    let start = i;
                    while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                        i += 1;
                    }
                    let key: String = chars[start..i].iter().collect();
                    let key = key.trim();
                    if key.is_empty() {
                        return Err(invalid("empty segment"));
                    }
                    segments.push(PathSegment::Key(key.to_string()));
                    expect_segment = false;
                }
            }
        }

        if expect_segment {
            return Err(invalid("path ends with a separator"));
        }

        Ok(Self { segments })
    }

    /// Build a path from plain keys
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: keys.into_iter().map(|k| PathSegment::Key(k.into())).collect(),
        }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// True for `$` (the document root)
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Resolve the path against a value
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
                (PathSegment::Key(key), Value::Array(items)) => {
                    items.get(key.parse::<usize>().ok()?)?
                }
                (PathSegment::Index(index), Value::Array(items)) => items.get(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Write a value at the path, creating intermediate containers
    ///
    /// Fails without touching `root` when an index exceeds the write bound.
    /// A type conflict can only occur on an existing value, so no containers
    /// are created before one is reported.
    pub fn set(&self, root: &mut Value, value: Value) -> Result<()> {
        if let Some(index) = self.segments.iter().find_map(|segment| match segment {
            PathSegment::Index(index) if *index > MAX_WRITE_INDEX => Some(*index),
            _ => None,
        }) {
            return Err(CoreError::PathConflict {
                path: self.to_string(),
                message: format!("index {} exceeds {}", index, MAX_WRITE_INDEX),
            });
        }
        set_in(root, &self.segments, value, self)
    }
}

fn set_in(current: &mut Value, segments: &[PathSegment], value: Value, path: &FieldPath) -> Result<()> {
    let Some((head, rest)) = segments.split_first() else {
        *current = value;
        return Ok(());
    };

    match head {
        PathSegment::Key(key) => {
            if current.is_null() {
                *current = Value::Object(BTreeMap::new());
            }
            match current {
                Value::Object(map) => {
                    let child = map.entry(key.clone()).or_insert(Value::Null);
                    set_in(child, rest, value, path)
                }
                other => Err(CoreError::PathConflict {
                    path: path.to_string(),
                    message: format!("cannot set key '{}' on {}", key, other.type_name()),
                }),
            }
        }
        PathSegment::Index(index) => {
            if current.is_null() {
                *current = Value::Array(Vec::new());
            }
            match current {
                Value::Array(items) => {
                    if items.len() <= *index {
                        items.resize(index + 1, Value::Null);
                    }
                    set_in(&mut items[*index], rest, value, path)
                }
                other => Err(CoreError::PathConflict {
                    path: path.to_string(),
                    message: format!("cannot set index {} on {}", index, other.type_name()),
                }),
            }
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            match segment {
                PathSegment::Key(key) => write!(f, ".{}", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

/// Resolve a fact reference.
///
/// An exact top-level key wins over path interpretation, so facts named
/// `"driver.age"` stay addressable.
pub fn lookup<'a>(root: &'a Value, reference: &str) -> Option<&'a Value> {
    if let Some(value) = root.get(reference) {
        return Some(value);
    }
    FieldPath::parse(reference).ok()?.resolve(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Value {
        Value::from(serde_json::json!({
            "policy": {
                "state": "CA",
                "drivers": [{"age": 34}, {"age": 19}],
                "effective date": "2026-01-01"
            },
            "driver.age": 50
        }))
    }

    #[test]
    fn test_parse_root_relative_and_dotted_agree() {
        let a = FieldPath::parse("$.policy.drivers[1].age").unwrap();
        let b = FieldPath::parse("policy.drivers[1].age").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "$.policy.drivers[1].age");
    }

    #[test]
    fn test_resolve_paths() {
        let doc = doc();
        let age = FieldPath::parse("$.policy.drivers[0].age").unwrap();
        assert_eq!(age.resolve(&doc), Some(&Value::Number(34.0)));

        let dotted_index = FieldPath::parse("policy.drivers.1.age").unwrap();
        assert_eq!(dotted_index.resolve(&doc), Some(&Value::Number(19.0)));

        let quoted = FieldPath::parse("$['policy']['effective date']").unwrap();
        assert_eq!(quoted.resolve(&doc), Some(&Value::String("2026-01-01".to_string())));
    }

    #[test]
    fn test_resolve_missing_is_none() {
        let doc = doc();
        assert!(FieldPath::parse("policy.vehicles[0]").unwrap().resolve(&doc).is_none());
        assert!(FieldPath::parse("policy.state.code").unwrap().resolve(&doc).is_none());
    }

    #[test]
    fn test_root_path() {
        let doc = doc();
        let root = FieldPath::parse("$").unwrap();
        assert!(root.is_root());
        assert_eq!(root.resolve(&doc), Some(&doc));
    }

    #[test]
    fn test_parse_errors() {
        assert!(FieldPath::parse("a..b").is_err());
        assert!(FieldPath::parse("a.").is_err());
        assert!(FieldPath::parse("a[x]").is_err());
        assert!(FieldPath::parse("a['b").is_err());
    }

    #[test]
    fn test_set_creates_intermediate_containers() {
        let mut target = Value::object();
        FieldPath::parse("insured.vehicles[1].vin").unwrap()
            .set(&mut target, Value::from("1HGCM"))
            .unwrap();

        let expected = Value::from(serde_json::json!({
            "insured": {"vehicles": [null, {"vin": "1HGCM"}]}
        }));
        assert_eq!(target, expected);
    }

    #[test]
    fn test_set_conflict() {
        let mut target = Value::from(serde_json::json!({"insured": "scalar"}));
        let err = FieldPath::parse("insured.name").unwrap()
            .set(&mut target, Value::from("x"))
            .unwrap_err();
        assert!(matches!(err, CoreError::PathConflict { .. }));
    }

    #[test]
    fn test_set_out_of_bound_index_leaves_target_untouched() {
        let mut target = Value::object();
        let err = FieldPath::parse("a.b[20000]").unwrap()
            .set(&mut target, Value::from("x"))
            .unwrap_err();
        assert!(matches!(err, CoreError::PathConflict { .. }));
        assert_eq!(target, Value::object());
    }

    #[test]
    fn test_lookup_prefers_exact_key() {
        let doc = doc();
        assert_eq!(lookup(&doc, "driver.age"), Some(&Value::Number(50.0)));
        assert_eq!(lookup(&doc, "policy.state"), Some(&Value::String("CA".to_string())));
        assert_eq!(lookup(&doc, "missing"), None);
    }
}
