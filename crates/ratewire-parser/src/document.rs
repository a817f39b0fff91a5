//! Artifact document parser
//!
//! Configuration artifacts are YAML or JSON documents wrapped in a single
//! envelope key naming their kind:
//!
//! ```yaml
//! rule:
//!   id: state_tax
//!   type: lookup
//!   key_field: state
//!   table: { CA: 0.05 }
//! ---
//! rule_set:
//!   id: auto_rating
//!   rules: [state_tax]
//! ```
//!
//! A YAML file may hold several documents separated by `---`; a JSON file
//! holds one envelope or an array of envelopes. Each document parses and
//! validates independently, so one bad artifact never hides its neighbours.

use crate::error::{ParseError, Result};
use ratewire_core::ast::{MappingConfiguration, Pipeline, Rule, RuleSet};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A parsed and validated configuration artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    Rule(Rule),
    RuleSet(RuleSet),
    Mapping(MappingConfiguration),
    Pipeline(Pipeline),
}

/// On-disk shape: exactly one of the fields is present
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    rule: Option<Rule>,
    rule_set: Option<RuleSet>,
    mapping: Option<MappingConfiguration>,
    pipeline: Option<Pipeline>,
}

impl Envelope {
    fn into_artifact(self) -> Option<Artifact> {
        self.rule
            .map(Artifact::Rule)
            .or(self.rule_set.map(Artifact::RuleSet))
            .or(self.mapping.map(Artifact::Mapping))
            .or(self.pipeline.map(Artifact::Pipeline))
    }
}

impl Artifact {
    pub fn id(&self) -> &str {
        match self {
            Artifact::Rule(r) => &r.id,
            Artifact::RuleSet(s) => &s.id,
            Artifact::Mapping(m) => &m.id,
            Artifact::Pipeline(p) => &p.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Artifact::Rule(_) => "rule",
            Artifact::RuleSet(_) => "rule_set",
            Artifact::Mapping(_) => "mapping",
            Artifact::Pipeline(_) => "pipeline",
        }
    }

    /// Check the artifact's structural invariants
    pub fn validate(&self) -> Result<()> {
        match self {
            Artifact::Rule(r) => r.validate()?,
            Artifact::RuleSet(s) => s.validate()?,
            Artifact::Mapping(m) => m.validate()?,
            Artifact::Pipeline(p) => p.validate()?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    /// Infer the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(DocumentFormat::Yaml),
            "json" => Some(DocumentFormat::Json),
            _ => None,
        }
    }
}

const ENVELOPES: &[&str] = &["rule", "rule_set", "mapping", "pipeline"];

/// Artifact document parser
pub struct DocumentParser;

impl DocumentParser {
    /// Parse every document in `content`; one result per non-empty document
    pub fn parse(content: &str, format: DocumentFormat) -> Vec<Result<Artifact>> {
        match format {
            DocumentFormat::Yaml => Self::parse_yaml(content),
            DocumentFormat::Json => Self::parse_json(content),
        }
    }

    /// Parse exactly one artifact
    pub fn parse_one(content: &str, format: DocumentFormat) -> Result<Artifact> {
        let mut results = Self::parse(content, format);
        match results.len() {
            1 => results.remove(0),
            0 => Err(ParseError::UnknownEnvelope("empty document".to_string())),
            n => Err(ParseError::UnknownEnvelope(format!(
                "expected a single document, found {}",
                n
            ))),
        }
    }

    pub fn parse_yaml(content: &str) -> Vec<Result<Artifact>> {
        let mut results = Vec::new();
        for document in serde_yaml::Deserializer::from_str(content) {
            let value = match serde_yaml::Value::deserialize(document) {
                Ok(serde_yaml::Value::Null) => continue,
                Ok(value) => value,
                Err(e) => {
                    // A syntax error ends the stream
                    results.push(Err(ParseError::YamlError(e)));
                    break;
                }
            };
            results.push(Self::yaml_artifact(value));
        }
        results
    }

    pub fn parse_json(content: &str) -> Vec<Result<Artifact>> {
        match serde_json::from_str::<serde_json::Value>(content) {
            Ok(serde_json::Value::Array(items)) => {
                items.into_iter().map(Self::json_artifact).collect()
            }
            Ok(serde_json::Value::Null) => Vec::new(),
            Ok(value) => vec![Self::json_artifact(value)],
            Err(e) => vec![Err(ParseError::JsonError(e))],
        }
    }

    fn yaml_artifact(value: serde_yaml::Value) -> Result<Artifact> {
        let envelope = match &value {
            serde_yaml::Value::Mapping(map) if map.len() == 1 => map
                .keys()
                .next()
                .and_then(|k| k.as_str())
                .map(str::to_string),
            _ => None,
        };
        Self::check_envelope(envelope)?;
        let envelope: Envelope = serde_yaml::from_value(value)?;
        Self::finish(envelope)
    }

    fn json_artifact(value: serde_json::Value) -> Result<Artifact> {
        let envelope = match &value {
            serde_json::Value::Object(map) if map.len() == 1 => map.keys().next().cloned(),
            _ => None,
        };
        Self::check_envelope(envelope)?;
        let envelope: Envelope = serde_json::from_value(value)?;
        Self::finish(envelope)
    }

    fn finish(envelope: Envelope) -> Result<Artifact> {
        let artifact = envelope
            .into_artifact()
            .ok_or_else(|| ParseError::UnknownEnvelope("envelope has no body".to_string()))?;
        artifact.validate()?;
        Ok(artifact)
    }

    fn check_envelope(envelope: Option<String>) -> Result<()> {
        match envelope {
            Some(key) if ENVELOPES.contains(&key.as_str()) => Ok(()),
            Some(key) => Err(ParseError::UnknownEnvelope(key)),
            None => Err(ParseError::UnknownEnvelope(format!(
                "document must have exactly one of the keys {}",
                ENVELOPES.join(", ")
            ))),
        }
    }
}
