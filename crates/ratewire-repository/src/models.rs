//! Data models for repository loads

use ratewire_core::ast::{MappingConfiguration, Pipeline, Rule, RuleSet};
use ratewire_parser::Artifact;
use serde::Serialize;
use std::collections::BTreeSet;

/// A document that could not be loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadIssue {
    /// Source of the document, relative to the repository root
    pub source: String,

    /// 1-based position of the document inside its source
    pub document: usize,

    pub message: String,
}

/// Every artifact a repository holds, plus the documents it had to skip
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepositoryContent {
    pub rules: Vec<Rule>,
    pub rule_sets: Vec<RuleSet>,
    pub mappings: Vec<MappingConfiguration>,
    pub pipelines: Vec<Pipeline>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<LoadIssue>,
}

/// Artifact counts of a load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContentSummary {
    pub rules: usize,
    pub rule_sets: usize,
    pub mappings: usize,
    pub pipelines: usize,
    pub issues: usize,
}

impl RepositoryContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an artifact; a second artifact of the same kind and id is
    /// reported as an issue and dropped
    pub fn push(&mut self, artifact: Artifact, source: &str, document: usize) {
        if self.contains(artifact.kind(), artifact.id()) {
            let message = format!("duplicate {} id '{}'", artifact.kind(), artifact.id());
            tracing::warn!(source, document, "{}", message);
            self.issues.push(LoadIssue {
                source: source.to_string(),
                document,
                message,
            });
            return;
        }

        match artifact {
            Artifact::Rule(rule) => self.rules.push(rule),
            Artifact::RuleSet(rule_set) => self.rule_sets.push(rule_set),
            Artifact::Mapping(mapping) => self.mappings.push(mapping),
            Artifact::Pipeline(pipeline) => self.pipelines.push(pipeline),
        }
    }

    pub fn push_issue(&mut self, source: &str, document: usize, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(source, document, error = %message, "Skipping invalid document");
        self.issues.push(LoadIssue {
            source: source.to_string(),
            document,
            message,
        });
    }

    pub fn contains(&self, kind: &str, id: &str) -> bool {
        match kind {
            "rule" => self.rules.iter().any(|r| r.id == id),
            "rule_set" => self.rule_sets.iter().any(|s| s.id == id),
            "mapping" => self.mappings.iter().any(|m| m.id == id),
            "pipeline" => self.pipelines.iter().any(|p| p.id == id),
            _ => false,
        }
    }

    pub fn summary(&self) -> ContentSummary {
        ContentSummary {
            rules: self.rules.len(),
            rule_sets: self.rule_sets.len(),
            mappings: self.mappings.len(),
            pipelines: self.pipelines.len(),
            issues: self.issues.len(),
        }
    }

    /// Rule ids referenced by rule sets but not defined anywhere
    pub fn dangling_rule_refs(&self) -> BTreeSet<&str> {
        let defined: BTreeSet<&str> = self.rules.iter().map(|r| r.id.as_str()).collect();
        self.rule_sets
            .iter()
            .flat_map(|s| s.rules.iter().map(String::as_str))
            .filter(|id| !defined.contains(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratewire_parser::{DocumentFormat, DocumentParser};

    fn artifact(yaml: &str) -> Artifact {
        DocumentParser::parse_one(yaml, DocumentFormat::Yaml).unwrap()
    }

    #[test]
    fn test_duplicates_become_issues() {
        let mut content = RepositoryContent::new();
        let rule = "rule: { id: tax, type: lookup, key_field: state, table: { CA: 0.05 } }";
        content.push(artifact(rule), "rules/a.yaml", 1);
        content.push(artifact(rule), "rules/b.yaml", 1);

        assert_eq!(content.rules.len(), 1);
        assert_eq!(content.issues.len(), 1);
        assert_eq!(content.issues[0].source, "rules/b.yaml");
        assert!(content.issues[0].message.contains("duplicate rule id 'tax'"));
    }

    #[test]
    fn test_dangling_rule_refs() {
        let mut content = RepositoryContent::new();
        content.push(
            artifact("rule: { id: tax, type: lookup, key_field: state, table: {} }"),
            "mem",
            1,
        );
        content.push(artifact("rule_set: { id: auto, rules: [tax, fees] }"), "mem", 2);

        assert_eq!(content.dangling_rule_refs().into_iter().collect::<Vec<_>>(), vec!["fees"]);
        assert_eq!(
            content.summary(),
            ContentSummary {
                rules: 1,
                rule_sets: 1,
                ..ContentSummary::default()
            }
        );
    }
}
