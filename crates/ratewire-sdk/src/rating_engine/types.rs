//! Result types of engine-level operations

use ratewire_repository::{ContentSummary, LoadIssue};
use serde::Serialize;

/// Artifact that parsed but was refused by its registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedArtifact {
    pub kind: String,
    pub message: String,
}

/// Outcome of a repository (re)load
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReloadReport {
    /// Artifacts now registered
    pub loaded: ContentSummary,

    /// Documents the repository could not parse
    pub issues: Vec<LoadIssue>,

    /// Parsed artifacts the registries refused
    pub rejected: Vec<RejectedArtifact>,

    /// Rule ids referenced by rule sets without a definition
    pub dangling_rule_refs: Vec<String>,
}

impl ReloadReport {
    /// True when every document loaded and registered
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.rejected.is_empty()
    }
}
