//! In-memory repository

use async_trait::async_trait;
use ratewire_parser::{DocumentFormat, DocumentParser};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{traits::Repository, RepositoryContent, RepositoryResult};

/// Repository backed by documents held in memory.
///
/// Clones share the same content, so a test or an embedding application can
/// keep a handle, change the documents and trigger a reload.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    documents: Arc<RwLock<Vec<(String, String, DocumentFormat)>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`add_yaml`](Self::add_yaml)
    pub fn with_yaml(self, name: impl Into<String>, content: impl Into<String>) -> Self {
        if let Ok(mut documents) = self.documents.try_write() {
            documents.push((name.into(), content.into(), DocumentFormat::Yaml));
        }
        self
    }

    /// Add a named YAML source (may hold several documents)
    pub async fn add_yaml(&self, name: impl Into<String>, content: impl Into<String>) {
        self.add(name.into(), content.into(), DocumentFormat::Yaml).await;
    }

    pub async fn add_json(&self, name: impl Into<String>, content: impl Into<String>) {
        self.add(name.into(), content.into(), DocumentFormat::Json).await;
    }

    /// Remove a source by name
    pub async fn remove(&self, name: &str) -> bool {
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|(n, _, _)| n != name);
        documents.len() != before
    }

    async fn add(&self, name: String, content: String, format: DocumentFormat) {
        let mut documents = self.documents.write().await;
        // Same name replaces the earlier source
        documents.retain(|(n, _, _)| *n != name);
        documents.push((name, content, format));
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn load_all(&self) -> RepositoryResult<RepositoryContent> {
        let documents = self.documents.read().await;
        let mut content = RepositoryContent::new();

        for (name, text, format) in documents.iter() {
            for (index, result) in DocumentParser::parse(text, *format).into_iter().enumerate() {
                match result {
                    Ok(artifact) => content.push(artifact, name, index + 1),
                    Err(e) => content.push_issue(name, index + 1, e.to_string()),
                }
            }
        }
        Ok(content)
    }

    fn describe(&self) -> String {
        "in-memory repository".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_reports_bad_documents() {
        let repo = MemoryRepository::new().with_yaml(
            "rules.yaml",
            r#"
rule: { id: tax, type: lookup, key_field: state, table: { CA: 0.05 } }
---
rule: { id: broken, type: spreadsheet }
---
widget: { id: w }
"#,
        );
        repo.add_json("pipelines.json", r#"{"pipeline": {"id": "p", "steps": [{"order": 1, "type": "validate"}]}}"#)
            .await;

        let content = repo.load_all().await.unwrap();
        assert_eq!(content.rules.len(), 1);
        assert_eq!(content.pipelines.len(), 1);
        assert_eq!(content.issues.len(), 2);
        assert_eq!(content.issues[0].document, 2);
        assert_eq!(content.issues[1].document, 3);
        assert!(content.issues[1].message.contains("widget"));
    }

    #[tokio::test]
    async fn test_clones_share_documents() {
        let repo = MemoryRepository::new();
        let handle = repo.clone();
        handle
            .add_yaml("a", "rule: { id: a, type: lookup, key_field: k, table: {} }")
            .await;
        assert_eq!(repo.load_all().await.unwrap().rules.len(), 1);

        assert!(handle.remove("a").await);
        assert!(repo.load_all().await.unwrap().rules.is_empty());
    }
}
