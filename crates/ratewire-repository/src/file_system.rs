//! File system based repository implementation
//!
//! Layout under the root:
//!
//! ```text
//! rules/**/*.{yaml,yml,json}
//! rule_sets/**/*.{yaml,yml,json}
//! mappings/**/*.{yaml,yml,json}
//! pipelines/**/*.{yaml,yml,json}
//! ```
//!
//! Every file may hold any artifact kind; the directories only organize the
//! tree. Files are read in sorted path order so duplicate resolution is
//! deterministic.

use async_trait::async_trait;
use path_absolutize::Absolutize;
use ratewire_parser::{DocumentFormat, DocumentParser};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::{error::RepositoryError, traits::Repository, RepositoryContent, RepositoryResult};

/// Directories scanned under the repository root
pub const ARTIFACT_DIRS: &[&str] = &["rules", "rule_sets", "mappings", "pipelines"];

/// File system based repository
#[derive(Debug, Clone)]
pub struct FileSystemRepository {
    /// Root path of the repository
    root_path: PathBuf,
}

impl FileSystemRepository {
    /// Create a new file system repository
    ///
    /// # Example
    /// ```no_run
    /// use ratewire_repository::FileSystemRepository;
    ///
    /// let repo = FileSystemRepository::new("repository").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(root_path: P) -> RepositoryResult<Self> {
        let path = root_path.as_ref();

        if !path.is_dir() {
            return Err(RepositoryError::InvalidPath {
                path: path.to_path_buf(),
            });
        }

        let abs_path = path
            .absolutize()
            .map_err(|e| RepositoryError::Other(format!("Failed to absolutize path: {}", e)))?
            .to_path_buf();

        Ok(Self { root_path: abs_path })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Artifact files under one of the artifact directories, sorted
    async fn list_artifact_files(&self, relative_dir: &str) -> RepositoryResult<Vec<PathBuf>> {
        let dir_path = self.root_path.join(relative_dir);

        if !dir_path.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        collect_artifact_files(&dir_path, &mut files).await?;
        files.sort();

        tracing::debug!(dir = relative_dir, files = files.len(), "Found artifact files");
        Ok(files)
    }

    async fn load_file(&self, path: &Path, format: DocumentFormat, content: &mut RepositoryContent) {
        let source = path
            .strip_prefix(&self.root_path)
            .unwrap_or(path)
            .display()
            .to_string();

        let text = match fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) => {
                content.push_issue(&source, 0, format!("failed to read file: {}", e));
                return;
            }
        };

        for (index, result) in DocumentParser::parse(&text, format).into_iter().enumerate() {
            match result {
                Ok(artifact) => {
                    tracing::debug!(%source, kind = artifact.kind(), id = artifact.id(), "Loaded artifact");
                    content.push(artifact, &source, index + 1);
                }
                Err(e) => content.push_issue(&source, index + 1, e.to_string()),
            }
        }
    }
}

/// Recursively collect YAML and JSON files
fn collect_artifact_files<'a>(
    dir: &'a Path,
    files: &'a mut Vec<PathBuf>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = RepositoryResult<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            if entry.file_type().await?.is_dir() {
                collect_artifact_files(&path, files).await?;
            } else if DocumentFormat::from_path(&path).is_some() {
                files.push(path);
            }
        }

        Ok(())
    })
}

#[async_trait]
impl Repository for FileSystemRepository {
    async fn load_all(&self) -> RepositoryResult<RepositoryContent> {
        let mut content = RepositoryContent::new();

        for dir in ARTIFACT_DIRS {
            for path in self.list_artifact_files(dir).await? {
                // Listed files always have a known extension
                if let Some(format) = DocumentFormat::from_path(&path) {
                    self.load_file(&path, format, &mut content).await;
                }
            }
        }

        let summary = content.summary();
        tracing::info!(
            root = %self.root_path.display(),
            rules = summary.rules,
            rule_sets = summary.rule_sets,
            mappings = summary.mappings,
            pipelines = summary.pipelines,
            issues = summary.issues,
            "Repository loaded"
        );
        Ok(content)
    }

    fn describe(&self) -> String {
        format!("file system repository at {}", self.root_path.display())
    }
}
