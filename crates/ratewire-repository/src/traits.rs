//! Core trait definitions for the repository pattern

use async_trait::async_trait;

use crate::{RepositoryContent, RepositoryResult};

/// Source of configuration artifacts.
///
/// A load returns every valid artifact the backend holds. Invalid documents
/// are skipped and listed in [`RepositoryContent::issues`]; only failures
/// that make the whole backend unreadable surface as errors.
///
/// # Examples
///
/// ```no_run
/// use ratewire_repository::{FileSystemRepository, Repository};
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let repo = FileSystemRepository::new("repository")?;
/// let content = repo.load_all().await?;
/// println!("{} rules, {} skipped documents", content.rules.len(), content.issues.len());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Repository: Send + Sync {
    /// Load every artifact
    async fn load_all(&self) -> RepositoryResult<RepositoryContent>;

    /// Human-readable location, used in logs
    fn describe(&self) -> String;
}
