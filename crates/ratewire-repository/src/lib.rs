//! Repository abstraction layer for Ratewire
//!
//! A repository is the configuration store the engine loads rules, rule
//! sets, mappings and pipelines from. Loads are all-or-nothing per
//! document: a malformed artifact is reported and skipped, the rest load.
//!
//! # Quick Start
//!
//! ```no_run
//! use ratewire_repository::{FileSystemRepository, Repository};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let repo = FileSystemRepository::new("repository")?;
//!     let content = repo.load_all().await?;
//!
//!     for issue in &content.issues {
//!         eprintln!("{} #{}: {}", issue.source, issue.document, issue.message);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod file_system;
pub mod memory;
pub mod models;
pub mod traits;

// Re-exports - Error
pub use error::{RepositoryError, RepositoryResult};

// Re-exports - Repositories
pub use file_system::FileSystemRepository;
pub use memory::MemoryRepository;
pub use models::{ContentSummary, LoadIssue, RepositoryContent};
pub use traits::Repository;
