//! Error types for the repository layer

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors that abort a whole repository load.
///
/// Problems with individual documents are not errors; they are reported as
/// [`LoadIssue`](crate::LoadIssue)s next to the artifacts that did load.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Root directory missing or not a directory
    #[error("Invalid repository path: {path}")]
    InvalidPath { path: PathBuf },

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("Repository error: {0}")]
    Other(String),
}
