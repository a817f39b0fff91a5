//! RatingEngine - facade over the registries, engines and repository

mod engine;
mod types;

pub use engine::RatingEngine;
pub use types::{RejectedArtifact, ReloadReport};
