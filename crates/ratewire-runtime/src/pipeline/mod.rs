//! Pipelines: routing, step orchestration and run traces

pub mod orchestrator;
pub mod registry;
pub mod router;
pub mod trace;

pub use orchestrator::PipelineOrchestrator;
pub use registry::{PipelineCatalog, PipelineRegistry};
pub use router::{route, PipelineRequest};
pub use trace::{PipelineRun, StepError, StepStatus, StepTrace};
