pub mod error;
pub mod orchestrator;
pub mod run;

pub use error::PipelineError;
pub use orchestrator::PipelineOrchestrator;
pub use run::{FailedChunk, PipelineRun, PipelineStage, RunReport, RunStatus};
