// Per-contest-group pipeline: processing transforms, table/snapshot storage,
// the stage machine and the multi-group runner

pub mod orchestrator;
pub mod processing;
pub mod runner;
pub mod storage;

pub use orchestrator::{Pipeline, PipelineFailure, PipelineResult, PipelineSettings, PipelineStage};
pub use runner::{run_groups, RunSummary};
