//! bias-pipeline - bias analysis for models produced by a training pipeline

pub mod cli;
pub mod cloud;
pub mod core;
pub mod execution;

// Re-export commonly used types
pub use cloud::{CloudError, ObjectStorage, PipelineService, ProcessingService};
pub use core::config::WorkflowConfig;
pub use core::{AnalysisConfig, BiasJobRequest, JobRecord, ModelArtifact, ReportArtifactSet};
pub use execution::{Workflow, WorkflowError, WorkflowEvent, WorkflowOutcome};
