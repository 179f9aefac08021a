//! Remote services used by the bias workflow
//!
//! Every component receives its service client explicitly, so a run can be
//! pointed at the managed service or at the simulated backend.

pub mod error;
#[cfg(feature = "sagemaker")]
pub mod sagemaker;
pub mod simulated;
pub mod storage;

use crate::core::{BiasJobRequest, JobName, JobRecord, PipelineExecution, StepRecord};
use async_trait::async_trait;

pub use error::CloudError;
#[cfg(feature = "sagemaker")]
pub use sagemaker::SageMakerClient;
pub use simulated::{JobOutcome, SimulatedPipelineService, SimulatedProcessingService};
pub use storage::{ObjectStorage, StoredObject};

/// Orchestration service that runs training pipelines
#[async_trait]
pub trait PipelineService: Send + Sync {
    /// Most recent execution of a pipeline, without its steps
    async fn latest_execution(&self, pipeline_name: &str) -> Result<PipelineExecution, CloudError>;

    /// Steps of an execution, in the order the service reports them
    async fn list_steps(&self, execution_arn: &str) -> Result<Vec<StepRecord>, CloudError>;
}

/// Managed processing service that runs the bias analysis
#[async_trait]
pub trait ProcessingService: Send + Sync {
    /// Start a job; the returned record is in its initial state
    async fn submit(&self, request: &BiasJobRequest) -> Result<JobRecord, CloudError>;

    /// Current state of a job
    async fn describe(&self, job_name: &JobName) -> Result<JobRecord, CloudError>;
}
