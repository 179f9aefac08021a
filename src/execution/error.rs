//! Errors raised while running a bias workflow

use crate::cloud::CloudError;
use crate::core::{DatasetError, DescriptorError, JobName, JobStatus};
use std::time::Duration;
use thiserror::Error;

/// Error types for workflow execution
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No model found in step '{marker}' of the latest execution of pipeline '{pipeline}'")]
    ModelNotFound { pipeline: String, marker: String },

    #[error("Bias job {job} ended {status}: {reason}")]
    JobFailed {
        job: JobName,
        status: JobStatus,
        reason: String,
    },

    #[error("Gave up waiting for {target} after {attempts} queries ({elapsed:?})")]
    PollTimeout {
        target: String,
        attempts: u32,
        elapsed: Duration,
    },
}

impl WorkflowError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        WorkflowError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<DescriptorError> for WorkflowError {
    fn from(err: DescriptorError) -> Self {
        WorkflowError::InvalidConfig(err.to_string())
    }
}

impl From<DatasetError> for WorkflowError {
    fn from(err: DatasetError) -> Self {
        WorkflowError::InvalidConfig(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
