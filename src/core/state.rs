//! Remote status values
//!
//! Statuses are the only fields refreshed after a record is created. Each
//! enum parses the service's wire spelling and knows which values are final.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a training pipeline execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineExecutionStatus {
    /// Execution is running
    Executing,
    /// A stop was requested but steps are still winding down
    Stopping,
    /// Execution was stopped
    Stopped,
    /// Execution failed
    Failed,
    /// Execution finished successfully
    Succeeded,
}

impl PipelineExecutionStatus {
    /// Check if the execution has settled
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineExecutionStatus::Stopped
                | PipelineExecutionStatus::Failed
                | PipelineExecutionStatus::Succeeded
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineExecutionStatus::Executing => "Executing",
            PipelineExecutionStatus::Stopping => "Stopping",
            PipelineExecutionStatus::Stopped => "Stopped",
            PipelineExecutionStatus::Failed => "Failed",
            PipelineExecutionStatus::Succeeded => "Succeeded",
        }
    }
}

impl FromStr for PipelineExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Executing" => Ok(PipelineExecutionStatus::Executing),
            "Stopping" => Ok(PipelineExecutionStatus::Stopping),
            "Stopped" => Ok(PipelineExecutionStatus::Stopped),
            "Failed" => Ok(PipelineExecutionStatus::Failed),
            "Succeeded" => Ok(PipelineExecutionStatus::Succeeded),
            other => Err(format!("Unknown pipeline execution status: {}", other)),
        }
    }
}

impl fmt::Display for PipelineExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Starting,
    Executing,
    Stopping,
    Stopped,
    Failed,
    Succeeded,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Starting => "Starting",
            StepStatus::Executing => "Executing",
            StepStatus::Stopping => "Stopping",
            StepStatus::Stopped => "Stopped",
            StepStatus::Failed => "Failed",
            StepStatus::Succeeded => "Succeeded",
        }
    }
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Starting" => Ok(StepStatus::Starting),
            "Executing" => Ok(StepStatus::Executing),
            "Stopping" => Ok(StepStatus::Stopping),
            "Stopped" => Ok(StepStatus::Stopped),
            "Failed" => Ok(StepStatus::Failed),
            "Succeeded" => Ok(StepStatus::Succeeded),
            other => Err(format!("Unknown step status: {}", other)),
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a bias processing job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    InProgress,
    Stopping,
    Stopped,
    Failed,
    Completed,
}

impl JobStatus {
    /// Check if the job has settled
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Stopped | JobStatus::Failed | JobStatus::Completed)
    }

    /// Terminal and produced artifacts
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::InProgress => "InProgress",
            JobStatus::Stopping => "Stopping",
            JobStatus::Stopped => "Stopped",
            JobStatus::Failed => "Failed",
            JobStatus::Completed => "Completed",
        }
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "InProgress" => Ok(JobStatus::InProgress),
            "Stopping" => Ok(JobStatus::Stopping),
            "Stopped" => Ok(JobStatus::Stopped),
            "Failed" => Ok(JobStatus::Failed),
            "Completed" => Ok(JobStatus::Completed),
            other => Err(format!("Unknown processing job status: {}", other)),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
