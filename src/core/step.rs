//! Pipeline step records

use crate::core::state::StepStatus;
use serde::{Deserialize, Serialize};

/// Typed artifact reference carried in a step's metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepArtifact {
    /// A model created by a model-creation step
    Model { arn: String },
    /// A model package registered in the model registry
    RegisteredModel { arn: String },
    ProcessingJob { arn: String },
    TrainingJob { arn: String },
}

impl StepArtifact {
    pub fn arn(&self) -> &str {
        match self {
            StepArtifact::Model { arn }
            | StepArtifact::RegisteredModel { arn }
            | StepArtifact::ProcessingJob { arn }
            | StepArtifact::TrainingJob { arn } => arn,
        }
    }
}

/// One step of a pipeline execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub status: StepStatus,

    #[serde(default)]
    pub artifact: Option<StepArtifact>,

    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl StepRecord {
    pub fn new(name: impl Into<String>, status: StepStatus) -> Self {
        Self {
            name: name.into(),
            status,
            artifact: None,
            failure_reason: None,
        }
    }

    pub fn with_artifact(mut self, artifact: StepArtifact) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn with_failure(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }

    /// ARN of the model this step created, if it created one
    pub fn model_arn(&self) -> Option<&str> {
        match &self.artifact {
            Some(StepArtifact::Model { arn }) => Some(arn),
            _ => None,
        }
    }
}
