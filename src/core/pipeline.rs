//! Training pipeline execution records

use crate::core::state::PipelineExecutionStatus;
use crate::core::step::StepRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the step that creates the model, unless configured otherwise
pub const DEFAULT_MODEL_STEP: &str = "CreateModel";

/// One run of the training pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineExecution {
    pub arn: String,
    pub status: PipelineExecutionStatus,

    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    /// Steps in the order the service lists them; empty until listed
    #[serde(default)]
    pub steps: Vec<StepRecord>,
}

impl PipelineExecution {
    pub fn new(arn: impl Into<String>, status: PipelineExecutionStatus) -> Self {
        Self {
            arn: arn.into(),
            status,
            started_at: None,
            steps: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// The model created by the step named `marker`
    ///
    /// Returns `None` when no such step exists or it carries no model, e.g.
    /// when a quality gate upstream rejected the candidate.
    pub fn model_artifact(&self, marker: &str) -> Option<ModelArtifact> {
        self.steps
            .iter()
            .filter(|s| s.name == marker)
            .find_map(|s| s.model_arn())
            .map(ModelArtifact::new)
    }
}

/// A model created by the training pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub arn: String,
}

impl ModelArtifact {
    pub fn new(arn: impl Into<String>) -> Self {
        Self { arn: arn.into() }
    }

    /// Model name, the last segment of the ARN
    pub fn name(&self) -> &str {
        self.arn.rsplit('/').next().unwrap_or(&self.arn)
    }
}
