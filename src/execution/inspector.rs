//! Finds the model created by the latest training pipeline run

use crate::cloud::PipelineService;
use crate::core::{ModelArtifact, PipelineExecution, DEFAULT_MODEL_STEP};
use crate::execution::error::Result;
use crate::execution::poller::PollPolicy;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Waits for the latest pipeline execution and reads its model step
pub struct PipelineInspector {
    service: Arc<dyn PipelineService>,
    policy: PollPolicy,
    model_step: String,
}

impl PipelineInspector {
    pub fn new(service: Arc<dyn PipelineService>) -> Self {
        Self {
            service,
            policy: PollPolicy::default(),
            model_step: DEFAULT_MODEL_STEP.to_string(),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Name of the step whose metadata carries the model
    pub fn with_model_step(mut self, marker: impl Into<String>) -> Self {
        self.model_step = marker.into();
        self
    }

    /// Block until the latest execution of `pipeline_name` is no longer running
    pub async fn wait_for_latest(&self, pipeline_name: &str) -> Result<PipelineExecution> {
        self.wait_for_latest_with(pipeline_name, |_| {}).await
    }

    /// Same as [`wait_for_latest`](Self::wait_for_latest), reporting every observed status
    pub async fn wait_for_latest_with<F>(
        &self,
        pipeline_name: &str,
        mut on_poll: F,
    ) -> Result<PipelineExecution>
    where
        F: FnMut(&PipelineExecution),
    {
        let target = format!("pipeline {}", pipeline_name);
        let mut execution = self
            .policy
            .run(
                &target,
                move || self.service.latest_execution(pipeline_name),
                |execution| {
                    debug!("Pipeline {} execution {} is {}", pipeline_name, execution.arn, execution.status);
                    on_poll(execution);
                    execution.is_terminal()
                },
            )
            .await?;

        execution.steps = self.service.list_steps(&execution.arn).await?;
        info!(
            "Latest execution of {} finished {} with {} steps",
            pipeline_name,
            execution.status,
            execution.steps.len()
        );
        Ok(execution)
    }

    /// Model created by the latest execution, if its model step reported one
    pub async fn find_model(&self, pipeline_name: &str) -> Result<Option<ModelArtifact>> {
        let execution = self.wait_for_latest(pipeline_name).await?;
        Ok(self.model_in(&execution))
    }

    /// Read the model artifact out of an already finished execution
    pub fn model_in(&self, execution: &PipelineExecution) -> Option<ModelArtifact> {
        let model = execution.model_artifact(&self.model_step);
        match &model {
            Some(model) => info!("Found model {} in step {}", model.name(), self.model_step),
            None => warn!(
                "Execution {} has no model in step '{}'",
                execution.arn, self.model_step
            ),
        }
        model
    }
}
