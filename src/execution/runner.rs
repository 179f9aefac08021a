//! Submits the bias analysis job and waits for it

use crate::cloud::{ObjectStorage, ProcessingService};
use crate::core::{
    BiasJobRequest, DatasetLocation, JobHandle, JobManifest, JobName, JobRecord, JobStatus,
    ProcessingResources, ANALYSIS_CONFIG_FILE,
};
use crate::execution::configurator::BiasDescriptors;
use crate::execution::error::{Result, WorkflowError};
use crate::execution::poller::PollPolicy;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Runs one analysis job per submission
///
/// A failed job is reported, never resubmitted.
pub struct BiasJobRunner {
    processing: Arc<dyn ProcessingService>,
    storage: ObjectStorage,
    policy: PollPolicy,
    role_arn: String,
    name_prefix: String,
}

impl BiasJobRunner {
    pub fn new(
        processing: Arc<dyn ProcessingService>,
        storage: ObjectStorage,
        role_arn: impl Into<String>,
    ) -> Self {
        Self {
            processing,
            storage,
            policy: PollPolicy::default(),
            role_arn: role_arn.into(),
            name_prefix: "Clarify-Bias".to_string(),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Build a request under a freshly generated job name
    ///
    /// The analysis configuration goes next to the dataset, under
    /// `<dataset prefix>/<job name>/analysis_config.json`.
    pub fn prepare(
        &self,
        dataset: &DatasetLocation,
        descriptors: BiasDescriptors,
        resources: ProcessingResources,
    ) -> Result<BiasJobRequest> {
        let job_name =
            JobName::generate(&self.name_prefix, Utc::now()).map_err(WorkflowError::InvalidConfig)?;
        let analysis_config = dataset
            .uri
            .parent()
            .join(job_name.as_str())
            .join(ANALYSIS_CONFIG_FILE);

        let manifest = JobManifest {
            dataset: dataset.uri.clone(),
            analysis_config,
            output: descriptors.data.s3_output_path.clone(),
        };

        Ok(BiasJobRequest {
            job_name,
            role_arn: self.role_arn.clone(),
            resources,
            manifest,
            data: descriptors.data,
            model: descriptors.model,
            predicted_label: descriptors.predicted_label,
            bias: descriptors.bias,
            analysis: descriptors.analysis,
        })
    }

    /// Upload the analysis configuration and start the job
    pub async fn submit(&self, request: &BiasJobRequest) -> Result<JobHandle> {
        let config = request.analysis.to_json()?;
        debug!("analysis_config.json for {}:\n{}", request.job_name, config);
        self.storage
            .put(&request.manifest.analysis_config, config.into_bytes())
            .await?;

        let record = self.processing.submit(request).await?;
        info!(
            "Submitted bias job {} for model {} (output {})",
            record.name, request.model.model_name, record.manifest.output
        );
        Ok(JobHandle::from(&record))
    }

    /// Describe the job once
    pub async fn status(&self, job_name: &JobName) -> Result<JobRecord> {
        Ok(self.processing.describe(job_name).await?)
    }

    /// Block until the job reaches a terminal status
    pub async fn wait(&self, handle: &JobHandle) -> Result<JobRecord> {
        self.wait_with(handle, |_| {}).await
    }

    /// Same as [`wait`](Self::wait), reporting every observed record
    pub async fn wait_with<F>(&self, handle: &JobHandle, mut on_poll: F) -> Result<JobRecord>
    where
        F: FnMut(&JobRecord),
    {
        let target = format!("job {}", handle.name);
        let processing = &self.processing;
        let name = &handle.name;
        let record = self
            .policy
            .run(
                &target,
                move || processing.describe(name),
                |record| {
                    debug!("Job {} is {}", record.name, record.status);
                    on_poll(record);
                    record.is_terminal()
                },
            )
            .await?;

        match record.status {
            JobStatus::Completed => {
                info!("Bias job {} completed", record.name);
                Ok(record)
            }
            status => {
                let reason = record.diagnostics();
                error!("Bias job {} ended {}: {}", record.name, status, reason);
                Err(WorkflowError::JobFailed {
                    job: record.name,
                    status,
                    reason,
                })
            }
        }
    }
}
