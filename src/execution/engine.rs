//! Workflow engine - runs publish, inspect, configure, submit, wait and retrieve in order

use crate::{
    cloud::{ObjectStorage, PipelineService, ProcessingService},
    core::{
        config::WorkflowConfig, DatasetLocation, JobHandle, JobName, JobRecord, JobStatus,
        PipelineExecutionStatus, ReportArtifactSet, S3Uri,
    },
    execution::{
        BiasJobConfigurator, BiasJobRunner, DatasetPublisher, PipelineInspector, PollPolicy,
        ReportRetriever, Result, WorkflowError,
    },
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Events that can occur during a workflow run
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    WorkflowStarted {
        run_id: Uuid,
        name: String,
    },
    DatasetPublished {
        uri: S3Uri,
    },
    PipelinePolled {
        pipeline: String,
        status: PipelineExecutionStatus,
    },
    ModelResolved {
        model_name: String,
        /// Model ARN when the name came from a pipeline run
        arn: Option<String>,
    },
    JobSubmitted {
        job: JobName,
        output: S3Uri,
    },
    JobPolled {
        job: JobName,
        status: JobStatus,
    },
    JobFinished {
        job: JobName,
        status: JobStatus,
    },
    ReportDownloaded {
        local_dir: PathBuf,
        artifacts: usize,
    },
    WorkflowFinished {
        run_id: Uuid,
        success: bool,
    },
}

/// How far a successful run got
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    /// The job was submitted and left running
    Submitted(JobHandle),
    /// The job completed and its report was downloaded
    Completed {
        job: JobRecord,
        report: ReportArtifactSet,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(WorkflowEvent) + Send + Sync>;

/// Runs one bias analysis end to end
pub struct Workflow {
    config: WorkflowConfig,
    storage: ObjectStorage,
    pipelines: Arc<dyn PipelineService>,
    processing: Arc<dyn ProcessingService>,
    event_handlers: Vec<EventHandler>,
}

impl Workflow {
    pub fn new(
        config: WorkflowConfig,
        storage: ObjectStorage,
        pipelines: Arc<dyn PipelineService>,
        processing: Arc<dyn ProcessingService>,
    ) -> Self {
        Self {
            config,
            storage,
            pipelines,
            processing,
            event_handlers: Vec::new(),
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(WorkflowEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: WorkflowEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    pub fn publisher(&self) -> DatasetPublisher {
        let publisher = DatasetPublisher::new(self.storage.clone())
            .with_content_type(self.config.dataset.content_type);
        if self.config.dataset.validate {
            publisher.with_schema(self.config.dataset.schema())
        } else {
            publisher
        }
    }

    pub fn inspector(&self) -> PipelineInspector {
        let inspector = PipelineInspector::new(self.pipelines.clone())
            .with_policy(PollPolicy::from(&self.config.polling.pipeline));
        match self.config.model_step() {
            Some(marker) => inspector.with_model_step(marker),
            None => inspector,
        }
    }

    pub fn configurator(&self) -> BiasJobConfigurator<'_> {
        BiasJobConfigurator::new(&self.config)
    }

    pub fn runner(&self) -> BiasJobRunner {
        BiasJobRunner::new(
            self.processing.clone(),
            self.storage.clone(),
            &self.config.role_arn,
        )
        .with_name_prefix(&self.config.job.name_prefix)
        .with_policy(PollPolicy::from(&self.config.polling.job))
    }

    pub fn retriever(&self) -> ReportRetriever {
        ReportRetriever::new(self.storage.clone())
    }

    /// Name of the model to analyse
    ///
    /// A configured name wins; otherwise the latest pipeline run must have
    /// created one.
    pub async fn resolve_model(&self) -> Result<String> {
        if let Some(name) = &self.config.model.name {
            info!("Using configured model {}", name);
            self.emit_event(WorkflowEvent::ModelResolved {
                model_name: name.clone(),
                arn: None,
            });
            return Ok(name.clone());
        }

        let pipeline = self.config.pipeline.as_ref().ok_or_else(|| {
            WorkflowError::InvalidConfig("Either pipeline.name or model.name is required".into())
        })?;

        let inspector = self.inspector();
        let execution = inspector
            .wait_for_latest_with(&pipeline.name, |execution| {
                self.emit_event(WorkflowEvent::PipelinePolled {
                    pipeline: pipeline.name.clone(),
                    status: execution.status,
                })
            })
            .await?;

        let model = inspector.model_in(&execution).ok_or_else(|| WorkflowError::ModelNotFound {
            pipeline: pipeline.name.clone(),
            marker: pipeline.model_step.clone(),
        })?;

        self.emit_event(WorkflowEvent::ModelResolved {
            model_name: model.name().to_string(),
            arn: Some(model.arn.clone()),
        });
        Ok(model.name().to_string())
    }

    /// Upload the configured dataset
    pub async fn publish_dataset(&self) -> Result<DatasetLocation> {
        let dataset = self
            .publisher()
            .publish(&self.config.dataset.local_path, &self.config.dataset.destination)
            .await?;
        self.emit_event(WorkflowEvent::DatasetPublished {
            uri: dataset.uri.clone(),
        });
        Ok(dataset)
    }

    /// Execute the entire workflow
    pub async fn run(&self) -> Result<WorkflowOutcome> {
        let run_id = Uuid::new_v4();
        info!("Starting bias workflow: {} ({})", self.config.name, run_id);
        self.emit_event(WorkflowEvent::WorkflowStarted {
            run_id,
            name: self.config.name.clone(),
        });

        let result = self.run_stages().await;
        match &result {
            Ok(_) => info!("Bias workflow finished: {}", self.config.name),
            Err(e) => error!("Bias workflow {} failed: {}", self.config.name, e),
        }

        self.emit_event(WorkflowEvent::WorkflowFinished {
            run_id,
            success: result.is_ok(),
        });
        result
    }

    async fn run_stages(&self) -> Result<WorkflowOutcome> {
        let dataset = self.publish_dataset().await?;
        let model_name = self.resolve_model().await?;

        let configurator = self.configurator();
        let descriptors = configurator.configure(&dataset, &model_name)?;

        let runner = self.runner();
        let request = runner.prepare(&dataset, descriptors, configurator.resources())?;
        let handle = runner.submit(&request).await?;
        self.emit_event(WorkflowEvent::JobSubmitted {
            job: handle.name.clone(),
            output: handle.output.clone(),
        });

        if !self.config.job.wait {
            info!("Not waiting for job {}", handle.name);
            return Ok(WorkflowOutcome::Submitted(handle));
        }

        let waited = runner
            .wait_with(&handle, |record| {
                self.emit_event(WorkflowEvent::JobPolled {
                    job: record.name.clone(),
                    status: record.status,
                })
            })
            .await;

        match &waited {
            Ok(record) => self.emit_event(WorkflowEvent::JobFinished {
                job: record.name.clone(),
                status: record.status,
            }),
            Err(WorkflowError::JobFailed { job, status, .. }) => {
                self.emit_event(WorkflowEvent::JobFinished {
                    job: job.clone(),
                    status: *status,
                })
            }
            Err(_) => {}
        }
        let job = waited?;

        let report = self
            .retriever()
            .download(&handle.output, &self.config.report.local_dir)
            .await?;
        self.emit_event(WorkflowEvent::ReportDownloaded {
            local_dir: report.local_dir.clone(),
            artifacts: report.len(),
        });

        Ok(WorkflowOutcome::Completed { job, report })
    }
}
