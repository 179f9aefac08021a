//! Test utility functions for bias-pipeline

#![allow(dead_code)]

use bias_pipeline::cloud::{
    JobOutcome, ObjectStorage, SimulatedPipelineService, SimulatedProcessingService,
};
use bias_pipeline::core::config::WorkflowConfig;
use bias_pipeline::core::{
    PipelineExecutionStatus, S3Uri, StepArtifact, StepRecord, StepStatus,
};
use bias_pipeline::execution::{Workflow, WorkflowEvent};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const BUCKET: &str = "bias-bucket";
pub const PIPELINE: &str = "BERT-pipeline-1234";
pub const EXECUTION_ARN: &str =
    "arn:aws:sagemaker:us-east-1:123456789012:pipeline/bert-pipeline-1234/execution/abc123";
pub const MODEL_ARN: &str =
    "arn:aws:sagemaker:us-east-1:123456789012:model/pipelines-abc123-createmodel-xyz";
pub const MODEL_NAME: &str = "pipelines-abc123-createmodel-xyz";

/// Product reviews: features are the review text and category, label the stars
pub const REVIEWS: &str = r#"{"features":["I loved this book","Books"],"star_rating":5}
{"features":["Battery died in a week","Electronics"],"star_rating":1}
{"features":["Decent for the price","Electronics"],"star_rating":4}
{"features":["Could not put it down","Books"],"star_rating":5}
"#;

/// Steps of a pipeline run that registered a model
pub fn steps_with_model() -> Vec<StepRecord> {
    vec![
        StepRecord::new("Processing", StepStatus::Succeeded).with_artifact(
            StepArtifact::ProcessingJob {
                arn: "arn:aws:sagemaker:us-east-1:123456789012:processing-job/prep".into(),
            },
        ),
        StepRecord::new("Train", StepStatus::Succeeded).with_artifact(StepArtifact::TrainingJob {
            arn: "arn:aws:sagemaker:us-east-1:123456789012:training-job/train".into(),
        }),
        StepRecord::new("AccuracyCondition", StepStatus::Succeeded),
        StepRecord::new("CreateModel", StepStatus::Succeeded)
            .with_artifact(StepArtifact::Model { arn: MODEL_ARN.into() }),
    ]
}

/// Steps of a run whose quality gate stopped before model creation
pub fn steps_without_model() -> Vec<StepRecord> {
    vec![
        StepRecord::new("Processing", StepStatus::Succeeded),
        StepRecord::new("Train", StepStatus::Succeeded),
        StepRecord::new("AccuracyCondition", StepStatus::Succeeded),
    ]
}

/// Pipeline service whose latest run reports `statuses` in turn
pub fn pipeline_service(
    statuses: Vec<PipelineExecutionStatus>,
    steps: Vec<StepRecord>,
) -> SimulatedPipelineService {
    SimulatedPipelineService::new().with_execution(PIPELINE, EXECUTION_ARN, statuses, steps)
}

/// Simulated backend on an in-memory bucket plus a scratch directory
pub struct Harness {
    pub dir: TempDir,
    pub storage: ObjectStorage,
    pub pipelines: Arc<SimulatedPipelineService>,
    pub processing: Arc<SimulatedProcessingService>,
    pub events: Arc<Mutex<Vec<WorkflowEvent>>>,
}

impl Harness {
    pub fn new(pipelines: SimulatedPipelineService, outcome: JobOutcome) -> Self {
        Self::with_job_polls(pipelines, outcome, 1)
    }

    pub fn with_job_polls(
        pipelines: SimulatedPipelineService,
        outcome: JobOutcome,
        polls_until_done: usize,
    ) -> Self {
        let storage = ObjectStorage::in_memory(BUCKET);
        let processing = SimulatedProcessingService::new(storage.clone())
            .with_outcome(outcome)
            .with_polls_until_done(polls_until_done);
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
            storage,
            pipelines: Arc::new(pipelines),
            processing: Arc::new(processing),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn dataset_path(&self) -> PathBuf {
        let path = self.dir.path().join("test_data.jsonl");
        if !path.exists() {
            std::fs::write(&path, REVIEWS).expect("write dataset");
        }
        path
    }

    pub fn report_dir(&self) -> PathBuf {
        self.dir.path().join("generated_bias_report")
    }

    /// Workflow YAML for the reviews example, with `extra` appended
    pub fn yaml(&self, extra: &str) -> String {
        format!(
            r#"
name: "reviews-bias"
role_arn: "arn:aws:iam::123456789012:role/BiasRole"
dataset:
  local_path: "{dataset}"
  destination: "s3://{bucket}/bias"
  label: "star_rating"
  headers: ["review_body", "product_category", "star_rating"]
pipeline:
  name: "{pipeline}"
model:
  instance_type: "ml.m5.large"
  instance_count: 1
bias:
  label_values: [5, 4]
  facet: "product_category"
  group: "product_category"
job:
  image_uri: "205585389593.dkr.ecr.us-east-1.amazonaws.com/sagemaker-clarify-processing:1.0"
  instance_type: "ml.c5.xlarge"
  output: "s3://{bucket}/bias/generated_bias_report"
report:
  local_dir: "{report}"
{extra}"#,
            dataset = self.dataset_path().display(),
            bucket = BUCKET,
            pipeline = PIPELINE,
            report = self.report_dir().display(),
            extra = extra,
        )
    }

    /// Parsed config with millisecond polling
    pub fn config(&self, extra: &str) -> WorkflowConfig {
        let polling = r#"
polling:
  pipeline:
    initial_interval_secs: 0.001
    max_interval_secs: 0.005
    max_attempts: 20
  job:
    initial_interval_secs: 0.001
    max_interval_secs: 0.005
    max_attempts: 20
"#;
        let extra = if extra.contains("polling:") {
            extra.to_string()
        } else {
            format!("{}{}", polling, extra)
        };
        WorkflowConfig::from_yaml(&self.yaml(&extra)).expect("valid workflow config")
    }

    /// Workflow over this harness, recording every event
    pub fn workflow(&self, config: WorkflowConfig) -> Workflow {
        let mut workflow = Workflow::new(
            config,
            self.storage.clone(),
            self.pipelines.clone(),
            self.processing.clone(),
        );
        let events = self.events.clone();
        workflow.add_event_handler(move |event| events.lock().expect("events").push(event));
        workflow
    }

    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.lock().expect("events").clone()
    }

    pub fn output_prefix(&self) -> S3Uri {
        S3Uri::new(BUCKET, "bias/generated_bias_report")
    }
}

/// Short names of the recorded events, in order
pub fn event_kinds(events: &[WorkflowEvent]) -> Vec<&'static str> {
    events
        .iter()
        .map(|e| match e {
            WorkflowEvent::WorkflowStarted { .. } => "started",
            WorkflowEvent::DatasetPublished { .. } => "published",
            WorkflowEvent::PipelinePolled { .. } => "pipeline_polled",
            WorkflowEvent::ModelResolved { .. } => "model_resolved",
            WorkflowEvent::JobSubmitted { .. } => "submitted",
            WorkflowEvent::JobPolled { .. } => "job_polled",
            WorkflowEvent::JobFinished { .. } => "job_finished",
            WorkflowEvent::ReportDownloaded { .. } => "report",
            WorkflowEvent::WorkflowFinished { .. } => "finished",
        })
        .collect()
}

/// Assert that `dir/<name>` holds exactly `expected`
pub fn assert_file_bytes(dir: &Path, name: &str, expected: &[u8]) {
    let path = dir.join(name);
    let actual = std::fs::read(&path)
        .unwrap_or_else(|e| panic!("Expected {} to exist: {}", path.display(), e));
    assert_eq!(actual, expected, "{} differs from the stored object", name);
}
