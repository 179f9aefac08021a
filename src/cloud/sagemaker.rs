//! SageMaker-backed pipeline and processing services

use crate::cloud::{CloudError, PipelineService, ProcessingService};
use crate::core::{
    BiasJobRequest, JobManifest, JobName, JobRecord, JobStatus, PipelineExecution,
    PipelineExecutionStatus, S3Uri, StepArtifact, StepRecord, StepStatus,
};
use async_trait::async_trait;
use aws_sdk_sagemaker::error::{BuildError, DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_sagemaker::primitives::DateTime as AwsDateTime;
use aws_sdk_sagemaker::types::{
    AppSpecification, PipelineExecutionStep, ProcessingClusterConfig, ProcessingInput,
    ProcessingInstanceType, ProcessingOutput, ProcessingOutputConfig, ProcessingResources,
    ProcessingS3DataType, ProcessingS3Input, ProcessingS3InputMode, ProcessingS3Output,
    ProcessingS3UploadMode, ProcessingStoppingCondition, SortOrder, SortPipelineExecutionsBy,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

const DATASET_INPUT: &str = "dataset";
const CONFIG_INPUT: &str = "analysis_config";
const RESULT_OUTPUT: &str = "analysis_result";
const DATASET_MOUNT: &str = "/opt/ml/processing/input/data";
const CONFIG_MOUNT: &str = "/opt/ml/processing/input/config";
const RESULT_MOUNT: &str = "/opt/ml/processing/output";

/// Client for the managed ML service, used for both pipelines and jobs
#[derive(Debug, Clone)]
pub struct SageMakerClient {
    client: aws_sdk_sagemaker::Client,
}

impl SageMakerClient {
    /// Build a client from the default credential chain
    pub async fn from_env(region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }
        let config = loader.load().await;
        Self {
            client: aws_sdk_sagemaker::Client::new(&config),
        }
    }

    pub fn new(client: aws_sdk_sagemaker::Client) -> Self {
        Self { client }
    }
}

fn classify<E, R>(err: SdkError<E, R>) -> CloudError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => CloudError::Transport(message),
        SdkError::ResponseError(_) => CloudError::Unavailable(message),
        _ => match err.code() {
            Some("ThrottlingException") | Some("Throttling") => CloudError::Throttled(message),
            Some("ResourceNotFound") => CloudError::NotFound(message),
            Some("AccessDeniedException") => CloudError::AccessDenied(message),
            Some("ValidationException") | Some("ResourceInUse") | Some("ResourceLimitExceeded") => {
                CloudError::Validation(message)
            }
            Some("ServiceUnavailable") | Some("InternalFailure") => CloudError::Unavailable(message),
            _ => CloudError::Service(message),
        },
    }
}

fn invalid_request(err: BuildError) -> CloudError {
    CloudError::Validation(err.to_string())
}

/// Narrow a resource setting to the service's 32-bit field
fn to_i32<T>(field: &str, value: T) -> Result<i32, CloudError>
where
    T: TryInto<i32> + Copy + std::fmt::Display,
{
    value
        .try_into()
        .map_err(|_| CloudError::Validation(format!("{} {} exceeds {}", field, value, i32::MAX)))
}

fn to_chrono(time: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.secs(), time.subsec_nanos())
}

fn step_record(step: &PipelineExecutionStep) -> Option<StepRecord> {
    let name = step.step_name()?;
    let status = step
        .step_status()
        .and_then(|s| s.as_str().parse::<StepStatus>().ok())
        .unwrap_or(StepStatus::Executing);
    let mut record = StepRecord::new(name, status);

    if let Some(metadata) = step.metadata() {
        let artifact = if let Some(arn) = metadata.model().and_then(|m| m.arn()) {
            Some(StepArtifact::Model { arn: arn.to_string() })
        } else if let Some(arn) = metadata.register_model().and_then(|m| m.arn()) {
            Some(StepArtifact::RegisteredModel { arn: arn.to_string() })
        } else if let Some(arn) = metadata.processing_job().and_then(|m| m.arn()) {
            Some(StepArtifact::ProcessingJob { arn: arn.to_string() })
        } else {
            metadata
                .training_job()
                .and_then(|m| m.arn())
                .map(|arn| StepArtifact::TrainingJob { arn: arn.to_string() })
        };
        if let Some(artifact) = artifact {
            record = record.with_artifact(artifact);
        }
    }
    if let Some(reason) = step.failure_reason() {
        record = record.with_failure(reason);
    }
    Some(record)
}

fn s3_input(name: &str, uri: &S3Uri, local_path: &str) -> Result<ProcessingInput, CloudError> {
    let source = ProcessingS3Input::builder()
        .s3_uri(uri.to_string())
        .local_path(local_path)
        .s3_data_type(ProcessingS3DataType::S3Prefix)
        .s3_input_mode(ProcessingS3InputMode::File)
        .build()
        .map_err(invalid_request)?;
    ProcessingInput::builder()
        .input_name(name)
        .s3_input(source)
        .build()
        .map_err(invalid_request)
}

fn input_uri(inputs: &[ProcessingInput], name: &str) -> Option<S3Uri> {
    inputs
        .iter()
        .find(|input| {
            let input_name: Option<&str> = input.input_name().into();
            input_name == Some(name)
        })
        .and_then(|input| input.s3_input())
        .and_then(|s3| {
            let uri: Option<&str> = s3.s3_uri().into();
            uri
        })
        .and_then(|uri| uri.parse().ok())
}

fn output_uri(outputs: &[ProcessingOutput], name: &str) -> Option<S3Uri> {
    outputs
        .iter()
        .find(|output| {
            let output_name: Option<&str> = output.output_name().into();
            output_name == Some(name)
        })
        .and_then(|output| output.s3_output())
        .and_then(|s3| {
            let uri: Option<&str> = s3.s3_uri().into();
            uri
        })
        .and_then(|uri| uri.parse().ok())
}

#[async_trait]
impl PipelineService for SageMakerClient {
    async fn latest_execution(&self, pipeline_name: &str) -> Result<PipelineExecution, CloudError> {
        let output = self
            .client
            .list_pipeline_executions()
            .pipeline_name(pipeline_name)
            .sort_by(SortPipelineExecutionsBy::CreationTime)
            .sort_order(SortOrder::Descending)
            .max_results(1)
            .send()
            .await
            .map_err(classify)?;

        let summary = output.pipeline_execution_summaries().first().ok_or_else(|| {
            CloudError::NotFound(format!("No executions found for pipeline {}", pipeline_name))
        })?;
        let arn = summary
            .pipeline_execution_arn()
            .ok_or_else(|| CloudError::Service("Execution summary without an ARN".to_string()))?;
        let status = summary
            .pipeline_execution_status()
            .ok_or_else(|| CloudError::Service(format!("Execution {} has no status", arn)))?
            .as_str()
            .parse::<PipelineExecutionStatus>()
            .map_err(CloudError::Service)?;

        debug!("[SageMakerClient] Latest execution of {} is {} ({})", pipeline_name, arn, status);

        Ok(PipelineExecution {
            started_at: summary.start_time().and_then(to_chrono),
            ..PipelineExecution::new(arn, status)
        })
    }

    async fn list_steps(&self, execution_arn: &str) -> Result<Vec<StepRecord>, CloudError> {
        let mut steps = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .list_pipeline_execution_steps()
                .pipeline_execution_arn(execution_arn)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(classify)?;

            steps.extend(output.pipeline_execution_steps().iter().filter_map(step_record));

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }
        Ok(steps)
    }
}

#[async_trait]
impl ProcessingService for SageMakerClient {
    async fn submit(&self, request: &BiasJobRequest) -> Result<JobRecord, CloudError> {
        let resources = &request.resources;
        let manifest = &request.manifest;

        let cluster = ProcessingClusterConfig::builder()
            .instance_count(to_i32("instance_count", resources.instance_count)?)
            .instance_type(ProcessingInstanceType::from(resources.instance_type.as_str()))
            .volume_size_in_gb(to_i32("volume_size_gb", resources.volume_size_gb)?)
            .build()
            .map_err(invalid_request)?;
        let output = ProcessingOutput::builder()
            .output_name(RESULT_OUTPUT)
            .s3_output(
                ProcessingS3Output::builder()
                    .s3_uri(manifest.output.to_string())
                    .local_path(RESULT_MOUNT)
                    .s3_upload_mode(ProcessingS3UploadMode::EndOfJob)
                    .build()
                    .map_err(invalid_request)?,
            )
            .build()
            .map_err(invalid_request)?;

        let response = self
            .client
            .create_processing_job()
            .processing_job_name(request.job_name.as_str())
            .role_arn(&request.role_arn)
            .app_specification(
                AppSpecification::builder()
                    .image_uri(&resources.image_uri)
                    .build()
                    .map_err(invalid_request)?,
            )
            .processing_resources(ProcessingResources::builder().cluster_config(cluster).build())
            .processing_inputs(s3_input(DATASET_INPUT, &manifest.dataset, DATASET_MOUNT)?)
            .processing_inputs(s3_input(CONFIG_INPUT, &manifest.analysis_config, CONFIG_MOUNT)?)
            .processing_output_config(
                ProcessingOutputConfig::builder()
                    .outputs(output)
                    .build()
                    .map_err(invalid_request)?,
            )
            .stopping_condition(
                ProcessingStoppingCondition::builder()
                    .max_runtime_in_seconds(to_i32("max_runtime_secs", resources.max_runtime_secs)?)
                    .build()
                    .map_err(invalid_request)?,
            )
            .send()
            .await
            .map_err(classify)?;

        let arn: Option<&str> = response.processing_job_arn().into();
        info!("[SageMakerClient] Created processing job {}", request.job_name);

        Ok(JobRecord {
            name: request.job_name.clone(),
            arn: arn.map(str::to_string),
            status: JobStatus::InProgress,
            failure_reason: None,
            exit_message: None,
            created_at: Utc::now(),
            ended_at: None,
            manifest: manifest.clone(),
        })
    }

    async fn describe(&self, job_name: &JobName) -> Result<JobRecord, CloudError> {
        let output = self
            .client
            .describe_processing_job()
            .processing_job_name(job_name.as_str())
            .send()
            .await
            .map_err(classify)?;

        let status: Option<&aws_sdk_sagemaker::types::ProcessingJobStatus> =
            output.processing_job_status().into();
        let status = status
            .ok_or_else(|| CloudError::Service(format!("Job {} has no status", job_name)))?
            .as_str()
            .parse::<JobStatus>()
            .map_err(CloudError::Service)?;

        let inputs = output.processing_inputs();
        let result_uri = output
            .processing_output_config()
            .and_then(|config| output_uri(config.outputs(), RESULT_OUTPUT));

        let manifest = match (
            input_uri(inputs, DATASET_INPUT),
            input_uri(inputs, CONFIG_INPUT),
            result_uri,
        ) {
            (Some(dataset), Some(analysis_config), Some(output)) => JobManifest {
                dataset,
                analysis_config,
                output,
            },
            _ => {
                return Err(CloudError::Service(format!(
                    "Job {} was not created as a bias analysis job",
                    job_name
                )))
            }
        };

        let created: Option<&AwsDateTime> = output.creation_time().into();
        let arn: Option<&str> = output.processing_job_arn().into();

        Ok(JobRecord {
            name: job_name.clone(),
            arn: arn.map(str::to_string),
            status,
            failure_reason: output.failure_reason().map(str::to_string),
            exit_message: output.exit_message().map(str::to_string),
            created_at: created.and_then(to_chrono).unwrap_or_else(Utc::now),
            ended_at: output.processing_end_time().and_then(to_chrono),
            manifest,
        })
    }
}
