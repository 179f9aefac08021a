//! Simulated remote services
//!
//! Scripted stand-ins for the orchestration and processing services. They
//! keep their state in memory and write job artifacts through an
//! [`ObjectStorage`], so a whole run can be exercised without a cloud
//! account: tests back them with an in-memory store, the CLI with a local
//! directory. Given a jobs directory, the processing service also keeps
//! one `<job name>.json` per job there so later processes can follow it.

use crate::cloud::{CloudError, ObjectStorage, PipelineService, ProcessingService};
use crate::core::{
    BiasJobRequest, JobName, JobRecord, JobStatus, MethodSelection, MetricCode,
    PipelineExecution, PipelineExecutionStatus, StepRecord, ANALYSIS_CONFIG_FILE, ANALYSIS_FILE,
    REPORT_HTML_FILE, REPORT_NOTEBOOK_FILE, REPORT_PDF_FILE,
};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

struct ScriptedExecution {
    arn: String,
    /// Statuses reported in turn; the last one repeats
    statuses: VecDeque<PipelineExecutionStatus>,
    steps: Vec<StepRecord>,
    transient_failures: usize,
}

/// Orchestration service answering from scripted executions
pub struct SimulatedPipelineService {
    executions: Mutex<HashMap<String, ScriptedExecution>>,
    queries: AtomicUsize,
}

impl SimulatedPipelineService {
    pub fn new() -> Self {
        Self {
            executions: Mutex::new(HashMap::new()),
            queries: AtomicUsize::new(0),
        }
    }

    /// Register the latest execution of `pipeline_name`
    ///
    /// `statuses` are reported one per query, the last one indefinitely.
    pub fn with_execution(
        mut self,
        pipeline_name: &str,
        arn: &str,
        statuses: Vec<PipelineExecutionStatus>,
        steps: Vec<StepRecord>,
    ) -> Self {
        let mut statuses: VecDeque<_> = statuses.into();
        if statuses.is_empty() {
            statuses.push_back(PipelineExecutionStatus::Succeeded);
        }
        self.executions.get_mut().insert(
            pipeline_name.to_string(),
            ScriptedExecution {
                arn: arn.to_string(),
                statuses,
                steps,
                transient_failures: 0,
            },
        );
        self
    }

    /// Register a recorded execution that has already finished
    pub fn with_recorded(self, pipeline_name: &str, execution: PipelineExecution) -> Self {
        let arn = execution.arn.clone();
        self.with_execution(pipeline_name, &arn, vec![execution.status], execution.steps)
    }

    /// Make the next `count` status queries for `pipeline_name` fail transiently
    pub fn with_transient_failures(mut self, pipeline_name: &str, count: usize) -> Self {
        if let Some(execution) = self.executions.get_mut().get_mut(pipeline_name) {
            execution.transient_failures = count;
        }
        self
    }

    /// Number of status queries received so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl Default for SimulatedPipelineService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineService for SimulatedPipelineService {
    async fn latest_execution(&self, pipeline_name: &str) -> Result<PipelineExecution, CloudError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let mut executions = self.executions.lock().await;
        let execution = executions.get_mut(pipeline_name).ok_or_else(|| {
            CloudError::NotFound(format!("No executions found for pipeline {}", pipeline_name))
        })?;

        if execution.transient_failures > 0 {
            execution.transient_failures -= 1;
            return Err(CloudError::Transport("simulated connection reset".to_string()));
        }

        let status = if execution.statuses.len() > 1 {
            execution.statuses.pop_front()
        } else {
            execution.statuses.front().copied()
        }
        .unwrap_or(PipelineExecutionStatus::Succeeded);

        debug!("[SimulatedPipelineService] {} is {}", pipeline_name, status);

        Ok(PipelineExecution {
            started_at: Some(Utc::now()),
            ..PipelineExecution::new(execution.arn.clone(), status)
        })
    }

    async fn list_steps(&self, execution_arn: &str) -> Result<Vec<StepRecord>, CloudError> {
        let executions = self.executions.lock().await;
        executions
            .values()
            .find(|e| e.arn == execution_arn)
            .map(|e| e.steps.clone())
            .ok_or_else(|| CloudError::NotFound(format!("Pipeline execution {}", execution_arn)))
    }
}

/// How a simulated job ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Write the artifact set and report `Completed`
    Complete,
    /// Report `Failed` with this reason, writing nothing
    Fail { reason: String },
}

#[derive(Serialize, Deserialize)]
struct SimulatedJob {
    record: JobRecord,
    request: BiasJobRequest,
    remaining_polls: usize,
}

/// Processing service that "runs" jobs by writing placeholder artifacts
///
/// No metric is computed: `analysis.json` lists the selected metric codes
/// with empty values.
pub struct SimulatedProcessingService {
    storage: ObjectStorage,
    outcome: JobOutcome,
    polls_until_done: usize,
    jobs_dir: Option<PathBuf>,
    jobs: Mutex<HashMap<JobName, SimulatedJob>>,
    submitted: Mutex<Vec<BiasJobRequest>>,
    describe_calls: AtomicUsize,
}

impl SimulatedProcessingService {
    pub fn new(storage: ObjectStorage) -> Self {
        Self {
            storage,
            outcome: JobOutcome::Complete,
            polls_until_done: 1,
            jobs_dir: None,
            jobs: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            describe_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_outcome(mut self, outcome: JobOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Number of `describe` calls that report `InProgress` before the job settles
    pub fn with_polls_until_done(mut self, polls: usize) -> Self {
        self.polls_until_done = polls;
        self
    }

    /// Keep job state in `dir` as well as in memory
    pub fn with_jobs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.jobs_dir = Some(dir.into());
        self
    }

    /// Last known record of a job kept in `jobs_dir`, if any
    pub async fn stored_record(
        jobs_dir: &Path,
        job_name: &JobName,
    ) -> Result<Option<JobRecord>, CloudError> {
        Ok(read_job(jobs_dir, job_name).await?.map(|job| job.record))
    }

    /// Every request received, in submission order
    pub async fn submitted_requests(&self) -> Vec<BiasJobRequest> {
        self.submitted.lock().await.clone()
    }

    pub fn describe_count(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }

    /// Job from memory, falling back to the jobs directory
    async fn lookup<'a>(
        &self,
        jobs: &'a mut HashMap<JobName, SimulatedJob>,
        job_name: &JobName,
    ) -> Result<Option<&'a mut SimulatedJob>, CloudError> {
        if !jobs.contains_key(job_name) {
            if let Some(dir) = &self.jobs_dir {
                if let Some(job) = read_job(dir, job_name).await? {
                    debug!("[SimulatedProcessingService] loaded {} from {}", job_name, dir.display());
                    jobs.insert(job_name.clone(), job);
                }
            }
        }
        Ok(jobs.get_mut(job_name))
    }

    async fn persist(&self, job: &SimulatedJob) -> Result<(), CloudError> {
        let Some(dir) = &self.jobs_dir else {
            return Ok(());
        };
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| CloudError::Service(format!("{}: {}", dir.display(), e)))?;
        let path = job_path(dir, &job.record.name);
        let body = serde_json::to_vec_pretty(job).map_err(|e| CloudError::Service(e.to_string()))?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| CloudError::Service(format!("{}: {}", path.display(), e)))
    }

    /// Check the inputs a real job would read
    async fn missing_input(&self, request: &BiasJobRequest) -> Result<Option<String>, CloudError> {
        for input in [&request.manifest.dataset, &request.manifest.analysis_config] {
            if !self.storage.exists(input).await? {
                return Ok(Some(format!("ClientError: input {} does not exist", input)));
            }
        }
        Ok(None)
    }

    async fn write_artifacts(&self, request: &BiasJobRequest) -> Result<(), CloudError> {
        let output = &request.manifest.output;
        let config = request
            .analysis
            .to_json()
            .map_err(|e| CloudError::Service(e.to_string()))?;

        let analysis = simulated_analysis(request);
        let analysis = serde_json::to_string_pretty(&analysis)
            .map_err(|e| CloudError::Service(e.to_string()))?;

        let title = format!("Bias report for {}", request.model.model_name);
        let artifacts: [(&str, Vec<u8>); 5] = [
            (ANALYSIS_CONFIG_FILE, config.into_bytes()),
            (ANALYSIS_FILE, analysis.into_bytes()),
            (
                REPORT_HTML_FILE,
                format!("<html><head><title>{}</title></head><body></body></html>", title)
                    .into_bytes(),
            ),
            (
                REPORT_NOTEBOOK_FILE,
                json!({"cells": [], "metadata": {"title": title}, "nbformat": 4, "nbformat_minor": 5})
                    .to_string()
                    .into_bytes(),
            ),
            (REPORT_PDF_FILE, b"%PDF-1.4\n%%EOF\n".to_vec()),
        ];

        for (name, body) in artifacts {
            self.storage.put(&output.join(name), body).await?;
        }
        Ok(())
    }
}

fn job_path(dir: &Path, job_name: &JobName) -> PathBuf {
    dir.join(format!("{}.json", job_name))
}

async fn read_job(dir: &Path, job_name: &JobName) -> Result<Option<SimulatedJob>, CloudError> {
    let path = job_path(dir, job_name);
    let body = match tokio::fs::read(&path).await {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CloudError::Service(format!("{}: {}", path.display(), e))),
    };
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|e| CloudError::Service(format!("{}: {}", path.display(), e)))
}

fn selected_codes(selection: Option<&MethodSelection>, all: &[MetricCode]) -> Vec<MetricCode> {
    match selection {
        Some(MethodSelection::All) => all.to_vec(),
        Some(MethodSelection::Codes(codes)) => codes.clone(),
        None => Vec::new(),
    }
}

fn simulated_analysis(request: &BiasJobRequest) -> serde_json::Value {
    let section = |codes: Vec<MetricCode>| {
        let metrics: Vec<_> = codes
            .iter()
            .map(|code| json!({"name": code.as_str(), "value": null, "error": "simulated run"}))
            .collect();
        json!({
            "label": request.data.label,
            "facets": {
                (request.bias.facet_name.clone()): [
                    {"value_or_threshold": null, "metrics": metrics}
                ]
            }
        })
    };

    let methods = &request.analysis.methods;
    let mut analysis = json!({"version": "1.0"});
    if let Some(pre) = &methods.pre_training_bias {
        analysis["pre_training_bias_metrics"] =
            section(selected_codes(Some(&pre.methods), &MetricCode::PRE_TRAINING));
    }
    if let Some(post) = &methods.post_training_bias {
        analysis["post_training_bias_metrics"] =
            section(selected_codes(Some(&post.methods), &MetricCode::POST_TRAINING));
    }
    analysis
}

#[async_trait]
impl ProcessingService for SimulatedProcessingService {
    async fn submit(&self, request: &BiasJobRequest) -> Result<JobRecord, CloudError> {
        let mut jobs = self.jobs.lock().await;
        if self.lookup(&mut jobs, &request.job_name).await?.is_some() {
            return Err(CloudError::Validation(format!(
                "Job name {} already exists",
                request.job_name
            )));
        }

        let record = JobRecord {
            name: request.job_name.clone(),
            arn: Some(format!("arn:simulated:processing-job/{}", request.job_name)),
            status: JobStatus::InProgress,
            failure_reason: None,
            exit_message: None,
            created_at: Utc::now(),
            ended_at: None,
            manifest: request.manifest.clone(),
        };

        let job = SimulatedJob {
            record: record.clone(),
            request: request.clone(),
            remaining_polls: self.polls_until_done,
        };
        self.persist(&job).await?;
        jobs.insert(request.job_name.clone(), job);
        self.submitted.lock().await.push(request.clone());

        debug!("[SimulatedProcessingService] accepted {}", request.job_name);
        Ok(record)
    }

    async fn describe(&self, job_name: &JobName) -> Result<JobRecord, CloudError> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        let mut jobs = self.jobs.lock().await;
        let job = self
            .lookup(&mut jobs, job_name)
            .await?
            .ok_or_else(|| CloudError::NotFound(format!("Processing job {}", job_name)))?;

        if job.record.is_terminal() {
            return Ok(job.record.clone());
        }
        if job.remaining_polls > 0 {
            job.remaining_polls -= 1;
            self.persist(job).await?;
            return Ok(job.record.clone());
        }

        let failure = match &self.outcome {
            JobOutcome::Fail { reason } => Some(reason.clone()),
            JobOutcome::Complete => self.missing_input(&job.request).await?,
        };

        match failure {
            Some(reason) => {
                job.record.status = JobStatus::Failed;
                job.record.failure_reason = Some(reason);
                job.record.exit_message = Some("Analysis job exited with a non-zero status".into());
            }
            None => {
                self.write_artifacts(&job.request).await?;
                job.record.status = JobStatus::Completed;
            }
        }
        job.record.ended_at = Some(Utc::now());
        self.persist(job).await?;

        debug!("[SimulatedProcessingService] {} is {}", job_name, job.record.status);
        Ok(job.record.clone())
    }
}
