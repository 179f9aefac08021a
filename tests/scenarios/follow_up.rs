//! Test: Follow-up - a job submitted without waiting is picked up by a later process

use crate::helpers::*;
use bias_pipeline::cloud::{JobOutcome, SimulatedProcessingService};
use bias_pipeline::core::{JobName, JobStatus, PipelineExecutionStatus, EXPECTED_ARTIFACTS};
use bias_pipeline::execution::{BiasJobRunner, PollPolicy, WorkflowOutcome};
use bias_pipeline::Workflow;
use std::sync::Arc;
use std::time::Duration;

/// A fresh service over the same jobs directory finishes the job
#[tokio::test]
async fn test_submitted_job_is_followed_from_a_new_service() {
    let h = Harness::new(
        pipeline_service(vec![PipelineExecutionStatus::Succeeded], steps_with_model()),
        JobOutcome::Complete,
    );
    let jobs_dir = h.dir.path().join("jobs");
    let mut config = h.config("");
    config.job.wait = false;

    let submitting = SimulatedProcessingService::new(h.storage.clone()).with_jobs_dir(&jobs_dir);
    let workflow = Workflow::new(
        config,
        h.storage.clone(),
        h.pipelines.clone(),
        Arc::new(submitting),
    );
    let handle = match workflow.run().await.unwrap() {
        WorkflowOutcome::Submitted(handle) => handle,
        other => panic!("Expected Submitted, got {:?}", other),
    };
    assert!(jobs_dir.join(format!("{}.json", handle.name)).is_file());

    // Nothing shared with the submitting service but storage and the directory
    let following = Arc::new(
        SimulatedProcessingService::new(h.storage.clone()).with_jobs_dir(&jobs_dir),
    );
    let runner = BiasJobRunner::new(following, h.storage.clone(), "")
        .with_policy(PollPolicy::fixed(Duration::from_millis(1), 10));

    let record = runner.status(&handle.name).await.unwrap();
    assert_eq!(record.status, JobStatus::InProgress);
    assert_eq!(record.manifest.output, h.output_prefix());

    let record = runner.wait(&handle).await.unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    for name in EXPECTED_ARTIFACTS {
        assert!(h.storage.exists(&h.output_prefix().join(name)).await.unwrap());
    }

    let stored = SimulatedProcessingService::stored_record(&jobs_dir, &handle.name)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
}

/// Jobs never submitted are not found, on disk or in memory
#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let h = Harness::new(
        pipeline_service(vec![PipelineExecutionStatus::Succeeded], steps_with_model()),
        JobOutcome::Complete,
    );
    let jobs_dir = h.dir.path().join("jobs");
    let name = JobName::parse("Clarify-Bias-never-submitted").unwrap();

    assert!(SimulatedProcessingService::stored_record(&jobs_dir, &name)
        .await
        .unwrap()
        .is_none());

    let runner = BiasJobRunner::new(
        Arc::new(SimulatedProcessingService::new(h.storage.clone()).with_jobs_dir(&jobs_dir)),
        h.storage.clone(),
        "",
    );
    let err = runner.status(&name).await.unwrap_err();
    assert!(err.to_string().contains("Not found"));
}
