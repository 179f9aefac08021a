//! Test: Polling - waits end on terminal status, errors are classified, bounds hold

use crate::helpers::*;
use bias_pipeline::cloud::{CloudError, JobOutcome, SimulatedPipelineService};
use bias_pipeline::core::PipelineExecutionStatus;
use bias_pipeline::execution::{WorkflowError, WorkflowEvent};

/// Polling stops at the first terminal status
#[tokio::test]
async fn test_pipeline_polling_stops_when_terminal() {
    let h = Harness::new(
        pipeline_service(
            vec![
                PipelineExecutionStatus::Executing,
                PipelineExecutionStatus::Executing,
                PipelineExecutionStatus::Executing,
                PipelineExecutionStatus::Succeeded,
            ],
            steps_with_model(),
        ),
        JobOutcome::Complete,
    );
    let workflow = h.workflow(h.config(""));

    workflow.run().await.unwrap();

    assert_eq!(h.pipelines.query_count(), 4);
    let polled: Vec<PipelineExecutionStatus> = h
        .events()
        .into_iter()
        .filter_map(|e| match e {
            WorkflowEvent::PipelinePolled { status, .. } => Some(status),
            _ => None,
        })
        .collect();
    assert_eq!(polled.last(), Some(&PipelineExecutionStatus::Succeeded));
    assert_eq!(polled.len(), 4);
}

/// An already finished run is queried exactly once
#[tokio::test]
async fn test_finished_pipeline_is_queried_once() {
    let h = Harness::new(
        pipeline_service(vec![PipelineExecutionStatus::Succeeded], steps_with_model()),
        JobOutcome::Complete,
    );
    let workflow = h.workflow(h.config(""));

    workflow.inspector().find_model(PIPELINE).await.unwrap();
    assert_eq!(h.pipelines.query_count(), 1);
}

/// Transient errors are retried within the same bounds
#[tokio::test]
async fn test_transient_errors_are_retried() {
    let pipelines = pipeline_service(
        vec![PipelineExecutionStatus::Executing, PipelineExecutionStatus::Succeeded],
        steps_with_model(),
    )
    .with_transient_failures(PIPELINE, 3);
    let h = Harness::new(pipelines, JobOutcome::Complete);
    let workflow = h.workflow(h.config(""));

    let model = workflow.inspector().find_model(PIPELINE).await.unwrap();
    assert_eq!(model.unwrap().arn, MODEL_ARN);
    assert_eq!(h.pipelines.query_count(), 5);
}

/// Permanent errors are not retried
#[tokio::test]
async fn test_unknown_pipeline_fails_immediately() {
    let h = Harness::new(SimulatedPipelineService::new(), JobOutcome::Complete);
    let workflow = h.workflow(h.config(""));

    let err = workflow.run().await.unwrap_err();
    assert!(matches!(err, WorkflowError::Cloud(CloudError::NotFound(_))));
    assert_eq!(h.pipelines.query_count(), 1);
}

/// A pipeline that never finishes ends in a poll timeout
#[tokio::test]
async fn test_pipeline_poll_timeout() {
    let h = Harness::new(
        pipeline_service(vec![PipelineExecutionStatus::Executing], steps_with_model()),
        JobOutcome::Complete,
    );
    let config = h.config(
        r#"
polling:
  pipeline:
    initial_interval_secs: 0.001
    max_attempts: 3
"#,
    );
    let workflow = h.workflow(config);

    match workflow.run().await.unwrap_err() {
        WorkflowError::PollTimeout { attempts, target, .. } => {
            assert_eq!(attempts, 3);
            assert!(target.contains(PIPELINE));
        }
        other => panic!("Expected PollTimeout, got {:?}", other),
    }
    assert_eq!(h.pipelines.query_count(), 3);
    assert!(h.processing.submitted_requests().await.is_empty());
}

/// A job still running when the bounds run out is a timeout, not a failure
#[tokio::test]
async fn test_job_poll_timeout_is_distinct_from_failure() {
    let h = Harness::with_job_polls(
        pipeline_service(vec![PipelineExecutionStatus::Succeeded], steps_with_model()),
        JobOutcome::Complete,
        100,
    );
    let config = h.config(
        r#"
polling:
  job:
    initial_interval_secs: 0.001
    max_attempts: 4
"#,
    );
    let workflow = h.workflow(config);

    let err = workflow.run().await.unwrap_err();
    assert!(matches!(err, WorkflowError::PollTimeout { attempts: 4, .. }));
    assert_eq!(h.processing.describe_count(), 4);
    assert!(!event_kinds(&h.events()).contains(&"job_finished"));
}
