//! Test: Model lookup - the model comes from the CreateModel step of the latest run

use crate::helpers::*;
use bias_pipeline::cloud::JobOutcome;
use bias_pipeline::core::{PipelineExecutionStatus, StepArtifact, StepRecord, StepStatus};
use bias_pipeline::execution::{WorkflowError, WorkflowEvent};

/// The model name handed to the job is the last segment of the CreateModel ARN
#[tokio::test]
async fn test_model_from_create_model_step() {
    let h = Harness::new(
        pipeline_service(vec![PipelineExecutionStatus::Succeeded], steps_with_model()),
        JobOutcome::Complete,
    );
    let workflow = h.workflow(h.config(""));

    workflow.run().await.unwrap();

    let resolved = h
        .events()
        .into_iter()
        .find_map(|e| match e {
            WorkflowEvent::ModelResolved { model_name, arn } => Some((model_name, arn)),
            _ => None,
        })
        .expect("model resolved event");
    assert_eq!(resolved.0, MODEL_NAME);
    assert_eq!(resolved.1.as_deref(), Some(MODEL_ARN));

    let requests = h.processing.submitted_requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model.model_name, MODEL_NAME);
    assert_eq!(requests[0].analysis.predictor.model_name, MODEL_NAME);
}

/// No CreateModel step means no model, which is not an error for the inspector
#[tokio::test]
async fn test_absent_model_step_is_none() {
    let h = Harness::new(
        pipeline_service(vec![PipelineExecutionStatus::Succeeded], steps_without_model()),
        JobOutcome::Complete,
    );
    let workflow = h.workflow(h.config(""));

    let model = workflow.inspector().find_model(PIPELINE).await.unwrap();
    assert_eq!(model, None);
}

/// The workflow stops before submitting when no model was created
#[tokio::test]
async fn test_missing_model_stops_before_submission() {
    let h = Harness::new(
        pipeline_service(vec![PipelineExecutionStatus::Failed], steps_without_model()),
        JobOutcome::Complete,
    );
    let workflow = h.workflow(h.config(""));

    let err = workflow.run().await.unwrap_err();
    match err {
        WorkflowError::ModelNotFound { pipeline, marker } => {
            assert_eq!(pipeline, PIPELINE);
            assert_eq!(marker, "CreateModel");
        }
        other => panic!("Expected ModelNotFound, got {:?}", other),
    }

    assert!(h.processing.submitted_requests().await.is_empty());
    assert!(!event_kinds(&h.events()).contains(&"submitted"));
}

/// A configured model name is used as is and the pipeline is never queried
#[tokio::test]
async fn test_configured_model_skips_pipeline() {
    let h = Harness::new(
        pipeline_service(vec![PipelineExecutionStatus::Executing], vec![]),
        JobOutcome::Complete,
    );
    let mut config = h.config("");
    config.model.name = Some("bert-reviews-manual".to_string());
    let workflow = h.workflow(config);

    workflow.run().await.unwrap();

    assert_eq!(h.pipelines.query_count(), 0);
    let requests = h.processing.submitted_requests().await;
    assert_eq!(requests[0].model.model_name, "bert-reviews-manual");
}

/// A custom marker picks the model from a differently named step
#[tokio::test]
async fn test_custom_model_step() {
    let mut steps = steps_without_model();
    steps.push(
        StepRecord::new("CreateBertModel", StepStatus::Succeeded).with_artifact(
            StepArtifact::Model {
                arn: MODEL_ARN.into(),
            },
        ),
    );
    let h = Harness::new(
        pipeline_service(vec![PipelineExecutionStatus::Succeeded], steps),
        JobOutcome::Complete,
    );
    let mut config = h.config("");
    if let Some(pipeline) = config.pipeline.as_mut() {
        pipeline.model_step = "CreateBertModel".to_string();
    }
    let workflow = h.workflow(config);

    let model = workflow.inspector().find_model(PIPELINE).await.unwrap().unwrap();
    assert_eq!(model.arn, MODEL_ARN);
}
