//! Test: Submission - descriptors reach the service exactly as configured

use crate::helpers::*;
use bias_pipeline::cloud::JobOutcome;
use bias_pipeline::core::{
    AnalysisConfig, ContentType, DatasetLocation, JobStatus, LabelValue, PipelineExecutionStatus,
    S3Uri,
};
use bias_pipeline::execution::{BiasJobConfigurator, WorkflowOutcome};

/// The running example: reviews rated 4 or 5 are favourable, product category is the facet
#[tokio::test]
async fn test_reviews_example_descriptors() {
    let h = Harness::new(
        pipeline_service(vec![PipelineExecutionStatus::Succeeded], steps_with_model()),
        JobOutcome::Complete,
    );
    let workflow = h.workflow(h.config(""));
    workflow.run().await.unwrap();

    let requests = h.processing.submitted_requests().await;
    let request = &requests[0];

    assert_eq!(
        request.bias.label_values_or_threshold,
        vec![LabelValue::Int(5), LabelValue::Int(4)]
    );
    assert_eq!(request.bias.facet_name, "product_category");
    assert_eq!(request.bias.group_name.as_deref(), Some("product_category"));
    assert_eq!(
        request.data.s3_data_input_path,
        S3Uri::new(BUCKET, "bias/test_data.jsonl")
    );
    assert_eq!(request.data.label, "star_rating");
    assert_eq!(
        request.data.headers,
        vec!["review_body", "product_category", "star_rating"]
    );
    assert_eq!(request.model.instance_type, "ml.m5.large");
    assert_eq!(request.model.content_template, r#"{"features":$features}"#);
    assert_eq!(request.predicted_label.label, "predicted_label");
    assert_eq!(request.resources.instance_type, "ml.c5.xlarge");
    assert_eq!(request.role_arn, "arn:aws:iam::123456789012:role/BiasRole");
}

/// What the service receives equals what the configurator builds, field for field
#[tokio::test]
async fn test_descriptors_submitted_unchanged() {
    let h = Harness::new(
        pipeline_service(vec![PipelineExecutionStatus::Succeeded], steps_with_model()),
        JobOutcome::Complete,
    );
    let config = h.config("");
    let dataset = DatasetLocation {
        uri: S3Uri::new(BUCKET, "bias/test_data.jsonl"),
        content_type: ContentType::JsonLines,
    };
    let expected = BiasJobConfigurator::new(&config)
        .configure(&dataset, MODEL_NAME)
        .unwrap();

    h.workflow(config).run().await.unwrap();

    let request = h.processing.submitted_requests().await.remove(0);
    assert_eq!(request.data, expected.data);
    assert_eq!(request.model, expected.model);
    assert_eq!(request.predicted_label, expected.predicted_label);
    assert_eq!(request.bias, expected.bias);
    assert_eq!(request.analysis, expected.analysis);
}

/// The stored analysis_config.json is byte-for-byte the request's configuration
#[tokio::test]
async fn test_analysis_config_stored_next_to_dataset() {
    let h = Harness::new(
        pipeline_service(vec![PipelineExecutionStatus::Succeeded], steps_with_model()),
        JobOutcome::Complete,
    );
    h.workflow(h.config("")).run().await.unwrap();

    let request = h.processing.submitted_requests().await.remove(0);
    let expected_key = format!("bias/{}/analysis_config.json", request.job_name);
    assert_eq!(request.manifest.analysis_config, S3Uri::new(BUCKET, &expected_key));

    let stored = h.storage.get(&request.manifest.analysis_config).await.unwrap();
    assert_eq!(stored, request.analysis.to_json().unwrap().into_bytes());

    let parsed: AnalysisConfig = serde_json::from_slice(&stored).unwrap();
    assert_eq!(parsed, request.analysis);
}

/// The dataset is uploaded unchanged under the destination prefix
#[tokio::test]
async fn test_dataset_uploaded_unchanged() {
    let h = Harness::new(
        pipeline_service(vec![PipelineExecutionStatus::Succeeded], steps_with_model()),
        JobOutcome::Complete,
    );
    h.workflow(h.config("")).run().await.unwrap();

    let stored = h
        .storage
        .get(&S3Uri::new(BUCKET, "bias/test_data.jsonl"))
        .await
        .unwrap();
    assert_eq!(stored, REVIEWS.as_bytes());
}

/// Without waiting the workflow returns the handle right after submission
#[tokio::test]
async fn test_no_wait_returns_handle() {
    let h = Harness::new(
        pipeline_service(vec![PipelineExecutionStatus::Succeeded], steps_with_model()),
        JobOutcome::Complete,
    );
    let mut config = h.config("");
    config.job.wait = false;
    let workflow = h.workflow(config);

    let handle = match workflow.run().await.unwrap() {
        WorkflowOutcome::Submitted(handle) => handle,
        other => panic!("Expected Submitted, got {:?}", other),
    };
    assert_eq!(handle.output, h.output_prefix());
    assert_eq!(h.processing.describe_count(), 0);
    assert!(!h.report_dir().exists());

    // The handle can still be followed up independently
    let record = workflow.runner().status(&handle.name).await.unwrap();
    assert_eq!(record.status, JobStatus::InProgress);
}

/// Every submission gets its own job name
#[tokio::test]
async fn test_resubmission_uses_new_job_name() {
    let h = Harness::new(
        pipeline_service(vec![PipelineExecutionStatus::Succeeded], steps_with_model()),
        JobOutcome::Complete,
    );
    let mut config = h.config("");
    config.job.wait = false;
    let workflow = h.workflow(config);

    workflow.run().await.unwrap();
    workflow.run().await.unwrap();

    let requests = h.processing.submitted_requests().await;
    assert_eq!(requests.len(), 2);
    assert_ne!(requests[0].job_name, requests[1].job_name);
    assert!(requests[0].job_name.as_str().starts_with("Clarify-Bias-"));
}

/// Back-to-back submissions are all accepted under distinct names
#[tokio::test]
async fn test_rapid_resubmission_is_never_rejected() {
    let h = Harness::new(
        pipeline_service(vec![PipelineExecutionStatus::Succeeded], steps_with_model()),
        JobOutcome::Complete,
    );
    let workflow = h.workflow(h.config(""));
    let dataset = workflow.publish_dataset().await.unwrap();
    let configurator = workflow.configurator();
    let runner = workflow.runner();

    let mut names = std::collections::HashSet::new();
    for _ in 0..20 {
        let descriptors = configurator.configure(&dataset, MODEL_NAME).unwrap();
        let request = runner
            .prepare(&dataset, descriptors, configurator.resources())
            .unwrap();
        let handle = runner.submit(&request).await.unwrap();
        assert!(handle.name.as_str().len() <= 63);
        names.insert(handle.name);
    }

    assert_eq!(names.len(), 20);
    assert_eq!(h.processing.submitted_requests().await.len(), 20);
}
