//! Smoke test - a complete bias run on a directory-backed bucket
//!
//! This test catches regressions that would break the end-to-end flow.
//! Run with: cargo test smoke_test

use bias_pipeline::cloud::{
    ObjectStorage, SimulatedPipelineService, SimulatedProcessingService,
};
use bias_pipeline::core::config::WorkflowConfig;
use bias_pipeline::core::{PipelineExecution, S3Uri};
use bias_pipeline::{Workflow, WorkflowOutcome};
use std::sync::Arc;
use std::time::Duration;

const RECORDED_RUN: &str = r#"{
  "arn": "arn:aws:sagemaker:us-east-1:123456789012:pipeline/bert/execution/smoke",
  "status": "Succeeded",
  "steps": [
    {"name": "Train", "status": "Succeeded",
     "artifact": {"type": "training_job", "arn": "arn:aws:sagemaker:us-east-1:123456789012:training-job/smoke"}},
    {"name": "CreateModel", "status": "Succeeded",
     "artifact": {"type": "model", "arn": "arn:aws:sagemaker:us-east-1:123456789012:model/bert-smoke-model"}}
  ]
}"#;

/// Simple smoke test - publishes, configures, runs and downloads
#[tokio::test]
async fn smoke_test_local_bucket() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dataset = dir.path().join("reviews.jsonl");
    std::fs::write(
        &dataset,
        "{\"features\":[\"Great read\",\"Books\"],\"star_rating\":5}\n",
    )
    .unwrap();

    let yaml = format!(
        r#"
name: "Smoke Test"
role_arn: "arn:aws:iam::123456789012:role/BiasRole"
dataset:
  local_path: "{dataset}"
  destination: "s3://smoke-bucket/bias"
  label: "star_rating"
  headers: ["review_body", "product_category", "star_rating"]
  validate: true
pipeline:
  name: "bert"
model:
  instance_type: "ml.m5.large"
bias:
  label_values: [5, 4]
  facet: "product_category"
job:
  image_uri: "clarify-processing:1.0"
  output: "s3://smoke-bucket/bias/report"
polling:
  pipeline:
    initial_interval_secs: 0.001
  job:
    initial_interval_secs: 0.001
report:
  local_dir: "{report}"
"#,
        dataset = dataset.display(),
        report = dir.path().join("report").display(),
    );
    let config = WorkflowConfig::from_yaml(&yaml).expect("Should parse YAML");

    let storage = ObjectStorage::local("smoke-bucket", &dir.path().join("buckets")).unwrap();
    let recorded: PipelineExecution = serde_json::from_str(RECORDED_RUN).unwrap();
    let pipelines = SimulatedPipelineService::new().with_recorded("bert", recorded);
    let processing = SimulatedProcessingService::new(storage.clone());
    let workflow = Workflow::new(
        config,
        storage.clone(),
        Arc::new(pipelines),
        Arc::new(processing),
    );

    let start = std::time::Instant::now();
    let result = tokio::time::timeout(Duration::from_secs(30), workflow.run()).await;
    let elapsed = start.elapsed();

    let report = match result {
        Ok(Ok(WorkflowOutcome::Completed { report, .. })) => report,
        Ok(Ok(other)) => panic!("Expected a completed run, got {:?}", other),
        Ok(Err(e)) => panic!("Workflow failed: {:?}", e),
        Err(_) => panic!("Workflow timed out after {}s", elapsed.as_secs()),
    };

    assert!(report.missing().is_empty(), "missing {:?}", report.missing());
    assert!(
        storage
            .exists(&S3Uri::new("smoke-bucket", "bias/reviews.jsonl"))
            .await
            .unwrap()
    );
    // The bucket really is a directory tree
    assert!(dir
        .path()
        .join("buckets/smoke-bucket/bias/report/analysis.json")
        .is_file());

    let config = std::fs::read_to_string(report.local_dir.join("analysis_config.json")).unwrap();
    assert!(config.contains("bert-smoke-model"));

    println!("✅ Smoke test passed in {:?}", elapsed);
}

/// The shipped demo runs against a scratch root and leaves `demos/` untouched
#[tokio::test]
async fn smoke_test_demo_in_scratch_root() {
    let demos = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("demos");
    let listing = |dir: &std::path::Path| {
        let mut names: Vec<_> = walk(dir).into_iter().collect();
        names.sort();
        names
    };
    let before = listing(&demos);

    let sim_root = tempfile::tempdir().expect("tempdir");
    let yaml = std::fs::read_to_string(demos.join("bias-job.yaml")).unwrap();
    let yaml = yaml
        .replace(
            "\"demos/test_data.jsonl\"",
            &format!("\"{}\"", demos.join("test_data.jsonl").display()),
        )
        .replace(
            "\"generated_bias_report\"",
            &format!("\"{}\"", sim_root.path().join("report").display()),
        )
        .replace("initial_interval_secs: 1", "initial_interval_secs: 0.001");
    let config = WorkflowConfig::from_yaml(&yaml).expect("demo config");

    let pipeline = config.pipeline.as_ref().unwrap().name.clone();
    let recorded = demos.join("pipelines").join(format!("{}.json", pipeline));
    let recorded = std::fs::read_to_string(recorded).expect("recorded run for the demo pipeline");
    let recorded: PipelineExecution = serde_json::from_str(&recorded).unwrap();

    let bucket = config.dataset.destination.bucket().to_string();
    let storage = ObjectStorage::local(&bucket, sim_root.path()).unwrap();
    let processing = SimulatedProcessingService::new(storage.clone())
        .with_jobs_dir(sim_root.path().join("jobs"));
    let workflow = Workflow::new(
        config,
        storage,
        Arc::new(SimulatedPipelineService::new().with_recorded(&pipeline, recorded)),
        Arc::new(processing),
    );

    let outcome = tokio::time::timeout(Duration::from_secs(30), workflow.run())
        .await
        .expect("demo run timed out")
        .expect("demo run failed");
    assert!(matches!(outcome, WorkflowOutcome::Completed { .. }));
    assert!(sim_root.path().join(&bucket).is_dir());
    assert_eq!(listing(&demos), before);
}

fn walk(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            found.extend(walk(&path));
        }
        found.push(path);
    }
    found
}

/// Read-only check against a real account
///
/// Needs credentials plus `BIAS_SMOKE_PIPELINE` naming a pipeline with at
/// least one execution.
#[cfg(feature = "sagemaker")]
#[tokio::test]
#[ignore] // Requires AWS credentials
async fn smoke_test_sagemaker_pipeline_lookup() {
    use bias_pipeline::cloud::SageMakerClient;
    use bias_pipeline::execution::{PipelineInspector, PollPolicy};

    let pipeline = std::env::var("BIAS_SMOKE_PIPELINE").expect("BIAS_SMOKE_PIPELINE");
    let region = std::env::var("AWS_REGION").ok();
    let client = SageMakerClient::from_env(region.as_deref()).await;

    let inspector = PipelineInspector::new(Arc::new(client))
        .with_policy(PollPolicy::fixed(Duration::from_secs(10), 3));
    let result = inspector.find_model(&pipeline).await;

    match result {
        Ok(model) => println!("✅ Latest run of {} created {:?}", pipeline, model),
        Err(bias_pipeline::execution::WorkflowError::PollTimeout { .. }) => {
            println!("Latest run of {} is still executing", pipeline)
        }
        Err(e) => panic!("Lookup failed: {:?}", e),
    }
}
