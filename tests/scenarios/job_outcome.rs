//! Test: Job outcome - failures surface as errors, completed reports are mirrored

use crate::helpers::*;
use bias_pipeline::cloud::JobOutcome;
use bias_pipeline::core::{
    summarize_analysis, JobStatus, MetricPhase, PipelineExecutionStatus, EXPECTED_ARTIFACTS,
};
use bias_pipeline::execution::{WorkflowError, WorkflowOutcome};

fn finished_pipeline() -> bias_pipeline::cloud::SimulatedPipelineService {
    pipeline_service(vec![PipelineExecutionStatus::Succeeded], steps_with_model())
}

/// A completed job's output prefix is mirrored byte for byte
#[tokio::test]
async fn test_completed_job_report_is_mirrored() {
    let h = Harness::with_job_polls(finished_pipeline(), JobOutcome::Complete, 2);
    let workflow = h.workflow(h.config(""));

    let (job, report) = match workflow.run().await.unwrap() {
        WorkflowOutcome::Completed { job, report } => (job, report),
        other => panic!("Expected Completed, got {:?}", other),
    };

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(report.local_dir, h.report_dir());
    assert_eq!(report.len(), EXPECTED_ARTIFACTS.len());
    assert!(report.missing().is_empty());

    for name in EXPECTED_ARTIFACTS {
        let stored = h.storage.get(&h.output_prefix().join(name)).await.unwrap();
        assert_file_bytes(&h.report_dir(), name, &stored);
        assert_eq!(report.get(name).unwrap().size, stored.len() as u64);
    }
}

/// The downloaded analysis.json lists every selected metric
#[tokio::test]
async fn test_downloaded_analysis_is_readable() {
    let h = Harness::new(finished_pipeline(), JobOutcome::Complete);
    let workflow = h.workflow(h.config(
        r#"
methods:
  pre_training: ["CI", "DPL"]
  post_training: ["DPPL"]
"#,
    ));

    workflow.run().await.unwrap();

    let json = std::fs::read_to_string(h.report_dir().join("analysis.json")).unwrap();
    let rows = summarize_analysis(&json).unwrap();
    let names: Vec<(MetricPhase, &str)> =
        rows.iter().map(|r| (r.phase, r.name.as_str())).collect();
    assert_eq!(
        names,
        vec![
            (MetricPhase::PreTraining, "CI"),
            (MetricPhase::PreTraining, "DPL"),
            (MetricPhase::PostTraining, "DPPL"),
        ]
    );
    assert!(rows.iter().all(|r| r.facet == "product_category"));
}

/// A failed job is an error and nothing is downloaded
#[tokio::test]
async fn test_failed_job_is_an_error() {
    let h = Harness::new(
        finished_pipeline(),
        JobOutcome::Fail {
            reason: "AlgorithmError: facet not found".to_string(),
        },
    );
    let workflow = h.workflow(h.config(""));

    match workflow.run().await.unwrap_err() {
        WorkflowError::JobFailed { status, reason, .. } => {
            assert_eq!(status, JobStatus::Failed);
            assert!(reason.contains("facet not found"));
        }
        other => panic!("Expected JobFailed, got {:?}", other),
    }

    let kinds = event_kinds(&h.events());
    assert!(kinds.contains(&"job_finished"));
    assert!(!kinds.contains(&"report"));
    assert_eq!(kinds.last(), Some(&"finished"));
    assert!(!h.report_dir().exists());
}

/// Existing local files are overwritten by a second download
#[tokio::test]
async fn test_report_overwrites_local_files() {
    let h = Harness::new(finished_pipeline(), JobOutcome::Complete);
    std::fs::create_dir_all(h.report_dir()).unwrap();
    std::fs::write(h.report_dir().join("report.pdf"), b"stale").unwrap();

    h.workflow(h.config("")).run().await.unwrap();

    let stored = h
        .storage
        .get(&h.output_prefix().join("report.pdf"))
        .await
        .unwrap();
    assert_file_bytes(&h.report_dir(), "report.pdf", &stored);
}

/// A full run emits its events in stage order
#[tokio::test]
async fn test_event_order() {
    let h = Harness::with_job_polls(
        pipeline_service(
            vec![PipelineExecutionStatus::Executing, PipelineExecutionStatus::Succeeded],
            steps_with_model(),
        ),
        JobOutcome::Complete,
        1,
    );
    h.workflow(h.config("")).run().await.unwrap();

    assert_eq!(
        event_kinds(&h.events()),
        vec![
            "started",
            "published",
            "pipeline_polled",
            "pipeline_polled",
            "model_resolved",
            "submitted",
            "job_polled",
            "job_polled",
            "job_finished",
            "report",
            "finished",
        ]
    );
}
