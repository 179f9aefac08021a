//! CLI output formatting

use crate::{
    core::{JobRecord, JobStatus, MetricValue, PipelineExecutionStatus, ReportArtifactSet},
    execution::{WorkflowEvent, WorkflowOutcome},
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a spinner for long waits
pub fn create_spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format a pipeline execution status for display
pub fn format_pipeline_status(status: PipelineExecutionStatus) -> String {
    match status {
        PipelineExecutionStatus::Executing => style("EXECUTING").yellow().to_string(),
        PipelineExecutionStatus::Stopping => style("STOPPING").yellow().to_string(),
        PipelineExecutionStatus::Stopped => style("STOPPED").dim().to_string(),
        PipelineExecutionStatus::Failed => style("FAILED").red().to_string(),
        PipelineExecutionStatus::Succeeded => style("SUCCEEDED").green().to_string(),
    }
}

/// Format a job status for display
pub fn format_job_status(status: JobStatus) -> String {
    match status {
        JobStatus::InProgress => style("IN PROGRESS").yellow().to_string(),
        JobStatus::Stopping => style("STOPPING").yellow().to_string(),
        JobStatus::Stopped => style("STOPPED").dim().to_string(),
        JobStatus::Failed => style("FAILED").red().to_string(),
        JobStatus::Completed => style("COMPLETED").green().to_string(),
    }
}

/// Format a workflow event for display
pub fn format_workflow_event(event: &WorkflowEvent) -> String {
    match event {
        WorkflowEvent::WorkflowStarted { run_id, name } => format!(
            "{} Starting bias workflow {} ({})",
            ROCKET,
            style(name).bold(),
            style(&run_id.to_string()[..8]).dim()
        ),
        WorkflowEvent::DatasetPublished { uri } => {
            format!("{} Dataset published to {}", CHECK, style(uri).cyan())
        }
        WorkflowEvent::PipelinePolled { pipeline, status } => format!(
            "{} Pipeline {} is {}",
            SPINNER,
            style(pipeline).cyan(),
            format_pipeline_status(*status)
        ),
        WorkflowEvent::ModelResolved { model_name, arn } => match arn {
            Some(arn) => format!(
                "{} Model {} ({})",
                CHECK,
                style(model_name).bold(),
                style(arn).dim()
            ),
            None => format!("{} Model {} (configured)", CHECK, style(model_name).bold()),
        },
        WorkflowEvent::JobSubmitted { job, output } => format!(
            "{} Submitted {} → {}",
            ROCKET,
            style(job).cyan(),
            style(output).dim()
        ),
        WorkflowEvent::JobPolled { job, status } => format!(
            "{} Job {} is {}",
            SPINNER,
            style(job).cyan(),
            format_job_status(*status)
        ),
        WorkflowEvent::JobFinished { job, status } => {
            let icon = if status.is_success() { CHECK } else { CROSS };
            format!("{} Job {} {}", icon, style(job).cyan(), format_job_status(*status))
        }
        WorkflowEvent::ReportDownloaded {
            local_dir,
            artifacts,
        } => format!(
            "{} {} artifacts downloaded to {}",
            CHECK,
            style(artifacts).cyan(),
            style(local_dir.display()).bold()
        ),
        WorkflowEvent::WorkflowFinished { run_id, success } => {
            let status = if *success {
                format!("{} completed", style("successfully").green())
            } else {
                style("failed").red().to_string()
            };
            format!(
                "{} Workflow ({}) {}",
                INFO,
                style(&run_id.to_string()[..8]).dim(),
                status
            )
        }
    }
}

/// Multi-line description of a job record
pub fn format_job_record(record: &JobRecord) -> String {
    let mut lines = vec![
        format!("  Job: {}", style(&record.name).bold()),
        format!("  Status: {}", format_job_status(record.status)),
        format!("  Created: {}", style(record.created_at.to_rfc3339()).dim()),
    ];
    if let Some(arn) = &record.arn {
        lines.push(format!("  ARN: {}", style(arn).dim()));
    }
    if let Some(ended) = record.ended_at {
        lines.push(format!("  Ended: {}", style(ended.to_rfc3339()).dim()));
    }
    lines.push(format!("  Output: {}", style(&record.manifest.output).cyan()));
    if matches!(record.status, JobStatus::Failed | JobStatus::Stopped) {
        lines.push(format!("  Reason: {}", style(record.diagnostics()).red()));
    }
    lines.join("\n")
}

/// List downloaded artifacts, flagging well-known ones that are absent
pub fn format_artifacts(set: &ReportArtifactSet) -> String {
    let mut lines: Vec<String> = set
        .artifacts
        .iter()
        .map(|a| format!("  {} {} ({} bytes)", CHECK, a.key, a.size))
        .collect();
    for name in set.missing() {
        lines.push(format!("  {} {} {}", WARN, name, style("(not produced)").dim()));
    }
    lines.join("\n")
}

/// One row per metric value
pub fn format_metric_table(metrics: &[MetricValue]) -> String {
    if metrics.is_empty() {
        return format!("  {}", style("no metrics reported").dim());
    }
    metrics
        .iter()
        .map(|m| {
            let value = match (m.value, &m.error) {
                (Some(v), _) => style(format!("{:>8.4}", v)).cyan().to_string(),
                (None, Some(err)) => style(err).dim().to_string(),
                (None, None) => style("n/a").dim().to_string(),
            };
            format!(
                "  {:<13} {:<5} {}={} {}",
                m.phase.to_string(),
                m.name,
                m.facet,
                m.facet_value,
                value
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Final line for a successful run
pub fn format_outcome(outcome: &WorkflowOutcome) -> String {
    match outcome {
        WorkflowOutcome::Submitted(handle) => format!(
            "{} Job {} submitted; check it with `bias-pipeline status --job {}`",
            INFO,
            style(&handle.name).bold(),
            handle.name
        ),
        WorkflowOutcome::Completed { job, report } => format!(
            "{} {} completed, report in {}",
            CHECK,
            style(&job.name).bold(),
            style(report.local_dir.display()).green()
        ),
    }
}
