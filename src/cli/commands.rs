//! CLI command definitions

use crate::core::config::WorkflowConfig;
use clap::Args;
use std::path::PathBuf;

/// Backend argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendArg {
    /// Local directory buckets and recorded pipeline runs
    Simulated,
    /// The managed ML service (needs the `sagemaker` build feature)
    Sagemaker,
}

/// Run the whole workflow
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Return after submitting the job
    #[arg(long)]
    pub no_wait: bool,

    /// Analyse this model instead of looking one up
    #[arg(long)]
    pub model_name: Option<String>,

    /// Where to put the downloaded report
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

impl RunCommand {
    /// Apply command-line overrides on top of the file
    pub fn apply(&self, config: &mut WorkflowConfig) {
        if self.no_wait {
            config.job.wait = false;
        }
        if let Some(name) = &self.model_name {
            config.model.name = Some(name.clone());
        }
        if let Some(dir) = &self.output_dir {
            config.report.local_dir = dir.clone();
        }
    }
}

/// Upload the dataset
#[derive(Debug, Args, Clone)]
pub struct UploadCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,
}

/// Find the pipeline's model
#[derive(Debug, Args, Clone)]
pub struct FindModelCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,
}

/// Render the analysis configuration
#[derive(Debug, Args, Clone)]
pub struct RenderConfigCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Model to configure the analysis for
    #[arg(long)]
    pub model_name: String,

    /// Published dataset; defaults to where `upload` would put it
    #[arg(long)]
    pub dataset_uri: Option<String>,
}

/// Address one job
#[derive(Debug, Args, Clone)]
pub struct JobCommand {
    /// Processing job name
    #[arg(long)]
    pub job: String,

    /// Service region; defaults to the ambient AWS configuration
    #[arg(long)]
    pub region: Option<String>,
}

/// Download a job's report
#[derive(Debug, Args, Clone)]
pub struct FetchCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Take the output location from this job instead of the file
    #[arg(long)]
    pub job: Option<String>,

    /// Where to put the downloaded report
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

/// Validate a workflow configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
