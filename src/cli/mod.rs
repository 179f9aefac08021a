//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{
    BackendArg, FetchCommand, FindModelCommand, JobCommand, RenderConfigCommand, RunCommand,
    UploadCommand, ValidateCommand,
};
use std::ffi::OsString;
use std::path::PathBuf;

/// Bias analysis for models produced by a training pipeline
#[derive(Debug, Parser, Clone)]
#[command(name = "bias-pipeline")]
#[command(version = "0.1.0")]
#[command(about = "Runs managed bias-analysis jobs against pipeline-trained models", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Which services to talk to
    #[arg(long, value_enum, global = true, default_value_t = BackendArg::Simulated)]
    pub backend: BackendArg,

    /// Directory holding simulated buckets and recorded pipeline runs
    #[arg(long, global = true, default_value = ".bias-sim")]
    pub sim_root: PathBuf,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the whole workflow: upload, find model, submit, wait, download
    Run(RunCommand),

    /// Upload the test dataset only
    Upload(UploadCommand),

    /// Find the model created by the latest pipeline run
    FindModel(FindModelCommand),

    /// Print the analysis configuration a job would receive
    RenderConfig(RenderConfigCommand),

    /// Describe a bias job once
    Status(JobCommand),

    /// Block until a bias job finishes
    Wait(JobCommand),

    /// Download a job's report artifacts
    Fetch(FetchCommand),

    /// Validate a workflow configuration
    Validate(ValidateCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
