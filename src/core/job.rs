//! Bias processing job records

use crate::core::analysis::{AnalysisConfig, BiasConfig, DataConfig, ModelConfig, ModelPredictedLabelConfig};
use crate::core::location::S3Uri;
use crate::core::state::JobStatus;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

/// Longest job name the service accepts
pub const MAX_JOB_NAME_LEN: usize = 63;

/// Hex digits of randomness appended to generated names
const NAME_SUFFIX_LEN: usize = 8;

fn job_name_pattern() -> Result<&'static Regex, String> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9](-*[a-zA-Z0-9]){0,62}$"))
        .as_ref()
        .map_err(|e| e.to_string())
}

/// A validated processing job name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobName(String);

impl JobName {
    /// Validate an existing name
    pub fn parse(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        if !job_name_pattern()?.is_match(&name) {
            return Err(format!(
                "Invalid job name '{}': use letters, digits and single hyphens, at most {} characters",
                name, MAX_JOB_NAME_LEN
            ));
        }
        Ok(Self(name))
    }

    /// `<prefix>-<yyyy-mm-dd-HH-MM-SS-mmm>-<8 hex digits>`, distinct per submission
    ///
    /// The prefix is cut short so the name fits in [`MAX_JOB_NAME_LEN`].
    pub fn generate(prefix: &str, now: DateTime<Utc>) -> Result<Self, String> {
        let simple = Uuid::new_v4().simple().to_string();
        let stamp = format!(
            "{}-{}",
            now.format("%Y-%m-%d-%H-%M-%S-%3f"),
            &simple[..NAME_SUFFIX_LEN]
        );
        let budget = MAX_JOB_NAME_LEN - stamp.len() - 1;
        let prefix: String = prefix.trim_matches('-').chars().take(budget).collect();
        let prefix = prefix.trim_end_matches('-');
        if prefix.is_empty() {
            return Self::parse(stamp);
        }
        Self::parse(format!("{}-{}", prefix, stamp))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for JobName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<JobName> for String {
    fn from(name: JobName) -> Self {
        name.0
    }
}

/// Compute resources for the processing job itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResources {
    /// Analysis container image
    pub image_uri: String,
    pub instance_type: String,
    pub instance_count: u32,
    pub volume_size_gb: u32,
    pub max_runtime_secs: u64,
}

/// Inputs and output of a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobManifest {
    pub dataset: S3Uri,
    pub analysis_config: S3Uri,
    pub output: S3Uri,
}

/// Everything handed to the processing service in one submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasJobRequest {
    pub job_name: JobName,
    pub role_arn: String,
    pub resources: ProcessingResources,
    pub manifest: JobManifest,
    pub data: DataConfig,
    pub model: ModelConfig,
    pub predicted_label: ModelPredictedLabelConfig,
    pub bias: BiasConfig,
    pub analysis: AnalysisConfig,
}

/// State of a submitted job as last reported by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub name: JobName,

    #[serde(default)]
    pub arn: Option<String>,

    pub status: JobStatus,

    #[serde(default)]
    pub failure_reason: Option<String>,

    #[serde(default)]
    pub exit_message: Option<String>,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,

    pub manifest: JobManifest,
}

impl JobRecord {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Best available explanation for a failed job
    pub fn diagnostics(&self) -> String {
        match (&self.failure_reason, &self.exit_message) {
            (Some(reason), Some(exit)) => format!("{} ({})", reason, exit),
            (Some(reason), None) => reason.clone(),
            (None, Some(exit)) => exit.clone(),
            (None, None) => "no failure reason reported".to_string(),
        }
    }
}

/// Handle for a submitted job, used for independent polling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub name: JobName,
    pub output: S3Uri,
}

impl From<&JobRecord> for JobHandle {
    fn from(record: &JobRecord) -> Self {
        Self {
            name: record.name.clone(),
            output: record.manifest.output.clone(),
        }
    }
}
