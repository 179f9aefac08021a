//! Bias job configuration from YAML

use crate::core::analysis::{BiasMethods, ContentType, LabelValue, FEATURES_PLACEHOLDER};
use crate::core::dataset::DatasetSchema;
use crate::core::location::S3Uri;
use crate::core::pipeline::DEFAULT_MODEL_STEP;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level workflow configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name, used in logs
    pub name: String,

    /// Cloud region; the ambient default applies when absent
    #[serde(default)]
    pub region: Option<String>,

    /// Execution role the processing job assumes
    pub role_arn: String,

    pub dataset: DatasetSection,

    /// Training pipeline to take the model from
    #[serde(default)]
    pub pipeline: Option<PipelineSection>,

    pub model: ModelSection,

    pub bias: BiasSection,

    #[serde(default)]
    pub methods: BiasMethods,

    pub job: JobSection,

    #[serde(default)]
    pub polling: PollingSection,

    #[serde(default)]
    pub report: ReportSection,
}

/// Test dataset: local source, remote destination, record shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSection {
    /// Local JSON lines file
    pub local_path: PathBuf,

    /// Prefix the file is uploaded under
    pub destination: S3Uri,

    #[serde(default)]
    pub content_type: ContentType,

    /// Key holding the observed label
    pub label: String,

    /// Key holding the ordered feature values
    #[serde(default = "default_features_key")]
    pub features: String,

    /// Header names in exactly the order the model expects them
    pub headers: Vec<String>,

    /// Check record shape before uploading
    #[serde(default)]
    pub validate: bool,
}

impl DatasetSection {
    pub fn schema(&self) -> DatasetSchema {
        DatasetSchema::new(&self.features, &self.label, self.headers.clone())
    }
}

/// Which pipeline run produced the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    pub name: String,

    /// Step whose metadata carries the created model
    #[serde(default = "default_model_step")]
    pub model_step: String,
}

/// How the analysis service should host and call the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSection {
    /// Explicit model name; skips the pipeline lookup
    #[serde(default)]
    pub name: Option<String>,

    pub instance_type: String,

    #[serde(default = "default_one")]
    pub instance_count: u32,

    #[serde(default)]
    pub content_type: ContentType,

    #[serde(default)]
    pub accept_type: ContentType,

    /// Request template with a single `$features` substitution point
    #[serde(default = "default_content_template")]
    pub content_template: String,

    /// Response key holding the predicted label
    #[serde(default = "default_predicted_label")]
    pub predicted_label: String,

    #[serde(default)]
    pub probability: Option<String>,

    #[serde(default)]
    pub probability_threshold: Option<f64>,
}

/// Favorable outcomes and the sensitive attribute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasSection {
    /// Label values counted as favorable
    pub label_values: Vec<LabelValue>,

    /// Sensitive attribute column
    pub facet: String,

    #[serde(default)]
    pub facet_values: Option<Vec<LabelValue>>,

    /// Subgroup column for conditional metrics
    #[serde(default)]
    pub group: Option<String>,
}

/// The processing job running the analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSection {
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// Analysis container image
    pub image_uri: String,

    #[serde(default = "default_job_instance_type")]
    pub instance_type: String,

    #[serde(default = "default_one")]
    pub instance_count: u32,

    #[serde(default = "default_volume_size_gb")]
    pub volume_size_gb: u32,

    #[serde(default = "default_max_runtime_secs")]
    pub max_runtime_secs: u64,

    /// Prefix the job writes its artifacts under
    pub output: S3Uri,

    /// Block until the job settles
    #[serde(default = "default_true")]
    pub wait: bool,
}

/// Bounds for one polling loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSettings {
    #[serde(default = "default_initial_interval_secs")]
    pub initial_interval_secs: f64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_max_interval_secs")]
    pub max_interval_secs: f64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_max_elapsed_secs")]
    pub max_elapsed_secs: f64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_interval_secs: default_initial_interval_secs(),
            multiplier: default_multiplier(),
            max_interval_secs: default_max_interval_secs(),
            max_attempts: default_max_attempts(),
            max_elapsed_secs: default_max_elapsed_secs(),
        }
    }
}

impl PollSettings {
    fn validate(&self, which: &str) -> Result<()> {
        let durations = [
            ("initial_interval_secs", self.initial_interval_secs),
            ("max_interval_secs", self.max_interval_secs),
            ("max_elapsed_secs", self.max_elapsed_secs),
        ];
        for (field, value) in durations {
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("polling.{}.{} must be a non-negative number", which, field);
            }
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            anyhow::bail!("polling.{}.multiplier must be at least 1.0", which);
        }
        if self.max_attempts == 0 {
            anyhow::bail!("polling.{}.max_attempts must be at least 1", which);
        }
        Ok(())
    }
}

/// Polling bounds for the pipeline and job loops
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PollingSection {
    #[serde(default)]
    pub pipeline: PollSettings,

    #[serde(default)]
    pub job: PollSettings,
}

/// Where report artifacts are mirrored locally
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSection {
    #[serde(default = "default_report_dir")]
    pub local_dir: PathBuf,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            local_dir: default_report_dir(),
        }
    }
}

fn default_features_key() -> String {
    "features".to_string()
}

fn default_model_step() -> String {
    DEFAULT_MODEL_STEP.to_string()
}

fn default_one() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_content_template() -> String {
    format!(r#"{{"features":{}}}"#, FEATURES_PLACEHOLDER)
}

fn default_predicted_label() -> String {
    "predicted_label".to_string()
}

fn default_name_prefix() -> String {
    "Clarify-Bias".to_string()
}

fn default_job_instance_type() -> String {
    "ml.c5.xlarge".to_string()
}

fn default_volume_size_gb() -> u32 {
    30
}

fn default_max_runtime_secs() -> u64 {
    3600
}

fn default_initial_interval_secs() -> f64 {
    30.0
}

fn default_multiplier() -> f64 {
    1.5
}

fn default_max_interval_secs() -> f64 {
    300.0
}

fn default_max_attempts() -> u32 {
    240
}

fn default_max_elapsed_secs() -> f64 {
    6.0 * 3600.0
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("generated_bias_report")
}

impl WorkflowConfig {
    /// Load workflow configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse workflow configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the workflow configuration
    ///
    /// Only presence and ranges are checked here; the descriptors check
    /// their own fields when they are built.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Workflow name must not be empty");
        }
        if self.role_arn.trim().is_empty() {
            anyhow::bail!("role_arn must not be empty");
        }

        if self.dataset.headers.is_empty() {
            anyhow::bail!("dataset.headers must list the columns in model order");
        }
        if self.dataset.validate && !self.dataset.local_path.exists() {
            anyhow::bail!(
                "dataset.local_path doesn't exist: {}",
                self.dataset.local_path.display()
            );
        }

        match (&self.pipeline, &self.model.name) {
            (None, None) => anyhow::bail!(
                "Either pipeline.name or model.name is required to know which model to analyse"
            ),
            (Some(pipeline), _) if pipeline.name.trim().is_empty() => {
                anyhow::bail!("pipeline.name must not be empty")
            }
            _ => {}
        }

        if self.bias.label_values.is_empty() {
            anyhow::bail!("bias.label_values must list at least one favorable value");
        }
        if self.dataset.label.trim().is_empty() {
            anyhow::bail!("dataset.label must not be empty");
        }
        if self.bias.facet.trim().is_empty() {
            anyhow::bail!("bias.facet must not be empty");
        }

        self.methods.validate()?;

        if self.job.output.bucket() != self.dataset.destination.bucket() {
            anyhow::bail!(
                "job.output ({}) must be in the same bucket as dataset.destination ({})",
                self.job.output,
                self.dataset.destination
            );
        }
        if self.job.image_uri.trim().is_empty() {
            anyhow::bail!("job.image_uri must not be empty");
        }
        // The service takes 32-bit resource fields
        let limit = i32::MAX as u64;
        for (field, value) in [
            ("model.instance_count", u64::from(self.model.instance_count)),
            ("job.instance_count", u64::from(self.job.instance_count)),
            ("job.volume_size_gb", u64::from(self.job.volume_size_gb)),
            ("job.max_runtime_secs", self.job.max_runtime_secs),
        ] {
            if value > limit {
                anyhow::bail!("{} must be at most {}, got {}", field, limit, value);
            }
        }
        if self.job.instance_count == 0 {
            anyhow::bail!("job.instance_count must be at least 1");
        }

        self.polling.pipeline.validate("pipeline")?;
        self.polling.job.validate("job")?;

        Ok(())
    }

    /// Name of the step carrying the model, when a pipeline is configured
    pub fn model_step(&self) -> Option<&str> {
        self.pipeline.as_ref().map(|p| p.model_step.as_str())
    }
}
