//! Bias analysis descriptors
//!
//! The four descriptors mirror what the analysis service needs to know:
//! where the data lives and how it is shaped ([`DataConfig`]), how to call
//! the model ([`ModelConfig`]), where the prediction sits in the model's
//! response ([`ModelPredictedLabelConfig`]) and which outcomes and column
//! define the bias question ([`BiasConfig`]). They are combined into the
//! `analysis_config.json` document by [`AnalysisConfig::assemble`].
//!
//! Values pass through untouched. Only field presence is checked.

use crate::core::location::S3Uri;
use crate::core::metrics::{MetricCode, MetricPhase};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Substitution point for the feature vector in a request template
pub const FEATURES_PLACEHOLDER: &str = "$features";

/// A descriptor is missing a required field
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid {descriptor} descriptor: {message}")]
pub struct DescriptorError {
    pub descriptor: &'static str,
    pub message: String,
}

impl DescriptorError {
    fn new(descriptor: &'static str, message: impl Into<String>) -> Self {
        Self {
            descriptor,
            message: message.into(),
        }
    }
}

fn require(descriptor: &'static str, field: &str, value: &str) -> Result<(), DescriptorError> {
    if value.trim().is_empty() {
        return Err(DescriptorError::new(descriptor, format!("'{}' must not be empty", field)));
    }
    Ok(())
}

/// Content format of datasets, requests and responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ContentType {
    #[default]
    #[serde(rename = "application/jsonlines")]
    JsonLines,
    #[serde(rename = "application/json")]
    Json,
    #[serde(rename = "text/csv")]
    Csv,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::JsonLines => "application/jsonlines",
            ContentType::Json => "application/json",
            ContentType::Csv => "text/csv",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outcome value (or threshold) counted as favorable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for LabelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelValue::Int(v) => write!(f, "{}", v),
            LabelValue::Float(v) => write!(f, "{}", v),
            LabelValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for LabelValue {
    fn from(value: i64) -> Self {
        LabelValue::Int(value)
    }
}

impl From<&str> for LabelValue {
    fn from(value: &str) -> Self {
        LabelValue::Text(value.to_string())
    }
}

/// Dataset descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Where the dataset was published
    pub s3_data_input_path: S3Uri,

    /// Where the job writes its artifacts
    pub s3_output_path: S3Uri,

    /// Column (or JSON key) holding the observed label
    pub label: String,

    /// JSON key holding the ordered feature values
    pub features: String,

    /// Header names, in exactly the order the hosted model expects
    pub headers: Vec<String>,

    pub dataset_type: ContentType,
}

impl DataConfig {
    pub fn validate(&self) -> Result<(), DescriptorError> {
        require("data", "label", &self.label)?;
        if self.dataset_type == ContentType::JsonLines {
            require("data", "features", &self.features)?;
        }
        if self.headers.is_empty() {
            return Err(DescriptorError::new("data", "'headers' must not be empty"));
        }
        Ok(())
    }
}

/// Model invocation descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    pub instance_type: String,
    pub instance_count: u32,
    pub content_type: ContentType,
    pub accept_type: ContentType,

    /// Request payload template, e.g. `{"features":$features}`
    pub content_template: String,
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), DescriptorError> {
        require("model", "model_name", &self.model_name)?;
        require("model", "instance_type", &self.instance_type)?;
        if self.instance_count == 0 {
            return Err(DescriptorError::new("model", "'instance_count' must be at least 1"));
        }
        let placeholders = self.content_template.matches(FEATURES_PLACEHOLDER).count();
        if placeholders != 1 {
            return Err(DescriptorError::new(
                "model",
                format!(
                    "'content_template' must contain exactly one {} placeholder, found {}",
                    FEATURES_PLACEHOLDER, placeholders
                ),
            ));
        }
        Ok(())
    }
}

/// Which part of the model response carries the prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPredictedLabelConfig {
    /// Response key with the predicted label
    pub label: String,

    /// Response key with the prediction score, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<String>,

    /// Score above which the prediction counts as positive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability_threshold: Option<f64>,
}

impl ModelPredictedLabelConfig {
    pub fn validate(&self) -> Result<(), DescriptorError> {
        require("predicted label", "label", &self.label)
    }
}

/// Favorable outcomes and the sensitive attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasConfig {
    /// Label values treated as positive
    pub label_values_or_threshold: Vec<LabelValue>,

    /// The sensitive attribute column
    pub facet_name: String,

    /// Facet values to treat as the sensitive group; all values when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet_values_or_threshold: Option<Vec<LabelValue>>,

    /// Column used to form subgroups for conditional metrics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
}

impl BiasConfig {
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.label_values_or_threshold.is_empty() {
            return Err(DescriptorError::new(
                "bias",
                "'label_values_or_threshold' must list at least one value",
            ));
        }
        require("bias", "facet_name", &self.facet_name)?;
        if let Some(group) = &self.group_name {
            require("bias", "group_name", group)?;
        }
        Ok(())
    }
}

/// Which metrics to compute in a phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSelection {
    /// Every metric that applies
    All,
    /// An explicit list of metric codes
    Codes(Vec<MetricCode>),
}

impl MethodSelection {
    /// Check that every listed code belongs to `phase`
    pub fn validate(&self, phase: MetricPhase) -> Result<(), DescriptorError> {
        match self {
            MethodSelection::All => Ok(()),
            MethodSelection::Codes(codes) if codes.is_empty() => Err(DescriptorError::new(
                "methods",
                format!("{} selection lists no metric codes", phase),
            )),
            MethodSelection::Codes(codes) => {
                match codes.iter().find(|code| code.phase() != phase) {
                    Some(code) => Err(DescriptorError::new(
                        "methods",
                        format!("metric {} is not a {} metric", code, phase),
                    )),
                    None => Ok(()),
                }
            }
        }
    }
}

impl Serialize for MethodSelection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MethodSelection::All => serializer.serialize_str("all"),
            MethodSelection::Codes(codes) => codes.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for MethodSelection {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Keyword(String),
            Codes(Vec<MetricCode>),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Keyword(word) if word.eq_ignore_ascii_case("all") => Ok(MethodSelection::All),
            Raw::Keyword(word) => word
                .parse()
                .map(|code| MethodSelection::Codes(vec![code]))
                .map_err(serde::de::Error::custom),
            Raw::Codes(codes) => Ok(MethodSelection::Codes(codes)),
        }
    }
}

/// Metric selection for a whole analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiasMethods {
    /// Pre-training metrics; skipped when absent
    #[serde(default)]
    pub pre_training: Option<MethodSelection>,

    /// Post-training metrics; skipped when absent
    #[serde(default)]
    pub post_training: Option<MethodSelection>,

    /// Ask the service to render the report
    #[serde(default = "default_true")]
    pub report: bool,
}

fn default_true() -> bool {
    true
}

impl Default for BiasMethods {
    fn default() -> Self {
        Self {
            pre_training: Some(MethodSelection::All),
            post_training: Some(MethodSelection::All),
            report: true,
        }
    }
}

impl BiasMethods {
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.pre_training.is_none() && self.post_training.is_none() {
            return Err(DescriptorError::new("methods", "no bias metrics selected"));
        }
        if let Some(pre) = &self.pre_training {
            pre.validate(MetricPhase::PreTraining)?;
        }
        if let Some(post) = &self.post_training {
            post.validate(MetricPhase::PostTraining)?;
        }
        Ok(())
    }
}

/// `{"name_or_index": ...}` entry of the facet list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetSpec {
    pub name_or_index: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_or_threshold: Option<Vec<LabelValue>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodsSpec {
    pub methods: MethodSelection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSpec {
    pub name: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMethods {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<ReportSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_training_bias: Option<MethodsSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_training_bias: Option<MethodsSpec>,
}

/// The `predictor` section: model descriptor plus predicted-label keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorSpec {
    pub model_name: String,
    pub instance_type: String,
    pub initial_instance_count: u32,
    pub accept_type: ContentType,
    pub content_type: ContentType,
    pub content_template: String,
    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<String>,
}

/// The `analysis_config.json` document consumed by the processing job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub dataset_type: ContentType,
    pub headers: Vec<String>,
    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<String>,

    pub label_values_or_threshold: Vec<LabelValue>,
    pub facet: Vec<FacetSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_variable: Option<String>,

    pub methods: AnalysisMethods,
    pub predictor: PredictorSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability_threshold: Option<f64>,
}

impl AnalysisConfig {
    /// Combine the four descriptors and the metric selection
    pub fn assemble(
        data: &DataConfig,
        model: &ModelConfig,
        predicted: &ModelPredictedLabelConfig,
        bias: &BiasConfig,
        methods: &BiasMethods,
    ) -> Result<Self, DescriptorError> {
        data.validate()?;
        model.validate()?;
        predicted.validate()?;
        bias.validate()?;
        methods.validate()?;

        let features = match data.dataset_type {
            ContentType::Csv => None,
            _ => Some(data.features.clone()),
        };

        Ok(Self {
            dataset_type: data.dataset_type,
            headers: data.headers.clone(),
            label: data.label.clone(),
            features,
            label_values_or_threshold: bias.label_values_or_threshold.clone(),
            facet: vec![FacetSpec {
                name_or_index: bias.facet_name.clone(),
                value_or_threshold: bias.facet_values_or_threshold.clone(),
            }],
            group_variable: bias.group_name.clone(),
            methods: AnalysisMethods {
                report: methods.report.then(|| ReportSpec {
                    name: "report".to_string(),
                    title: "Analysis Report".to_string(),
                }),
                pre_training_bias: methods
                    .pre_training
                    .clone()
                    .map(|methods| MethodsSpec { methods }),
                post_training_bias: methods
                    .post_training
                    .clone()
                    .map(|methods| MethodsSpec { methods }),
            },
            predictor: PredictorSpec {
                model_name: model.model_name.clone(),
                instance_type: model.instance_type.clone(),
                initial_instance_count: model.instance_count,
                accept_type: model.accept_type,
                content_type: model.content_type,
                content_template: model.content_template.clone(),
                label: predicted.label.clone(),
                probability: predicted.probability.clone(),
            },
            probability_threshold: predicted.probability_threshold,
        })
    }

    /// Pretty JSON as written to object storage
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
