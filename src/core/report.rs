//! Report artifacts written by the analysis job

use crate::core::metrics::MetricPhase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const ANALYSIS_CONFIG_FILE: &str = "analysis_config.json";
pub const ANALYSIS_FILE: &str = "analysis.json";
pub const REPORT_HTML_FILE: &str = "report.html";
pub const REPORT_NOTEBOOK_FILE: &str = "report.ipynb";
pub const REPORT_PDF_FILE: &str = "report.pdf";

/// Artifacts a successful job is expected to write
pub const EXPECTED_ARTIFACTS: [&str; 5] = [
    ANALYSIS_CONFIG_FILE,
    ANALYSIS_FILE,
    REPORT_HTML_FILE,
    REPORT_NOTEBOOK_FILE,
    REPORT_PDF_FILE,
];

/// One downloaded object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportArtifact {
    /// Key relative to the job's output prefix
    pub key: String,
    pub local_path: PathBuf,
    pub size: u64,
}

/// Everything mirrored from a job's output prefix
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportArtifactSet {
    pub local_dir: PathBuf,
    pub artifacts: Vec<ReportArtifact>,
}

impl ReportArtifactSet {
    pub fn new(local_dir: impl Into<PathBuf>) -> Self {
        Self {
            local_dir: local_dir.into(),
            artifacts: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ReportArtifact> {
        self.artifacts.iter().find(|a| a.key == key)
    }

    /// Well-known artifacts that were not downloaded
    ///
    /// Informational only; nothing is rejected.
    pub fn missing(&self) -> Vec<&'static str> {
        EXPECTED_ARTIFACTS
            .iter()
            .filter(|name| self.get(name).is_none())
            .copied()
            .collect()
    }

    pub fn analysis_path(&self) -> Option<&Path> {
        self.get(ANALYSIS_FILE).map(|a| a.local_path.as_path())
    }

    pub fn total_bytes(&self) -> u64 {
        self.artifacts.iter().map(|a| a.size).sum()
    }
}

/// A single metric value from `analysis.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub phase: MetricPhase,
    pub facet: String,
    pub facet_value: String,
    pub name: String,
    pub description: Option<String>,
    pub value: Option<f64>,
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    pre_training_bias_metrics: Option<RawPhase>,
    #[serde(default)]
    post_training_bias_metrics: Option<RawPhase>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPhase {
    #[serde(default)]
    facets: BTreeMap<String, Vec<RawFacetValue>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFacetValue {
    #[serde(default)]
    value_or_threshold: serde_json::Value,
    #[serde(default)]
    metrics: Vec<RawMetric>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetric {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    value: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

/// Flatten the metrics in an `analysis.json` document for display
///
/// Unknown fields are ignored and missing sections yield no rows.
pub fn summarize_analysis(json: &str) -> Result<Vec<MetricValue>, serde_json::Error> {
    let raw: RawAnalysis = serde_json::from_str(json)?;
    let mut rows = Vec::new();

    let phases = [
        (MetricPhase::PreTraining, raw.pre_training_bias_metrics),
        (MetricPhase::PostTraining, raw.post_training_bias_metrics),
    ];

    for (phase, section) in phases {
        let Some(section) = section else { continue };
        for (facet, values) in section.facets {
            for facet_value in values {
                let value_label = match &facet_value.value_or_threshold {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                for metric in facet_value.metrics {
                    rows.push(MetricValue {
                        phase,
                        facet: facet.clone(),
                        facet_value: value_label.clone(),
                        name: metric.name,
                        description: metric.description,
                        value: metric.value,
                        error: metric.error,
                    });
                }
            }
        }
    }

    Ok(rows)
}
