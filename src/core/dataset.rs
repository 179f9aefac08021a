//! Test dataset location and record shape

use crate::core::analysis::ContentType;
use crate::core::location::S3Uri;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Where a published dataset lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetLocation {
    pub uri: S3Uri,
    pub content_type: ContentType,
}

/// A dataset line does not have the expected shape
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Line {line}: {message}")]
    Record { line: usize, message: String },

    #[error("Dataset is empty")]
    Empty,
}

/// Shape of a JSON lines record: `{"<features>": [...], "<label>": n}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSchema {
    pub features: String,
    pub label: String,
    pub headers: Vec<String>,
}

impl DatasetSchema {
    pub fn new(features: impl Into<String>, label: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            features: features.into(),
            label: label.into(),
            headers,
        }
    }

    /// Number of feature values each record should carry
    ///
    /// The headers name every feature plus the label.
    pub fn expected_feature_count(&self) -> usize {
        self.headers.len().saturating_sub(1)
    }

    /// Check one line, returning the number of feature values
    pub fn check_record(&self, line: &str) -> Result<usize, String> {
        let record: Value =
            serde_json::from_str(line).map_err(|e| format!("not valid JSON: {}", e))?;

        let features = record
            .get(&self.features)
            .ok_or_else(|| format!("missing '{}' key", self.features))?
            .as_array()
            .ok_or_else(|| format!("'{}' is not an array", self.features))?;

        if features.len() != self.expected_feature_count() {
            return Err(format!(
                "expected {} feature values, found {}",
                self.expected_feature_count(),
                features.len()
            ));
        }

        match record.get(&self.label) {
            Some(label) if label.is_number() => Ok(features.len()),
            Some(_) => Err(format!("'{}' is not numeric", self.label)),
            None => Err(format!("missing '{}' key", self.label)),
        }
    }

    /// Structural check of JSON lines content, returning the record count
    ///
    /// Blank lines are skipped. Whether the header order matches the order the
    /// model expects cannot be checked here.
    pub fn check_bytes(&self, content: &[u8]) -> Result<usize, DatasetError> {
        let content = std::str::from_utf8(content).map_err(|e| DatasetError::Record {
            line: content[..e.valid_up_to()].iter().filter(|b| **b == b'\n').count() + 1,
            message: "not valid UTF-8".to_string(),
        })?;
        let mut records = 0;

        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            self.check_record(line).map_err(|message| DatasetError::Record {
                line: idx + 1,
                message,
            })?;
            records += 1;
        }

        if records == 0 {
            return Err(DatasetError::Empty);
        }
        Ok(records)
    }
}
