//! Uploads the local test dataset to object storage

use crate::cloud::ObjectStorage;
use crate::core::{ContentType, DatasetLocation, DatasetSchema, S3Uri};
use crate::execution::error::{Result, WorkflowError};
use std::path::Path;
use tracing::{debug, info};

/// Publishes a local dataset file unchanged
pub struct DatasetPublisher {
    storage: ObjectStorage,
    content_type: ContentType,
    schema: Option<DatasetSchema>,
}

impl DatasetPublisher {
    pub fn new(storage: ObjectStorage) -> Self {
        Self {
            storage,
            content_type: ContentType::JsonLines,
            schema: None,
        }
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Check every record against `schema` before uploading
    pub fn with_schema(mut self, schema: DatasetSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Upload `local_path` to `<destination_prefix>/<file name>`
    pub async fn publish(&self, local_path: &Path, destination_prefix: &S3Uri) -> Result<DatasetLocation> {
        let shown = local_path.display().to_string();
        let file_name = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| WorkflowError::InvalidConfig(format!("'{}' does not name a file", shown)))?;

        let body = tokio::fs::read(local_path)
            .await
            .map_err(|e| WorkflowError::io(&shown, e))?;

        if let Some(schema) = &self.schema {
            let records = schema.check_bytes(&body)?;
            debug!("Dataset {} passed the structural check ({} records)", shown, records);
        }

        let uri = destination_prefix.join(file_name);
        let size = body.len();
        self.storage.put(&uri, body).await?;

        info!("Published dataset {} to {} ({} bytes)", shown, uri, size);
        Ok(DatasetLocation {
            uri,
            content_type: self.content_type,
        })
    }
}
