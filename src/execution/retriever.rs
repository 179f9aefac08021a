//! Mirrors a job's output prefix into a local directory

use crate::cloud::ObjectStorage;
use crate::core::{ReportArtifact, ReportArtifactSet, S3Uri};
use crate::execution::error::{Result, WorkflowError};
use std::path::Path;
use tracing::{debug, info, warn};

/// Downloads every object under an output prefix
pub struct ReportRetriever {
    storage: ObjectStorage,
}

impl ReportRetriever {
    pub fn new(storage: ObjectStorage) -> Self {
        Self { storage }
    }

    /// Copy every object under `output` to `local_dir/<relative key>`
    ///
    /// Existing files are overwritten. Nothing is filtered or validated.
    pub async fn download(&self, output: &S3Uri, local_dir: &Path) -> Result<ReportArtifactSet> {
        let objects = self.storage.list(output).await?;
        let mut set = ReportArtifactSet::new(local_dir);

        tokio::fs::create_dir_all(local_dir)
            .await
            .map_err(|e| WorkflowError::io(local_dir.display().to_string(), e))?;

        let prefix = output.key();
        for object in objects {
            let key = object.uri.key();
            let relative = if prefix.is_empty() {
                key
            } else {
                key.strip_prefix(prefix).unwrap_or(key).trim_start_matches('/')
            };
            if relative.is_empty() {
                continue;
            }

            let local_path = local_dir.join(relative);
            if let Some(parent) = local_path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| WorkflowError::io(parent.display().to_string(), e))?;
            }

            let body = self.storage.get(&object.uri).await?;
            tokio::fs::write(&local_path, &body)
                .await
                .map_err(|e| WorkflowError::io(local_path.display().to_string(), e))?;
            debug!("Downloaded {} to {}", object.uri, local_path.display());

            set.artifacts.push(ReportArtifact {
                key: relative.to_string(),
                local_path,
                size: body.len() as u64,
            });
        }

        let missing = set.missing();
        if !missing.is_empty() {
            warn!("Output {} lacks {}", output, missing.join(", "));
        }
        info!(
            "Downloaded {} artifacts ({} bytes) from {} to {}",
            set.len(),
            set.total_bytes(),
            output,
            local_dir.display()
        );
        Ok(set)
    }
}
