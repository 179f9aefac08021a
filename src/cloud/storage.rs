//! Bucket-scoped object storage
//!
//! Wraps an [`ObjectStore`] so the rest of the crate speaks in `s3://` URIs.
//! The same wrapper sits over S3, a local directory (simulated runs) and an
//! in-memory store (tests).

use crate::cloud::CloudError;
use crate::core::S3Uri;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, ObjectStore, RetryConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// An object found under a prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub uri: S3Uri,
    pub size: u64,
}

/// Object storage for a single bucket
#[derive(Debug, Clone)]
pub struct ObjectStorage {
    bucket: String,
    store: Arc<dyn ObjectStore>,
}

fn create_client_options() -> ClientOptions {
    ClientOptions::new()
        .with_connect_timeout(Duration::from_secs(5))
        .with_timeout(Duration::from_secs(300))
        .with_pool_idle_timeout(Duration::from_secs(90))
}

fn create_retry_config() -> RetryConfig {
    RetryConfig {
        max_retries: 5,
        backoff: object_store::BackoffConfig {
            init_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            base: 2.0,
        },
        retry_timeout: Duration::from_secs(120),
    }
}

impl ObjectStorage {
    pub fn new(bucket: impl Into<String>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            bucket: bucket.into(),
            store,
        }
    }

    /// Ephemeral storage, used by tests
    pub fn in_memory(bucket: impl Into<String>) -> Self {
        Self::new(bucket, Arc::new(InMemory::new()))
    }

    /// A local directory standing in for the bucket at `root/<bucket>`
    pub fn local(bucket: impl Into<String>, root: &Path) -> Result<Self, CloudError> {
        let bucket = bucket.into();
        let dir = root.join(&bucket);
        std::fs::create_dir_all(&dir)
            .map_err(|e| CloudError::InvalidUri(format!("{}: {}", dir.display(), e)))?;
        info!("Using local directory {} as bucket {}", dir.display(), bucket);
        Ok(Self::new(bucket, Arc::new(LocalFileSystem::new_with_prefix(&dir)?)))
    }

    /// Authenticated S3 access
    ///
    /// Credentials and region come from the ambient environment
    /// (`AWS_*` variables, config files, instance profile).
    pub fn s3(bucket: impl Into<String>, region: Option<&str>) -> Result<Self, CloudError> {
        let bucket = bucket.into();
        info!("Creating S3 client for bucket: {}", bucket);

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&bucket)
            .with_client_options(create_client_options())
            .with_retry(create_retry_config());
        if let Some(region) = region {
            builder = builder.with_region(region);
        }

        Ok(Self::new(bucket, Arc::new(builder.build()?)))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn path_for(&self, uri: &S3Uri) -> Result<ObjectPath, CloudError> {
        if uri.bucket() != self.bucket {
            return Err(CloudError::InvalidUri(format!(
                "{} is outside bucket {}",
                uri, self.bucket
            )));
        }
        Ok(ObjectPath::from(uri.key()))
    }

    /// Write an object, replacing any existing one
    pub async fn put(&self, uri: &S3Uri, body: Vec<u8>) -> Result<(), CloudError> {
        let path = self.path_for(uri)?;
        debug!("PUT {} ({} bytes)", uri, body.len());
        self.store.put(&path, body.into()).await?;
        Ok(())
    }

    /// Read a whole object
    pub async fn get(&self, uri: &S3Uri) -> Result<Vec<u8>, CloudError> {
        let path = self.path_for(uri)?;
        debug!("GET {}", uri);
        let bytes = self.store.get(&path).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    pub async fn exists(&self, uri: &S3Uri) -> Result<bool, CloudError> {
        let path = self.path_for(uri)?;
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Every object under `prefix`, sorted by key
    pub async fn list(&self, prefix: &S3Uri) -> Result<Vec<StoredObject>, CloudError> {
        let path = self.path_for(prefix)?;
        let prefix_path = if prefix.key().is_empty() { None } else { Some(&path) };

        let metas: Vec<_> = self.store.list(prefix_path).try_collect().await?;
        let mut objects: Vec<StoredObject> = metas
            .into_iter()
            .map(|meta| StoredObject {
                uri: S3Uri::new(self.bucket.clone(), meta.location.as_ref()),
                size: meta.size as u64,
            })
            .collect();
        objects.sort_by(|a, b| a.uri.key().cmp(b.uri.key()));

        debug!("LIST {} -> {} objects", prefix, objects.len());
        Ok(objects)
    }
}
