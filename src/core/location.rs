//! Object storage locations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An `s3://bucket/key` location
///
/// The key may be empty (bucket root) and never has leading or trailing
/// slashes, so prefixes and object keys compose with [`S3Uri::join`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct S3Uri {
    bucket: String,
    key: String,
}

impl S3Uri {
    pub fn new(bucket: impl Into<String>, key: impl AsRef<str>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.as_ref().trim_matches('/').to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Append a path segment (or several, separated by `/`)
    pub fn join(&self, segment: &str) -> Self {
        let segment = segment.trim_matches('/');
        let key = match (self.key.is_empty(), segment.is_empty()) {
            (true, _) => segment.to_string(),
            (false, true) => self.key.clone(),
            (false, false) => format!("{}/{}", self.key, segment),
        };
        Self {
            bucket: self.bucket.clone(),
            key,
        }
    }

    /// The location one level up, e.g. the prefix holding an object
    pub fn parent(&self) -> Self {
        let key = match self.key.rsplit_once('/') {
            Some((parent, _)) => parent.to_string(),
            None => String::new(),
        };
        Self {
            bucket: self.bucket.clone(),
            key,
        }
    }

    /// Last path segment of the key
    pub fn file_name(&self) -> Option<&str> {
        self.key
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
    }
}

impl fmt::Display for S3Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key.is_empty() {
            write!(f, "s3://{}", self.bucket)
        } else {
            write!(f, "s3://{}/{}", self.bucket, self.key)
        }
    }
}

impl FromStr for S3Uri {
    type Err = String;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let without_scheme = uri
            .strip_prefix("s3://")
            .ok_or_else(|| format!("Invalid S3 URI: expected 's3://' prefix in '{}'", uri))?;

        let (bucket, key) = without_scheme
            .split_once('/')
            .unwrap_or((without_scheme, ""));

        if bucket.is_empty() {
            return Err(format!("Invalid S3 URI: missing bucket in '{}'", uri));
        }

        Ok(Self::new(bucket, key))
    }
}

impl Serialize for S3Uri {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for S3Uri {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
