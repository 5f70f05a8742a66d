use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

use crate::error::BlobError;

/// Location of one object in bucket storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub object: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.object)
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, object: &ObjectRef) -> Result<Vec<u8>, BlobError>;
}

/// Buckets are directories under `root`; objects are files inside them.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, object: &ObjectRef) -> PathBuf {
        self.root.join(&object.bucket).join(&object.object)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, object: &ObjectRef) -> Result<Vec<u8>, BlobError> {
        let path = self.path_for(object);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!(path = %path.display(), bytes = bytes.len(), "Read object from filesystem");
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BlobError::NotFound {
                bucket: object.bucket.clone(),
                object: object.object.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

/// Fetches objects over HTTP as `{base_url}/{bucket}/{object}`, the layout of
/// public bucket URLs.
pub struct HttpBlobStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn url_for(&self, object: &ObjectRef) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            object.bucket,
            object.object.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn get(&self, object: &ObjectRef) -> Result<Vec<u8>, BlobError> {
        let url = self.url_for(object);
        let resp = self.client.get(&url).send().await?;
        let status = resp.status().as_u16();
        if status == 404 {
            return Err(BlobError::NotFound {
                bucket: object.bucket.clone(),
                object: object.object.clone(),
            });
        }
        if !(200..=299).contains(&status) {
            return Err(BlobError::Status { status, url });
        }
        let bytes = resp.bytes().await?.to_vec();
        debug!(%url, bytes = bytes.len(), "Fetched object over HTTP");
        Ok(bytes)
    }
}
