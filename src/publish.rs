//! Content-addressed blob publisher.
//!
//! Derived artifacts are published to a content-addressed store and the
//! returned URIs are embedded in the generated index document. The store is
//! opaque to the pipeline: `put` bytes or JSON, get a `sha1://` URI back.
//! Re-publishing identical content is a no-op that returns the same URI.

use crate::error::{ChitterError, Result};
use sha1::{Digest, Sha1};
use std::fs;
use std::path::{Path, PathBuf};

/// Blob publisher interface. The pipeline never assumes anything beyond
/// content addressing.
pub trait Publisher {
    fn put_bytes(&self, data: &[u8]) -> Result<String>;
    fn put_json(&self, value: &serde_json::Value) -> Result<String>;

    fn put_file(&self, path: &Path) -> Result<String> {
        let data = fs::read(path)?;
        self.put_bytes(&data)
    }
}

/// Publisher backed by a directory of sha1-named files under the project
/// root. Stands in for a remote object store while keeping URIs stable.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    store_dir: PathBuf,
}

impl LocalBlobStore {
    pub fn new(project_root: &Path) -> Self {
        Self {
            store_dir: project_root.join(".chitter").join("store").join("sha1"),
        }
    }

    /// Filesystem path a URI from this store resolves to.
    pub fn resolve(&self, uri: &str) -> Result<PathBuf> {
        let hex = uri
            .strip_prefix("sha1://")
            .ok_or_else(|| ChitterError::MalformedQueryPath {
                path: uri.to_string(),
            })?;
        Ok(self.store_dir.join(hex))
    }
}

impl Publisher for LocalBlobStore {
    fn put_bytes(&self, data: &[u8]) -> Result<String> {
        let mut hasher = Sha1::new();
        hasher.update(data);
        let hex = format!("{:x}", hasher.finalize());
        fs::create_dir_all(&self.store_dir)?;
        let blob_path = self.store_dir.join(&hex);
        if !blob_path.exists() {
            fs::write(&blob_path, data)?;
        }
        Ok(format!("sha1://{hex}"))
    }

    fn put_json(&self, value: &serde_json::Value) -> Result<String> {
        let data = serde_json::to_vec(value)?;
        self.put_bytes(&data)
    }
}
