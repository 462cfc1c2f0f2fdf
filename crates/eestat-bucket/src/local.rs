use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::{BucketError, BucketStore};

/// Directory-backed bucket: objects live under `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalBucketStore {
    bucket: String,
    dir: PathBuf,
}

impl LocalBucketStore {
    pub fn new(root: impl AsRef<Path>, bucket: impl Into<String>) -> Result<Self, BucketError> {
        let bucket = bucket.into();
        if bucket.is_empty() {
            return Err(BucketError::Configuration(
                "bucket name cannot be empty".into(),
            ));
        }
        let dir = root.as_ref().join(&bucket);
        Ok(Self { bucket, dir })
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, BucketError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(BucketError::Configuration(format!(
                "invalid object key '{key}'"
            )));
        }
        Ok(self.dir.join(relative))
    }
}

#[async_trait]
impl BucketStore for LocalBucketStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        _content_type: &str,
    ) -> Result<(), BucketError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "wrote local object");
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, BucketError> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(contents) => Ok(Bytes::from(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(BucketError::NotFound(key.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}
