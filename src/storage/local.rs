use super::{ByteStream, ObjectStore};
use crate::{Error, Result};
use async_trait::async_trait;
use std::io::{self, SeekFrom};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Object store backed by a local directory tree: `<root>/<bucket>/<object>`.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn object_path(&self, bucket: &str, object: &str) -> Result<PathBuf> {
        let components = Path::new(bucket)
            .components()
            .chain(Path::new(object).components());
        for component in components {
            if !matches!(component, Component::Normal(_)) {
                return Err(Error::InvalidInput(format!(
                    "invalid object name {bucket}/{object}"
                )));
            }
        }
        Ok(self.root.join(bucket).join(object))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn open_range(
        &self,
        bucket: &str,
        object: &str,
        offset: u64,
        length: Option<u64>,
    ) -> Result<ByteStream> {
        let path = self.object_path(bucket, object)?;
        let mut file = fs::File::open(&path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(format!("{bucket}/{object}")),
            io::ErrorKind::PermissionDenied => {
                Error::PermissionDenied(format!("{bucket}/{object}"))
            }
            _ => Error::Io(e),
        })?;
        file.seek(SeekFrom::Start(offset)).await?;

        match length {
            Some(length) => Ok(Box::pin(file.take(length))),
            None => Ok(Box::pin(file)),
        }
    }
}
