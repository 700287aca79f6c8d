// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::{ByteStream, ObjectStore};
use crate::error::StoreError;

/// Suffix of in-flight writes; such files are invisible to listings
const PARTIAL_SUFFIX: &str = ".partial";

/// Object store backed by a local directory
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at `root`. The directory is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an object key to a filesystem path, rejecting anything that could escape the root
    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        let trimmed = key.strip_suffix('/').unwrap_or(key);
        if trimmed.is_empty() {
            return Ok(self.root.clone());
        }

        let mut path = self.root.clone();
        for segment in trimmed.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
                return Err(StoreError::InvalidPath(key.to_string()));
            }
            path.push(segment);
        }
        Ok(path)
    }

    fn io_err(key: &str, source: std::io::Error) -> StoreError {
        if source.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(key.to_string())
        } else {
            StoreError::Io {
                path: key.to_string(),
                source,
            }
        }
    }

    async fn ensure_parent(&self, key: &str, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_err(key, e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        self.ensure_parent(key, &path).await?;

        // Write next to the target and rename so readers never see a torn object
        let mut partial = path.clone().into_os_string();
        partial.push(PARTIAL_SUFFIX);
        let partial = PathBuf::from(partial);

        fs::write(&partial, &data)
            .await
            .map_err(|e| Self::io_err(key, e))?;
        fs::rename(&partial, &path)
            .await
            .map_err(|e| Self::io_err(key, e))?;

        debug!(key, bytes = data.len(), "stored object");
        Ok(())
    }

    async fn put_file(&self, key: &str, source: &Path) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        self.ensure_parent(key, &path).await?;

        let mut partial = path.clone().into_os_string();
        partial.push(PARTIAL_SUFFIX);
        let partial = PathBuf::from(partial);

        let bytes = fs::copy(source, &partial).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::LocalFile {
                    path: source.to_path_buf(),
                    source: e,
                }
            } else {
                Self::io_err(key, e)
            }
        })?;
        fs::rename(&partial, &path)
            .await
            .map_err(|e| Self::io_err(key, e))?;

        debug!(key, bytes, "stored file");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let path = self.resolve(key)?;
        let data = fs::read(&path).await.map_err(|e| Self::io_err(key, e))?;
        Ok(Bytes::from(data))
    }

    async fn get_stream(&self, key: &str) -> Result<ByteStream, StoreError> {
        let path = self.resolve(key)?;
        let file = fs::File::open(&path)
            .await
            .map_err(|e| Self::io_err(key, e))?;
        Ok(Box::pin(ReaderStream::new(file)))
    }

    async fn get_range(&self, key: &str, start: u64, len: u64) -> Result<ByteStream, StoreError> {
        let path = self.resolve(key)?;
        let mut file = fs::File::open(&path)
            .await
            .map_err(|e| Self::io_err(key, e))?;
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|e| Self::io_err(key, e))?;
        Ok(Box::pin(ReaderStream::new(file.take(len))))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.resolve(key)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| Self::io_err(key, e))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err(key, e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let base = self.resolve(prefix)?;
        if !fs::try_exists(&base)
            .await
            .map_err(|e| Self::io_err(prefix, e))?
        {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut pending = vec![(base, String::new())];

        while let Some((dir, relative)) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| Self::io_err(prefix, e))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Self::io_err(prefix, e))?
            {
                let name = entry.file_name().to_string_lossy().into_owned();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| Self::io_err(prefix, e))?;
                let joined = if relative.is_empty() {
                    name.clone()
                } else {
                    format!("{relative}/{name}")
                };

                if file_type.is_dir() {
                    pending.push((entry.path(), joined));
                } else if !name.ends_with(PARTIAL_SUFFIX) {
                    names.push(joined);
                }
            }
        }

        names.sort();
        Ok(names)
    }

    async fn size(&self, key: &str) -> Result<u64, StoreError> {
        let path = self.resolve(key)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| Self::io_err(key, e))?;
        Ok(metadata.len())
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError> {
        let from = self.resolve(src)?;
        let to = self.resolve(dst)?;
        self.ensure_parent(dst, &to).await?;
        fs::copy(&from, &to)
            .await
            .map_err(|e| Self::io_err(src, e))?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), StoreError> {
        let path = self.resolve(prefix)?;
        if path == self.root {
            return Err(StoreError::InvalidPath(prefix.to_string()));
        }
        match fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err(prefix, e)),
        }
    }
}
