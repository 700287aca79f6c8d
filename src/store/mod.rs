// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod local;
pub mod paths;

use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::StoreError;

pub use local::LocalStore;

/// A streaming object body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// A shared handle to an object store
pub type SharedStore = Arc<dyn ObjectStore>;

/// Blob storage abstraction
///
/// Paths are `/`-separated keys relative to the store root, e.g. `tech/audio/ep1.mp3`.
/// Implementations are not transactional; callers sequence operations themselves.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object, replacing any existing one
    async fn put(&self, path: &str, data: Bytes) -> Result<(), StoreError>;

    /// Read a whole object into memory
    async fn get(&self, path: &str) -> Result<Bytes, StoreError>;

    /// Stream an object
    async fn get_stream(&self, path: &str) -> Result<ByteStream, StoreError>;

    /// Stream `len` bytes of an object starting at `start`
    async fn get_range(&self, path: &str, start: u64, len: u64) -> Result<ByteStream, StoreError>;

    async fn exists(&self, path: &str) -> Result<bool, StoreError>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// List every object below `prefix`, recursively, as names relative to the prefix
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Size of an object in bytes
    async fn size(&self, path: &str) -> Result<u64, StoreError>;

    async fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError>;

    /// Delete every object below `prefix`
    async fn delete_prefix(&self, prefix: &str) -> Result<(), StoreError>;

    /// Upload a local file
    async fn put_file(&self, path: &str, source: &Path) -> Result<(), StoreError> {
        let data = tokio::fs::read(source)
            .await
            .map_err(|e| StoreError::LocalFile {
                path: source.to_path_buf(),
                source: e,
            })?;
        self.put(path, Bytes::from(data)).await
    }

    /// Stream an object into a local file, returning the number of bytes written
    async fn download_to(&self, path: &str, target: &Path) -> Result<u64, StoreError> {
        let mut stream = self.get_stream(path).await?;

        let local_err = |e: std::io::Error| StoreError::LocalFile {
            path: target.to_path_buf(),
            source: e,
        };

        let mut file = File::create(target).await.map_err(local_err)?;
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StoreError::Io {
                path: path.to_string(),
                source: e,
            })?;
            file.write_all(&chunk).await.map_err(local_err)?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(local_err)?;

        Ok(written)
    }
}
