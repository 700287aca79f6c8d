// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by an object store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object path '{0}'")]
    InvalidPath(String),

    #[error("I/O error on object {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to access local file {path}: {source}")]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur when operating on the feed/episode catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Feed '{0}' already exists")]
    FeedExists(String),

    #[error("Feed '{0}' does not exist")]
    FeedNotFound(String),

    #[error("Feed id '{current}' cannot be changed to '{requested}'; use rename instead")]
    ImmutableFeedId { current: String, requested: String },

    #[error("Invalid feed id '{0}': use 1-64 ASCII letters, digits, '-' or '_'")]
    InvalidFeedId(String),

    #[error("Invalid file name '{0}'")]
    InvalidFileName(String),

    #[error("Source file {0} does not exist")]
    MissingSourceFile(PathBuf),

    #[error("Failed to read source file {path}: {source}")]
    SourceFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create scratch file: {0}")]
    ScratchFile(#[source] std::io::Error),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to parse {path}: {source}")]
    JsonParseFailed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize {path}: {source}")]
    JsonSerializeFailed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CatalogError {
    /// Whether the error was caused by the caller's input rather than a failed side effect
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::FeedExists(_)
                | Self::FeedNotFound(_)
                | Self::ImmutableFeedId { .. }
                | Self::InvalidFeedId(_)
                | Self::InvalidFileName(_)
                | Self::MissingSourceFile(_)
        )
    }
}

/// Errors that can occur when rendering a feed document
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Failed to write RSS document: {0}")]
    WriteFailed(#[from] rss::Error),

    #[error("RSS document is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}
