// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

const MAX_FEED_ID_LENGTH: usize = 64;

fn default_language() -> String {
    "en".to_string()
}

/// Configuration of a single podcast feed
///
/// Feeds are values: every update builds a new `Feed` and replaces the catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    /// Unique key, also the blob namespace of the feed
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Absolute URL, or a file name inside the feed namespace (e.g. `icon.png`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Cache-busting token appended to the image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_version: Option<String>,
    /// Prefer dates embedded in uploaded files over the upload time
    #[serde(default)]
    pub use_metadata_for_published_date: bool,
}

impl Feed {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            author: String::new(),
            email: None,
            language: default_language(),
            category: None,
            image_url: None,
            image_version: None,
            use_metadata_for_published_date: false,
        }
    }

    /// Copy of this feed under another id
    pub fn with_id(&self, id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..self.clone()
        }
    }

    /// Copy of this feed pointing at a new cover image
    pub fn with_image(&self, image_url: &str, version: String) -> Self {
        Self {
            image_url: Some(image_url.to_string()),
            image_version: Some(version),
            ..self.clone()
        }
    }
}

/// Check that a feed id can be used as a single blob path segment
pub fn validate_feed_id(id: &str) -> Result<(), CatalogError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_FEED_ID_LENGTH
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));

    if valid {
        Ok(())
    } else {
        Err(CatalogError::InvalidFeedId(id.to_string()))
    }
}
