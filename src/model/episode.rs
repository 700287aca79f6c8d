// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::derive_episode_id;

/// A single audio item belonging to exactly one feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    /// Derived from (feed id, file name, file size); never user supplied
    pub id: String,
    pub feed_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub file_name: String,
    pub file_size: u64,
    /// Whole seconds, zero when unknown
    #[serde(default)]
    pub duration_seconds: u64,
    pub published_date: DateTime<Utc>,
    /// Direct enclosure URL overriding the hosted one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Episode {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_seconds)
    }

    /// Copy of this episode re-homed under another feed id, keeping its id
    pub fn in_feed(&self, feed_id: &str) -> Self {
        Self {
            feed_id: feed_id.to_string(),
            ..self.clone()
        }
    }

    /// Copy of this episode as it would exist in another feed, with a re-derived id
    pub fn transferred_to(&self, feed_id: &str) -> Self {
        Self {
            id: derive_episode_id(feed_id, &self.file_name, self.file_size),
            feed_id: feed_id.to_string(),
            ..self.clone()
        }
    }
}

/// Sort newest first. The sort is stable, so equal timestamps keep their stored order.
pub fn sort_newest_first(episodes: &mut [Episode]) {
    episodes.sort_by(|a, b| b.published_date.cmp(&a.published_date));
}
