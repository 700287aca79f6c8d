// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Blob layout shared by the catalog, the sync engine and the web layer.

/// Top-level document listing every feed
pub const FEEDS_DOCUMENT: &str = "feeds.json";

/// Cover image name inside a feed namespace
pub const ICON_FILENAME: &str = "icon.png";

const EPISODES_FILENAME: &str = "episodes.json";

/// `{feed}/`
pub fn feed_prefix(feed_id: &str) -> String {
    format!("{feed_id}/")
}

/// `{feed}/audio/`
pub fn audio_prefix(feed_id: &str) -> String {
    format!("{feed_id}/audio/")
}

/// `{feed}/audio/{file}`
pub fn audio_path(feed_id: &str, file_name: &str) -> String {
    format!("{feed_id}/audio/{file_name}")
}

/// `{feed}/icon.png`
pub fn icon_path(feed_id: &str) -> String {
    format!("{feed_id}/{ICON_FILENAME}")
}

/// `{feed}/episodes.json`
pub fn episodes_path(feed_id: &str) -> String {
    format!("{feed_id}/{EPISODES_FILENAME}")
}
