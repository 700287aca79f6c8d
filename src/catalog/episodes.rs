// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{Catalog, title_from_file_name};
use crate::error::CatalogError;
use crate::identity::derive_episode_id;
use crate::media::DateSource;
use crate::model::{Episode, sort_newest_first};
use crate::store::paths::audio_path;

/// A local file about to become an episode
#[derive(Debug, Clone, Default)]
pub struct NewEpisode {
    /// Where the bytes are read from
    pub source: PathBuf,
    /// Name the file is stored under; sanitized before use
    pub file_name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    /// Read the publication date from the file for this upload only
    pub use_metadata: Option<bool>,
}

impl NewEpisode {
    pub fn from_file(source: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            file_name: file_name.into(),
            ..Default::default()
        }
    }
}

/// Editable episode fields; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct EpisodeUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
}

impl EpisodeUpdate {
    fn apply(self, episode: &Episode) -> Episode {
        let mut updated = episode.clone();
        if let Some(title) = self.title {
            updated.title = title;
        }
        if let Some(description) = self.description {
            updated.description = Some(description);
        }
        if let Some(date) = self.published_date {
            updated.published_date = date;
        }
        updated
    }
}

/// Reduce a client supplied name to a single safe path segment
fn sanitize_file_name(raw: &str) -> Result<String, CatalogError> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let sanitized = sanitize_filename::sanitize(last.trim());
    if sanitized.is_empty() {
        return Err(CatalogError::InvalidFileName(raw.to_string()));
    }
    Ok(sanitized)
}

impl Catalog {
    /// Episodes of a feed, newest first; empty for unknown feeds
    pub async fn list_episodes(&self, feed_id: &str) -> Vec<Episode> {
        let state = self.state.lock().await;
        let mut episodes = state.episodes_of(feed_id).to_vec();
        sort_newest_first(&mut episodes);
        episodes
    }

    pub async fn get_episode(&self, feed_id: &str, episode_id: &str) -> Option<Episode> {
        self.state.lock().await.episode(feed_id, episode_id).cloned()
    }

    /// Store a local file as an episode of `feed_id`
    ///
    /// Uploading the same file (same name and size) twice is a no-op that returns the
    /// existing episode, even if the feed was renamed in between. A record with the same file name but another size is replaced,
    /// since its blob is overwritten.
    pub async fn add_episode(
        &self,
        feed_id: &str,
        upload: NewEpisode,
    ) -> Result<Episode, CatalogError> {
        let file_name = sanitize_file_name(&upload.file_name)?;

        let metadata = match tokio::fs::metadata(&upload.source).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(CatalogError::MissingSourceFile(upload.source)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CatalogError::MissingSourceFile(upload.source));
            }
            Err(e) => {
                return Err(CatalogError::SourceFile {
                    path: upload.source,
                    source: e,
                });
            }
        };
        let file_size = metadata.len();

        let mut state = self.state.lock().await;
        let feed = state.require_feed(feed_id)?.clone();

        // Ids survive feed renames, so match on the file as well as the id
        let id = derive_episode_id(feed_id, &file_name, file_size);
        if let Some(existing) = state
            .episodes_of(feed_id)
            .iter()
            .find(|e| e.id == id || (e.file_name == file_name && e.file_size == file_size))
        {
            info!(feed = %feed_id, episode = %existing.id, "{file_name} is already published");
            return Ok(existing.clone());
        }

        let media = self
            .resolver
            .inspect(
                &upload.source,
                DateSource {
                    explicit: upload.published_date,
                    use_metadata: upload.use_metadata,
                    feed_prefers_metadata: feed.use_metadata_for_published_date,
                },
            )
            .await;

        self.store
            .put_file(&audio_path(feed_id, &file_name), &upload.source)
            .await?;

        let episode = Episode {
            id,
            feed_id: feed_id.to_string(),
            title: upload
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| title_from_file_name(&file_name)),
            description: upload.description.filter(|d| !d.trim().is_empty()),
            file_name,
            file_size,
            duration_seconds: media.duration.as_secs(),
            published_date: media.published_date,
            url: None,
        };

        let mut episodes: Vec<Episode> = state
            .episodes_of(feed_id)
            .iter()
            .filter(|e| e.file_name != episode.file_name)
            .cloned()
            .collect();
        episodes.push(episode.clone());
        self.repository.save_episodes(feed_id, &episodes).await?;
        state.episodes.insert(feed_id.to_string(), episodes);

        info!(
            feed = %feed_id,
            episode = %episode.id,
            "Published '{}' ({} bytes)",
            episode.title,
            episode.file_size
        );
        Ok(episode)
    }

    pub async fn update_episode(
        &self,
        feed_id: &str,
        episode_id: &str,
        update: EpisodeUpdate,
    ) -> Result<Option<Episode>, CatalogError> {
        let mut state = self.state.lock().await;
        let Some(current) = state.episode(feed_id, episode_id) else {
            return Ok(None);
        };
        let updated = update.apply(current);

        let episodes: Vec<Episode> = state
            .episodes_of(feed_id)
            .iter()
            .map(|e| {
                if e.id == episode_id {
                    updated.clone()
                } else {
                    e.clone()
                }
            })
            .collect();
        self.repository.save_episodes(feed_id, &episodes).await?;
        state.episodes.insert(feed_id.to_string(), episodes);

        Ok(Some(updated))
    }

    /// Remove an episode and its blob. Returns false if there was no such episode.
    pub async fn delete_episode(
        &self,
        feed_id: &str,
        episode_id: &str,
    ) -> Result<bool, CatalogError> {
        let mut state = self.state.lock().await;
        let Some(episode) = state.episode(feed_id, episode_id).cloned() else {
            return Ok(false);
        };

        self.store
            .delete(&audio_path(feed_id, &episode.file_name))
            .await?;

        let episodes = without(state.episodes_of(feed_id), episode_id);
        self.repository.save_episodes(feed_id, &episodes).await?;
        state.episodes.insert(feed_id.to_string(), episodes);

        info!(feed = %feed_id, episode = %episode_id, "Deleted '{}'", episode.title);
        Ok(true)
    }

    /// Move an episode to another feed. The episode gets the id it would have had if it
    /// was uploaded to the target feed.
    pub async fn move_episode(
        &self,
        source_feed: &str,
        episode_id: &str,
        target_feed: &str,
    ) -> Result<Option<Episode>, CatalogError> {
        let mut state = self.state.lock().await;
        state.require_feed(source_feed)?;
        state.require_feed(target_feed)?;
        let Some(episode) = state.episode(source_feed, episode_id).cloned() else {
            return Ok(None);
        };
        if source_feed == target_feed {
            return Ok(Some(episode));
        }

        let moved = episode.transferred_to(target_feed);
        let source_blob = audio_path(source_feed, &episode.file_name);
        self.store
            .copy(&source_blob, &audio_path(target_feed, &moved.file_name))
            .await?;

        let source_episodes = without(state.episodes_of(source_feed), episode_id);
        let target_episodes = with_replaced(state.episodes_of(target_feed), &moved);
        // Memory follows each save, so a failed source save leaves the episode in
        // both feeds, as stored
        self.repository
            .save_episodes(target_feed, &target_episodes)
            .await?;
        state
            .episodes
            .insert(target_feed.to_string(), target_episodes);
        self.repository
            .save_episodes(source_feed, &source_episodes)
            .await?;
        state
            .episodes
            .insert(source_feed.to_string(), source_episodes);

        if let Err(e) = self.store.delete(&source_blob).await {
            warn!("Moved episode left {source_blob} behind: {e}");
        }

        info!(
            "Moved '{}' from '{source_feed}' to '{target_feed}' as {}",
            moved.title, moved.id
        );
        Ok(Some(moved))
    }

    /// Duplicate an episode into another feed, leaving the source untouched
    pub async fn copy_episode(
        &self,
        source_feed: &str,
        episode_id: &str,
        target_feed: &str,
    ) -> Result<Option<Episode>, CatalogError> {
        let mut state = self.state.lock().await;
        state.require_feed(source_feed)?;
        state.require_feed(target_feed)?;
        let Some(episode) = state.episode(source_feed, episode_id).cloned() else {
            return Ok(None);
        };
        if source_feed == target_feed {
            return Ok(Some(episode));
        }

        let copied = episode.transferred_to(target_feed);
        self.store
            .copy(
                &audio_path(source_feed, &episode.file_name),
                &audio_path(target_feed, &copied.file_name),
            )
            .await?;

        let target_episodes = with_replaced(state.episodes_of(target_feed), &copied);
        self.repository
            .save_episodes(target_feed, &target_episodes)
            .await?;
        state
            .episodes
            .insert(target_feed.to_string(), target_episodes);

        info!(
            "Copied '{}' from '{source_feed}' to '{target_feed}' as {}",
            copied.title, copied.id
        );
        Ok(Some(copied))
    }
}

fn without(episodes: &[Episode], episode_id: &str) -> Vec<Episode> {
    episodes
        .iter()
        .filter(|e| e.id != episode_id)
        .cloned()
        .collect()
}

/// `episodes` plus `episode`, dropping any record sharing its id or its blob
fn with_replaced(episodes: &[Episode], episode: &Episode) -> Vec<Episode> {
    let mut result: Vec<Episode> = episodes
        .iter()
        .filter(|e| e.id != episode.id && e.file_name != episode.file_name)
        .cloned()
        .collect();
    result.push(episode.clone());
    result
}
