// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{CatalogError, StoreError};
use crate::model::{Episode, Feed};
use crate::store::SharedStore;
use crate::store::paths::{FEEDS_DOCUMENT, episodes_path};

/// Load-all/save-all persistence of the catalog as JSON documents in the object store
///
/// `feeds.json` holds every feed; `{feed}/episodes.json` holds one feed's episodes.
/// Documents are always rewritten whole.
#[derive(Clone)]
pub struct CatalogRepository {
    store: SharedStore,
}

impl CatalogRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Load the feed list; a missing document is an empty list
    pub async fn load_feeds(&self) -> Result<Vec<Feed>, CatalogError> {
        Ok(self.load_document(FEEDS_DOCUMENT).await?.unwrap_or_default())
    }

    pub async fn save_feeds(&self, feeds: &[Feed]) -> Result<(), CatalogError> {
        self.save_document(FEEDS_DOCUMENT, &feeds).await
    }

    /// Load one feed's episodes; a missing document is an empty list
    pub async fn load_episodes(&self, feed_id: &str) -> Result<Vec<Episode>, CatalogError> {
        Ok(self
            .load_document(&episodes_path(feed_id))
            .await?
            .unwrap_or_default())
    }

    pub async fn save_episodes(
        &self,
        feed_id: &str,
        episodes: &[Episode],
    ) -> Result<(), CatalogError> {
        self.save_document(&episodes_path(feed_id), &episodes).await
    }

    async fn load_document<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, CatalogError> {
        let bytes = match self.store.get(path).await {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CatalogError::JsonParseFailed {
                path: path.to_string(),
                source: e,
            })
    }

    async fn save_document<T: Serialize + ?Sized>(
        &self,
        path: &str,
        value: &T,
    ) -> Result<(), CatalogError> {
        let json =
            serde_json::to_vec_pretty(value).map_err(|e| CatalogError::JsonSerializeFailed {
                path: path.to_string(),
                source: e,
            })?;
        self.store.put(path, Bytes::from(json)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::derive_episode_id;
    use crate::store::{LocalStore, ObjectStore};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn make_episode(feed_id: &str, name: &str) -> Episode {
        Episode {
            id: derive_episode_id(feed_id, name, 10),
            feed_id: feed_id.to_string(),
            title: name.to_string(),
            description: Some("desc".to_string()),
            file_name: name.to_string(),
            file_size: 10,
            duration_seconds: 90,
            published_date: Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
            url: None,
        }
    }

    #[tokio::test]
    async fn missing_documents_load_as_empty() {
        let dir = tempdir().unwrap();
        let repo = CatalogRepository::new(Arc::new(LocalStore::new(dir.path())));

        assert!(repo.load_feeds().await.unwrap().is_empty());
        assert!(repo.load_episodes("tech").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn feeds_roundtrip() {
        let dir = tempdir().unwrap();
        let repo = CatalogRepository::new(Arc::new(LocalStore::new(dir.path())));

        let mut feed = Feed::new("tech", "Tech Talk");
        feed.email = Some("host@example.com".to_string());
        feed.category = Some("Technology".to_string());
        feed.use_metadata_for_published_date = true;
        let feeds = vec![feed, Feed::new("news", "News")];

        repo.save_feeds(&feeds).await.unwrap();
        assert_eq!(repo.load_feeds().await.unwrap(), feeds);
    }

    #[tokio::test]
    async fn episodes_roundtrip_under_feed_namespace() {
        let dir = tempdir().unwrap();
        let store = Arc::new(LocalStore::new(dir.path()));
        let repo = CatalogRepository::new(store.clone());

        let episodes = vec![make_episode("tech", "a.mp3"), make_episode("tech", "b.mp3")];
        repo.save_episodes("tech", &episodes).await.unwrap();

        assert!(store.exists("tech/episodes.json").await.unwrap());
        assert_eq!(repo.load_episodes("tech").await.unwrap(), episodes);
    }

    #[tokio::test]
    async fn corrupt_document_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let store = Arc::new(LocalStore::new(dir.path()));
        store
            .put("feeds.json", Bytes::from_static(b"{not json"))
            .await
            .unwrap();

        let repo = CatalogRepository::new(store);
        assert!(matches!(
            repo.load_feeds().await,
            Err(CatalogError::JsonParseFailed { .. })
        ));
    }
}
