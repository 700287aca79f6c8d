// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bytes::Bytes;
use chrono::Utc;
use tracing::{info, warn};

use super::Catalog;
use crate::error::CatalogError;
use crate::model::{Episode, Feed, sort_newest_first, validate_feed_id};
use crate::store::paths::{ICON_FILENAME, feed_prefix, icon_path};

impl Catalog {
    pub async fn list_feeds(&self) -> Vec<Feed> {
        self.state.lock().await.feeds.clone()
    }

    pub async fn get_feed(&self, id: &str) -> Option<Feed> {
        self.state.lock().await.feed(id).cloned()
    }

    /// Ids of every known feed, in persisted order
    pub async fn feed_ids(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.feeds.iter().map(|f| f.id.clone()).collect()
    }

    /// A feed and its episodes (newest first), read under one lock acquisition
    pub async fn feed_snapshot(&self, id: &str) -> Option<(Feed, Vec<Episode>)> {
        let state = self.state.lock().await;
        let feed = state.feed(id)?.clone();
        let mut episodes = state.episodes_of(id).to_vec();
        sort_newest_first(&mut episodes);
        Some((feed, episodes))
    }

    pub async fn create_feed(&self, feed: Feed) -> Result<Feed, CatalogError> {
        validate_feed_id(&feed.id)?;

        let mut state = self.state.lock().await;
        if state.feed(&feed.id).is_some() {
            return Err(CatalogError::FeedExists(feed.id));
        }

        let mut feeds = state.feeds.clone();
        feeds.push(feed.clone());
        self.repository.save_feeds(&feeds).await?;

        state.feeds = feeds;
        state.episodes.insert(feed.id.clone(), Vec::new());

        info!(feed = %feed.id, "Created feed '{}'", feed.title);
        Ok(feed)
    }

    /// Create `feed` unless a feed with its id already exists; returns the stored feed
    pub async fn ensure_feed(&self, feed: Feed) -> Result<Feed, CatalogError> {
        validate_feed_id(&feed.id)?;

        let mut state = self.state.lock().await;
        if let Some(existing) = state.feed(&feed.id) {
            return Ok(existing.clone());
        }

        let mut feeds = state.feeds.clone();
        feeds.push(feed.clone());
        self.repository.save_feeds(&feeds).await?;

        state.feeds = feeds;
        state.episodes.entry(feed.id.clone()).or_default();

        info!(feed = %feed.id, "Created feed '{}'", feed.title);
        Ok(feed)
    }

    /// Replace the configuration of feed `id`. The id itself cannot change here.
    pub async fn update_feed(&self, id: &str, feed: Feed) -> Result<Feed, CatalogError> {
        if feed.id != id {
            return Err(CatalogError::ImmutableFeedId {
                current: id.to_string(),
                requested: feed.id,
            });
        }

        let mut state = self.state.lock().await;
        state.require_feed(id)?;

        let feeds = state.feeds_replacing(id, &feed);
        self.repository.save_feeds(&feeds).await?;
        state.feeds = feeds;

        info!(feed = %id, "Updated feed");
        Ok(feed)
    }

    /// Move a feed and everything it owns to a new id
    ///
    /// Blobs are copied into the new namespace first, then the feed entry and the
    /// episodes' feed references are rewritten together and persisted, and finally the
    /// old namespace is removed. Episode ids are kept. Failing to remove the old
    /// namespace only logs a warning, since the rename is already stored.
    pub async fn rename_feed(&self, old_id: &str, new_id: &str) -> Result<Feed, CatalogError> {
        validate_feed_id(new_id)?;

        let mut state = self.state.lock().await;
        let feed = state.require_feed(old_id)?.clone();
        if state.feed(new_id).is_some() {
            return Err(CatalogError::FeedExists(new_id.to_string()));
        }

        let old_prefix = feed_prefix(old_id);
        let new_prefix = feed_prefix(new_id);
        let blobs = self.store.list(&old_prefix).await?;
        for name in &blobs {
            self.store
                .copy(&format!("{old_prefix}{name}"), &format!("{new_prefix}{name}"))
                .await?;
        }

        let renamed = feed.with_id(new_id);
        let feeds = state.feeds_replacing(old_id, &renamed);
        let episodes: Vec<Episode> = state
            .episodes_of(old_id)
            .iter()
            .map(|e| e.in_feed(new_id))
            .collect();

        self.repository.save_episodes(new_id, &episodes).await?;
        self.repository.save_feeds(&feeds).await?;

        state.feeds = feeds;
        state.episodes.remove(old_id);
        state.episodes.insert(new_id.to_string(), episodes);

        // The rename is committed once feeds.json names the new id
        if let Err(e) = self.store.delete_prefix(&old_prefix).await {
            warn!("Renamed feed '{old_id}' left blobs under {old_prefix}: {e}");
        }

        info!(
            "Renamed feed '{old_id}' to '{new_id}' ({} blobs relocated)",
            blobs.len()
        );
        Ok(renamed)
    }

    /// Delete a feed with all its episodes and blobs. Returns false if it did not exist.
    pub async fn delete_feed(&self, id: &str) -> Result<bool, CatalogError> {
        let mut state = self.state.lock().await;
        if state.feed(id).is_none() {
            return Ok(false);
        }

        self.store.delete_prefix(&feed_prefix(id)).await?;

        let feeds: Vec<Feed> = state.feeds.iter().filter(|f| f.id != id).cloned().collect();
        self.repository.save_feeds(&feeds).await?;

        state.feeds = feeds;
        state.episodes.remove(id);

        info!(feed = %id, "Deleted feed");
        Ok(true)
    }

    /// Store a new cover image for a feed and bump its version token
    pub async fn set_feed_image(&self, id: &str, image: Bytes) -> Result<Feed, CatalogError> {
        let mut state = self.state.lock().await;
        let feed = state.require_feed(id)?.clone();

        self.store.put(&icon_path(id), image).await?;

        let version = Utc::now().timestamp_millis().to_string();
        let updated = feed.with_image(ICON_FILENAME, version);
        let feeds = state.feeds_replacing(id, &updated);
        self.repository.save_feeds(&feeds).await?;
        state.feeds = feeds;

        info!(feed = %id, "Updated cover image");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::catalog::NewEpisode;
    use crate::catalog::testing::{FaultyStore, Fixture, catalog_over};
    use crate::error::CatalogError;
    use crate::model::Feed;
    use crate::store::{LocalStore, ObjectStore};
    use bytes::Bytes;

    fn upload(fixture: &Fixture, name: &str, size: usize) -> NewEpisode {
        NewEpisode::from_file(fixture.source_file(name, size), name)
    }

    #[tokio::test]
    async fn create_and_get_feed() {
        let fixture = Fixture::new().await;
        fixture
            .catalog
            .create_feed(Feed::new("tech", "Tech Talk"))
            .await
            .unwrap();

        let feed = fixture.catalog.get_feed("tech").await.unwrap();
        assert_eq!(feed.title, "Tech Talk");
        assert_eq!(fixture.catalog.list_feeds().await.len(), 1);
        assert!(fixture.catalog.list_episodes("tech").await.is_empty());
    }

    #[tokio::test]
    async fn create_rejects_duplicates_and_bad_ids() {
        let fixture = Fixture::new().await;
        let catalog = &fixture.catalog;
        catalog.create_feed(Feed::new("tech", "A")).await.unwrap();

        assert!(matches!(
            catalog.create_feed(Feed::new("tech", "B")).await,
            Err(CatalogError::FeedExists(_))
        ));
        assert!(matches!(
            catalog.create_feed(Feed::new("../etc", "C")).await,
            Err(CatalogError::InvalidFeedId(_))
        ));
        assert_eq!(catalog.get_feed("tech").await.unwrap().title, "A");
    }

    #[tokio::test]
    async fn ensure_feed_keeps_existing_configuration() {
        let fixture = Fixture::new().await;
        let catalog = &fixture.catalog;
        catalog.create_feed(Feed::new("default", "Mine")).await.unwrap();

        let feed = catalog
            .ensure_feed(Feed::new("default", "From config"))
            .await
            .unwrap();
        assert_eq!(feed.title, "Mine");

        let created = catalog.ensure_feed(Feed::new("other", "New")).await.unwrap();
        assert_eq!(created.title, "New");
        assert_eq!(catalog.list_feeds().await.len(), 2);
    }

    #[tokio::test]
    async fn update_requires_existing_feed_and_same_id() {
        let fixture = Fixture::new().await;
        let catalog = &fixture.catalog;
        catalog.create_feed(Feed::new("tech", "Tech")).await.unwrap();

        let mut changed = Feed::new("tech", "Tech Talk");
        changed.category = Some("Technology".to_string());
        catalog.update_feed("tech", changed.clone()).await.unwrap();
        assert_eq!(catalog.get_feed("tech").await.unwrap(), changed);

        assert!(matches!(
            catalog.update_feed("tech", Feed::new("other", "X")).await,
            Err(CatalogError::ImmutableFeedId { .. })
        ));
        assert!(matches!(
            catalog.update_feed("nope", Feed::new("nope", "X")).await,
            Err(CatalogError::FeedNotFound(_))
        ));
    }

    #[tokio::test]
    async fn rename_relocates_blobs_and_episodes() {
        let fixture = Fixture::new().await;
        let catalog = &fixture.catalog;
        catalog.create_feed(Feed::new("old", "Show")).await.unwrap();
        let ep1 = catalog
            .add_episode("old", upload(&fixture, "ep1.mp3", 100))
            .await
            .unwrap();
        catalog
            .add_episode("old", upload(&fixture, "ep2.mp3", 200))
            .await
            .unwrap();
        let audio_before = fixture.store.list("old/audio/").await.unwrap();

        let renamed = catalog.rename_feed("old", "new").await.unwrap();

        assert_eq!(renamed.id, "new");
        assert_eq!(renamed.title, "Show");
        assert!(catalog.get_feed("old").await.is_none());

        let episodes = catalog.list_episodes("new").await;
        assert_eq!(episodes.len(), 2);
        assert!(episodes.iter().all(|e| e.feed_id == "new"));
        assert!(episodes.iter().any(|e| e.id == ep1.id));
        assert!(catalog.list_episodes("old").await.is_empty());

        assert_eq!(fixture.store.list("new/audio/").await.unwrap(), audio_before);
        assert!(fixture.store.list("old/").await.unwrap().is_empty());

        // Survives a restart
        let reopened = fixture.reopen().await;
        assert_eq!(reopened.list_episodes("new").await.len(), 2);
        assert!(reopened.get_feed("old").await.is_none());
    }

    #[tokio::test]
    async fn rename_conflicts() {
        let fixture = Fixture::new().await;
        let catalog = &fixture.catalog;
        catalog.create_feed(Feed::new("a", "A")).await.unwrap();
        catalog.create_feed(Feed::new("b", "B")).await.unwrap();

        assert!(matches!(
            catalog.rename_feed("missing", "c").await,
            Err(CatalogError::FeedNotFound(_))
        ));
        assert!(matches!(
            catalog.rename_feed("a", "b").await,
            Err(CatalogError::FeedExists(_))
        ));
        assert_eq!(catalog.feed_ids().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn delete_removes_everything() {
        let fixture = Fixture::new().await;
        let catalog = &fixture.catalog;
        catalog.create_feed(Feed::new("tech", "Tech")).await.unwrap();
        catalog.create_feed(Feed::new("keep", "Keep")).await.unwrap();
        catalog
            .add_episode("tech", upload(&fixture, "ep1.mp3", 10))
            .await
            .unwrap();

        assert!(catalog.delete_feed("tech").await.unwrap());
        assert!(!catalog.delete_feed("tech").await.unwrap());

        assert!(catalog.get_feed("tech").await.is_none());
        assert!(catalog.list_episodes("tech").await.is_empty());
        assert!(fixture.store.list("tech/").await.unwrap().is_empty());

        let reopened = fixture.reopen().await;
        assert_eq!(reopened.feed_ids().await, vec!["keep"]);
    }

    #[tokio::test]
    async fn set_image_stores_icon_and_versions_it() {
        let fixture = Fixture::new().await;
        let catalog = &fixture.catalog;
        catalog.create_feed(Feed::new("tech", "Tech")).await.unwrap();

        let feed = catalog
            .set_feed_image("tech", Bytes::from_static(b"\x89PNG"))
            .await
            .unwrap();

        assert_eq!(feed.image_url.as_deref(), Some("icon.png"));
        assert!(feed.image_version.is_some());
        assert_eq!(fixture.store.get("tech/icon.png").await.unwrap(), &b"\x89PNG"[..]);
        assert!(matches!(
            catalog.set_feed_image("nope", Bytes::new()).await,
            Err(CatalogError::FeedNotFound(_))
        ));
    }

    #[tokio::test]
    async fn feed_list_roundtrips_through_store() {
        let fixture = Fixture::new().await;
        let mut feed = Feed::new("tech", "Tech Talk");
        feed.description = Some("All about tech".to_string());
        feed.email = Some("host@example.com".to_string());
        feed.use_metadata_for_published_date = true;
        fixture.catalog.create_feed(feed.clone()).await.unwrap();
        fixture.catalog.create_feed(Feed::new("news", "News")).await.unwrap();

        let reopened = fixture.reopen().await;
        assert_eq!(reopened.list_feeds().await, fixture.catalog.list_feeds().await);
        assert_eq!(reopened.get_feed("tech").await.unwrap(), feed);
    }

    #[tokio::test]
    async fn rename_commits_even_if_old_blobs_cannot_be_removed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        let store = Arc::new(FaultyStore::new(&root).failing_delete_prefix());
        let scratch = dir.path().join("scratch");
        let catalog = catalog_over(store.clone(), &scratch).await;

        catalog.create_feed(Feed::new("old", "Show")).await.unwrap();
        let source = dir.path().join("ep1.mp3");
        std::fs::write(&source, vec![0u8; 100]).unwrap();
        catalog
            .add_episode("old", NewEpisode::from_file(&source, "ep1.mp3"))
            .await
            .unwrap();

        let renamed = catalog.rename_feed("old", "new").await.unwrap();
        assert_eq!(renamed.id, "new");
        assert_eq!(catalog.feed_ids().await, vec!["new"]);
        assert!(store.exists("old/audio/ep1.mp3").await.unwrap());

        let reopened = catalog_over(Arc::new(LocalStore::new(&root)), &scratch).await;
        assert_eq!(reopened.feed_ids().await, vec!["new"]);
        assert_eq!(
            reopened.list_episodes("new").await,
            catalog.list_episodes("new").await
        );
    }
}
