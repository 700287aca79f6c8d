// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The in-memory feed/episode index and its persistence.
//!
//! Every public operation of [`Catalog`] runs as one critical section over a single
//! async mutex covering the feed list and every episode list. Operations compute the
//! new state, persist it, and only then commit it to memory, so a failed write leaves
//! the in-memory view matching what is stored. Operations never call each other while
//! holding the lock; shared logic lives on [`CatalogState`].

mod episodes;
mod feeds;
mod repository;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::info;

use crate::error::CatalogError;
use crate::media::PublishDateResolver;
use crate::model::{Episode, Feed};
use crate::progress::SharedSyncReporter;
use crate::store::SharedStore;

pub use episodes::{EpisodeUpdate, NewEpisode};
pub use repository::CatalogRepository;

/// State guarded by the catalog lock
#[derive(Debug, Default)]
pub(crate) struct CatalogState {
    /// Feeds in persisted order
    pub(crate) feeds: Vec<Feed>,
    /// Episodes per feed id, in stored (not presentation) order
    pub(crate) episodes: HashMap<String, Vec<Episode>>,
}

impl CatalogState {
    pub(crate) fn feed(&self, id: &str) -> Option<&Feed> {
        self.feeds.iter().find(|f| f.id == id)
    }

    pub(crate) fn episodes_of(&self, feed_id: &str) -> &[Episode] {
        self.episodes.get(feed_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn episode(&self, feed_id: &str, episode_id: &str) -> Option<&Episode> {
        self.episodes_of(feed_id).iter().find(|e| e.id == episode_id)
    }

    pub(crate) fn require_feed(&self, id: &str) -> Result<&Feed, CatalogError> {
        self.feed(id)
            .ok_or_else(|| CatalogError::FeedNotFound(id.to_string()))
    }

    /// The feed list with `id` replaced by `replacement`
    pub(crate) fn feeds_replacing(&self, id: &str, replacement: &Feed) -> Vec<Feed> {
        self.feeds
            .iter()
            .map(|f| {
                if f.id == id {
                    replacement.clone()
                } else {
                    f.clone()
                }
            })
            .collect()
    }
}

/// The process-wide feed and episode index
pub struct Catalog {
    pub(crate) state: Mutex<CatalogState>,
    pub(crate) store: SharedStore,
    pub(crate) repository: CatalogRepository,
    pub(crate) resolver: PublishDateResolver,
    pub(crate) reporter: SharedSyncReporter,
    pub(crate) scratch_dir: Option<PathBuf>,
}

impl Catalog {
    /// Hydrate the catalog from the store: the feed list first, then each feed's episodes
    pub async fn open(
        store: SharedStore,
        resolver: PublishDateResolver,
        reporter: SharedSyncReporter,
    ) -> Result<Self, CatalogError> {
        let repository = CatalogRepository::new(store.clone());

        let feeds = repository.load_feeds().await?;
        let mut episodes = HashMap::with_capacity(feeds.len());
        for feed in &feeds {
            episodes.insert(feed.id.clone(), repository.load_episodes(&feed.id).await?);
        }

        info!(
            "Loaded {} feeds with {} episodes",
            feeds.len(),
            episodes.values().map(Vec::len).sum::<usize>()
        );

        Ok(Self {
            state: Mutex::new(CatalogState { feeds, episodes }),
            store,
            repository,
            resolver,
            reporter,
            scratch_dir: None,
        })
    }

    /// Download imported files into `dir` instead of the system temp directory
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Create a scratch file that keeps the extension of `file_name` and is removed on drop
    pub(crate) fn scratch_file(
        &self,
        file_name: &str,
    ) -> Result<tempfile::NamedTempFile, CatalogError> {
        let suffix = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();

        let mut builder = tempfile::Builder::new();
        builder.prefix("podhost-").suffix(&suffix);

        let file = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        file.map_err(CatalogError::ScratchFile)
    }
}

/// Episode title used when none is given: the file name without its extension
pub(crate) fn title_from_file_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or(file_name)
        .to_string()
}
