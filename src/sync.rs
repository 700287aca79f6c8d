// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciliation of the catalog against what is actually in storage.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::catalog::{Catalog, title_from_file_name};
use crate::error::CatalogError;
use crate::identity::derive_episode_id;
use crate::media::DateSource;
use crate::media::mime::is_audio_file;
use crate::model::{Episode, Feed};
use crate::progress::SyncEvent;
use crate::store::paths::{audio_path, audio_prefix};

/// Result of synchronizing one or more feeds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Episodes dropped because their file is gone
    pub pruned: usize,
    /// Stored files that became episodes
    pub imported: usize,
    /// Stored files that could not be imported
    pub failed: usize,
    /// Details of failed files (file name, error message)
    pub failed_files: Vec<(String, String)>,
}

impl SyncReport {
    pub fn is_unchanged(&self) -> bool {
        self.pruned == 0 && self.imported == 0
    }

    fn absorb(&mut self, other: SyncReport) {
        self.pruned += other.pruned;
        self.imported += other.imported;
        self.failed += other.failed;
        self.failed_files.extend(other.failed_files);
    }
}

enum ImportOutcome {
    Imported(Episode),
    Duplicate(String),
}

impl Catalog {
    /// Reconcile one feed's episode list with the files under `{feed}/audio/`
    ///
    /// Episodes whose file is gone are pruned; audio files without an episode are
    /// imported with the feed's own date preference. Files that fail to import are
    /// reported and skipped. The episode list is persisted once, and only if it changed.
    pub async fn synchronize_feed(&self, feed_id: &str) -> Result<SyncReport, CatalogError> {
        let mut state = self.state.lock().await;
        let feed = state.require_feed(feed_id)?.clone();

        let stored: HashSet<String> = self
            .store
            .list(&audio_prefix(feed_id))
            .await?
            .into_iter()
            .collect();

        let mut report = SyncReport::default();
        let mut episodes = Vec::with_capacity(stored.len());

        for episode in state.episodes_of(feed_id) {
            if stored.contains(&episode.file_name) {
                episodes.push(episode.clone());
            } else {
                report.pruned += 1;
                self.reporter.report(SyncEvent::EpisodePruned {
                    feed_id: feed_id.to_string(),
                    episode_id: episode.id.clone(),
                    file_name: episode.file_name.clone(),
                });
            }
        }

        let mut untracked: Vec<String> = {
            let tracked: HashSet<&str> = episodes.iter().map(|e| e.file_name.as_str()).collect();
            stored
                .iter()
                .filter(|name| !name.contains('/') && is_audio_file(name))
                .filter(|name| !tracked.contains(name.as_str()))
                .cloned()
                .collect()
        };
        untracked.sort();

        for file_name in untracked {
            match self.import_file(&feed, &file_name, &episodes).await {
                Ok(ImportOutcome::Imported(episode)) => {
                    report.imported += 1;
                    self.reporter.report(SyncEvent::EpisodeImported {
                        feed_id: feed_id.to_string(),
                        episode_id: episode.id.clone(),
                        file_name,
                    });
                    episodes.push(episode);
                }
                Ok(ImportOutcome::Duplicate(episode_id)) => {
                    self.reporter.report(SyncEvent::DuplicateSkipped {
                        feed_id: feed_id.to_string(),
                        episode_id,
                        file_name,
                    });
                }
                Err(e) => {
                    report.failed += 1;
                    self.reporter.report(SyncEvent::ImportFailed {
                        feed_id: feed_id.to_string(),
                        file_name: file_name.clone(),
                        error: e.to_string(),
                    });
                    report.failed_files.push((file_name, e.to_string()));
                }
            }
        }

        if !report.is_unchanged() {
            self.repository.save_episodes(feed_id, &episodes).await?;
            state.episodes.insert(feed_id.to_string(), episodes);
        }

        self.reporter.report(SyncEvent::FeedSynced {
            feed_id: feed_id.to_string(),
            pruned_count: report.pruned,
            imported_count: report.imported,
            failed_count: report.failed,
        });

        Ok(report)
    }

    /// Synchronize every feed in turn, taking the catalog lock once per feed
    pub async fn synchronize_all(&self) -> SyncReport {
        self.synchronize_until(&CancellationToken::new()).await
    }

    /// Like [`Catalog::synchronize_all`], but stops between feeds once `cancel` fires.
    /// A feed that fails to synchronize is logged and skipped.
    pub async fn synchronize_until(&self, cancel: &CancellationToken) -> SyncReport {
        let mut total = SyncReport::default();

        for feed_id in self.feed_ids().await {
            if cancel.is_cancelled() {
                debug!("Sync interrupted before feed '{feed_id}'");
                break;
            }

            match self.synchronize_feed(&feed_id).await {
                Ok(report) => total.absorb(report),
                Err(CatalogError::FeedNotFound(_)) => {
                    debug!("Feed '{feed_id}' disappeared before it was synchronized");
                }
                Err(e) => error!(feed = %feed_id, "Sync failed: {e}"),
            }
        }

        total
    }

    /// Turn one untracked stored file into an episode
    async fn import_file(
        &self,
        feed: &Feed,
        file_name: &str,
        known: &[Episode],
    ) -> Result<ImportOutcome, CatalogError> {
        let path = audio_path(&feed.id, file_name);
        let file_size = self.store.size(&path).await?;

        let id = derive_episode_id(&feed.id, file_name, file_size);
        if known.iter().any(|e| e.id == id) {
            return Ok(ImportOutcome::Duplicate(id));
        }

        let scratch = self.scratch_file(file_name)?;
        self.store.download_to(&path, scratch.path()).await?;

        let media = self
            .resolver
            .inspect(
                scratch.path(),
                DateSource {
                    feed_prefers_metadata: feed.use_metadata_for_published_date,
                    ..Default::default()
                },
            )
            .await;

        Ok(ImportOutcome::Imported(Episode {
            id,
            feed_id: feed.id.clone(),
            title: title_from_file_name(file_name),
            description: None,
            file_name: file_name.to_string(),
            file_size,
            duration_seconds: media.duration.as_secs(),
            published_date: media.published_date,
            url: None,
        }))
    }
}

/// Timing of the background sweep
#[derive(Debug, Clone, Copy)]
pub struct SyncSchedule {
    /// Wait before the first sweep
    pub initial_delay: Duration,
    /// Wait between sweeps
    pub interval: Duration,
}

/// Synchronize every feed periodically until `cancel` fires
pub async fn run_periodic_sync(
    catalog: Arc<Catalog>,
    schedule: SyncSchedule,
    cancel: CancellationToken,
) {
    info!(
        "Starting periodic sync (first run in {:?}, then every {:?})",
        schedule.initial_delay, schedule.interval
    );

    let mut delay = schedule.initial_delay;
    loop {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {
                break;
            }
        }

        let report = catalog.synchronize_until(&cancel).await;
        if report.is_unchanged() && report.failed == 0 {
            debug!("Periodic sync found nothing to do");
        } else {
            info!(
                "Periodic sync: {} imported, {} pruned, {} failed",
                report.imported, report.pruned, report.failed
            );
        }

        delay = schedule.interval;
    }

    info!("Periodic sync stopped");
}
