// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use tracing::{debug, info, warn};

/// Events emitted while reconciling a feed against storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// An episode was dropped because its file is gone from storage
    EpisodePruned {
        feed_id: String,
        episode_id: String,
        file_name: String,
    },

    /// A stored file without an episode record was imported
    EpisodeImported {
        feed_id: String,
        episode_id: String,
        file_name: String,
    },

    /// A stored file could not be imported
    ImportFailed {
        feed_id: String,
        file_name: String,
        error: String,
    },

    /// An untracked file derived an id that is already in use
    DuplicateSkipped {
        feed_id: String,
        episode_id: String,
        file_name: String,
    },

    /// A feed finished reconciling
    FeedSynced {
        feed_id: String,
        pruned_count: usize,
        imported_count: usize,
        failed_count: usize,
    },
}

/// Trait for reporting synchronization events.
///
/// Implementations can log, collect statistics, or feed a UI.
pub trait SyncReporter: Send + Sync {
    /// Report a sync event
    fn report(&self, event: SyncEvent);
}

/// A shared reference to a sync reporter
pub type SharedSyncReporter = Arc<dyn SyncReporter>;

/// A reporter that silently ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl SyncReporter for NoopReporter {
    fn report(&self, _event: SyncEvent) {}
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedSyncReporter {
        Arc::new(Self)
    }
}

/// A reporter that writes every event to the `tracing` log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl LogReporter {
    pub fn shared() -> SharedSyncReporter {
        Arc::new(Self)
    }
}

impl SyncReporter for LogReporter {
    fn report(&self, event: SyncEvent) {
        match event {
            SyncEvent::EpisodePruned {
                feed_id,
                episode_id,
                file_name,
            } => {
                info!(feed = %feed_id, episode = %episode_id, "Pruned episode, {file_name} is gone from storage");
            }

            SyncEvent::EpisodeImported {
                feed_id,
                episode_id,
                file_name,
            } => {
                info!(feed = %feed_id, episode = %episode_id, "Imported {file_name}");
            }

            SyncEvent::ImportFailed {
                feed_id,
                file_name,
                error,
            } => {
                warn!(feed = %feed_id, "Failed to import {file_name}: {error}");
            }

            SyncEvent::DuplicateSkipped {
                feed_id,
                episode_id,
                file_name,
            } => {
                warn!(feed = %feed_id, episode = %episode_id, "Skipped {file_name}: id already in use");
            }

            SyncEvent::FeedSynced {
                feed_id,
                pruned_count,
                imported_count,
                failed_count,
            } => {
                if pruned_count + imported_count + failed_count > 0 {
                    info!(
                        feed = %feed_id,
                        "Sync complete: {imported_count} imported, {pruned_count} pruned, {failed_count} failed"
                    );
                } else {
                    debug!(feed = %feed_id, "Sync complete: no changes");
                }
            }
        }
    }
}
