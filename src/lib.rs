// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod catalog;
pub mod config;
pub mod error;
pub mod feed;
pub mod identity;
pub mod media;
pub mod model;
pub mod progress;
pub mod store;
pub mod sync;
pub mod web;

// Re-export main types for convenience
pub use catalog::{Catalog, EpisodeUpdate, NewEpisode};
pub use config::Config;
pub use error::{CatalogError, FeedError, StoreError};
pub use feed::{enclosure_url, render_feed};
pub use identity::derive_episode_id;
pub use media::{AudioProbe, AudioProperties, PublishDateResolver, TagProbe};
pub use model::{Episode, Feed};
pub use progress::{LogReporter, NoopReporter, SharedSyncReporter, SyncEvent, SyncReporter};
pub use store::{LocalStore, ObjectStore, SharedStore};
pub use sync::{SyncReport, SyncSchedule, run_periodic_sync};
