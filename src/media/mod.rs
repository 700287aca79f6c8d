// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod mime;
pub mod mp4;
mod probe;
mod publish_date;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

pub use probe::TagProbe;
pub use publish_date::{DateSource, MediaInfo, PublishDateResolver};

/// Best-effort properties of an audio file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioProperties {
    /// Zero when it could not be determined
    pub duration: Duration,
    /// The "date tagged" value of the file's tag, if any
    pub tag_date: Option<DateTime<Utc>>,
}

/// Reads audio properties from a local file
///
/// Implementations swallow every failure and report what they could read; a file with
/// no readable metadata yields `AudioProperties::default()`.
pub trait AudioProbe: Send + Sync {
    fn read_properties(&self, path: &Path) -> AudioProperties;
}

/// A shared reference to an audio probe
pub type SharedProbe = Arc<dyn AudioProbe>;

/// Run a blocking extraction on the blocking pool, giving up after `timeout`
///
/// Panics and timeouts both degrade to `None`. A timed-out task keeps running on its
/// blocking thread, but nobody waits for it.
pub(crate) async fn run_bounded<T, F>(what: &str, path: &Path, timeout: Duration, task: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> Option<T> + Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(task)).await {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            warn!("{what} failed for {}: {e}", path.display());
            None
        }
        Err(_) => {
            warn!("{what} timed out after {timeout:?} for {}", path.display());
            None
        }
    }
}
