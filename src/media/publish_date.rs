// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::mime::is_container_file;
use super::{AudioProperties, SharedProbe, mp4, run_bounded};

/// Inputs that decide where an episode's publication date comes from
#[derive(Debug, Clone, Copy, Default)]
pub struct DateSource {
    /// Caller-supplied date; always wins
    pub explicit: Option<DateTime<Utc>>,
    /// Per-request request to read the date from the file
    pub use_metadata: Option<bool>,
    /// The feed's standing preference for file-embedded dates
    pub feed_prefers_metadata: bool,
}

impl DateSource {
    fn wants_metadata(&self) -> bool {
        self.use_metadata == Some(true) || self.feed_prefers_metadata
    }
}

/// Duration and publication date resolved for a file about to become an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaInfo {
    pub duration: Duration,
    pub published_date: DateTime<Utc>,
}

/// Chooses publication dates from explicit input, file metadata and the clock
///
/// Priority: explicit date, then the tag's "date tagged" value, then the MP4 creation
/// time (container files only), then the current time. The metadata sources are only
/// consulted when the request or the feed asks for them. Every file read is bounded by
/// `timeout` and treated as absent on failure.
#[derive(Clone)]
pub struct PublishDateResolver {
    probe: SharedProbe,
    timeout: Duration,
}

impl PublishDateResolver {
    pub fn new(probe: SharedProbe, timeout: Duration) -> Self {
        Self { probe, timeout }
    }

    /// Read audio properties, or defaults if the probe fails or takes too long
    pub async fn read_properties(&self, path: &Path) -> AudioProperties {
        let probe = self.probe.clone();
        let owned = path.to_path_buf();
        run_bounded("Audio tag read", path, self.timeout, move || {
            Some(probe.read_properties(&owned))
        })
        .await
        .unwrap_or_default()
    }

    /// Creation time from the MP4 movie header
    pub async fn container_creation_time(&self, path: &Path) -> Option<DateTime<Utc>> {
        let owned = path.to_path_buf();
        run_bounded("Container header read", path, self.timeout, move || {
            mp4::creation_time(&owned)
        })
        .await
    }

    /// Resolve the publication date of the file at `path`
    pub async fn resolve(&self, path: &Path, source: DateSource) -> DateTime<Utc> {
        if let Some(date) = source.explicit {
            return date;
        }
        if !source.wants_metadata() {
            return Utc::now();
        }

        let properties = self.read_properties(path).await;
        self.choose(path, properties.tag_date, source).await
    }

    /// Resolve both duration and publication date with a single probe pass
    pub async fn inspect(&self, path: &Path, source: DateSource) -> MediaInfo {
        let properties = self.read_properties(path).await;
        let published_date = self.choose(path, properties.tag_date, source).await;

        MediaInfo {
            duration: properties.duration,
            published_date,
        }
    }

    async fn choose(
        &self,
        path: &Path,
        tag_date: Option<DateTime<Utc>>,
        source: DateSource,
    ) -> DateTime<Utc> {
        if let Some(date) = source.explicit {
            return date;
        }

        if source.wants_metadata() {
            if let Some(date) = tag_date.filter(is_meaningful) {
                return date;
            }

            let is_container = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(is_container_file);

            if is_container
                && let Some(date) = self
                    .container_creation_time(path)
                    .await
                    .filter(is_meaningful)
            {
                return date;
            }
        }

        Utc::now()
    }
}

/// Rejects unset values: zeroed MP4 headers and minimum-value tag dates
fn is_meaningful(date: &DateTime<Utc>) -> bool {
    *date > mp4::mp4_epoch()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::AudioProbe;
    use crate::media::mp4::fixtures::sample_m4a;
    use chrono::TimeZone;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::{TempDir, tempdir};

    struct StubProbe {
        tag_date: Option<DateTime<Utc>>,
    }

    impl AudioProbe for StubProbe {
        fn read_properties(&self, _path: &Path) -> AudioProperties {
            AudioProperties {
                duration: Duration::from_secs(42),
                tag_date: self.tag_date,
            }
        }
    }

    struct SlowProbe;

    impl AudioProbe for SlowProbe {
        fn read_properties(&self, _path: &Path) -> AudioProperties {
            std::thread::sleep(Duration::from_millis(500));
            AudioProperties {
                duration: Duration::from_secs(1),
                tag_date: Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
            }
        }
    }

    fn resolver(tag_date: Option<DateTime<Utc>>) -> PublishDateResolver {
        PublishDateResolver::new(Arc::new(StubProbe { tag_date }), Duration::from_secs(5))
    }

    fn tagged() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 6, 1, 8, 30, 0).unwrap()
    }

    fn explicit() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 2, 3, 4, 5, 6).unwrap()
    }

    /// 2022-05-05T00:00:00Z in MP4 epoch seconds
    fn container_created() -> (u32, DateTime<Utc>) {
        let date = Utc.with_ymd_and_hms(2022, 5, 5, 0, 0, 0).unwrap();
        ((date.timestamp() + 2_082_844_800) as u32, date)
    }

    fn write_file(name: &str, bytes: &[u8]) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        (dir, path)
    }

    fn assert_recent(date: DateTime<Utc>) {
        let age = Utc::now() - date;
        assert!(age.num_seconds().abs() < 5, "expected ~now, got {date}");
    }

    #[tokio::test]
    async fn explicit_date_always_wins() {
        let (_dir, path) = write_file("ep.mp3", b"x");
        let source = DateSource {
            explicit: Some(explicit()),
            use_metadata: Some(true),
            feed_prefers_metadata: true,
        };
        assert_eq!(resolver(Some(tagged())).resolve(&path, source).await, explicit());
    }

    #[tokio::test]
    async fn tag_date_used_when_requested() {
        let (_dir, path) = write_file("ep.mp3", b"x");
        let source = DateSource {
            use_metadata: Some(true),
            ..Default::default()
        };
        assert_eq!(resolver(Some(tagged())).resolve(&path, source).await, tagged());
    }

    #[tokio::test]
    async fn tag_date_used_when_feed_prefers_metadata() {
        let (_dir, path) = write_file("ep.mp3", b"x");
        let source = DateSource {
            feed_prefers_metadata: true,
            ..Default::default()
        };
        assert_eq!(resolver(Some(tagged())).resolve(&path, source).await, tagged());
    }

    #[tokio::test]
    async fn request_opt_out_does_not_override_feed_preference() {
        let (_dir, path) = write_file("ep.mp3", b"x");
        let source = DateSource {
            use_metadata: Some(false),
            feed_prefers_metadata: true,
            ..Default::default()
        };
        assert_eq!(resolver(Some(tagged())).resolve(&path, source).await, tagged());
    }

    #[tokio::test]
    async fn metadata_ignored_unless_asked_for() {
        let (_dir, path) = write_file("ep.mp3", b"x");
        let date = resolver(Some(tagged()))
            .resolve(&path, DateSource::default())
            .await;
        assert_recent(date);
    }

    #[tokio::test]
    async fn missing_tag_falls_back_to_container_creation_time() {
        let (raw, expected) = container_created();
        let (_dir, path) = write_file("ep.m4a", &sample_m4a(raw, 1000, 1000));
        let source = DateSource {
            use_metadata: Some(true),
            ..Default::default()
        };
        assert_eq!(resolver(None).resolve(&path, source).await, expected);
    }

    #[tokio::test]
    async fn missing_tag_on_non_container_falls_back_to_now() {
        let (raw, _) = container_created();
        // MP4 bytes but an .mp3 name: the container is not consulted
        let (_dir, path) = write_file("ep.mp3", &sample_m4a(raw, 1000, 1000));
        let source = DateSource {
            use_metadata: Some(true),
            ..Default::default()
        };
        assert_recent(resolver(None).resolve(&path, source).await);
    }

    #[tokio::test]
    async fn zeroed_container_time_is_a_sentinel() {
        let (_dir, path) = write_file("ep.m4a", &sample_m4a(0, 1000, 1000));
        let source = DateSource {
            feed_prefers_metadata: true,
            ..Default::default()
        };
        assert_recent(resolver(None).resolve(&path, source).await);
    }

    #[tokio::test]
    async fn minimum_tag_date_is_a_sentinel() {
        let (_dir, path) = write_file("ep.mp3", b"x");
        let source = DateSource {
            use_metadata: Some(true),
            ..Default::default()
        };
        let date = resolver(Some(DateTime::<Utc>::MIN_UTC))
            .resolve(&path, source)
            .await;
        assert_recent(date);
    }

    #[tokio::test]
    async fn slow_probe_is_treated_as_absent() {
        let (_dir, path) = write_file("ep.mp3", b"x");
        let resolver = PublishDateResolver::new(Arc::new(SlowProbe), Duration::from_millis(20));
        let source = DateSource {
            use_metadata: Some(true),
            ..Default::default()
        };

        let info = resolver.inspect(&path, source).await;
        assert_recent(info.published_date);
        assert_eq!(info.duration, Duration::ZERO);
    }

    #[tokio::test]
    async fn inspect_reports_duration_and_date() {
        let (_dir, path) = write_file("ep.mp3", b"x");
        let info = resolver(Some(tagged()))
            .inspect(
                &path,
                DateSource {
                    feed_prefers_metadata: true,
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(info.duration, Duration::from_secs(42));
        assert_eq!(info.published_date, tagged());
    }
}
