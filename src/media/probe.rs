// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use id3::{Tag, TagLike, Timestamp};
use tracing::debug;

use super::mime::{extension, is_container_file};
use super::mp4;
use super::{AudioProbe, AudioProperties};

/// ID3v2 frame holding the time the file was tagged
const DATE_TAGGED_FRAME: &str = "TDTG";

/// Default probe: ID3v2 tags, MP3 frame scanning and MP4 movie headers
#[derive(Debug, Default, Clone, Copy)]
pub struct TagProbe;

impl AudioProbe for TagProbe {
    fn read_properties(&self, path: &Path) -> AudioProperties {
        let tag = match Tag::read_from_path(path) {
            Ok(tag) => Some(tag),
            Err(e) => {
                debug!("No readable ID3 tag in {}: {e}", path.display());
                None
            }
        };

        let tag_date = tag.as_ref().and_then(date_tagged);
        let tagged_length = tag
            .as_ref()
            .and_then(|t| t.duration())
            .map(|millis| Duration::from_millis(u64::from(millis)));

        let duration = tagged_length
            .or_else(|| measure_duration(path))
            .unwrap_or_default();

        AudioProperties { duration, tag_date }
    }
}

fn date_tagged(tag: &Tag) -> Option<DateTime<Utc>> {
    let text = tag.get(DATE_TAGGED_FRAME)?.content().text()?;
    let stamp: Timestamp = text.trim().parse().ok()?;
    timestamp_to_utc(&stamp)
}

/// ID3 timestamps may stop at any precision; missing parts default to the start of the period
fn timestamp_to_utc(stamp: &Timestamp) -> Option<DateTime<Utc>> {
    let date = NaiveDate::from_ymd_opt(
        stamp.year,
        u32::from(stamp.month.unwrap_or(1)),
        u32::from(stamp.day.unwrap_or(1)),
    )?;
    let time = date.and_hms_opt(
        u32::from(stamp.hour.unwrap_or(0)),
        u32::from(stamp.minute.unwrap_or(0)),
        u32::from(stamp.second.unwrap_or(0)),
    )?;
    Some(time.and_utc())
}

fn measure_duration(path: &Path) -> Option<Duration> {
    let name = path.file_name()?.to_str()?;

    if is_container_file(name) {
        return mp4::movie_header(path).and_then(|header| header.duration);
    }

    if extension(name).as_deref() == Some("mp3") {
        return mp3_duration::from_path(path).ok();
    }

    None
}
