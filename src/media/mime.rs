// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

/// Fallback for unknown extensions; also the type of the most common podcast format
pub const DEFAULT_AUDIO_MIME: &str = "audio/mpeg";

/// Lowercased extension of a file name, without the dot
pub fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

fn audio_mime(ext: &str) -> Option<&'static str> {
    match ext {
        "mp3" => Some("audio/mpeg"),
        "m4a" => Some("audio/mp4"),
        "wav" => Some("audio/wav"),
        "ogg" => Some("audio/ogg"),
        "flac" => Some("audio/flac"),
        "aac" => Some("audio/aac"),
        _ => None,
    }
}

/// MIME type for an enclosure, derived from the file extension only
pub fn mime_type_for(file_name: &str) -> &'static str {
    extension(file_name)
        .and_then(|ext| audio_mime(&ext))
        .unwrap_or(DEFAULT_AUDIO_MIME)
}

/// Whether a stored file should be tracked as an episode
pub fn is_audio_file(file_name: &str) -> bool {
    extension(file_name).is_some_and(|ext| audio_mime(&ext).is_some())
}

/// Whether the file uses the ISO base media (MP4) box layout
pub fn is_container_file(file_name: &str) -> bool {
    matches!(
        extension(file_name).as_deref(),
        Some("m4a" | "mp4" | "m4b")
    )
}
