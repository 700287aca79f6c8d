// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Minimal reader for the ISO base media (MP4/M4A) box layout.
//!
//! Only the movie header (`moov/mvhd`) is of interest: it carries the creation time and
//! the overall duration of the presentation. Every failure, from I/O errors to boxes
//! whose sizes do not add up, yields `None`.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Seconds between 1904-01-01T00:00:00Z (the format's epoch) and the Unix epoch
const MP4_EPOCH_OFFSET: i64 = 2_082_844_800;

const HEADER_LEN: u64 = 8;
const EXTENDED_HEADER_LEN: u64 = 16;

/// Fields recovered from an `mvhd` box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovieHeader {
    pub creation_time: DateTime<Utc>,
    /// `None` when the timescale is zero or the duration is marked unknown
    pub duration: Option<Duration>,
}

/// The format's reference epoch, 1904-01-01T00:00:00Z
pub fn mp4_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(-MP4_EPOCH_OFFSET, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Read the movie header of the file at `path`
pub fn movie_header(path: &Path) -> Option<MovieHeader> {
    let file = File::open(path).ok()?;
    read_movie_header(&mut BufReader::new(file))
}

/// Creation time embedded in the file at `path`
pub fn creation_time(path: &Path) -> Option<DateTime<Utc>> {
    movie_header(path).map(|header| header.creation_time)
}

/// Read the movie header from any seekable source
pub fn read_movie_header<R: Read + Seek>(reader: &mut R) -> Option<MovieHeader> {
    let end = reader.seek(SeekFrom::End(0)).ok()?;
    let moov = find_box(reader, 0, end, b"moov")?;
    let mvhd = find_box(reader, moov.body_start, moov.end, b"mvhd")?;
    parse_mvhd(reader, &mvhd)
}

#[derive(Debug)]
struct BoxSpan {
    body_start: u64,
    end: u64,
}

/// Scan sibling boxes in `[start, end)` for one of type `wanted`
fn find_box<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    end: u64,
    wanted: &[u8; 4],
) -> Option<BoxSpan> {
    let mut offset = start;

    while offset.checked_add(HEADER_LEN)? <= end {
        reader.seek(SeekFrom::Start(offset)).ok()?;

        let mut header = [0u8; 8];
        reader.read_exact(&mut header).ok()?;
        let declared = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let kind = [header[4], header[5], header[6], header[7]];

        let (size, header_len) = match declared {
            0 => (end - offset, HEADER_LEN),
            1 => {
                let mut extended = [0u8; 8];
                reader.read_exact(&mut extended).ok()?;
                (u64::from_be_bytes(extended), EXTENDED_HEADER_LEN)
            }
            n => (u64::from(n), HEADER_LEN),
        };

        // A box must hold its own header and stay inside its parent
        if size < header_len {
            return None;
        }
        let box_end = offset.checked_add(size)?;
        if box_end > end {
            return None;
        }

        if &kind == wanted {
            return Some(BoxSpan {
                body_start: offset + header_len,
                end: box_end,
            });
        }

        offset = box_end;
    }

    None
}

fn parse_mvhd<R: Read + Seek>(reader: &mut R, span: &BoxSpan) -> Option<MovieHeader> {
    reader.seek(SeekFrom::Start(span.body_start)).ok()?;
    let mut body = reader.take(span.end - span.body_start);

    let mut version_and_flags = [0u8; 4];
    body.read_exact(&mut version_and_flags).ok()?;

    let (creation, duration) = match version_and_flags[0] {
        1 => {
            let creation = read_u64(&mut body)? as u32;
            let duration = read_u64(&mut body).and_then(|_modified| {
                let timescale = read_u32(&mut body)?;
                let units = read_u64(&mut body).filter(|&d| d != u64::MAX)?;
                Some((timescale, units))
            });
            (creation, duration)
        }
        0 => {
            let creation = read_u32(&mut body)?;
            let duration = read_u32(&mut body).and_then(|_modified| {
                let timescale = read_u32(&mut body)?;
                let units = read_u32(&mut body).filter(|&d| d != u32::MAX)?;
                Some((timescale, u64::from(units)))
            });
            (creation, duration)
        }
        _ => return None,
    };

    let creation_time = DateTime::from_timestamp(i64::from(creation) - MP4_EPOCH_OFFSET, 0)?;
    let duration = duration.and_then(|(timescale, units)| {
        (timescale > 0).then(|| {
            let millis = u128::from(units) * 1000 / u128::from(timescale);
            Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
        })
    });

    Some(MovieHeader {
        creation_time,
        duration,
    })
}

fn read_u32<R: Read>(reader: &mut R) -> Option<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).ok()?;
    Some(u32::from_be_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> Option<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf).ok()?;
    Some(u64::from_be_bytes(buf))
}
