// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use super::{ApiError, AppState};
use crate::media::mime::mime_type_for;
use crate::store::paths::{audio_path, icon_path};

/// A parsed `Range` header against an object of known size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteRange {
    /// No usable range; serve the whole object
    Full,
    /// Inclusive byte bounds
    Partial { start: u64, end: u64 },
    Unsatisfiable,
}

impl ByteRange {
    /// Parse a single `bytes=` range. Multi-range and malformed headers fall back to
    /// the full body.
    fn parse(header: Option<&str>, size: u64) -> Self {
        let Some(ranges) = header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
            return Self::Full;
        };
        if ranges.contains(',') {
            return Self::Full;
        }
        let Some((first, last)) = ranges.split_once('-') else {
            return Self::Full;
        };

        let (first, last) = (first.trim(), last.trim());
        let bounds = if first.is_empty() {
            // Suffix range: the last N bytes
            match last.parse::<u64>() {
                Ok(0) => return Self::Unsatisfiable,
                Ok(n) => Some((size.saturating_sub(n), size.saturating_sub(1))),
                Err(_) => return Self::Full,
            }
        } else {
            let Ok(start) = first.parse::<u64>() else {
                return Self::Full;
            };
            let end = if last.is_empty() {
                size.saturating_sub(1)
            } else {
                match last.parse::<u64>() {
                    Ok(end) if end >= start => end.min(size.saturating_sub(1)),
                    _ => return Self::Full,
                }
            };
            Some((start, end))
        };

        match bounds {
            Some((start, end)) if size > 0 && start < size => Self::Partial { start, end },
            _ => Self::Unsatisfiable,
        }
    }
}

pub async fn audio_default(
    State(state): State<AppState>,
    Path(file): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let feed_id = state.default_feed.clone();
    serve_audio(&state, &feed_id, &file, &headers).await
}

pub async fn audio(
    State(state): State<AppState>,
    Path((feed_id, file)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    serve_audio(&state, &feed_id, &file, &headers).await
}

pub async fn icon(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
) -> Result<Response, ApiError> {
    let image = state.catalog.store().get(&icon_path(&feed_id)).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        image,
    )
        .into_response())
}

async fn serve_audio(
    state: &AppState,
    feed_id: &str,
    file: &str,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let store = state.catalog.store();
    let path = audio_path(feed_id, file);
    let size = store.size(&path).await?;

    let range = ByteRange::parse(
        headers.get(header::RANGE).and_then(|v| v.to_str().ok()),
        size,
    );

    let (status, body, length) = match range {
        ByteRange::Full => (StatusCode::OK, store.get_stream(&path).await?, size),
        ByteRange::Partial { start, end } => {
            let length = end - start + 1;
            (
                StatusCode::PARTIAL_CONTENT,
                store.get_range(&path, start, length).await?,
                length,
            )
        }
        ByteRange::Unsatisfiable => {
            return Ok((
                StatusCode::RANGE_NOT_SATISFIABLE,
                [(header::CONTENT_RANGE, format!("bytes */{size}"))],
            )
                .into_response());
        }
    };

    let mut response = Response::new(Body::from_stream(body));
    *response.status_mut() = status;
    let response_headers = response.headers_mut();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(mime_type_for(file)),
    );
    response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    response_headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let ByteRange::Partial { start, end } = range
        && let Ok(value) = HeaderValue::from_str(&format!("bytes {start}-{end}/{size}"))
    {
        response_headers.insert(header::CONTENT_RANGE, value);
    }

    Ok(response)
}
