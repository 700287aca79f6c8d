// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path as FsPath;

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::extract::multipart::Field;
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use super::{ApiError, AppState};
use crate::catalog::{EpisodeUpdate, NewEpisode};
use crate::model::Episode;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub published_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub target_feed_id: String,
}

pub async fn list_default(State(state): State<AppState>) -> Json<Vec<Episode>> {
    Json(state.catalog.list_episodes(&state.default_feed).await)
}

pub async fn list(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
) -> Json<Vec<Episode>> {
    Json(state.catalog.list_episodes(&feed_id).await)
}

pub async fn show(
    State(state): State<AppState>,
    Path((feed_id, episode_id)): Path<(String, String)>,
) -> Result<Json<Episode>, ApiError> {
    state
        .catalog
        .get_episode(&feed_id, &episode_id)
        .await
        .map(Json)
        .ok_or_else(|| episode_not_found(&episode_id))
}

pub async fn upload_default(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Episode>), ApiError> {
    let feed_id = state.default_feed.clone();
    store_upload(&state, &feed_id, multipart).await
}

pub async fn upload(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Episode>), ApiError> {
    store_upload(&state, &feed_id, multipart).await
}

pub async fn update(
    State(state): State<AppState>,
    Path((feed_id, episode_id)): Path<(String, String)>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<Episode>, ApiError> {
    let update = EpisodeUpdate {
        title: request.title,
        description: request.description,
        published_date: request
            .published_date
            .as_deref()
            .map(parse_published_date)
            .transpose()?,
    };

    state
        .catalog
        .update_episode(&feed_id, &episode_id, update)
        .await?
        .map(Json)
        .ok_or_else(|| episode_not_found(&episode_id))
}

pub async fn remove_default(
    State(state): State<AppState>,
    Path(episode_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let feed_id = state.default_feed.clone();
    delete(&state, &feed_id, &episode_id).await
}

pub async fn remove(
    State(state): State<AppState>,
    Path((feed_id, episode_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    delete(&state, &feed_id, &episode_id).await
}

pub async fn move_to(
    State(state): State<AppState>,
    Path((feed_id, episode_id)): Path<(String, String)>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<Episode>, ApiError> {
    state
        .catalog
        .move_episode(&feed_id, &episode_id, &request.target_feed_id)
        .await?
        .map(Json)
        .ok_or_else(|| episode_not_found(&episode_id))
}

pub async fn copy_to(
    State(state): State<AppState>,
    Path((feed_id, episode_id)): Path<(String, String)>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<Episode>, ApiError> {
    state
        .catalog
        .copy_episode(&feed_id, &episode_id, &request.target_feed_id)
        .await?
        .map(Json)
        .ok_or_else(|| episode_not_found(&episode_id))
}

async fn delete(state: &AppState, feed_id: &str, episode_id: &str) -> Result<StatusCode, ApiError> {
    if state.catalog.delete_episode(feed_id, episode_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(episode_not_found(episode_id))
    }
}

fn episode_not_found(episode_id: &str) -> ApiError {
    ApiError::NotFound(format!("Episode '{episode_id}' not found"))
}

/// Read the multipart form into a staged file and publish it
async fn store_upload(
    state: &AppState,
    feed_id: &str,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Episode>), ApiError> {
    let mut staged: Option<(NamedTempFile, String)> = None;
    let mut title = None;
    let mut description = None;
    let mut published_date = None;
    let mut use_metadata = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        match field.name() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| ApiError::BadRequest("File part has no file name".into()))?;
                let file = stage_file(state, &file_name, field).await?;
                staged = Some((file, file_name));
            }
            Some("title") => title = Some(field_text(field).await?),
            Some("description") => description = Some(field_text(field).await?),
            Some("publishedDate") => {
                let text = field_text(field).await?;
                if !text.trim().is_empty() {
                    published_date = Some(parse_published_date(&text)?);
                }
            }
            Some("useMetadataForPublishedDate") => {
                use_metadata = parse_flag(&field_text(field).await?)?;
            }
            _ => {}
        }
    }

    let (file, file_name) =
        staged.ok_or_else(|| ApiError::BadRequest("Missing file part".into()))?;

    let episode = state
        .catalog
        .add_episode(
            feed_id,
            NewEpisode {
                source: file.path().to_path_buf(),
                file_name,
                title,
                description,
                published_date,
                use_metadata,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(episode)))
}

/// Stream a file part to a scratch file that keeps the upload's extension
async fn stage_file(
    state: &AppState,
    file_name: &str,
    mut field: Field<'_>,
) -> Result<NamedTempFile, ApiError> {
    let suffix = FsPath::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    let mut builder = tempfile::Builder::new();
    builder.prefix("podhost-upload-").suffix(&suffix);
    let staged = match &state.scratch_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(ApiError::Upload)?;

    let mut file = tokio::fs::File::from_std(staged.reopen().map_err(ApiError::Upload)?);
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        file.write_all(&chunk).await.map_err(ApiError::Upload)?;
    }
    file.flush().await.map_err(ApiError::Upload)?;

    Ok(staged)
}

async fn field_text(field: Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC)
pub fn parse_published_date(value: &str) -> Result<DateTime<Utc>, ApiError> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Ok(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid publishedDate '{value}'")))
}

fn parse_flag(value: &str) -> Result<Option<bool>, ApiError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "true" | "1" | "on" | "yes" => Ok(Some(true)),
        "false" | "0" | "off" | "no" => Ok(Some(false)),
        other => Err(ApiError::BadRequest(format!(
            "Invalid useMetadataForPublishedDate '{other}'"
        ))),
    }
}
