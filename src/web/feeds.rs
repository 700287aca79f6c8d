// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::feed::render_feed;
use crate::model::Feed;
use crate::sync::SyncReport;

const RSS_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub new_id: String,
}

pub async fn rss_default(State(state): State<AppState>) -> Result<Response, ApiError> {
    let feed_id = state.default_feed.clone();
    render(&state, &feed_id).await
}

pub async fn rss(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
) -> Result<Response, ApiError> {
    render(&state, &feed_id).await
}

async fn render(state: &AppState, feed_id: &str) -> Result<Response, ApiError> {
    let (feed, episodes) = state
        .catalog
        .feed_snapshot(feed_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Feed '{feed_id}' not found")))?;

    let xml = render_feed(&feed, &episodes, &state.base_url)?;
    Ok(([(header::CONTENT_TYPE, RSS_CONTENT_TYPE)], xml).into_response())
}

pub async fn list(State(state): State<AppState>) -> Json<Vec<Feed>> {
    Json(state.catalog.list_feeds().await)
}

pub async fn show(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
) -> Result<Json<Feed>, ApiError> {
    state
        .catalog
        .get_feed(&feed_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Feed '{feed_id}' not found")))
}

pub async fn create(
    State(state): State<AppState>,
    Json(feed): Json<Feed>,
) -> Result<(StatusCode, Json<Feed>), ApiError> {
    let feed = state.catalog.create_feed(feed).await?;
    Ok((StatusCode::CREATED, Json(feed)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    Json(feed): Json<Feed>,
) -> Result<Json<Feed>, ApiError> {
    Ok(Json(state.catalog.update_feed(&feed_id, feed).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.catalog.delete_feed(&feed_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Feed '{feed_id}' not found")))
    }
}

pub async fn rename(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<Feed>, ApiError> {
    Ok(Json(
        state.catalog.rename_feed(&feed_id, &request.new_id).await?,
    ))
}

pub async fn set_icon(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    image: Bytes,
) -> Result<Json<Feed>, ApiError> {
    if image.is_empty() {
        return Err(ApiError::BadRequest("Image body is empty".to_string()));
    }
    Ok(Json(state.catalog.set_feed_image(&feed_id, image).await?))
}

pub async fn synchronize(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
) -> Result<Json<SyncReport>, ApiError> {
    Ok(Json(state.catalog.synchronize_feed(&feed_id).await?))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use bytes::Bytes;

    use crate::model::Feed;
    use crate::store::ObjectStore;
    use crate::web::testing::{TestApp, body_bytes, body_json};

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn default_feed_xml_is_served() {
        let app = TestApp::new(None).await;
        let response = app
            .send(Request::get("/feed.xml").body(Body::empty()).unwrap())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/xml; charset=utf-8"
        );
        let xml = String::from_utf8(body_bytes(response).await).unwrap();
        let channel = rss::Channel::read_from(xml.as_bytes()).unwrap();
        assert_eq!(channel.title(), "Default Show");
    }

    #[tokio::test]
    async fn unknown_feed_xml_is_404() {
        let app = TestApp::new(None).await;
        let response = app
            .send(
                Request::get("/feeds/ghost/feed.xml")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn feed_crud() {
        let app = TestApp::new(None).await;

        let response = app
            .send(json_request(
                "POST",
                "/api/feeds",
                serde_json::json!({ "id": "tech", "title": "Tech Talk", "author": "Ann" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .send(json_request(
                "POST",
                "/api/feeds",
                serde_json::json!({ "id": "tech", "title": "Again" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .send(json_request(
                "PUT",
                "/api/feeds/tech",
                serde_json::json!({ "id": "tech", "title": "Tech Talk 2", "category": "Technology" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["category"], "Technology");

        let response = app
            .send(json_request(
                "PUT",
                "/api/feeds/tech",
                serde_json::json!({ "id": "other", "title": "X" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .send(Request::get("/api/feeds").body(Body::empty()).unwrap())
            .await;
        let feeds = body_json(response).await;
        assert_eq!(feeds.as_array().unwrap().len(), 2);

        let response = app
            .send(
                Request::delete("/api/feeds/tech")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .send(Request::get("/api/feeds/tech").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rename_through_api() {
        let app = TestApp::new(None).await;
        app.catalog
            .create_feed(Feed::new("old", "Show"))
            .await
            .unwrap();

        let response = app
            .send(json_request(
                "POST",
                "/api/feeds/old/rename",
                serde_json::json!({ "newId": "new" }),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["id"], "new");
        assert!(app.catalog.get_feed("old").await.is_none());
    }

    #[tokio::test]
    async fn icon_upload_and_download() {
        let app = TestApp::new(None).await;

        let response = app
            .send(
                Request::put("/api/feeds/default/icon")
                    .header(header::CONTENT_TYPE, "image/png")
                    .body(Body::from(&b"\x89PNG-data"[..]))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let feed = body_json(response).await;
        assert_eq!(feed["imageUrl"], "icon.png");
        assert!(feed["imageVersion"].is_string());

        let response = app
            .send(
                Request::get("/feeds/default/icon.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(body_bytes(response).await, b"\x89PNG-data");

        let xml = String::from_utf8(
            body_bytes(
                app.send(Request::get("/feed.xml").body(Body::empty()).unwrap())
                    .await,
            )
            .await,
        )
        .unwrap();
        assert!(xml.contains("https://pods.example.com/feeds/default/icon.png?v="));
    }

    #[tokio::test]
    async fn sync_endpoint_imports_files() {
        let app = TestApp::new(None).await;
        app.fixture
            .store
            .put("default/audio/dropped.mp3", Bytes::from_static(b"abc"))
            .await
            .unwrap();

        let response = app
            .send(
                Request::post("/api/feeds/default/sync")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["imported"], 1);
        assert_eq!(app.catalog.list_episodes("default").await.len(), 1);
    }
}
