// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP surface: RSS documents, media files and the JSON management API.
//!
//! Handlers stay thin and delegate to [`Catalog`]. Routes without a `/feeds/{feed}`
//! segment address the configured default feed.

mod episodes;
mod error;
mod feeds;
mod media;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::Method;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use tower_http::trace::TraceLayer;
use url::Url;

use crate::catalog::Catalog;
use crate::config::Config;

pub use error::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared state of every handler
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub base_url: Url,
    pub default_feed: String,
    pub api_key: Option<String>,
    /// Where uploads are staged before they are stored
    pub scratch_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(catalog: Arc<Catalog>, config: &Config) -> Self {
        Self {
            catalog,
            base_url: config.server.base_url.clone(),
            default_feed: config.default_feed.id.clone(),
            api_key: config.server.api_key.clone().filter(|key| !key.is_empty()),
            scratch_dir: config.storage.scratch_dir.clone(),
        }
    }
}

/// Build the application router
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let api = Router::new()
        .route(
            "/episodes",
            get(episodes::list_default).post(episodes::upload_default),
        )
        .route("/episodes/{episode}", delete(episodes::remove_default))
        .route("/feeds", get(feeds::list).post(feeds::create))
        .route(
            "/feeds/{feed}",
            get(feeds::show).put(feeds::update).delete(feeds::remove),
        )
        .route("/feeds/{feed}/rename", post(feeds::rename))
        .route("/feeds/{feed}/icon", put(feeds::set_icon))
        .route("/feeds/{feed}/sync", post(feeds::synchronize))
        .route(
            "/feeds/{feed}/episodes",
            get(episodes::list).post(episodes::upload),
        )
        .route(
            "/feeds/{feed}/episodes/{episode}",
            get(episodes::show)
                .patch(episodes::update)
                .delete(episodes::remove),
        )
        .route("/feeds/{feed}/episodes/{episode}/move", post(episodes::move_to))
        .route("/feeds/{feed}/episodes/{episode}/copy", post(episodes::copy_to))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/feed.xml", get(feeds::rss_default))
        .route("/feeds/{feed}/feed.xml", get(feeds::rss))
        .route("/audio/{file}", get(media::audio_default))
        .route("/feeds/{feed}/audio/{file}", get(media::audio))
        .route("/feeds/{feed}/icon.png", get(media::icon))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Reject mutating requests without the configured API key
async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let read_only = request.method() == Method::GET || request.method() == Method::HEAD;

    if let Some(expected) = &state.api_key
        && !read_only
    {
        let provided = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected.as_str()) {
            return Err(ApiError::Unauthorized);
        }
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, Response};
    use tower::ServiceExt;
    use url::Url;

    use super::{AppState, router};
    use crate::catalog::Catalog;
    use crate::catalog::testing::Fixture;
    use crate::model::Feed;

    pub const BOUNDARY: &str = "podhost-test-boundary";

    pub struct TestApp {
        pub fixture: Fixture,
        pub catalog: Arc<Catalog>,
        pub router: Router,
    }

    impl TestApp {
        pub async fn new(api_key: Option<&str>) -> Self {
            let fixture = Fixture::new().await;
            let catalog = Arc::new(fixture.reopen().await);
            catalog
                .create_feed(Feed::new("default", "Default Show"))
                .await
                .unwrap();

            let state = AppState {
                catalog: catalog.clone(),
                base_url: Url::parse("https://pods.example.com/").unwrap(),
                default_feed: "default".to_string(),
                api_key: api_key.map(str::to_string),
                scratch_dir: Some(fixture.dir.path().join("scratch")),
            };

            Self {
                fixture,
                catalog,
                router: router(state, 16 * 1024 * 1024),
            }
        }

        pub async fn send(&self, request: Request<Body>) -> Response<Body> {
            self.router.clone().oneshot(request).await.unwrap()
        }
    }

    pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    pub async fn body_json(response: Response<Body>) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    /// A multipart body with text fields and an optional file part
    pub fn multipart(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Body {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, data)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: audio/mpeg\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Body::from(body)
    }

    pub fn multipart_content_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }
}
