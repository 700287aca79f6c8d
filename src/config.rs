// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Server configuration: built-in defaults, then an optional TOML file, then
//! `PODHOST_`-prefixed environment variables (`__` separates nested keys).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Deserialize;
use url::Url;

use crate::model::Feed;
use crate::sync::SyncSchedule;

pub const ENV_PREFIX: &str = "PODHOST_";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub default_feed: DefaultFeedConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Public root URL used for enclosure and image links
    pub base_url: Url,
    /// Required in the `X-API-Key` header of every mutating request when set
    pub api_key: Option<String>,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            base_url: Url::parse("http://localhost:3000/").expect("valid default URL"),
            api_key: None,
            max_upload_bytes: 1024 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the blob store
    pub root: PathBuf,
    /// Where uploads and sync downloads are staged; the system temp dir if unset
    pub scratch_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("data"),
            scratch_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    #[serde(with = "duration_serde")]
    pub interval: Duration,
    #[serde(with = "duration_serde")]
    pub initial_delay: Duration,
    /// Upper bound for a single tag or container read
    #[serde(with = "duration_serde")]
    pub extraction_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(60 * 60),
            initial_delay: Duration::from_secs(60),
            extraction_timeout: Duration::from_secs(5),
        }
    }
}

impl SyncConfig {
    pub fn schedule(&self) -> SyncSchedule {
        SyncSchedule {
            initial_delay: self.initial_delay,
            interval: self.interval,
        }
    }
}

/// The feed addressed by the un-prefixed routes, created on first start
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DefaultFeedConfig {
    pub id: String,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub language: String,
}

impl Default for DefaultFeedConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            title: "My Podcast".to_string(),
            author: String::new(),
            description: None,
            language: "en".to_string(),
        }
    }
}

impl DefaultFeedConfig {
    pub fn to_feed(&self) -> Feed {
        let mut feed = Feed::new(self.id.clone(), self.title.clone());
        feed.author = self.author.clone();
        feed.description = self.description.clone();
        feed.language = self.language.clone();
        feed
    }
}

impl Config {
    /// Layer the TOML file at `path` (skipped if missing) and the environment over
    /// the defaults
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }
}

/// Durations as seconds or human-readable strings such as `90s` or `1h 30m`
mod duration_serde {
    use std::fmt;
    use std::time::Duration;

    use serde::Deserializer;
    use serde::de::{self, Visitor};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DurationVisitor;

        impl<'de> Visitor<'de> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a duration as seconds or a string like '30s' or '1h'")
            }

            fn visit_u64<E: de::Error>(self, seconds: u64) -> Result<Self::Value, E> {
                Ok(Duration::from_secs(seconds))
            }

            fn visit_i64<E: de::Error>(self, seconds: i64) -> Result<Self::Value, E> {
                u64::try_from(seconds)
                    .map(Duration::from_secs)
                    .map_err(|_| E::custom(format!("negative duration: {seconds}")))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                humantime::parse_duration(value)
                    .map_err(|e| E::custom(format!("invalid duration '{value}': {e}")))
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}
