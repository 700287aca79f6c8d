// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use chrono::Utc;
use rss::extension::itunes::{
    ITunesCategoryBuilder, ITunesChannelExtensionBuilder, ITunesItemExtensionBuilder,
    ITunesOwnerBuilder,
};
use rss::{ChannelBuilder, EnclosureBuilder, GuidBuilder, ImageBuilder, Item, ItemBuilder};
use url::Url;

use crate::error::FeedError;
use crate::media::mime::mime_type_for;
use crate::model::{Episode, Feed, sort_newest_first};

const GENERATOR: &str = concat!("podhost ", env!("CARGO_PKG_VERSION"));

/// Render a feed and its episodes as an RSS 2.0 document with iTunes extensions
///
/// `base_url` is the public root of the server; hosted enclosures and the cover image
/// are addressed below it. Items are ordered newest first regardless of input order.
pub fn render_feed(feed: &Feed, episodes: &[Episode], base_url: &Url) -> Result<String, FeedError> {
    let mut episodes = episodes.to_vec();
    sort_newest_first(&mut episodes);

    let description = feed.description.clone().unwrap_or_default();
    let image = image_url(feed, base_url);

    let owner = ITunesOwnerBuilder::default()
        .name(Some(feed.author.clone()))
        .email(feed.email.clone())
        .build();

    let categories = feed
        .category
        .iter()
        .map(|text| ITunesCategoryBuilder::default().text(text.clone()).build())
        .collect::<Vec<_>>();

    let itunes = ITunesChannelExtensionBuilder::default()
        .author(Some(feed.author.clone()))
        .summary(Some(description.clone()))
        .owner(Some(owner))
        .categories(categories)
        .explicit(Some("false".to_string()))
        .image(image.clone())
        .build();

    let channel_image = image.map(|url| {
        ImageBuilder::default()
            .url(url)
            .title(feed.title.clone())
            .link(base_url.to_string())
            .build()
    });

    let items = episodes
        .iter()
        .map(|episode| render_item(feed, episode, base_url))
        .collect::<Vec<_>>();

    let channel = ChannelBuilder::default()
        .title(feed.title.clone())
        .link(base_url.to_string())
        .description(description)
        .language(Some(feed.language.clone()))
        .last_build_date(Some(Utc::now().to_rfc2822()))
        .generator(Some(GENERATOR.to_string()))
        .image(channel_image)
        .itunes_ext(Some(itunes))
        .items(items)
        .build();

    let bytes = channel.write_to(Vec::new())?;
    Ok(String::from_utf8(bytes)?)
}

fn render_item(feed: &Feed, episode: &Episode, base_url: &Url) -> Item {
    let enclosure = EnclosureBuilder::default()
        .url(enclosure_url(episode, base_url))
        .length(episode.file_size.to_string())
        .mime_type(mime_type_for(&episode.file_name).to_string())
        .build();

    let guid = GuidBuilder::default()
        .value(episode.id.clone())
        .permalink(false)
        .build();

    let duration = Some(episode.duration())
        .filter(|d| !d.is_zero())
        .map(format_duration);

    let itunes = ITunesItemExtensionBuilder::default()
        .author(Some(feed.author.clone()))
        .summary(episode.description.clone())
        .explicit(Some("false".to_string()))
        .duration(duration)
        .build();

    ItemBuilder::default()
        .title(Some(episode.title.clone()))
        .description(episode.description.clone())
        .pub_date(Some(episode.published_date.to_rfc2822()))
        .guid(Some(guid))
        .enclosure(Some(enclosure))
        .itunes_ext(Some(itunes))
        .build()
}

/// The episode's direct URL if set, otherwise its hosted location
pub fn enclosure_url(episode: &Episode, base_url: &Url) -> String {
    match &episode.url {
        Some(url) => url.clone(),
        None => public_url(
            base_url,
            &["feeds", &episode.feed_id, "audio", &episode.file_name],
        )
        .to_string(),
    }
}

/// Absolute cover image URL with its version token, if the feed has an image
///
/// Host-less absolute references such as `data:` URIs are returned untouched; a
/// query string would corrupt them.
fn image_url(feed: &Feed, base_url: &Url) -> Option<String> {
    let image = feed.image_url.as_deref()?;

    let mut url = match Url::parse(image) {
        Ok(absolute) if absolute.has_host() => absolute,
        Ok(_) => return Some(image.to_string()),
        Err(_) => public_url(base_url, &["feeds", &feed.id, image]),
    };

    if let Some(version) = &feed.image_version {
        url.query_pairs_mut().append_pair("v", version);
    }
    Some(url.to_string())
}

/// `base_url` extended by percent-escaped path segments
fn public_url(base_url: &Url, segments: &[&str]) -> Url {
    let mut url = base_url.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// `HH:MM:SS`, hours zero-padded to two digits
fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
