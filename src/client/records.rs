//! Canonical records handed to the host.
//!
//! Every adapter maps its upstream payloads into these shapes. Records are built
//! fresh on each call and never persisted.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Image reference with its nominal size
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Thumbnail {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl Thumbnail {
    #[must_use]
    pub fn new(url: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            url: url.into(),
            width,
            height,
        }
    }

    /// Zero or one thumbnail, depending on whether a URL is present
    #[must_use]
    pub fn list(url: Option<String>, width: u32, height: u32) -> Vec<Self> {
        url.filter(|u| !u.is_empty())
            .map(|u| Self::new(u, width, height))
            .into_iter()
            .collect()
    }
}

/// Reference to the author of a media record or collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorLink {
    pub id: String,
    pub name: String,
    pub url: String,
    pub avatar: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    #[default]
    Audio,
    Video,
    Hls,
    Dash,
}

/// Playable stream resolved by a content-details lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StreamDescriptor {
    pub kind: StreamKind,
    pub url: String,
    pub name: String,
    /// MIME type, e.g. `audio/mpeg`
    pub container: String,
    pub codec: String,
    /// Bits per second, 0 when unknown
    pub bitrate: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Language tag for audio and subtitle tracks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Playable item: track, video, clip or live channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub id: String,
    /// Source id of the adapter that produced the record
    pub platform: String,
    pub name: String,
    pub author: AuthorLink,
    pub url: String,
    pub share_url: String,
    pub thumbnails: Vec<Thumbnail>,
    pub duration_ms: u64,
    pub view_count: u64,
    pub like_count: u64,
    pub is_live: bool,
    /// Milliseconds since the Unix epoch
    pub published_at_ms: i64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub streams: Vec<StreamDescriptor>,
    /// Source-specific extras such as album or short-form flags
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Author, artist or channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRecord {
    pub id: String,
    pub platform: String,
    pub name: String,
    pub url: String,
    pub thumbnail: String,
    pub description: String,
    /// `None` when the upstream count is unknown
    pub subscribers: Option<u64>,
}

/// Playlist or album
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRecord {
    pub id: String,
    pub platform: String,
    pub name: String,
    pub author: AuthorLink,
    pub url: String,
    pub thumbnail: String,
    pub item_count: u64,
    /// May be empty when items have not been fetched yet
    pub items: Vec<MediaRecord>,
    pub description: String,
}

/// Heterogeneous feed entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentItem {
    Media(MediaRecord),
    Channel(ChannelRecord),
    Collection(CollectionRecord),
}

impl ContentItem {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Media(m) => &m.id,
            Self::Channel(c) => &c.id,
            Self::Collection(c) => &c.id,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Media(m) => &m.name,
            Self::Channel(c) => &c.name,
            Self::Collection(c) => &c.name,
        }
    }
}

impl From<MediaRecord> for ContentItem {
    fn from(record: MediaRecord) -> Self {
        Self::Media(record)
    }
}

impl From<ChannelRecord> for ContentItem {
    fn from(record: ChannelRecord) -> Self {
        Self::Channel(record)
    }
}

impl From<CollectionRecord> for ContentItem {
    fn from(record: CollectionRecord) -> Self {
        Self::Collection(record)
    }
}

/// One page of results plus its pagination hint.
///
/// A page with `error` set is a degraded response: the operation failed and the
/// host should show the message instead of treating the page as "no results".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
    /// Offset to request for the following page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Page<T> {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_more: false,
            next_offset: None,
            error: None,
        }
    }

    /// Page without further results
    #[must_use]
    pub const fn complete(items: Vec<T>) -> Self {
        Self {
            items,
            has_more: false,
            next_offset: None,
            error: None,
        }
    }

    /// Page whose successor starts at `next_offset` when `has_more` holds
    #[must_use]
    pub fn paged(items: Vec<T>, has_more: bool, next_offset: u32) -> Self {
        Self {
            items,
            has_more,
            next_offset: has_more.then_some(next_offset),
            error: None,
        }
    }

    /// Empty page carrying a human-readable failure message
    #[must_use]
    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::empty()
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Convert the items, keeping pagination and error state
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            has_more: self.has_more,
            next_offset: self.next_offset,
            error: self.error,
        }
    }

    /// Keep only the items `f` converts
    pub fn filter_map<U, F: FnMut(T) -> Option<U>>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().filter_map(f).collect(),
            has_more: self.has_more,
            next_offset: self.next_offset,
            error: self.error,
        }
    }
}

/// Named external link, e.g. an artist website
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Link {
    pub name: String,
    pub url: String,
}

/// Channel lookup result: the channel plus a page of its media
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDetails {
    pub channel: ChannelRecord,
    pub links: Vec<Link>,
    pub videos: Page<MediaRecord>,
}

/// Playlist lookup result: the collection plus a page of its media
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistDetails {
    pub playlist: CollectionRecord,
    pub videos: Page<MediaRecord>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}
