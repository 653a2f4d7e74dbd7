use crate::client::records::{
    ChannelDetails, ChannelRecord, CollectionRecord, ContentItem, MediaRecord, Page,
    PlaylistDetails,
};
use crate::context::SourceContext;
use crate::{Error, Result};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// Kind of result a search should return
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchKind {
    /// Whatever the source returns for a plain query
    #[default]
    All,
    /// Playable items only
    Media,
    /// Authors, artists and channels
    Channels,
    /// Playlists and albums
    Playlists,
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::All => "all",
            Self::Media => "media",
            Self::Channels => "channels",
            Self::Playlists => "playlists",
        };
        f.write_str(name)
    }
}

impl FromStr for SearchKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "media" | "music" | "video" => Ok(Self::Media),
            "channels" | "channel" => Ok(Self::Channels),
            "playlists" | "playlist" => Ok(Self::Playlists),
            other => Err(Error::invalid_input(
                "kind",
                format!("unknown search kind '{other}'"),
            )),
        }
    }
}

/// Search query parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Query string
    pub text: String,
    /// Result type filter
    pub kind: SearchKind,
    /// Offset of the first result
    pub offset: u32,
    /// Page size; the source's default when `None`
    pub limit: Option<u32>,
}

impl SearchQuery {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: SearchKind::All,
            offset: 0,
            limit: None,
        }
    }

    #[must_use]
    pub const fn with_kind(mut self, kind: SearchKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn at_offset(&self, offset: u32) -> Self {
        Self {
            offset,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn page(&self) -> PageRequest {
        PageRequest {
            offset: self.offset,
            limit: self.limit,
        }
    }
}

/// Which slice of a paged listing to load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u32,
    pub limit: Option<u32>,
}

impl PageRequest {
    #[must_use]
    pub const fn first() -> Self {
        Self {
            offset: 0,
            limit: None,
        }
    }

    #[must_use]
    pub const fn at(offset: u32) -> Self {
        Self {
            offset,
            limit: None,
        }
    }

    #[must_use]
    pub fn limit_or(&self, default: u32) -> u32 {
        self.limit.filter(|l| *l > 0).unwrap_or(default)
    }
}

/// A media source the host can browse.
///
/// Listing operations (`home`, `search*`, `live_streams`) never fail: they
/// degrade to an empty page carrying a message. Lookups propagate typed errors
/// so the host can tell "not found" from "empty".
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Stable identifier, e.g. `jamendo`
    fn id(&self) -> &'static str;

    /// Human-readable name
    fn name(&self) -> &'static str;

    /// Human-readable description of the source
    fn description(&self) -> &'static str;

    /// Default number of items per page
    fn page_size(&self) -> u32;

    /// Whether listings can ever have a next page
    fn paginates(&self) -> bool;

    /// Home feed
    async fn home(&self, page: PageRequest, ctx: &mut SourceContext) -> Page<ContentItem>;

    /// Free-text search
    async fn search(&self, query: &SearchQuery, ctx: &mut SourceContext) -> Page<ContentItem>;

    /// Search restricted to channels
    async fn search_channels(
        &self,
        _query: &SearchQuery,
        _ctx: &mut SourceContext,
    ) -> Page<ChannelRecord> {
        Page::empty()
    }

    /// Search restricted to playlists
    async fn search_playlists(
        &self,
        _query: &SearchQuery,
        _ctx: &mut SourceContext,
    ) -> Page<CollectionRecord> {
        Page::empty()
    }

    /// Channel with a page of its media
    async fn channel(
        &self,
        id: &str,
        page: PageRequest,
        ctx: &mut SourceContext,
    ) -> Result<ChannelDetails>;

    /// Playlist with a page of its media
    async fn playlist(
        &self,
        _id: &str,
        _page: PageRequest,
        _ctx: &mut SourceContext,
    ) -> Result<PlaylistDetails> {
        Err(Error::Unsupported {
            source_id: self.id().to_string(),
            operation: "playlist".to_string(),
        })
    }

    /// Full record with playable streams
    async fn content_details(&self, url: &str, ctx: &mut SourceContext) -> Result<MediaRecord>;

    /// Currently airing live streams
    async fn live_streams(
        &self,
        _page: PageRequest,
        _ctx: &mut SourceContext,
    ) -> Page<MediaRecord> {
        Page::empty()
    }
}
