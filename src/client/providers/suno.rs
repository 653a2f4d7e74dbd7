use super::traits::{MediaSource, PageRequest, SearchKind, SearchQuery};
use crate::client::records::{
    AuthorLink, ChannelDetails, ChannelRecord, CollectionRecord, ContentItem, MediaRecord, Page,
    PlaylistDetails, StreamDescriptor, StreamKind, Thumbnail,
};
use crate::client::validator::{ResponseShape, ValidatedResponse};
use crate::client::{ApiRequest, HttpClientConfig, ResilientCaller};
use crate::config::{Config, SunoConfig};
use crate::context::SourceContext;
use crate::mapping::{self, lenient, MapOptions, MissingTimestamp};
use crate::resilience::{CredentialPool, RetryConfig};
use crate::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

const SOURCE_ID: &str = "suno";
const POPULAR_ID: &str = "popular_songs";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SunoUser {
    #[serde(deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub handle: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub display_name: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub avatar_url: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SunoClipMetadata {
    #[serde(deserialize_with = "lenient::string")]
    pub prompt: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub tags: Option<String>,
    /// Seconds
    #[serde(deserialize_with = "lenient::float")]
    pub duration: Option<f64>,
}

/// Generated song
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SunoClip {
    #[serde(deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub image_url: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub audio_url: Option<String>,
    /// Seconds
    #[serde(deserialize_with = "lenient::float")]
    pub duration: Option<f64>,
    #[serde(deserialize_with = "lenient::string")]
    pub gpt_description_prompt: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub created_at: Option<String>,
    #[serde(deserialize_with = "lenient::unsigned")]
    pub play_count: Option<u64>,
    #[serde(deserialize_with = "lenient::unsigned")]
    pub upvote_count: Option<u64>,
    #[serde(deserialize_with = "lenient::string")]
    pub model_name: Option<String>,
    #[serde(deserialize_with = "lenient::object")]
    pub metadata: Option<SunoClipMetadata>,
    #[serde(deserialize_with = "lenient::object")]
    pub user: Option<SunoUser>,
    // Some endpoints flatten the author onto the clip
    #[serde(deserialize_with = "lenient::string")]
    pub user_id: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub handle: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub display_name: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub avatar_image_url: Option<String>,
}

impl SunoClip {
    fn author(&self) -> SunoUser {
        let user = self.user.clone().unwrap_or_default();
        SunoUser {
            id: user.id.or_else(|| self.user_id.clone()),
            handle: user.handle.or_else(|| self.handle.clone()),
            display_name: user.display_name.or_else(|| self.display_name.clone()),
            avatar_url: user.avatar_url.or_else(|| self.avatar_image_url.clone()),
            bio: user.bio,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SunoPlaylist {
    #[serde(deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub image_url: Option<String>,
    #[serde(deserialize_with = "lenient::unsigned")]
    pub clip_count: Option<u64>,
    #[serde(deserialize_with = "lenient::unsigned")]
    pub num_total_results: Option<u64>,
    #[serde(deserialize_with = "lenient::object")]
    pub user: Option<SunoUser>,
}

/// Field mapping for Suno records
#[derive(Debug, Clone)]
pub struct SunoMapper {
    site_url: String,
    cdn_url: String,
    options: MapOptions,
}

impl SunoMapper {
    #[must_use]
    pub fn new(config: &SunoConfig, options: MapOptions) -> Self {
        Self {
            site_url: config.site_url.trim_end_matches('/').to_string(),
            cdn_url: config.cdn_url.trim_end_matches('/').to_string(),
            options,
        }
    }

    fn profile_url(&self, handle: &str) -> String {
        format!("{}/@{}", self.site_url, handle)
    }

    fn author(&self, user: &SunoUser) -> AuthorLink {
        AuthorLink {
            id: user
                .id
                .clone()
                .or_else(|| user.handle.clone())
                .unwrap_or_default(),
            name: mapping::name_or(user.display_name.clone(), "Unknown"),
            url: user
                .handle
                .as_deref()
                .map(|handle| self.profile_url(handle))
                .unwrap_or_default(),
            avatar: user.avatar_url.clone().unwrap_or_default(),
        }
    }

    /// Artwork, or the CDN rendition keyed by clip id
    #[must_use]
    pub fn clip_image(&self, id: &str, image_url: Option<String>) -> String {
        image_url
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| format!("{}/image_{}.jpeg?width=360", self.cdn_url, id))
    }

    pub fn clip(&self, clip: SunoClip) -> Result<MediaRecord> {
        let id = mapping::require_id("clip", clip.id.clone())?;
        let author = self.author(&clip.author());
        let url = format!("{}/song/{}", self.site_url, id);
        let metadata = clip.metadata.unwrap_or_default();
        let seconds = clip.duration.or(metadata.duration);

        let mut extra = BTreeMap::new();
        if let Some(tags) = metadata.tags.filter(|t| !t.is_empty()) {
            extra.insert("style".to_string(), tags);
        }
        if let Some(model) = clip.model_name {
            extra.insert("model".to_string(), model);
        }

        Ok(MediaRecord {
            platform: SOURCE_ID.to_string(),
            name: mapping::name_or(clip.title, "Untitled"),
            author,
            share_url: url.clone(),
            url,
            thumbnails: vec![Thumbnail::new(self.clip_image(&id, clip.image_url), 360, 360)],
            duration_ms: mapping::duration_ms(seconds),
            view_count: clip.play_count.unwrap_or(0),
            like_count: clip.upvote_count.unwrap_or(0),
            published_at_ms: self.options.timestamp(clip.created_at.as_deref()),
            description: metadata
                .prompt
                .or(clip.gpt_description_prompt)
                .unwrap_or_default(),
            streams: clip
                .audio_url
                .filter(|url| !url.is_empty())
                .map(|url| StreamDescriptor {
                    kind: StreamKind::Audio,
                    url,
                    name: "MP3".to_string(),
                    container: "audio/mpeg".to_string(),
                    codec: "mp3".to_string(),
                    bitrate: 0,
                    width: None,
                    height: None,
                    language: None,
                })
                .into_iter()
                .collect(),
            metadata: extra,
            id,
            ..Default::default()
        })
    }

    /// Clip that must be playable
    pub fn clip_details(&self, clip: SunoClip) -> Result<MediaRecord> {
        let record = self.clip(clip)?;
        if record.streams.is_empty() {
            return Err(Error::NoPlayableStreams {
                id: record.id,
                reason: "clip has no audio_url".to_string(),
            });
        }
        Ok(record)
    }

    pub fn user(&self, user: SunoUser) -> Result<ChannelRecord> {
        let id = mapping::require_id("user", user.id.clone().or_else(|| user.handle.clone()))?;
        let handle = user.handle.clone().unwrap_or_else(|| id.clone());

        Ok(ChannelRecord {
            platform: SOURCE_ID.to_string(),
            name: mapping::name_or(user.display_name.or(user.handle), "Unknown"),
            url: self.profile_url(&handle),
            thumbnail: user.avatar_url.unwrap_or_default(),
            description: user.bio.unwrap_or_default(),
            subscribers: None,
            id,
        })
    }

    pub fn playlist(&self, playlist: SunoPlaylist) -> Result<CollectionRecord> {
        let id = mapping::require_id("playlist", playlist.id)?;

        Ok(CollectionRecord {
            platform: SOURCE_ID.to_string(),
            name: mapping::name_or(playlist.name, "Untitled Playlist"),
            author: self.author(&playlist.user.unwrap_or_default()),
            url: format!("{}/playlist/{}", self.site_url, id),
            thumbnail: playlist.image_url.unwrap_or_default(),
            item_count: playlist
                .clip_count
                .or(playlist.num_total_results)
                .unwrap_or(0),
            items: Vec::new(),
            description: playlist.description.unwrap_or_default(),
            id,
        })
    }

    /// Home feed entry bundling the most popular songs
    #[must_use]
    pub fn popular(&self, songs: Vec<MediaRecord>) -> CollectionRecord {
        CollectionRecord {
            id: POPULAR_ID.to_string(),
            platform: SOURCE_ID.to_string(),
            name: "Popular Songs".to_string(),
            author: AuthorLink {
                id: "suno".to_string(),
                name: "Suno".to_string(),
                url: self.site_url.clone(),
                avatar: String::new(),
            },
            url: format!("{}/search?type=song", self.site_url),
            thumbnail: format!("{}/image_placeholder.jpeg", self.cdn_url),
            item_count: songs.len() as u64,
            items: songs,
            description: String::new(),
        }
    }
}

/// Upstream `type` filter for a search kind
#[must_use]
pub const fn search_type(kind: SearchKind) -> Option<&'static str> {
    match kind {
        SearchKind::All => None,
        SearchKind::Media => Some("song"),
        SearchKind::Channels => Some("user"),
        SearchKind::Playlists => Some("playlist"),
    }
}

/// Clip id from a song URL or a bare id
pub fn clip_id(url_or_id: &str) -> Result<String> {
    let song = Regex::new(r"/song/([0-9A-Za-z-]+)").map_err(|e| Error::InvalidInput {
        field: "pattern".to_string(),
        reason: e.to_string(),
    })?;
    if let Some(id) = song.captures(url_or_id).and_then(|c| c.get(1)) {
        return Ok(id.as_str().to_string());
    }

    let bare = url_or_id.trim();
    if !bare.is_empty() && bare.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Ok(bare.to_string());
    }

    Err(Error::invalid_input(
        "url",
        format!("Not a Suno song URL or clip id: {url_or_id}"),
    ))
}

fn array_at<'a>(response: &'a ValidatedResponse, pointer: &str) -> &'a [Value] {
    response
        .body
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Playlist entries are either clips or `{ "clip": {...} }` wrappers
fn playlist_entries(response: &ValidatedResponse) -> Vec<Value> {
    if !response.results.is_empty() {
        return response.results.clone();
    }
    array_at(response, "/playlist_clips")
        .iter()
        .map(|entry| entry.get("clip").cloned().unwrap_or_else(|| entry.clone()))
        .collect()
}

/// Suno studio search and catalogue
pub struct SunoSource {
    caller: ResilientCaller,
    config: SunoConfig,
    missing_timestamp: MissingTimestamp,
}

impl SunoSource {
    #[must_use]
    pub fn new(
        config: SunoConfig,
        client: Client,
        retry: RetryConfig,
        missing_timestamp: MissingTimestamp,
    ) -> Self {
        let caller = ResilientCaller::new(SOURCE_ID, client, CredentialPool::empty(), retry)
            .with_default_shape(ResponseShape::results_at("/clips"));
        Self {
            caller,
            config,
            missing_timestamp,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = HttpClientConfig::from(&config.http).build()?;
        Ok(Self::new(
            config.suno.clone(),
            client,
            config.retry.to_retry_config(),
            config.mapping.missing_timestamp,
        ))
    }

    fn mapper(&self) -> SunoMapper {
        SunoMapper::new(&self.config, MapOptions::new(self.missing_timestamp))
    }

    async fn search_request(
        &self,
        text: &str,
        kind: SearchKind,
        offset: u32,
        limit: u32,
        ctx: &mut SourceContext,
    ) -> Result<ValidatedResponse> {
        let mut request = ApiRequest::endpoint(&self.config.search_url, "/api/search/")?
            .param("q", text)
            .param("limit", limit);
        if offset > 0 {
            request = request.param("offset", offset);
        }
        if let Some(kind) = search_type(kind) {
            request = request.param("type", kind);
        }
        self.caller.get_json(&request, ctx).await
    }

    async fn try_home(&self, ctx: &mut SourceContext) -> Result<Page<ContentItem>> {
        let response = self
            .search_request("", SearchKind::Media, 0, self.config.page_size, ctx)
            .await?;
        let mapper = self.mapper();
        let songs = mapping::map_batch("clip", &response.results, |clip: SunoClip| mapper.clip(clip));

        if songs.is_empty() {
            debug!("No popular songs returned");
            return Ok(Page::empty());
        }
        info!("Home feed has {} popular songs", songs.len());
        Ok(Page::complete(vec![ContentItem::Collection(mapper.popular(songs))]))
    }

    async fn try_search(&self, query: &SearchQuery, ctx: &mut SourceContext) -> Result<Page<ContentItem>> {
        let limit = query.limit.unwrap_or(self.config.page_size);
        let response = self
            .search_request(&query.text, query.kind, query.offset, limit, ctx)
            .await?;
        let mapper = self.mapper();

        let clips = mapping::map_batch("clip", &response.results, |clip: SunoClip| mapper.clip(clip));
        let mut raw = response.results.len();
        let mut items: Vec<ContentItem> = clips.into_iter().map(ContentItem::Media).collect();

        if matches!(query.kind, SearchKind::All | SearchKind::Channels) {
            let users = array_at(&response, "/users");
            raw += users.len();
            items.extend(
                mapping::map_batch("user", users, |user: SunoUser| mapper.user(user))
                    .into_iter()
                    .map(ContentItem::Channel),
            );
        }
        if matches!(query.kind, SearchKind::All | SearchKind::Playlists) {
            let playlists = array_at(&response, "/playlists");
            raw += playlists.len();
            items.extend(
                mapping::map_batch("playlist", playlists, |p: SunoPlaylist| mapper.playlist(p))
                    .into_iter()
                    .map(ContentItem::Collection),
            );
        }

        info!("Found {} results for query '{}'", items.len(), query.text);
        let more = raw >= limit as usize && raw > 0;
        Ok(Page::paged(items, more, query.offset.saturating_add(limit)))
    }

    /// Fetch several clips, skipping ids that fail
    pub async fn clips(&self, ids: &[&str], ctx: &mut SourceContext) -> Vec<MediaRecord> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.content_details(id, ctx).await {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping clip {}: {}", id, e),
            }
        }
        records
    }
}

#[async_trait]
impl MediaSource for SunoSource {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    fn name(&self) -> &'static str {
        "Suno"
    }

    fn description(&self) -> &'static str {
        "AI-generated songs, artists and playlists from Suno"
    }

    fn page_size(&self) -> u32 {
        self.config.page_size
    }

    fn paginates(&self) -> bool {
        true
    }

    #[instrument(skip(self, ctx), fields(source = SOURCE_ID))]
    async fn home(&self, _page: PageRequest, ctx: &mut SourceContext) -> Page<ContentItem> {
        match self.try_home(ctx).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Error fetching popular songs: {}", e);
                Page::degraded(format!("Could not load popular songs. {e}"))
            }
        }
    }

    #[instrument(skip(self, ctx), fields(source = SOURCE_ID, query = %query.text))]
    async fn search(&self, query: &SearchQuery, ctx: &mut SourceContext) -> Page<ContentItem> {
        match self.try_search(query, ctx).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Search failed: {}", e);
                Page::degraded("Failed to perform search. Please try again.")
            }
        }
    }

    async fn search_channels(
        &self,
        query: &SearchQuery,
        ctx: &mut SourceContext,
    ) -> Page<ChannelRecord> {
        let query = query.clone().with_kind(SearchKind::Channels);
        self.search(&query, ctx).await.filter_map(|item| match item {
            ContentItem::Channel(channel) => Some(channel),
            _ => None,
        })
    }

    async fn search_playlists(
        &self,
        query: &SearchQuery,
        ctx: &mut SourceContext,
    ) -> Page<CollectionRecord> {
        let query = query.clone().with_kind(SearchKind::Playlists);
        self.search(&query, ctx).await.filter_map(|item| match item {
            ContentItem::Collection(playlist) => Some(playlist),
            _ => None,
        })
    }

    #[instrument(skip(self, _page, ctx), fields(source = SOURCE_ID))]
    async fn channel(
        &self,
        id: &str,
        _page: PageRequest,
        ctx: &mut SourceContext,
    ) -> Result<ChannelDetails> {
        let handle = id.trim().trim_start_matches('@');
        if handle.is_empty() {
            return Err(Error::invalid_input("id", "Channel id must not be empty"));
        }

        let request = ApiRequest::endpoint(
            &self.config.api_url,
            &format!("/api/profiles/{}/recent_clips", urlencoding::encode(handle)),
        )?;
        let response = self.caller.get_json(&request, ctx).await?;

        let mapper = self.mapper();
        let clips: Vec<SunoClip> =
            mapping::map_batch("clip", &response.results, |clip: SunoClip| Ok(clip));
        let profile = clips.first().map(SunoClip::author).unwrap_or_default();
        let videos: Vec<MediaRecord> = clips
            .into_iter()
            .filter_map(|clip| match mapper.clip(clip) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Dropping clip record: {}", e);
                    None
                }
            })
            .collect();
        info!("Channel {} has {} recent clips", handle, videos.len());

        Ok(ChannelDetails {
            channel: ChannelRecord {
                id: handle.to_string(),
                platform: SOURCE_ID.to_string(),
                name: mapping::name_or(profile.display_name, handle),
                url: mapper.profile_url(handle),
                thumbnail: profile.avatar_url.unwrap_or_default(),
                description: String::new(),
                subscribers: None,
            },
            links: Vec::new(),
            videos: Page::complete(videos),
        })
    }

    #[instrument(skip(self, _page, ctx), fields(source = SOURCE_ID))]
    async fn playlist(
        &self,
        id: &str,
        _page: PageRequest,
        ctx: &mut SourceContext,
    ) -> Result<PlaylistDetails> {
        let request = ApiRequest::endpoint(
            &self.config.api_url,
            &format!("/api/playlists/{}/", urlencoding::encode(id)),
        )?;
        let response = self.caller.get_json(&request, ctx).await?;

        let playlist: SunoPlaylist = serde_json::from_value(response.body.clone())?;
        if playlist.id.is_none() {
            return Err(Error::not_found("Playlist", id));
        }

        let mapper = self.mapper();
        let videos = mapping::map_batch("clip", &playlist_entries(&response), |clip: SunoClip| {
            mapper.clip(clip)
        });
        let mut collection = mapper.playlist(playlist)?;
        if collection.item_count == 0 {
            collection.item_count = videos.len() as u64;
        }
        info!("Playlist {} has {} clips", id, videos.len());

        Ok(PlaylistDetails {
            playlist: collection,
            videos: Page::complete(videos),
            metadata: BTreeMap::new(),
        })
    }

    #[instrument(skip(self, ctx), fields(source = SOURCE_ID))]
    async fn content_details(&self, url: &str, ctx: &mut SourceContext) -> Result<MediaRecord> {
        let id = clip_id(url)?;
        let request = ApiRequest::endpoint(&self.config.api_url, &format!("/api/clips/{id}/"))?;
        let response = self.caller.get_json(&request, ctx).await?;

        let clip: SunoClip = serde_json::from_value(response.body)?;
        if clip.id.is_none() {
            return Err(Error::not_found("Clip", id));
        }
        self.mapper().clip_details(clip)
    }
}
