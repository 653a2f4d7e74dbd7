use super::traits::{MediaSource, PageRequest, SearchKind, SearchQuery};
use crate::client::records::{
    AuthorLink, ChannelDetails, ChannelRecord, CollectionRecord, ContentItem, Link, MediaRecord,
    Page, PlaylistDetails, StreamDescriptor, StreamKind, Thumbnail,
};
use crate::client::validator::{FailureProbe, ResponseShape, ValidatedResponse};
use crate::client::{ApiRequest, HttpClientConfig, ResilientCaller};
use crate::config::{Config, JamendoConfig};
use crate::context::SourceContext;
use crate::mapping::{self, lenient, MapOptions, MissingTimestamp, TOP_TAG_COUNT};
use crate::resilience::{CredentialPlacement, CredentialPool, RetryConfig};
use crate::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

const SOURCE_ID: &str = "jamendo";

const HOME_FIELDS: &str = "id,name,duration,artist_id,artist_name,album_image,audio,shareurl,listens";
const SEARCH_FIELDS: &str = "id,name,duration,artist_id,artist_name,artist_idstr,album_name,album_id,releasedate,album_image,audio,audiodownload,shareurl,musicinfo,likes,downloads,listens";
const LIST_FIELDS: &str = "id,name,duration,artist_id,artist_name,album_name,album_id,releasedate,album_image,audio,audiodownload,shareurl,likes,downloads,listens";
const DETAIL_FIELDS: &str = "id,name,duration,artist_id,artist_name,artist_idstr,album_name,album_id,releasedate,album_image,artist_image,audio,audiodownload,shareurl,musicinfo,likes,downloads,listens,tags,lyrics";
const ARTIST_FIELDS: &str = "id,name,image,website,fans";
const ARTIST_DETAIL_FIELDS: &str = "id,name,image,website,fans,joindate,track_count,album_count";
const ALBUM_FIELDS: &str = "id,name,artist_id,artist_name,releasedate,image,tracks_count";
const ALBUM_DETAIL_FIELDS: &str = "id,name,artist_id,artist_name,releasedate,image,tracks_count,genre,tags,upc,artist_idstr";

/// Nominal bitrate of Jamendo's `mp32` streams
const MP3_BITRATE: u32 = 192_000;
/// Tracks at or under this many seconds are flagged as shorts
const SHORT_TRACK_SECS: f64 = 60.0;

/// Track as returned by `/tracks`, `/artists/tracks` and `/albums/tracks`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JamendoTrack {
    #[serde(deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::float")]
    pub duration: Option<f64>,
    #[serde(deserialize_with = "lenient::string")]
    pub artist_id: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub artist_idstr: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub artist_name: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub artist_image: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub album_id: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub album_name: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub album_image: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub image: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub releasedate: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub audio: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub audiodownload: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub shareurl: Option<String>,
    #[serde(deserialize_with = "lenient::unsigned")]
    pub downloads: Option<u64>,
    #[serde(deserialize_with = "lenient::unsigned")]
    pub listens: Option<u64>,
    #[serde(deserialize_with = "lenient::unsigned")]
    pub likes: Option<u64>,
    #[serde(deserialize_with = "lenient::object")]
    pub musicinfo: Option<MusicInfo>,
    #[serde(deserialize_with = "lenient::tags")]
    pub tags: BTreeMap<String, f64>,
    pub lyrics: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MusicInfo {
    /// Plain string or a per-language object such as `{"en": "..."}`
    pub description: Option<Value>,
}

impl MusicInfo {
    fn description(&self) -> Option<String> {
        match self.description.as_ref()? {
            Value::Object(localized) => localized
                .get("en")
                .and_then(lenient::value_to_string)
                .or_else(|| localized.values().find_map(lenient::value_to_string)),
            other => lenient::value_to_string(other),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JamendoArtist {
    #[serde(deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub image: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub website: Option<String>,
    #[serde(deserialize_with = "lenient::signed")]
    pub fans: Option<i64>,
    #[serde(deserialize_with = "lenient::string")]
    pub joindate: Option<String>,
    #[serde(deserialize_with = "lenient::unsigned")]
    pub track_count: Option<u64>,
    #[serde(deserialize_with = "lenient::unsigned")]
    pub album_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JamendoAlbum {
    #[serde(deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub artist_id: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub artist_idstr: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub artist_name: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub releasedate: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub image: Option<String>,
    #[serde(deserialize_with = "lenient::unsigned")]
    pub tracks_count: Option<u64>,
    #[serde(deserialize_with = "lenient::string")]
    pub genre: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub upc: Option<String>,
    #[serde(deserialize_with = "lenient::tags")]
    pub tags: BTreeMap<String, f64>,
}

/// Field mapping for Jamendo records
#[derive(Debug, Clone)]
pub struct JamendoMapper {
    site_url: String,
    image_proxy: String,
    options: MapOptions,
}

impl JamendoMapper {
    #[must_use]
    pub fn new(config: &JamendoConfig, options: MapOptions) -> Self {
        Self {
            site_url: config.site_url.trim_end_matches('/').to_string(),
            image_proxy: config.image_proxy.clone(),
            options,
        }
    }

    fn image(&self, raw: Option<&str>) -> Option<String> {
        mapping::thumbnail_url(raw, &self.image_proxy)
    }

    fn artist_url(&self, id: &str) -> String {
        format!("{}/artist/{}", self.site_url, id)
    }

    /// Track to canonical media record
    pub fn track(&self, track: JamendoTrack) -> Result<MediaRecord> {
        let id = mapping::require_id("track", track.id)?;
        let artist_id = track.artist_id.unwrap_or_else(|| "unknown".to_string());
        let url = track
            .shareurl
            .unwrap_or_else(|| format!("{}/track/{}", self.site_url, id));
        let thumbnail = self.image(track.album_image.as_deref().or(track.image.as_deref()));

        Ok(MediaRecord {
            platform: SOURCE_ID.to_string(),
            name: mapping::name_or(track.name, "Unknown Track"),
            author: AuthorLink {
                url: self.artist_url(track.artist_idstr.as_deref().unwrap_or(&artist_id)),
                id: artist_id,
                name: mapping::name_or(track.artist_name, "Unknown Artist"),
                avatar: track.artist_image.unwrap_or_default(),
            },
            share_url: url.clone(),
            url,
            thumbnails: Thumbnail::list(thumbnail, 300, 300),
            duration_ms: mapping::duration_ms(track.duration),
            view_count: mapping::popularity(track.downloads, track.listens),
            like_count: track.likes.unwrap_or(0),
            is_live: false,
            published_at_ms: self.options.timestamp(track.releasedate.as_deref()),
            description: track
                .musicinfo
                .as_ref()
                .and_then(MusicInfo::description)
                .unwrap_or_default(),
            id,
            ..Default::default()
        })
    }

    /// Track with description, streams and album metadata for playback
    pub fn track_details(&self, track: JamendoTrack) -> Result<MediaRecord> {
        let stream_url = track.audio.clone().or_else(|| track.audiodownload.clone());
        let duration = track.duration;
        let has_lyrics = track
            .lyrics
            .as_ref()
            .and_then(|l| l.get("lyrics"))
            .and_then(lenient::value_to_string)
            .is_some();

        let mut description = Vec::new();
        if let Some(text) = track.musicinfo.as_ref().and_then(MusicInfo::description) {
            description.push(format!("{text}\n"));
        }
        if let Some(date) = &track.releasedate {
            description.push(format!("Released: {date}"));
        }
        let tags = mapping::top_tags(&track.tags, TOP_TAG_COUNT);
        if !tags.is_empty() {
            description.push(format!("Tags: {tags}"));
        }
        if has_lyrics {
            description.push("\nLyrics available".to_string());
        }

        let mut metadata = BTreeMap::new();
        if let Some(album_name) = &track.album_name {
            metadata.insert("albumName".to_string(), album_name.clone());
            if let Some(album_id) = &track.album_id {
                metadata.insert("albumId".to_string(), album_id.clone());
                metadata.insert(
                    "albumUrl".to_string(),
                    format!("{}/album/{}", self.site_url, album_id),
                );
            }
        }
        let is_short = duration.is_some_and(|secs| secs <= SHORT_TRACK_SECS);
        metadata.insert("isShort".to_string(), is_short.to_string());
        metadata.insert("hasLyrics".to_string(), has_lyrics.to_string());

        // Only absolute artwork is usable for playback screens
        let artwork = track
            .album_image
            .clone()
            .or_else(|| track.image.clone())
            .filter(|u| u.starts_with("http"));

        let mut record = self.track(track)?;
        let Some(stream_url) = stream_url else {
            return Err(Error::NoPlayableStreams {
                id: record.id,
                reason: "track has no audio URL".to_string(),
            });
        };

        record.description = description.join("\n").trim().to_string();
        record.thumbnails = Thumbnail::list(artwork, 300, 300);
        record.metadata = metadata;
        record.streams = vec![StreamDescriptor {
            kind: StreamKind::Audio,
            url: stream_url,
            name: "MP3".to_string(),
            container: "audio/mpeg".to_string(),
            codec: "mp3".to_string(),
            bitrate: MP3_BITRATE,
            ..Default::default()
        }];
        Ok(record)
    }

    /// Artist to canonical channel record
    pub fn artist(&self, artist: JamendoArtist) -> Result<ChannelRecord> {
        let id = mapping::require_id("artist", artist.id)?;
        Ok(ChannelRecord {
            platform: SOURCE_ID.to_string(),
            name: mapping::name_or(artist.name, "Unknown Artist"),
            url: self.artist_url(&id),
            thumbnail: self.image(artist.image.as_deref()).unwrap_or_default(),
            description: artist.website.unwrap_or_default(),
            subscribers: mapping::subscribers(artist.fans),
            id,
        })
    }

    /// Album to canonical collection record, without items
    pub fn album(&self, album: JamendoAlbum) -> Result<CollectionRecord> {
        let id = mapping::require_id("album", album.id)?;
        let artist_id = album.artist_id.unwrap_or_default();

        Ok(CollectionRecord {
            platform: SOURCE_ID.to_string(),
            name: mapping::name_or(album.name, "Unknown Album"),
            author: AuthorLink {
                url: self.artist_url(album.artist_idstr.as_deref().unwrap_or(&artist_id)),
                id: artist_id,
                name: mapping::name_or(album.artist_name, "Unknown Artist"),
                avatar: String::new(),
            },
            url: format!("{}/album/{}", self.site_url, id),
            thumbnail: self.image(album.image.as_deref()).unwrap_or_default(),
            item_count: album.tracks_count.unwrap_or(0),
            items: Vec::new(),
            description: album
                .releasedate
                .map(|date| format!("Released: {date}"))
                .unwrap_or_default(),
            id,
        })
    }

    fn tracks(&self, values: &[Value]) -> Vec<MediaRecord> {
        mapping::map_batch("track", values, |track: JamendoTrack| self.track(track))
    }
}

/// `has_more` from the response headers, or from a full page when the count is absent
fn has_more(response: &ValidatedResponse, offset: u32, limit: u32) -> bool {
    let raw = response.results.len() as u64;
    let total = response
        .count_at("/headers/results_fullcount")
        .or_else(|| response.count_at("/headers/results_count"));

    match total {
        Some(total) => total > u64::from(offset) + raw,
        None => raw >= u64::from(limit),
    }
}

/// Extract the numeric track id from a Jamendo URL
pub fn track_id_from_url(url: &str) -> Result<String> {
    let pattern = Regex::new(r"track/(\d+)").map_err(|e| Error::InvalidInput {
        field: "pattern".to_string(),
        reason: e.to_string(),
    })?;

    pattern
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            Error::invalid_input("url", "Invalid track URL. Expected format: .../track/123")
        })
}

/// Jamendo music catalogue
pub struct JamendoSource {
    caller: ResilientCaller,
    config: JamendoConfig,
    missing_timestamp: MissingTimestamp,
}

impl JamendoSource {
    #[must_use]
    pub fn new(
        config: JamendoConfig,
        client: Client,
        retry: RetryConfig,
        missing_timestamp: MissingTimestamp,
    ) -> Self {
        let credentials = CredentialPool::new(
            config.client_ids.clone(),
            CredentialPlacement::Query("client_id".to_string()),
        );
        let caller = ResilientCaller::new(SOURCE_ID, client, credentials, retry)
            .with_fixed_params(&[("format", "json".into()), ("limit", config.page_size.into())])
            .with_default_shape(ResponseShape::default().with_failure(FailureProbe::new(
                "/headers/status",
                "failed",
                "/headers/error_message",
            )));

        Self {
            caller,
            config,
            missing_timestamp,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = HttpClientConfig::from(&config.http).build()?;
        Ok(Self::new(
            config.jamendo.clone(),
            client,
            config.retry.to_retry_config(),
            config.mapping.missing_timestamp,
        ))
    }

    fn mapper(&self) -> JamendoMapper {
        JamendoMapper::new(&self.config, MapOptions::new(self.missing_timestamp))
    }

    fn request(&self, path: &str) -> Result<ApiRequest> {
        ApiRequest::endpoint(&self.config.base_url, path)
    }

    async fn try_home(&self, page: PageRequest, ctx: &mut SourceContext) -> Result<Page<ContentItem>> {
        let limit = page.limit_or(self.config.page_size);
        let request = self
            .request("/tracks")?
            .param("order", "popularity_total")
            .param("offset", page.offset)
            .param("limit", limit)
            .param("audioformat", "mp32")
            .param("fields", HOME_FIELDS);

        let mut response = self.caller.get_json(&request, ctx).await?;
        // Past the first page an empty result is the end of the catalogue
        if response.is_empty() && page.offset == 0 {
            debug!("No results with full query, trying basic query");
            let basic = self
                .request("/tracks")?
                .param("order", "popularity_total")
                .param("limit", limit);
            response = self.caller.get_json(&basic, ctx).await?;
        }

        let more = response.results.len() >= limit as usize;
        let videos = self.mapper().tracks(&response.results);
        info!("Loaded {} popular tracks, has more: {}", videos.len(), more);

        if videos.is_empty() {
            return Ok(Page::empty());
        }
        Ok(Page::paged(
            videos.into_iter().map(ContentItem::Media).collect(),
            more,
            page.offset.saturating_add(limit),
        ))
    }

    async fn try_search_tracks(
        &self,
        query: &SearchQuery,
        ctx: &mut SourceContext,
    ) -> Result<Page<MediaRecord>> {
        let limit = query.limit.unwrap_or(self.config.page_size);
        let request = self
            .request("/tracks")?
            .param("search", query.text.as_str())
            .param("offset", query.offset)
            .param("limit", limit)
            .param("include", "musicinfo")
            .param("fields", SEARCH_FIELDS)
            .param("audioformat", "mp32")
            .param("fullcount", "true");

        let response = self.caller.get_json(&request, ctx).await?;
        let more = has_more(&response, query.offset, limit);
        let videos = self.mapper().tracks(&response.results);
        info!(
            "Found {} tracks for query '{}', has more: {}",
            videos.len(),
            query.text,
            more
        );
        Ok(Page::paged(videos, more, query.offset.saturating_add(limit)))
    }

    async fn try_search_channels(
        &self,
        query: &SearchQuery,
        ctx: &mut SourceContext,
    ) -> Result<Page<ChannelRecord>> {
        let limit = query.limit.unwrap_or(self.config.page_size);
        let request = self
            .request("/artists")?
            .param("name", query.text.as_str())
            .param("offset", query.offset)
            .param("limit", limit)
            .param("fields", ARTIST_FIELDS)
            .param("hasimage", "1")
            .param("fullcount", "true");

        let response = self.caller.get_json(&request, ctx).await?;
        let more = has_more(&response, query.offset, limit);
        let mapper = self.mapper();
        let channels = mapping::map_batch("artist", &response.results, |artist: JamendoArtist| {
            mapper.artist(artist)
        });
        info!("Found {} artists for query '{}'", channels.len(), query.text);
        Ok(Page::paged(channels, more, query.offset.saturating_add(limit)))
    }

    async fn try_search_playlists(
        &self,
        query: &SearchQuery,
        ctx: &mut SourceContext,
    ) -> Result<Page<CollectionRecord>> {
        let limit = query.limit.unwrap_or(self.config.page_size);
        let request = self
            .request("/albums")?
            .param("name", query.text.as_str())
            .param("offset", query.offset)
            .param("limit", limit)
            .param("fields", ALBUM_FIELDS)
            .param("hasimage", "1")
            .param("order", "releasedate_desc")
            .param("fullcount", "true");

        let response = self.caller.get_json(&request, ctx).await?;
        let more = has_more(&response, query.offset, limit);
        let mapper = self.mapper();
        let albums = mapping::map_batch("album", &response.results, |album: JamendoAlbum| {
            mapper.album(album)
        });
        info!("Found {} albums for query '{}'", albums.len(), query.text);
        Ok(Page::paged(albums, more, query.offset.saturating_add(limit)))
    }
}

fn first_record<T: serde::de::DeserializeOwned>(
    response: &ValidatedResponse,
    entity: &str,
    id: &str,
) -> Result<T> {
    let value = response
        .first()
        .ok_or_else(|| Error::not_found(entity, id))?;
    serde_json::from_value(value.clone()).map_err(|e| Error::InvalidResponse {
        context: SOURCE_ID.to_string(),
        message: format!("{entity} {id}: {e}"),
    })
}

#[async_trait]
impl MediaSource for JamendoSource {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    fn name(&self) -> &'static str {
        "Jamendo"
    }

    fn description(&self) -> &'static str {
        "Free, Creative Commons licensed music from independent artists"
    }

    fn page_size(&self) -> u32 {
        self.config.page_size
    }

    fn paginates(&self) -> bool {
        true
    }

    #[instrument(skip(self, ctx), fields(source = SOURCE_ID))]
    async fn home(&self, page: PageRequest, ctx: &mut SourceContext) -> Page<ContentItem> {
        match self.try_home(page, ctx).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Home feed failed: {}", e);
                Page::degraded(format!("Could not load the home feed. {e}"))
            }
        }
    }

    #[instrument(skip(self, ctx), fields(source = SOURCE_ID, query = %query.text))]
    async fn search(&self, query: &SearchQuery, ctx: &mut SourceContext) -> Page<ContentItem> {
        match query.kind {
            SearchKind::Channels => self.search_channels(query, ctx).await.map(ContentItem::Channel),
            SearchKind::Playlists => {
                self.search_playlists(query, ctx).await.map(ContentItem::Collection)
            }
            SearchKind::All | SearchKind::Media => match self.try_search_tracks(query, ctx).await {
                Ok(page) => page.map(ContentItem::Media),
                Err(e) => {
                    warn!("Search failed: {}", e);
                    Page::degraded("Failed to perform search. Please try again.")
                }
            },
        }
    }

    async fn search_channels(
        &self,
        query: &SearchQuery,
        ctx: &mut SourceContext,
    ) -> Page<ChannelRecord> {
        match self.try_search_channels(query, ctx).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Channel search failed: {}", e);
                Page::degraded("Failed to search for channels. Please try again.")
            }
        }
    }

    async fn search_playlists(
        &self,
        query: &SearchQuery,
        ctx: &mut SourceContext,
    ) -> Page<CollectionRecord> {
        match self.try_search_playlists(query, ctx).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Playlist search failed: {}", e);
                Page::degraded("Failed to search for playlists. Please try again.")
            }
        }
    }

    #[instrument(skip(self, ctx), fields(source = SOURCE_ID))]
    async fn channel(
        &self,
        id: &str,
        page: PageRequest,
        ctx: &mut SourceContext,
    ) -> Result<ChannelDetails> {
        let limit = page.limit_or(self.config.page_size);
        let artist_request = self
            .request("/artists")?
            .param("id", id)
            .param("fields", ARTIST_DETAIL_FIELDS)
            .param("include", "stats");
        let artist_response = self.caller.get_json(&artist_request, ctx).await?;
        let artist: JamendoArtist = first_record(&artist_response, "Artist", id)?;
        info!("Found artist {:?} ({})", artist.name, id);

        let tracks_request = self
            .request("/artists/tracks")?
            .param("id", id)
            .param("offset", page.offset)
            .param("limit", limit)
            .param("fields", LIST_FIELDS)
            .param("order", "popularity_total")
            .param("audioformat", "mp32");
        let tracks_response = self.caller.get_json(&tracks_request, ctx).await?;

        // `/artists/tracks` nests the tracks inside the artist result
        let track_values: Vec<Value> = tracks_response
            .first()
            .and_then(|artist| artist.get("tracks"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_else(|| tracks_response.results.clone());

        let mapper = self.mapper();
        let videos = mapper.tracks(&track_values);
        let total = artist.track_count.or_else(|| tracks_response.count_at("/headers/results_count"));
        let more = total.is_some_and(|t| t > u64::from(page.offset) + track_values.len() as u64);

        let links = artist
            .website
            .clone()
            .filter(|w| !w.is_empty())
            .map(|url| Link {
                name: "Website".to_string(),
                url,
            })
            .into_iter()
            .collect();

        let description = format!(
            "Joined {} • {} tracks • {} albums",
            artist.joindate.as_deref().unwrap_or("N/A"),
            artist.track_count.unwrap_or(0),
            artist.album_count.unwrap_or(0)
        );

        let mut channel = mapper.artist(artist)?;
        channel.description = description;

        Ok(ChannelDetails {
            channel,
            links,
            videos: Page::paged(videos, more, page.offset.saturating_add(limit)),
        })
    }

    #[instrument(skip(self, ctx), fields(source = SOURCE_ID))]
    async fn playlist(
        &self,
        id: &str,
        page: PageRequest,
        ctx: &mut SourceContext,
    ) -> Result<PlaylistDetails> {
        let limit = page.limit_or(self.config.page_size);
        let album_request = self
            .request("/albums")?
            .param("id", id)
            .param("fields", ALBUM_DETAIL_FIELDS)
            .param("include", "musicinfo,stats");
        let album_response = self.caller.get_json(&album_request, ctx).await?;
        let album: JamendoAlbum = first_record(&album_response, "Album", id)?;
        info!("Found album {:?} by {:?}", album.name, album.artist_name);

        let tracks_request = self
            .request("/albums/tracks")?
            .param("id", id)
            .param("offset", page.offset)
            .param("limit", limit)
            .param("fields", LIST_FIELDS)
            .param("audioformat", "mp32")
            .param("order", "track_num");
        let tracks_response = self.caller.get_json(&tracks_request, ctx).await?;

        let track_values: Vec<Value> = tracks_response
            .first()
            .and_then(|album| album.get("tracks"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_else(|| tracks_response.results.clone());

        let mapper = self.mapper();
        let videos = mapper.tracks(&track_values);
        let total = album
            .tracks_count
            .or_else(|| tracks_response.count_at("/headers/results_count"))
            .unwrap_or(0);
        let more = total > u64::from(page.offset) + track_values.len() as u64;

        let mut lines = Vec::new();
        let mut metadata = BTreeMap::new();
        if let Some(date) = &album.releasedate {
            lines.push(format!("Released: {date}"));
            metadata.insert("releaseDate".to_string(), date.clone());
        }
        if let Some(genre) = &album.genre {
            lines.push(format!("Genre: {genre}"));
            metadata.insert("genre".to_string(), genre.clone());
        }
        let tags = mapping::top_tags(&album.tags, TOP_TAG_COUNT);
        if !tags.is_empty() {
            lines.push(format!("Tags: {tags}"));
        }
        if let Some(upc) = &album.upc {
            metadata.insert("upc".to_string(), upc.clone());
        }

        let mut playlist = mapper.album(album)?;
        playlist.description = lines.join("\n");
        playlist.items.clone_from(&videos);

        Ok(PlaylistDetails {
            playlist,
            videos: Page::paged(videos, more, page.offset.saturating_add(limit)),
            metadata,
        })
    }

    #[instrument(skip(self, ctx), fields(source = SOURCE_ID))]
    async fn content_details(&self, url: &str, ctx: &mut SourceContext) -> Result<MediaRecord> {
        let track_id = track_id_from_url(url)?;
        debug!("Extracted track id {}", track_id);

        let request = self
            .request("/tracks")?
            .param("id", track_id.as_str())
            .param("include", "musicinfo,stats,lyrics")
            .param("fields", DETAIL_FIELDS)
            .param("audioformat", "mp32");
        let response = self.caller.get_json(&request, ctx).await?;
        let track: JamendoTrack = first_record(&response, "Track", &track_id)?;

        self.mapper().track_details(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapper() -> JamendoMapper {
        JamendoMapper::new(
            &JamendoConfig::default(),
            MapOptions::at(1_700_000_000_000, MissingTimestamp::Now),
        )
    }

    fn track(value: Value) -> JamendoTrack {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_track_mapping() {
        let record = mapper()
            .track(track(json!({
                "id": "1204669",
                "name": "Blue Train",
                "duration": 125,
                "artist_id": "7",
                "artist_name": "Quartet",
                "album_image": "https://usercontent.jamendo.com/a.jpg",
                "releasedate": "2015-03-10",
                "downloads": "10",
                "listens": 5,
                "likes": 3,
                "shareurl": "https://www.jamendo.com/track/1204669"
            })))
            .unwrap();

        assert_eq!(record.id, "1204669");
        assert_eq!(record.platform, "jamendo");
        assert_eq!(record.duration_ms, 125_000);
        assert_eq!(record.view_count, 15);
        assert_eq!(record.like_count, 3);
        assert_eq!(record.author.url, "https://www.jamendo.com/artist/7");
        assert_eq!(record.thumbnails[0].url, "https://usercontent.jamendo.com/a.jpg");
        assert_eq!(record.published_at_ms, 1_425_945_600_000);
        assert_eq!(record.share_url, record.url);
    }

    #[test]
    fn test_track_defaults() {
        let record = mapper()
            .track(track(json!({"id": 42, "album_image": "token/abc"})))
            .unwrap();

        assert_eq!(record.name, "Unknown Track");
        assert_eq!(record.author.id, "unknown");
        assert_eq!(record.author.name, "Unknown Artist");
        assert_eq!(record.url, "https://www.jamendo.com/track/42");
        assert_eq!(record.duration_ms, 0);
        assert_eq!(record.view_count, 0);
        assert_eq!(record.published_at_ms, 1_700_000_000_000);
        assert_eq!(
            record.thumbnails[0].url,
            "https://imgproxy.ra.co/_/quality:75/plain/token%2Fabc"
        );
    }

    #[test]
    fn test_track_without_id_is_rejected() {
        let result = mapper().track(track(json!({"name": "Nameless"})));
        assert!(matches!(result, Err(Error::UnmappableRecord { .. })));
    }

    #[test]
    fn test_odd_musicinfo_keeps_the_track() {
        for musicinfo in [json!("vocal"), json!(["vocal"]), json!(3)] {
            let record = mapper()
                .track(track(json!({"id": "9", "name": "Odd", "musicinfo": musicinfo})))
                .unwrap();
            assert_eq!(record.name, "Odd");
            assert_eq!(record.description, "");
        }
    }

    #[test]
    fn test_track_details() {
        let record = mapper()
            .track_details(track(json!({
                "id": 5,
                "name": "Interlude",
                "duration": "45",
                "artist_id": 9,
                "artist_idstr": "the_band",
                "album_id": 77,
                "album_name": "Suite",
                "album_image": "relative-token",
                "audio": "https://prod-1.storage.jamendo.com/?trackid=5&format=mp32",
                "releasedate": "2020-01-01",
                "musicinfo": {"description": {"en": "Short piece"}},
                "tags": {"piano": 3, "calm": 5},
                "lyrics": {"lyrics": "la la"}
            })))
            .unwrap();

        assert_eq!(record.author.url, "https://www.jamendo.com/artist/the_band");
        assert_eq!(
            record.description,
            "Short piece\n\nReleased: 2020-01-01\nTags: #calm #piano\n\nLyrics available"
        );
        // Relative artwork is dropped for playback
        assert!(record.thumbnails.is_empty());
        assert_eq!(record.streams.len(), 1);
        assert_eq!(record.streams[0].bitrate, 192_000);
        assert_eq!(record.metadata["isShort"], "true");
        assert_eq!(record.metadata["hasLyrics"], "true");
        assert_eq!(record.metadata["albumUrl"], "https://www.jamendo.com/album/77");
    }

    #[test]
    fn test_track_details_without_audio() {
        let result = mapper().track_details(track(json!({"id": 5})));
        assert!(matches!(result, Err(Error::NoPlayableStreams { .. })));
    }

    #[test]
    fn test_artist_and_album_mapping() {
        let artist: JamendoArtist =
            serde_json::from_value(json!({"id": 3, "name": "Band", "fans": "0"})).unwrap();
        let channel = mapper().artist(artist).unwrap();
        assert_eq!(channel.subscribers, None);
        assert_eq!(channel.url, "https://www.jamendo.com/artist/3");

        let album: JamendoAlbum = serde_json::from_value(json!({
            "id": "12", "name": "Debut", "artist_id": 3, "artist_name": "Band",
            "releasedate": "2019-05-01", "tracks_count": "8"
        }))
        .unwrap();
        let collection = mapper().album(album).unwrap();
        assert_eq!(collection.item_count, 8);
        assert_eq!(collection.description, "Released: 2019-05-01");
        assert_eq!(collection.url, "https://www.jamendo.com/album/12");
    }

    #[test]
    fn test_track_id_from_url() {
        assert_eq!(
            track_id_from_url("https://www.jamendo.com/track/1204669/blue-train").unwrap(),
            "1204669"
        );
        assert!(matches!(
            track_id_from_url("https://www.jamendo.com/album/12"),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_has_more_rules() {
        let with_count = ValidatedResponse {
            body: json!({"headers": {"results_count": 45}}),
            results: vec![json!({}); 20],
        };
        assert!(has_more(&with_count, 0, 20));
        assert!(!has_more(&with_count, 40, 20));

        let without_count = ValidatedResponse {
            body: json!({}),
            results: vec![json!({}); 20],
        };
        assert!(has_more(&without_count, 0, 20));
        assert!(!has_more(&without_count, 0, 30));
    }
}
