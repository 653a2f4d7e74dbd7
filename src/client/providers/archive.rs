use super::traits::{MediaSource, PageRequest, SearchQuery};
use crate::client::html::{self, LinkRule};
use crate::client::records::{
    AuthorLink, ChannelDetails, ChannelRecord, CollectionRecord, ContentItem, MediaRecord, Page,
    PlaylistDetails, StreamDescriptor, StreamKind, Thumbnail,
};
use crate::client::validator::{ResponseShape, ValidatedResponse};
use crate::client::{ApiRequest, HttpClientConfig, ResilientCaller};
use crate::config::{ArchiveConfig, Config};
use crate::context::SourceContext;
use crate::mapping::{self, lenient, MapOptions, MissingTimestamp};
use crate::resilience::{CredentialPool, RetryConfig};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

const SOURCE_ID: &str = "archive";
const DEFAULT_AUTHOR: &str = "Archive.org";
const SCRAPED_AUTHOR: &str = "Internet Archive";

const VIDEO_FORMATS: &[&str] = &[
    "MPEG4", "MP4", "H.264", "h.264", "Ogg Video", "WebM", "Matroska", "AVI", "MPEG2", "MPEG1",
];
const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".webm", ".ogv", ".avi", ".mkv", ".mpeg", ".mpg", ".m4v"];

/// Document from `advancedsearch.php`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArchiveDoc {
    #[serde(deserialize_with = "lenient::string")]
    pub identifier: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub creator: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient::unsigned")]
    pub downloads: Option<u64>,
    #[serde(deserialize_with = "lenient::string")]
    pub publicdate: Option<String>,
}

/// File entry from `/metadata/<identifier>`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArchiveFile {
    #[serde(deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub format: Option<String>,
    #[serde(deserialize_with = "lenient::unsigned")]
    pub width: Option<u64>,
    #[serde(deserialize_with = "lenient::unsigned")]
    pub height: Option<u64>,
    #[serde(deserialize_with = "lenient::string")]
    pub length: Option<String>,
}

impl ArchiveFile {
    fn is_video(&self) -> bool {
        let format = self.format.as_deref().unwrap_or_default();
        if VIDEO_FORMATS.iter().any(|f| format.contains(f)) {
            return true;
        }
        let name = self.name.as_deref().unwrap_or_default().to_lowercase();
        VIDEO_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
    }

    /// Lower sorts first: MP4/h.264, then MPEG4, then the rest
    fn priority(&self) -> u8 {
        let format = self.format.as_deref().unwrap_or_default();
        if format.contains("h.264") || format.contains("MP4") {
            1
        } else if format.contains("MPEG4") {
            2
        } else {
            3
        }
    }

    fn extension(&self) -> String {
        self.name
            .as_deref()
            .and_then(|n| n.rsplit_once('.'))
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default()
    }
}

/// Item metadata from `/metadata/<identifier>`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArchiveMetadata {
    #[serde(deserialize_with = "lenient::string")]
    pub d1: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub dir: Option<String>,
    pub metadata: ArchiveDoc,
    pub item: ArchiveItemStats,
    pub files: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArchiveItemStats {
    #[serde(deserialize_with = "lenient::unsigned")]
    pub downloads: Option<u64>,
}

impl ArchiveMetadata {
    fn file_url(&self, name: &str) -> Option<String> {
        match (&self.d1, &self.dir) {
            (Some(d1), Some(dir)) => Some(format!("https://{d1}{dir}/{name}")),
            _ => None,
        }
    }
}

/// Field mapping for Archive.org records
#[derive(Debug, Clone)]
pub struct ArchiveMapper {
    base_url: String,
    options: MapOptions,
}

impl ArchiveMapper {
    #[must_use]
    pub fn new(config: &ArchiveConfig, options: MapOptions) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            options,
        }
    }

    fn thumbnail(&self, identifier: &str) -> String {
        format!("{}/services/img/{}", self.base_url, identifier)
    }

    /// Search document to canonical media record
    pub fn doc(&self, doc: ArchiveDoc) -> Result<MediaRecord> {
        let id = mapping::require_id("document", doc.identifier)?;
        let url = format!("{}/details/{}", self.base_url, id);

        Ok(MediaRecord {
            platform: SOURCE_ID.to_string(),
            name: mapping::name_or(doc.title, "Unknown Title"),
            author: AuthorLink {
                id: doc.creator.clone().unwrap_or_default(),
                name: mapping::name_or(doc.creator, DEFAULT_AUTHOR),
                ..Default::default()
            },
            share_url: url.clone(),
            url,
            thumbnails: vec![Thumbnail::new(self.thumbnail(&id), 180, 180)],
            view_count: doc.downloads.unwrap_or(0),
            published_at_ms: self.options.timestamp(doc.publicdate.as_deref()),
            description: doc.description.unwrap_or_default(),
            id,
            ..Default::default()
        })
    }

    /// Item metadata to a playable media record
    pub fn item(&self, identifier: &str, metadata: ArchiveMetadata) -> Result<MediaRecord> {
        let mut files: Vec<ArchiveFile> =
            mapping::map_batch("file", &metadata.files, |file: ArchiveFile| Ok(file));
        files.retain(|file| file.name.is_some() && file.is_video());

        if files.is_empty() {
            return Err(Error::NoPlayableStreams {
                id: identifier.to_string(),
                reason: "No video file found in Archive.org item. This item may be audio-only or a different media type.".to_string(),
            });
        }
        files.sort_by_key(ArchiveFile::priority);

        let streams: Vec<StreamDescriptor> = files
            .iter()
            .filter_map(|file| {
                let name = file.name.as_deref()?;
                let url = metadata.file_url(name)?;
                let extension = file.extension();
                let container = match extension.as_str() {
                    "webm" => "video/webm",
                    "ogv" => "video/ogg",
                    _ => "video/mp4",
                };
                Some(StreamDescriptor {
                    kind: StreamKind::Video,
                    url,
                    name: file
                        .format
                        .clone()
                        .unwrap_or_else(|| extension.to_uppercase()),
                    container: container.to_string(),
                    codec: if container == "video/mp4" { "h264" } else { "vp8" }.to_string(),
                    bitrate: 0,
                    width: Some(file.width.and_then(|w| u32::try_from(w).ok()).unwrap_or(1920)),
                    height: Some(file.height.and_then(|h| u32::try_from(h).ok()).unwrap_or(1080)),
                    language: None,
                })
            })
            .collect();

        if streams.is_empty() {
            return Err(Error::NoPlayableStreams {
                id: identifier.to_string(),
                reason: "item has no download host".to_string(),
            });
        }

        let duration = files
            .first()
            .and_then(|f| f.length.as_deref())
            .and_then(mapping::clock_seconds);
        let thumbnail = metadata
            .file_url("__ia_thumb.jpg")
            .unwrap_or_else(|| self.thumbnail(identifier));
        let downloads = metadata.item.downloads;

        let mut doc = metadata.metadata;
        doc.identifier = Some(identifier.to_string());
        if doc.downloads.is_none() {
            doc.downloads = downloads;
        }

        let mut record = self.doc(doc)?;
        record.thumbnails = vec![Thumbnail::new(thumbnail, 180, 180)];
        record.duration_ms = mapping::duration_ms(duration);
        record.streams = streams;
        Ok(record)
    }

    /// Link scraped from a listing page
    #[must_use]
    pub fn scraped(&self, link: html::ScrapedLink) -> MediaRecord {
        MediaRecord {
            id: link.url.clone(),
            platform: SOURCE_ID.to_string(),
            name: link.title,
            author: AuthorLink {
                name: SCRAPED_AUTHOR.to_string(),
                ..Default::default()
            },
            share_url: link.url.clone(),
            url: link.url,
            thumbnails: Thumbnail::list(link.thumbnail, 0, 0),
            published_at_ms: self.options.fallback_timestamp(),
            ..Default::default()
        }
    }

    fn docs(&self, values: &[Value]) -> Vec<MediaRecord> {
        mapping::map_batch("document", values, |doc: ArchiveDoc| self.doc(doc))
    }
}

/// Identifier from a details URL, or the input itself when it is a bare identifier
pub fn identifier_from_url(url: &str) -> Result<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(str::trim)
        .filter(|id| !id.is_empty() && !id.contains(':'))
        .map(ToString::to_string)
        .ok_or_else(|| Error::invalid_input("url", "Invalid Archive.org URL: missing identifier"))
}

/// Internet Archive moving-image collections
pub struct ArchiveSource {
    caller: ResilientCaller,
    config: ArchiveConfig,
    missing_timestamp: MissingTimestamp,
}

impl ArchiveSource {
    #[must_use]
    pub fn new(
        config: ArchiveConfig,
        client: Client,
        retry: RetryConfig,
        missing_timestamp: MissingTimestamp,
    ) -> Self {
        let caller = ResilientCaller::new(SOURCE_ID, client, CredentialPool::empty(), retry)
            .with_default_shape(ResponseShape::results_at("/response/docs"));
        Self {
            caller,
            config,
            missing_timestamp,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = HttpClientConfig::from(&config.http).build()?;
        Ok(Self::new(
            config.archive.clone(),
            client,
            config.retry.to_retry_config(),
            config.mapping.missing_timestamp,
        ))
    }

    fn mapper(&self) -> ArchiveMapper {
        ArchiveMapper::new(&self.config, MapOptions::new(self.missing_timestamp))
    }

    fn advanced_search(&self, query: &str, sort: &str, rows: u32) -> Result<ApiRequest> {
        Ok(ApiRequest::endpoint(&self.config.base_url, "/advancedsearch.php")?
            .param("q", query)
            .param("sort[]", sort)
            .param("rows", rows)
            .param("output", "json"))
    }

    async fn metadata(&self, identifier: &str, ctx: &mut SourceContext) -> Result<ValidatedResponse> {
        let request = ApiRequest::endpoint(
            &self.config.base_url,
            &format!("/metadata/{}", urlencoding::encode(identifier)),
        )?
        .shape(ResponseShape::results_at("/files"));
        let response = self.caller.get_json(&request, ctx).await?;

        if response.body.as_object().map_or(true, serde_json::Map::is_empty) {
            return Err(Error::not_found("Item", identifier));
        }
        Ok(response)
    }

    async fn try_home(&self, page: PageRequest, ctx: &mut SourceContext) -> Result<Page<ContentItem>> {
        let request = self.advanced_search(
            "mediatype:(movies)",
            "-week",
            page.limit_or(self.config.page_size),
        )?;
        let response = self.caller.get_json(&request, ctx).await?;
        let videos = self.mapper().docs(&response.results);
        info!("Loaded {} trending items", videos.len());
        Ok(Page::complete(videos.into_iter().map(ContentItem::Media).collect()))
    }

    async fn try_search(&self, query: &SearchQuery, ctx: &mut SourceContext) -> Result<Page<ContentItem>> {
        let text = query.text.trim();
        if text.is_empty() {
            return Ok(Page::empty());
        }

        let request = self.advanced_search(
            &format!("{text} mediatype:(movies OR video)"),
            "downloads desc",
            query.limit.unwrap_or(self.config.page_size),
        )?;
        let response = self.caller.get_json(&request, ctx).await?;
        let videos = self.mapper().docs(&response.results);
        info!("Found {} items for query '{}'", videos.len(), text);
        Ok(Page::complete(videos.into_iter().map(ContentItem::Media).collect()))
    }
}

#[async_trait]
impl MediaSource for ArchiveSource {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    fn name(&self) -> &'static str {
        "Archive.org"
    }

    fn description(&self) -> &'static str {
        "Public-domain films and videos from the Internet Archive"
    }

    fn page_size(&self) -> u32 {
        self.config.page_size
    }

    fn paginates(&self) -> bool {
        false
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
        match self.try_search(query, ctx).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Search failed: {}", e);
                Page::degraded("Failed to perform search. Please try again.")
            }
        }
    }

    #[instrument(skip(self, ctx), fields(source = SOURCE_ID))]
    async fn channel(
        &self,
        id: &str,
        _page: PageRequest,
        ctx: &mut SourceContext,
    ) -> Result<ChannelDetails> {
        let url = if id.starts_with("http://") || id.starts_with("https://") {
            id.to_string()
        } else {
            format!(
                "{}/details/{}",
                self.config.base_url.trim_end_matches('/'),
                id.trim_start_matches('@')
            )
        };

        let body = self
            .caller
            .fetch_text(&ApiRequest::get(&url)?.anonymous(), ctx)
            .await?;

        let summary = html::page_summary(&body, "h1, title", ".description, .about")?;
        let links = html::scrape_links(
            &body,
            &LinkRule {
                candidates: r#"a[href*="/details/"], .item, .card"#,
                href_contains: &["/details/"],
                title: "h3, .title, .item-title",
                base_url: &self.config.base_url,
            },
        )?;
        debug!("Scraped {} item links from {}", links.len(), url);

        let mapper = self.mapper();
        let videos: Vec<MediaRecord> = links
            .into_iter()
            .filter(|link| link.url != url)
            .map(|link| mapper.scraped(link))
            .collect();

        Ok(ChannelDetails {
            channel: ChannelRecord {
                id: url.clone(),
                platform: SOURCE_ID.to_string(),
                name: mapping::name_or(summary.title, "Unknown Channel"),
                url,
                thumbnail: summary.image.unwrap_or_default(),
                description: summary.description.unwrap_or_default(),
                subscribers: None,
            },
            links: Vec::new(),
            videos: Page::complete(videos),
        })
    }

    #[instrument(skip(self, ctx), fields(source = SOURCE_ID))]
    async fn playlist(
        &self,
        id: &str,
        page: PageRequest,
        ctx: &mut SourceContext,
    ) -> Result<PlaylistDetails> {
        let identifier = identifier_from_url(id)?;
        let metadata = self.metadata(&identifier, ctx).await?;
        let collection: ArchiveMetadata =
            serde_json::from_value(metadata.body).map_err(|e| Error::InvalidResponse {
                context: SOURCE_ID.to_string(),
                message: format!("collection {identifier}: {e}"),
            })?;

        let request = self.advanced_search(
            &format!("collection:({identifier})"),
            "downloads desc",
            page.limit_or(self.config.page_size),
        )?;
        let response = self.caller.get_json(&request, ctx).await?;
        let mapper = self.mapper();
        let videos = mapper.docs(&response.results);
        let total = response
            .count_at("/response/numFound")
            .unwrap_or(videos.len() as u64);
        info!("Collection {} has {} items", identifier, total);

        let doc = collection.metadata;
        let mut metadata_extra = BTreeMap::new();
        if let Some(date) = &doc.publicdate {
            metadata_extra.insert("publicDate".to_string(), date.clone());
        }

        let playlist = CollectionRecord {
            id: identifier.clone(),
            platform: SOURCE_ID.to_string(),
            name: mapping::name_or(doc.title, "Unknown Collection"),
            author: AuthorLink {
                id: doc.creator.clone().unwrap_or_default(),
                name: mapping::name_or(doc.creator, DEFAULT_AUTHOR),
                ..Default::default()
            },
            url: format!(
                "{}/details/{}",
                self.config.base_url.trim_end_matches('/'),
                identifier
            ),
            thumbnail: mapper.thumbnail(&identifier),
            item_count: total,
            items: videos.clone(),
            description: doc.description.unwrap_or_default(),
        };

        Ok(PlaylistDetails {
            playlist,
            videos: Page::complete(videos),
            metadata: metadata_extra,
        })
    }

    #[instrument(skip(self, ctx), fields(source = SOURCE_ID))]
    async fn content_details(&self, url: &str, ctx: &mut SourceContext) -> Result<MediaRecord> {
        let identifier = identifier_from_url(url)?;
        let response = self.metadata(&identifier, ctx).await?;
        let metadata: ArchiveMetadata =
            serde_json::from_value(response.body).map_err(|e| Error::InvalidResponse {
                context: SOURCE_ID.to_string(),
                message: format!("item {identifier}: {e}"),
            })?;

        self.mapper().item(&identifier, metadata)
    }
}
