use super::traits::{MediaSource, PageRequest, SearchQuery};
use crate::client::html::{self, LinkRule, PageSummary, ScrapedLink};
use crate::client::records::{
    AuthorLink, ChannelDetails, ChannelRecord, ContentItem, MediaRecord, Page, StreamDescriptor,
    StreamKind, Thumbnail,
};
use crate::client::validator::ResponseShape;
use crate::client::{ApiRequest, HttpClientConfig, ResilientCaller};
use crate::config::{Config, PlutoConfig};
use crate::context::SourceContext;
use crate::mapping::{self, lenient, MapOptions, MissingTimestamp};
use crate::resilience::{CredentialPool, RetryConfig};
use crate::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

const SOURCE_ID: &str = "pluto";
const AUTHOR: &str = "Pluto TV";

/// State key that overrides the configured region for one session
pub const REGION_STATE_KEY: &str = "region";

const STITCH_PARAMS: &str = "advertisingId=&appName=web&appVersion=9.18.0&clientDeviceType=0&deviceDNT=false&deviceMake=web&deviceType=web&serverSideAds=false";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlutoImage {
    #[serde(deserialize_with = "lenient::string")]
    pub path: Option<String>,
}

/// Live channel from `/v2/channels.json`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlutoChannel {
    #[serde(rename = "_id", deserialize_with = "lenient::string")]
    pub object_id: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub slug: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub summary: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient::object")]
    pub thumbnail: Option<PlutoImage>,
}

impl PlutoChannel {
    fn channel_id(&self) -> Option<&str> {
        self.object_id.as_deref().or(self.id.as_deref())
    }

    fn thumbnail_url(&self) -> Option<String> {
        self.thumbnail.as_ref().and_then(|t| t.path.clone())
    }

    fn matches(&self, needle: &str) -> bool {
        let contains = |field: &Option<String>| {
            field
                .as_deref()
                .is_some_and(|value| value.to_lowercase().contains(needle))
        };
        contains(&self.name) || contains(&self.summary)
    }
}

/// On-demand item from `/v4/vod/items`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlutoVodItem {
    #[serde(deserialize_with = "lenient::string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub thumbnail: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub created: Option<String>,
    /// Milliseconds
    #[serde(deserialize_with = "lenient::unsigned")]
    pub duration: Option<u64>,
    #[serde(deserialize_with = "lenient::string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub summary: Option<String>,
}

/// Stream source from `/v4/start`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlutoStreamSource {
    #[serde(rename = "type", deserialize_with = "lenient::string")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub url: Option<String>,
}

/// Field mapping for Pluto TV records
#[derive(Debug, Clone)]
pub struct PlutoMapper {
    site_url: String,
    stitcher_url: String,
    region: String,
    options: MapOptions,
}

fn pluto_author() -> AuthorLink {
    AuthorLink {
        name: AUTHOR.to_string(),
        ..Default::default()
    }
}

impl PlutoMapper {
    #[must_use]
    pub fn new(config: &PlutoConfig, region: &str, options: MapOptions) -> Self {
        Self {
            site_url: config.site_url.trim_end_matches('/').to_string(),
            stitcher_url: config.stitcher_url.trim_end_matches('/').to_string(),
            region: region.to_string(),
            options,
        }
    }

    #[must_use]
    pub fn live_url(&self, slug: &str) -> String {
        format!("{}/{}/live-tv/{}", self.site_url, self.region, slug)
    }

    #[must_use]
    pub fn stitched_url(&self, channel_id: &str) -> String {
        format!(
            "{}/v2/stitch/hls/channel/{}/master.m3u8?{}",
            self.stitcher_url, channel_id, STITCH_PARAMS
        )
    }

    /// Live channel as a media record, keyed by its page URL
    pub fn live_channel(&self, channel: &PlutoChannel) -> Result<MediaRecord> {
        let slug = mapping::require_id("channel", channel.slug.clone())?;
        let url = self.live_url(&slug);

        Ok(MediaRecord {
            id: url.clone(),
            platform: SOURCE_ID.to_string(),
            name: mapping::name_or(channel.name.clone(), "Unknown Channel"),
            author: pluto_author(),
            share_url: url.clone(),
            url,
            thumbnails: Thumbnail::list(channel.thumbnail_url(), 0, 0),
            is_live: true,
            published_at_ms: self.options.fallback_timestamp(),
            description: channel
                .summary
                .clone()
                .or_else(|| channel.description.clone())
                .unwrap_or_default(),
            ..Default::default()
        })
    }

    /// Live channel with its stitched HLS stream
    pub fn live_details(&self, channel: &PlutoChannel, url: &str) -> Result<MediaRecord> {
        let channel_id = channel
            .channel_id()
            .ok_or_else(|| Error::UnmappableRecord {
                record: "channel".to_string(),
                reason: "missing channel id".to_string(),
            })?;

        let mut record = self.live_channel(channel)?;
        record.id = url.to_string();
        record.url = url.to_string();
        record.share_url = url.to_string();
        record.streams = vec![StreamDescriptor {
            kind: StreamKind::Hls,
            url: self.stitched_url(channel_id),
            name: "Live Stream".to_string(),
            container: "application/x-mpegURL".to_string(),
            codec: "h264".to_string(),
            bitrate: 0,
            width: Some(1920),
            height: Some(1080),
            language: None,
        }];
        Ok(record)
    }

    /// Placeholder for on-demand content requested without a token
    #[must_use]
    pub fn auth_required(&self, url: &str) -> MediaRecord {
        MediaRecord {
            id: url.to_string(),
            platform: SOURCE_ID.to_string(),
            name: "Authentication Required".to_string(),
            author: pluto_author(),
            url: url.to_string(),
            share_url: url.to_string(),
            description:
                "Please provide a Pluto TV Bearer token in settings to access on-demand content."
                    .to_string(),
            published_at_ms: self.options.fallback_timestamp(),
            ..Default::default()
        }
    }

    /// On-demand item with whatever stream sources were resolved
    #[must_use]
    pub fn vod_item(&self, item: PlutoVodItem, url: &str, sources: &[PlutoStreamSource]) -> MediaRecord {
        let streams = sources
            .iter()
            .filter_map(|source| {
                let url = source.url.clone()?;
                let (kind, container) = match source.kind.as_deref()? {
                    "hls" => (StreamKind::Hls, "application/x-mpegURL"),
                    "dash" => (StreamKind::Dash, "application/dash+xml"),
                    _ => return None,
                };
                Some(StreamDescriptor {
                    kind,
                    url,
                    name: source.kind.clone().unwrap_or_default().to_uppercase(),
                    container: container.to_string(),
                    codec: "h264".to_string(),
                    bitrate: 0,
                    width: Some(1920),
                    height: Some(1080),
                    language: None,
                })
            })
            .collect();

        MediaRecord {
            id: url.to_string(),
            platform: SOURCE_ID.to_string(),
            name: mapping::name_or(item.name.or(item.title), "Unknown Title"),
            author: pluto_author(),
            url: url.to_string(),
            share_url: url.to_string(),
            thumbnails: Thumbnail::list(item.thumbnail, 0, 0),
            duration_ms: item.duration.unwrap_or(0),
            published_at_ms: self.options.timestamp(item.created.as_deref()),
            description: item.description.or(item.summary).unwrap_or_default(),
            streams,
            ..Default::default()
        }
    }

    /// Record built from the page itself when the catalogue API has nothing
    #[must_use]
    pub fn page(&self, summary: PageSummary, url: &str) -> MediaRecord {
        MediaRecord {
            id: url.to_string(),
            platform: SOURCE_ID.to_string(),
            name: mapping::name_or(summary.title, "Unknown Title"),
            author: pluto_author(),
            url: url.to_string(),
            share_url: url.to_string(),
            thumbnails: Thumbnail::list(summary.image, 0, 0),
            published_at_ms: self.options.fallback_timestamp(),
            description: summary.description.unwrap_or_default(),
            ..Default::default()
        }
    }

    /// Movie or series link scraped from a listing page
    #[must_use]
    pub fn scraped(&self, link: ScrapedLink) -> MediaRecord {
        MediaRecord {
            id: link.url.clone(),
            platform: SOURCE_ID.to_string(),
            name: link.title,
            author: pluto_author(),
            share_url: link.url.clone(),
            url: link.url,
            thumbnails: Thumbnail::list(link.thumbnail, 0, 0),
            published_at_ms: self.options.fallback_timestamp(),
            ..Default::default()
        }
    }
}

fn capture(pattern: &str, haystack: &str) -> Result<Option<String>> {
    let regex = Regex::new(pattern).map_err(|e| Error::InvalidInput {
        field: "pattern".to_string(),
        reason: e.to_string(),
    })?;
    Ok(regex
        .captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string()))
}

/// Pluto TV live channels and on-demand catalogue
pub struct PlutoSource {
    caller: ResilientCaller,
    config: PlutoConfig,
    missing_timestamp: MissingTimestamp,
}

impl PlutoSource {
    #[must_use]
    pub fn new(
        config: PlutoConfig,
        client: Client,
        retry: RetryConfig,
        missing_timestamp: MissingTimestamp,
    ) -> Self {
        let caller = ResilientCaller::new(
            SOURCE_ID,
            client,
            CredentialPool::bearer(config.auth_token.clone()),
            retry,
        );
        Self {
            caller,
            config,
            missing_timestamp,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = HttpClientConfig::from(&config.http).build()?;
        Ok(Self::new(
            config.pluto.clone(),
            client,
            config.retry.to_retry_config(),
            config.mapping.missing_timestamp,
        ))
    }

    fn region(&self, ctx: &SourceContext) -> String {
        ctx.state()
            .get_str(REGION_STATE_KEY)
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(&self.config.region)
            .to_string()
    }

    fn mapper(&self, ctx: &SourceContext) -> PlutoMapper {
        PlutoMapper::new(
            &self.config,
            &self.region(ctx),
            MapOptions::new(self.missing_timestamp),
        )
    }

    fn has_token(&self) -> bool {
        self.caller.has_credentials()
    }

    async fn channels(&self, ctx: &mut SourceContext) -> Result<Vec<PlutoChannel>> {
        let request = ApiRequest::endpoint(&self.config.api_url, "/v2/channels.json")?
            .anonymous()
            .shape(ResponseShape::results_at(""));
        let response = self.caller.get_json(&request, ctx).await?;
        let channels = mapping::map_batch("channel", &response.results, |c: PlutoChannel| Ok(c));
        debug!("Fetched {} live channels", channels.len());
        Ok(channels)
    }

    async fn live_records(
        &self,
        ctx: &mut SourceContext,
        needle: Option<&str>,
    ) -> Result<Vec<MediaRecord>> {
        let channels = self.channels(ctx).await?;
        let mapper = self.mapper(ctx);
        let needle = needle.map(str::to_lowercase);

        Ok(channels
            .iter()
            .filter(|c| needle.as_deref().map_or(true, |n| c.matches(n)))
            .filter_map(|c| match mapper.live_channel(c) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Dropping channel record: {}", e);
                    None
                }
            })
            .take(self.config.max_live_channels)
            .collect())
    }

    async fn scrape_on_demand(&self, url: &str, ctx: &mut SourceContext) -> Result<Vec<MediaRecord>> {
        let body = self
            .caller
            .fetch_text(&ApiRequest::get(url)?.anonymous(), ctx)
            .await?;
        let links = html::scrape_links(
            &body,
            &LinkRule {
                candidates: r#"a[href*="/on-demand/"]"#,
                href_contains: &["/movies/", "/series/"],
                title: "h3, .title, .video-title",
                base_url: &self.config.site_url,
            },
        )?;
        let mapper = self.mapper(ctx);
        Ok(links.into_iter().map(|link| mapper.scraped(link)).collect())
    }

    /// Live part and on-demand part of a listing, merged and capped
    async fn listing(
        &self,
        ctx: &mut SourceContext,
        needle: Option<&str>,
        on_demand_url: String,
    ) -> Page<ContentItem> {
        let mut items: Vec<MediaRecord> = Vec::new();
        let mut failures = Vec::new();

        if self.config.content.includes_live() {
            match self.live_records(ctx, needle).await {
                Ok(records) => items.extend(records),
                Err(e) => {
                    warn!("Live channels failed: {}", e);
                    failures.push(e.to_string());
                }
            }
        }

        if self.config.content.includes_on_demand() && self.has_token() {
            match self.scrape_on_demand(&on_demand_url, ctx).await {
                Ok(records) => {
                    let mut seen: HashSet<String> = items.iter().map(|r| r.url.clone()).collect();
                    for record in records {
                        if items.len() >= self.config.max_items {
                            break;
                        }
                        if seen.insert(record.url.clone()) {
                            items.push(record);
                        }
                    }
                }
                Err(e) => warn!("On-demand listing failed, continuing with live content: {}", e),
            }
        }

        if items.is_empty() && !failures.is_empty() {
            return Page::degraded(format!("Could not load Pluto TV content. {}", failures.join("; ")));
        }

        items.truncate(self.config.max_items);
        Page::complete(items.into_iter().map(ContentItem::Media).collect())
    }

    async fn find_channel(
        &self,
        ctx: &mut SourceContext,
        key: &str,
    ) -> Result<PlutoChannel> {
        self.channels(ctx)
            .await?
            .into_iter()
            .find(|c| {
                c.slug.as_deref() == Some(key)
                    || c.object_id.as_deref() == Some(key)
                    || c.id.as_deref() == Some(key)
            })
            .ok_or_else(|| Error::not_found("Channel", key))
    }

    async fn on_demand_details(&self, url: &str, ctx: &mut SourceContext) -> Result<MediaRecord> {
        let mapper = self.mapper(ctx);
        if !self.has_token() {
            return Ok(mapper.auth_required(url));
        }

        let slug = capture(r"/on-demand/(?:movies|series)/([^/?#]+)", url)?.ok_or_else(|| {
            Error::invalid_input("url", "Expected a /on-demand/movies/ or /on-demand/series/ URL")
        })?;

        let items_request = ApiRequest::endpoint(&self.config.vod_url, "/v4/vod/items")?
            .param("ids", slug.as_str())
            .shape(ResponseShape::results_at(""));

        match self.caller.get_json(&items_request, ctx).await {
            Ok(response) => {
                let items =
                    mapping::map_batch("vod item", &response.results, |i: PlutoVodItem| Ok(i));
                if let Some(item) = items.into_iter().next() {
                    let sources = self.start_sources(&slug, ctx).await;
                    return Ok(mapper.vod_item(item, url, &sources));
                }
                debug!("No catalogue entry for {}, falling back to the page", slug);
            }
            Err(e) => warn!("Catalogue lookup for {} failed: {}", slug, e),
        }

        let body = self
            .caller
            .fetch_text(&ApiRequest::get(url)?.anonymous(), ctx)
            .await?;
        let summary = html::page_summary(&body, "h1, .title", ".description, .summary")?;
        Ok(mapper.page(summary, url))
    }

    async fn start_sources(&self, slug: &str, ctx: &mut SourceContext) -> Vec<PlutoStreamSource> {
        let request = match ApiRequest::endpoint(&self.config.boot_url, "/v4/start") {
            Ok(request) => request
                .param("appName", "web")
                .param("appVersion", "9")
                .param("clientID", "9")
                .param("clientModelNumber", "9")
                .param("drmCapabilities", "widevine:L3")
                .param("episodeSlugs", slug)
                .shape(ResponseShape::results_at("/sources")),
            Err(e) => {
                warn!("Invalid boot URL: {}", e);
                return Vec::new();
            }
        };

        match self.caller.get_json(&request, ctx).await {
            Ok(response) => {
                mapping::map_batch("stream source", &response.results, |s: PlutoStreamSource| Ok(s))
            }
            Err(e) => {
                warn!("Stream start for {} failed: {}", slug, e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl MediaSource for PlutoSource {
    fn id(&self) -> &'static str {
        SOURCE_ID
    }

    fn name(&self) -> &'static str {
        "Pluto TV"
    }

    fn description(&self) -> &'static str {
        "Free live TV channels and on-demand movies and series"
    }

    fn page_size(&self) -> u32 {
        u32::try_from(self.config.max_items).unwrap_or(u32::MAX)
    }

    fn paginates(&self) -> bool {
        false
    }

    #[instrument(skip(self, ctx), fields(source = SOURCE_ID))]
    async fn home(&self, _page: PageRequest, ctx: &mut SourceContext) -> Page<ContentItem> {
        let url = format!("{}/{}/on-demand", self.mapper(ctx).site_url, self.region(ctx));
        let page = self.listing(ctx, None, url).await;
        info!("Home feed has {} items", page.len());
        page
    }

    #[instrument(skip(self, ctx), fields(source = SOURCE_ID, query = %query.text))]
    async fn search(&self, query: &SearchQuery, ctx: &mut SourceContext) -> Page<ContentItem> {
        let url = format!(
            "{}/{}/search?q={}",
            self.mapper(ctx).site_url,
            self.region(ctx),
            urlencoding::encode(&query.text)
        );
        self.listing(ctx, Some(&query.text), url).await
    }

    #[instrument(skip(self, _page, ctx), fields(source = SOURCE_ID))]
    async fn channel(
        &self,
        id: &str,
        _page: PageRequest,
        ctx: &mut SourceContext,
    ) -> Result<ChannelDetails> {
        let key = capture(r"/live-tv/([^/?#]+)", id)?.unwrap_or_else(|| id.to_string());
        let channel = self.find_channel(ctx, &key).await?;
        let mapper = self.mapper(ctx);
        let live = mapper.live_channel(&channel)?;

        Ok(ChannelDetails {
            channel: ChannelRecord {
                id: channel.slug.clone().unwrap_or(key),
                platform: SOURCE_ID.to_string(),
                name: live.name.clone(),
                url: live.url.clone(),
                thumbnail: channel.thumbnail_url().unwrap_or_default(),
                description: live.description.clone(),
                subscribers: None,
            },
            links: Vec::new(),
            videos: Page::complete(vec![live]),
        })
    }

    #[instrument(skip(self, ctx), fields(source = SOURCE_ID))]
    async fn content_details(&self, url: &str, ctx: &mut SourceContext) -> Result<MediaRecord> {
        if url.contains("/live-tv/") {
            let channel = match capture(r"/live-tv/([a-f0-9]{24})", url)? {
                Some(channel_id) => self.find_channel(ctx, &channel_id).await?,
                None => {
                    let slug = capture(r"/live-tv/([^/?#]+)", url)?
                        .ok_or_else(|| Error::invalid_input("url", "Missing channel slug"))?;
                    self.find_channel(ctx, &slug).await?
                }
            };
            return self.mapper(ctx).live_details(&channel, url);
        }

        if url.contains("/on-demand/") {
            return self.on_demand_details(url, ctx).await;
        }

        Err(Error::invalid_input(
            "url",
            format!("Not a Pluto TV live or on-demand URL: {url}"),
        ))
    }

    #[instrument(skip(self, _page, ctx), fields(source = SOURCE_ID))]
    async fn live_streams(&self, _page: PageRequest, ctx: &mut SourceContext) -> Page<MediaRecord> {
        if !self.config.content.includes_live() {
            return Page::empty();
        }

        match self.live_records(ctx, None).await {
            Ok(records) => Page::complete(records),
            Err(e) => {
                warn!("Live channel listing failed: {}", e);
                Page::degraded(format!("Could not load live channels. {e}"))
            }
        }
    }
}
