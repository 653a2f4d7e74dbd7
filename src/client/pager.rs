//! Incremental loading over any [`MediaSource`] listing.

use crate::client::providers::{MediaSource, PageRequest, SearchQuery};
use crate::client::records::{ContentItem, Page};
use crate::context::SourceContext;
use std::sync::Arc;
use tracing::{debug, warn};

/// Listing a pager walks through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagedQuery {
    Home,
    Search(SearchQuery),
    Channel(String),
    Playlist(String),
}

/// Query plus offset.
///
/// Holds no results: [`Pager::results`] re-fetches the current page on every
/// call and [`Pager::next_page`] advances by one page size before fetching.
pub struct Pager {
    source: Arc<dyn MediaSource>,
    query: PagedQuery,
    offset: u32,
    page_size: u32,
    last_has_more: bool,
}

impl Pager {
    #[must_use]
    pub fn new(source: Arc<dyn MediaSource>, query: PagedQuery) -> Self {
        let (offset, page_size) = match &query {
            PagedQuery::Search(q) => (q.offset, q.limit.unwrap_or_else(|| source.page_size())),
            _ => (0, source.page_size()),
        };

        Self {
            source,
            query,
            offset,
            page_size,
            last_has_more: true,
        }
    }

    #[must_use]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Static source capability AND the flag of the last fetched page
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.source.paginates() && self.last_has_more
    }

    /// Fetch the page at the current offset
    pub async fn results(&mut self, ctx: &mut SourceContext) -> Page<ContentItem> {
        let page = self.fetch(ctx).await;
        self.last_has_more = page.has_more;
        page
    }

    /// Advance one page and fetch it; a source without pagination yields an
    /// empty page without a request
    pub async fn next_page(&mut self, ctx: &mut SourceContext) -> Page<ContentItem> {
        if !self.source.paginates() {
            return Page::empty();
        }

        self.offset = self.offset.saturating_add(self.page_size);
        debug!(
            "{} pager advancing to offset {}",
            self.source.id(),
            self.offset
        );
        self.results(ctx).await
    }

    async fn fetch(&self, ctx: &mut SourceContext) -> Page<ContentItem> {
        let page = PageRequest {
            offset: self.offset,
            limit: Some(self.page_size),
        };

        match &self.query {
            PagedQuery::Home => self.source.home(page, ctx).await,
            PagedQuery::Search(query) => {
                let query = SearchQuery {
                    offset: self.offset,
                    limit: Some(self.page_size),
                    ..query.clone()
                };
                self.source.search(&query, ctx).await
            }
            PagedQuery::Channel(id) => match self.source.channel(id, page, ctx).await {
                Ok(details) => details.videos.map(ContentItem::Media),
                Err(e) => {
                    warn!("{} channel page failed: {}", self.source.id(), e);
                    Page::degraded(format!("Failed to load channel: {e}"))
                }
            },
            PagedQuery::Playlist(id) => match self.source.playlist(id, page, ctx).await {
                Ok(details) => details.videos.map(ContentItem::Media),
                Err(e) => {
                    warn!("{} playlist page failed: {}", self.source.id(), e);
                    Page::degraded(format!("Failed to load playlist: {e}"))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::records::{ChannelDetails, MediaRecord};
    use crate::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingSource {
        paginates: bool,
        offsets: Mutex<Vec<u32>>,
    }

    impl RecordingSource {
        fn new(paginates: bool) -> Arc<Self> {
            Arc::new(Self {
                paginates,
                offsets: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MediaSource for RecordingSource {
        fn id(&self) -> &'static str {
            "recording"
        }
        fn name(&self) -> &'static str {
            "Recording"
        }
        fn description(&self) -> &'static str {
            "Records requested offsets"
        }
        fn page_size(&self) -> u32 {
            20
        }
        fn paginates(&self) -> bool {
            self.paginates
        }

        async fn home(&self, page: PageRequest, _ctx: &mut SourceContext) -> Page<ContentItem> {
            self.offsets.lock().unwrap().push(page.offset);
            let item = ContentItem::Media(MediaRecord {
                id: page.offset.to_string(),
                ..Default::default()
            });
            Page::paged(vec![item], page.offset < 40, page.offset + 20)
        }

        async fn search(&self, query: &SearchQuery, _ctx: &mut SourceContext) -> Page<ContentItem> {
            self.offsets.lock().unwrap().push(query.offset);
            Page::paged(Vec::new(), true, query.offset + 20)
        }

        async fn channel(
            &self,
            id: &str,
            _page: PageRequest,
            _ctx: &mut SourceContext,
        ) -> Result<ChannelDetails> {
            Err(crate::Error::not_found("Channel", id))
        }

        async fn content_details(&self, url: &str, _ctx: &mut SourceContext) -> Result<MediaRecord> {
            Err(crate::Error::not_found("Content", url))
        }
    }

    #[tokio::test]
    async fn test_next_page_advances_by_page_size() {
        let source = RecordingSource::new(true);
        let mut pager = Pager::new(source.clone(), PagedQuery::Home);
        let mut ctx = SourceContext::new();

        let first = pager.results(&mut ctx).await;
        assert_eq!(first.items[0].id(), "0");
        assert!(pager.has_more());

        pager.next_page(&mut ctx).await;
        assert_eq!(pager.offset(), 20);
        let third = pager.next_page(&mut ctx).await;
        assert_eq!(pager.offset(), 40);
        assert_eq!(third.items[0].id(), "40");
        assert!(!pager.has_more());

        // results() re-fetches rather than caching
        pager.results(&mut ctx).await;
        assert_eq!(*source.offsets.lock().unwrap(), vec![0, 20, 40, 40]);
    }

    #[tokio::test]
    async fn test_search_pager_keeps_query() {
        let source = RecordingSource::new(true);
        let query = SearchQuery::new("jazz").at_offset(20);
        let mut pager = Pager::new(source.clone(), PagedQuery::Search(query));
        let mut ctx = SourceContext::new();

        pager.results(&mut ctx).await;
        pager.next_page(&mut ctx).await;
        assert_eq!(*source.offsets.lock().unwrap(), vec![20, 40]);
    }

    #[tokio::test]
    async fn test_non_paginating_source() {
        let source = RecordingSource::new(false);
        let mut pager = Pager::new(source.clone(), PagedQuery::Home);
        let mut ctx = SourceContext::new();

        pager.results(&mut ctx).await;
        assert!(!pager.has_more());
        assert!(pager.next_page(&mut ctx).await.is_empty());
        assert_eq!(pager.offset(), 0);
        assert_eq!(source.offsets.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_channel_errors_degrade() {
        let source = RecordingSource::new(true);
        let mut pager = Pager::new(source, PagedQuery::Channel("missing".to_string()));
        let page = pager.results(&mut SourceContext::new()).await;
        assert!(page.is_degraded());
        assert!(!pager.has_more());
    }
}
