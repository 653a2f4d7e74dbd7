use media_source_adapters::config::SunoConfig;
use media_source_adapters::{
    ContentItem, Error, MediaSource, MissingTimestamp, PageRequest, PagedQuery, Pager,
    RetryConfig, SearchKind, SearchQuery, SourceContext, StreamKind, SunoSource,
};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn source(server: &MockServer, page_size: u32) -> SunoSource {
    SunoSource::new(
        SunoConfig {
            search_url: server.uri(),
            api_url: server.uri(),
            site_url: "https://suno.com".to_string(),
            cdn_url: "https://cdn2.suno.ai".to_string(),
            page_size,
        },
        Client::new(),
        RetryConfig::immediate(2),
        MissingTimestamp::Epoch,
    )
}

fn clip(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "audio_url": format!("https://cdn1.suno.ai/{id}.mp3"),
        "metadata": {"duration": 95.5, "prompt": "lofi beats"},
        "user": {"id": "u1", "handle": "neon", "display_name": "Neon Nights"},
        "play_count": 12
    })
}

#[tokio::test]
async fn test_home_is_popular_songs_collection() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/search/"))
        .and(query_param("type", "song"))
        .and(query_param("limit", "30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clips": [clip("a", "First"), clip("b", "Second"), {"title": "no id"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = source(&server, 30)
        .home(PageRequest::first(), &mut SourceContext::new())
        .await;

    assert_eq!(page.len(), 1);
    let ContentItem::Collection(popular) = &page.items[0] else {
        panic!("expected the popular songs collection");
    };
    assert_eq!(popular.name, "Popular Songs");
    assert_eq!(popular.item_count, 2);
    assert_eq!(popular.items[0].duration_ms, 95_500);
}

#[tokio::test]
async fn test_search_returns_mixed_results() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/search/"))
        .and(query_param("q", "lofi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clips": [clip("a", "Lofi One")],
            "users": [{"id": "u1", "handle": "neon", "display_name": "Neon Nights"}],
            "playlists": [{"id": "p1", "name": "Lofi Mix", "clip_count": 8}]
        })))
        .mount(&server)
        .await;

    let page = source(&server, 30)
        .search(&SearchQuery::new("lofi"), &mut SourceContext::new())
        .await;

    assert_eq!(page.len(), 3);
    assert!(matches!(page.items[0], ContentItem::Media(_)));
    assert!(matches!(page.items[1], ContentItem::Channel(_)));
    assert!(matches!(page.items[2], ContentItem::Collection(_)));
    assert!(!page.has_more);
}

#[tokio::test]
async fn test_typed_searches() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/search/"))
        .and(query_param("type", "user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{"id": "u1", "handle": "neon"}, {"display_name": "nameless"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/search/"))
        .and(query_param("type", "playlist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "playlists": [{"id": "p1", "name": "Lofi Mix"}]
        })))
        .mount(&server)
        .await;

    let source = source(&server, 30);
    let mut ctx = SourceContext::new();

    let channels = source
        .search_channels(&SearchQuery::new("neon"), &mut ctx)
        .await;
    assert_eq!(channels.len(), 1);
    assert_eq!(channels.items[0].url, "https://suno.com/@neon");

    let playlists = source
        .search_playlists(&SearchQuery::new("lofi"), &mut ctx)
        .await;
    assert_eq!(playlists.len(), 1);
    assert_eq!(playlists.items[0].name, "Lofi Mix");
}

#[tokio::test]
async fn test_search_failure_degrades() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let page = source(&server, 30)
        .search(
            &SearchQuery::new("lofi").with_kind(SearchKind::Media),
            &mut SourceContext::new(),
        )
        .await;
    assert!(page.is_degraded());
}

#[tokio::test]
async fn test_search_pager_forwards_offset() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/search/"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clips": [clip("c", "Third")]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/search/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clips": [clip("a", "First"), clip("b", "Second")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let query = SearchQuery::new("beats").with_kind(SearchKind::Media);
    let mut pager = Pager::new(Arc::new(source(&server, 2)), PagedQuery::Search(query));
    let mut ctx = SourceContext::new();

    assert_eq!(pager.results(&mut ctx).await.len(), 2);
    assert!(pager.has_more());

    let next = pager.next_page(&mut ctx).await;
    assert_eq!(next.items[0].name(), "Third");
    assert!(!pager.has_more());
}

#[tokio::test]
async fn test_playlist_lookup() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/playlists/p1/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "p1",
            "name": "Lofi Mix",
            "description": "Late night",
            "user": {"id": "u1", "handle": "neon", "display_name": "Neon Nights"},
            "playlist_clips": [{"clip": clip("a", "First")}, {"clip": clip("b", "Second")}]
        })))
        .mount(&server)
        .await;

    let details = source(&server, 30)
        .playlist("p1", PageRequest::first(), &mut SourceContext::new())
        .await
        .unwrap();

    assert_eq!(details.playlist.name, "Lofi Mix");
    assert_eq!(details.playlist.author.url, "https://suno.com/@neon");
    assert_eq!(details.playlist.item_count, 2);
    assert_eq!(details.videos.len(), 2);
}

#[tokio::test]
async fn test_channel_recent_clips() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/profiles/neon/recent_clips"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([clip("a", "First"), clip("b", "Second")])),
        )
        .mount(&server)
        .await;

    let details = source(&server, 30)
        .channel("@neon", PageRequest::first(), &mut SourceContext::new())
        .await
        .unwrap();

    assert_eq!(details.channel.id, "neon");
    assert_eq!(details.channel.name, "Neon Nights");
    assert_eq!(details.videos.len(), 2);
}

#[tokio::test]
async fn test_content_details_and_batch_lookup() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/clips/abc/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(clip("abc", "Found")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/clips/gone/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let source = source(&server, 30);
    let mut ctx = SourceContext::new();

    let record = source
        .content_details("https://suno.com/song/abc", &mut ctx)
        .await
        .unwrap();
    assert_eq!(record.name, "Found");
    assert_eq!(record.streams[0].kind, StreamKind::Audio);
    assert_eq!(record.streams[0].url, "https://cdn1.suno.ai/abc.mp3");

    let err = source.content_details("gone", &mut ctx).await.unwrap_err();
    assert!(matches!(err, Error::RequestFailed { status: 404, .. }));
    assert!(err.is_not_found());

    let records = source.clips(&["abc", "gone"], &mut ctx).await;
    assert_eq!(records.len(), 1);
}
