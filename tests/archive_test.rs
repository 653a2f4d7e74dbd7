use media_source_adapters::config::ArchiveConfig;
use media_source_adapters::{
    ArchiveSource, Error, MediaSource, MissingTimestamp, PageRequest, PagedQuery, Pager,
    RetryConfig, SearchQuery, SourceContext, StreamKind,
};
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn source(server: &MockServer) -> ArchiveSource {
    ArchiveSource::new(
        ArchiveConfig {
            base_url: server.uri(),
            page_size: 20,
        },
        Client::new(),
        RetryConfig::immediate(2),
        MissingTimestamp::Epoch,
    )
}

fn search_body() -> serde_json::Value {
    json!({
        "responseHeader": {"status": 0},
        "response": {
            "numFound": 2,
            "start": 0,
            "docs": [
                {
                    "identifier": "his_girl_friday",
                    "title": "His Girl Friday",
                    "creator": "Howard Hawks",
                    "downloads": 5000,
                    "publicdate": "2005-01-01T00:00:00Z"
                },
                {"title": "Missing identifier"}
            ]
        }
    })
}

#[tokio::test]
async fn test_search_maps_documents() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/advancedsearch.php"))
        .and(query_param("q", "hawks mediatype:(movies OR video)"))
        .and(query_param("output", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .expect(1)
        .mount(&server)
        .await;

    let page = source(&server)
        .search(&SearchQuery::new("hawks"), &mut SourceContext::new())
        .await;

    assert_eq!(page.len(), 1);
    assert!(!page.has_more);
    assert_eq!(page.items[0].name(), "His Girl Friday");
}

#[tokio::test]
async fn test_blank_search_sends_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .expect(0)
        .mount(&server)
        .await;

    let page = source(&server)
        .search(&SearchQuery::new("   "), &mut SourceContext::new())
        .await;
    assert!(page.is_empty());
    assert!(!page.is_degraded());
}

#[tokio::test]
async fn test_home_degrades_on_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/advancedsearch.php"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&server)
        .await;

    let page = source(&server)
        .home(PageRequest::first(), &mut SourceContext::new())
        .await;
    assert!(page.is_degraded());
}

#[tokio::test]
async fn test_pager_does_not_advance_without_pagination() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/advancedsearch.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .expect(1)
        .mount(&server)
        .await;

    let mut pager = Pager::new(Arc::new(source(&server)), PagedQuery::Home);
    let mut ctx = SourceContext::new();

    assert_eq!(pager.results(&mut ctx).await.len(), 1);
    assert!(!pager.has_more());
    assert!(pager.next_page(&mut ctx).await.is_empty());
}

#[tokio::test]
async fn test_content_details_picks_mp4_first() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/metadata/his_girl_friday"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "d1": "ia800300.us.archive.org",
            "dir": "/12/items/his_girl_friday",
            "metadata": {"title": "His Girl Friday", "creator": "Howard Hawks"},
            "item": {"downloads": 42},
            "files": [
                {"name": "his_girl_friday.ogv", "format": "Ogg Video", "length": "5532.00"},
                {"name": "his_girl_friday.mp4", "format": "h.264", "length": "01:32:12"},
                {"name": "his_girl_friday.txt", "format": "Text"}
            ]
        })))
        .mount(&server)
        .await;

    let record = source(&server)
        .content_details(
            &format!("{}/details/his_girl_friday", server.uri()),
            &mut SourceContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(record.streams.len(), 2);
    assert_eq!(record.streams[0].kind, StreamKind::Video);
    assert_eq!(
        record.streams[0].url,
        "https://ia800300.us.archive.org/12/items/his_girl_friday/his_girl_friday.mp4"
    );
    assert_eq!(record.streams[0].container, "video/mp4");
    assert_eq!(record.streams[1].container, "video/ogg");
    assert_eq!(record.duration_ms, 5_532_000);
    assert_eq!(record.view_count, 42);
    assert_eq!(
        record.thumbnails[0].url,
        "https://ia800300.us.archive.org/12/items/his_girl_friday/__ia_thumb.jpg"
    );
}

#[tokio::test]
async fn test_empty_metadata_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/metadata/nothing_here"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let err = source(&server)
        .content_details("nothing_here", &mut SourceContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn test_audio_only_item_has_no_streams() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/metadata/radio_show"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "d1": "ia1.us.archive.org",
            "dir": "/1/items/radio_show",
            "metadata": {"title": "Radio Show"},
            "files": [{"name": "episode.mp3", "format": "VBR MP3"}]
        })))
        .mount(&server)
        .await;

    let err = source(&server)
        .content_details("radio_show", &mut SourceContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoPlayableStreams { .. }));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_channel_scrapes_item_links() {
    let server = MockServer::start().await;

    let html = r#"
        <html>
          <head>
            <title>Prelinger Archives</title>
            <meta property="og:image" content="https://archive.org/services/img/prelinger">
          </head>
          <body>
            <h1>Prelinger Archives</h1>
            <div class="item">
              <a href="/details/duck_and_cover"><h3>Duck and Cover</h3></a>
            </div>
            <a href="/details/duck_and_cover">Duck and Cover (again)</a>
            <a href="/details/what_is_communism"><img src="/img/c.jpg" alt="What Is Communism?"></a>
            <a href="/about">About</a>
          </body>
        </html>
    "#;

    Mock::given(method("GET"))
        .and(path("/details/prelinger"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(&server)
        .await;

    let details = source(&server)
        .channel("prelinger", PageRequest::first(), &mut SourceContext::new())
        .await
        .unwrap();

    assert_eq!(details.channel.name, "Prelinger Archives");
    assert_eq!(details.videos.len(), 2);
    assert_eq!(details.videos.items[0].author.name, "Internet Archive");
    assert_eq!(
        details.videos.items[0].url,
        format!("{}/details/duck_and_cover", server.uri())
    );
}

#[tokio::test]
async fn test_collection_playlist() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/metadata/film_noir"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": {
                "identifier": "film_noir",
                "title": "Film Noir",
                "description": "Classic noir",
                "publicdate": "2009-06-01 10:00:00"
            },
            "files": []
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/advancedsearch.php"))
        .and(query_param("q", "collection:(film_noir)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_body()))
        .mount(&server)
        .await;

    let details = source(&server)
        .playlist("film_noir", PageRequest::first(), &mut SourceContext::new())
        .await
        .unwrap();

    assert_eq!(details.playlist.name, "Film Noir");
    assert_eq!(details.playlist.item_count, 2);
    assert_eq!(details.videos.len(), 1);
    assert_eq!(
        details.metadata.get("publicDate").map(String::as_str),
        Some("2009-06-01 10:00:00")
    );
}
