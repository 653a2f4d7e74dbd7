//! HTML scraping for pages that have no JSON API

use crate::{Error, Result};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;

/// Link to a media page found on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedLink {
    pub url: String,
    pub title: String,
    pub thumbnail: Option<String>,
}

/// Which anchors on a listing page count as media links
#[derive(Debug, Clone, Copy)]
pub struct LinkRule<'a> {
    /// Candidate elements, e.g. `a[href*="/details/"]`
    pub candidates: &'a str,
    /// The href must contain at least one of these fragments
    pub href_contains: &'a [&'a str],
    /// Where the title lives inside a candidate
    pub title: &'a str,
    /// Prefix for relative hrefs
    pub base_url: &'a str,
}

/// Title, description and preview image of a single page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSummary {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::InvalidInput {
        field: "selector".to_string(),
        reason: format!("Invalid CSS selector '{css}': {e}"),
    })
}

fn text_of(element: ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<String>();
    let trimmed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Resolve a possibly relative href against `base_url`
#[must_use]
pub fn absolute_url(href: &str, base_url: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            href.trim_start_matches('/')
        )
    }
}

/// Collect media links from a listing page, de-duplicated by URL in page order
pub fn scrape_links(html: &str, rule: &LinkRule<'_>) -> Result<Vec<ScrapedLink>> {
    let document = Html::parse_document(html);
    let candidates = selector(rule.candidates)?;
    let title_selector = selector(rule.title)?;
    let img_selector = selector("img")?;

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&candidates) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if !rule.href_contains.iter().any(|fragment| href.contains(fragment)) {
            continue;
        }

        let url = absolute_url(href, rule.base_url);
        let image = element.select(&img_selector).next();

        let title = element
            .select(&title_selector)
            .next()
            .and_then(text_of)
            .or_else(|| {
                image
                    .and_then(|img| img.value().attr("alt"))
                    .map(str::trim)
                    .filter(|alt| !alt.is_empty())
                    .map(ToString::to_string)
            })
            .or_else(|| text_of(element));

        let Some(title) = title else {
            continue;
        };

        if seen.insert(url.clone()) {
            links.push(ScrapedLink {
                url,
                title,
                thumbnail: image
                    .and_then(|img| img.value().attr("src"))
                    .filter(|src| !src.is_empty())
                    .map(ToString::to_string),
            });
        }
    }

    debug!("Scraped {} links matching {}", links.len(), rule.candidates);
    Ok(links)
}

/// Extract page title, description and `og:image`
pub fn page_summary(html: &str, title: &str, description: &str) -> Result<PageSummary> {
    let document = Html::parse_document(html);
    let title_selector = selector(title)?;
    let description_selector = selector(description)?;
    let image_selector = selector("meta[property='og:image']")?;

    Ok(PageSummary {
        title: document.select(&title_selector).find_map(text_of),
        description: document.select(&description_selector).find_map(text_of),
        image: document
            .select(&image_selector)
            .find_map(|meta| meta.value().attr("content"))
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .map(ToString::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
          <a href="/details/night_of_the_living_dead"><img src="https://archive.org/img/1.jpg" alt="Alt title"><h3> Night of the
            Living Dead </h3></a>
          <a href="https://archive.org/details/plan9"><img src="/img/2.jpg" alt="Plan 9"></a>
          <a href="/details/night_of_the_living_dead">duplicate</a>
          <a href="/search?query=x">Search</a>
          <a href="/details/empty"></a>
        </body></html>
    "#;

    fn archive_rule() -> LinkRule<'static> {
        LinkRule {
            candidates: r#"a[href*="/details/"]"#,
            href_contains: &["/details/"],
            title: "h3, .title, .item-title",
            base_url: "https://archive.org",
        }
    }

    #[test]
    fn test_scrape_links() {
        let links = scrape_links(LISTING, &archive_rule()).unwrap();
        assert_eq!(links.len(), 2);

        assert_eq!(links[0].url, "https://archive.org/details/night_of_the_living_dead");
        assert_eq!(links[0].title, "Night of the Living Dead");
        assert_eq!(links[0].thumbnail.as_deref(), Some("https://archive.org/img/1.jpg"));

        assert_eq!(links[1].url, "https://archive.org/details/plan9");
        assert_eq!(links[1].title, "Plan 9");
    }

    #[test]
    fn test_href_filter() {
        let html = r#"<a href="/us/on-demand/movies/heat"><span class="title">Heat</span></a>
                      <a href="/us/on-demand/collections/new">New</a>"#;
        let rule = LinkRule {
            candidates: r#"a[href*="/on-demand/"]"#,
            href_contains: &["/movies/", "/series/"],
            title: "h3, .title, .video-title",
            base_url: "https://pluto.tv",
        };
        let links = scrape_links(html, &rule).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://pluto.tv/us/on-demand/movies/heat");
        assert_eq!(links[0].thumbnail, None);
    }

    #[test]
    fn test_page_summary() {
        let html = r#"<html><head><title>Fallback</title>
            <meta property="og:image" content="https://img.example/poster.jpg"></head>
            <body><h1>Heat</h1><p class="description"> A heist film. </p></body></html>"#;
        let summary = page_summary(html, "h1, .title", ".description, .summary").unwrap();
        assert_eq!(summary.title.as_deref(), Some("Heat"));
        assert_eq!(summary.description.as_deref(), Some("A heist film."));
        assert_eq!(summary.image.as_deref(), Some("https://img.example/poster.jpg"));

        let bare = page_summary("<html></html>", "h1", ".description").unwrap();
        assert_eq!(bare, PageSummary::default());
    }

    #[test]
    fn test_absolute_url() {
        assert_eq!(absolute_url("/a", "https://x.org/"), "https://x.org/a");
        assert_eq!(absolute_url("//cdn.x.org/a", "https://x.org"), "https://cdn.x.org/a");
        assert_eq!(absolute_url("https://y.org/a", "https://x.org"), "https://y.org/a");
    }

    #[test]
    fn test_invalid_selector() {
        let rule = LinkRule {
            candidates: "a[",
            ..archive_rule()
        };
        assert!(matches!(scrape_links("", &rule), Err(Error::InvalidInput { .. })));
    }
}
