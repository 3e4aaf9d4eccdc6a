//! Sitemap discovery.
//!
//! Fetches `/sitemap.xml`, expands sitemap index files and collects page
//! URLs. Every failure is swallowed: a missing or malformed sitemap just
//! yields an empty seed list.

use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use tracing::debug;
use url::Url;

/// Guard against pathological or self-referencing sitemap indexes.
const MAX_SITEMAPS: usize = 50;

#[derive(Debug, Default, PartialEq)]
pub(crate) struct SitemapEntries {
    /// Nested sitemap documents (`<sitemap><loc>`).
    pub sitemaps: Vec<String>,
    /// Page URLs (`<url><loc>`).
    pub pages: Vec<String>,
}

/// Parse one sitemap document into nested-sitemap and page URL lists.
pub(crate) fn parse_sitemap(xml: &str) -> SitemapEntries {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut entries = SitemapEntries::default();
    let mut in_sitemap = false;
    let mut in_url = false;
    let mut in_loc = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"sitemap" => in_sitemap = true,
                b"url" => in_url = true,
                b"loc" => in_loc = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"sitemap" => in_sitemap = false,
                b"url" => in_url = false,
                b"loc" => in_loc = false,
                _ => {}
            },
            Ok(Event::Text(text)) if in_loc => {
                if let Ok(loc) = text.unescape() {
                    let loc = loc.trim().to_string();
                    if loc.is_empty() {
                        continue;
                    }
                    if in_sitemap {
                        entries.sitemaps.push(loc);
                    } else if in_url {
                        entries.pages.push(loc);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!(error = %e, "sitemap parse error");
                break;
            }
            _ => {}
        }
    }

    entries
}

/// Fetch and recursively expand the site's sitemap, returning page URLs.
pub async fn fetch_sitemap(client: &Client, site_url: &Url) -> Vec<String> {
    let Ok(root) = site_url.join("/sitemap.xml") else {
        return Vec::new();
    };

    let mut pages = Vec::new();
    let mut pending = vec![root.to_string()];
    let mut fetched = 0;

    while let Some(sitemap_url) = pending.pop() {
        if fetched >= MAX_SITEMAPS {
            debug!(limit = MAX_SITEMAPS, "sitemap expansion limit reached");
            break;
        }
        fetched += 1;

        let body = match client.get(&sitemap_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(url = %sitemap_url, error = %e, "sitemap body read failed");
                    continue;
                }
            },
            Ok(resp) => {
                debug!(url = %sitemap_url, status = %resp.status(), "sitemap fetch skipped");
                continue;
            }
            Err(e) => {
                debug!(url = %sitemap_url, error = %e, "sitemap fetch failed");
                continue;
            }
        };

        let entries = parse_sitemap(&body);
        pending.extend(entries.sitemaps);
        pages.extend(entries.pages);
    }

    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_sitemap() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/a</loc></url>
  <url><loc>https://example.com/b</loc><lastmod>2024-01-01</lastmod></url>
</urlset>"#;
        let entries = parse_sitemap(xml);
        assert_eq!(entries.pages, vec!["https://example.com/a", "https://example.com/b"]);
        assert!(entries.sitemaps.is_empty());
    }

    #[test]
    fn parses_sitemap_index() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://example.com/sitemap-posts.xml</loc></sitemap>
  <sitemap><loc>https://example.com/sitemap-pages.xml</loc></sitemap>
</sitemapindex>"#;
        let entries = parse_sitemap(xml);
        assert_eq!(
            entries.sitemaps,
            vec![
                "https://example.com/sitemap-posts.xml",
                "https://example.com/sitemap-pages.xml"
            ]
        );
        assert!(entries.pages.is_empty());
    }

    #[test]
    fn malformed_xml_yields_partial_or_empty() {
        let entries = parse_sitemap("this is not xml at all <<<<");
        assert!(entries.pages.is_empty());
        assert!(entries.sitemaps.is_empty());
    }

    #[test]
    fn entity_escapes_are_decoded() {
        let xml = r#"<urlset><url><loc>https://example.com/a?x=1&amp;y=2</loc></url></urlset>"#;
        let entries = parse_sitemap(xml);
        assert_eq!(entries.pages, vec!["https://example.com/a?x=1&y=2"]);
    }
}
