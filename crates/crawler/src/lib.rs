//! # OpenFeeder Crawler
//!
//! Sitemap-seeded BFS crawler with same-origin discipline. Seeds the
//! frontier from `/sitemap.xml` (expanding sitemap index files), then
//! follows internal links breadth-first up to the page limit. Fetch
//! failures are collected as error strings; a crawl always returns a
//! result.

mod sitemap;

use std::collections::{HashSet, VecDeque};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info};
use url::Url;

pub use sitemap::fetch_sitemap;

const USER_AGENT: &str = "OpenFeeder/1.0 (sidecar crawler)";
const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// A crawled page with its raw HTML and resolved URL.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
    pub status: u16,
}

/// Aggregated result of a full crawl run.
#[derive(Debug, Default)]
pub struct CrawlResult {
    pub pages: Vec<FetchedPage>,
    pub errors: Vec<String>,
}

/// File extensions we never want to crawl.
fn skip_extension_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\.(jpg|jpeg|png|gif|svg|webp|ico|pdf|zip|tar|gz|mp3|mp4|mov|avi|woff2?|ttf|eot|css|js)$",
        )
        .expect("valid extension regex")
    })
}

/// Strip the fragment, and the trailing slash on non-root paths.
pub fn normalise_url(raw: &str) -> String {
    let without_fragment = match raw.split_once('#') {
        Some((head, _)) => head,
        None => raw,
    };
    if without_fragment.ends_with('/') && without_fragment.matches('/').count() > 3 {
        without_fragment.trim_end_matches('/').to_string()
    } else {
        without_fragment.to_string()
    }
}

fn same_origin(base: &Url, candidate: &Url) -> bool {
    base.host_str() == candidate.host_str() && base.port() == candidate.port()
}

/// Whether a discovered link belongs in the crawl frontier.
pub fn is_crawlable(base: &Url, candidate: &str) -> bool {
    let Ok(parsed) = Url::parse(candidate) else {
        return false;
    };
    same_origin(base, &parsed) && !skip_extension_re().is_match(candidate)
}

/// Extract internal links from an HTML page, resolved and normalised.
fn extract_links(html: &str, page_url: &Url, base: &Url) -> Vec<String> {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    let anchor = SELECTOR.get_or_init(|| Selector::parse("a[href]").expect("static selector"));

    let doc = Html::parse_document(html);
    let mut links = Vec::new();
    for el in doc.select(anchor) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let Ok(absolute) = page_url.join(href) else {
            continue;
        };
        let normalised = normalise_url(absolute.as_str());
        if is_crawlable(base, &normalised) {
            links.push(normalised);
        }
    }
    links
}

/// Crawl `site_url` and return up to `max_pages` pages.
///
/// Strategy: seed from `sitemap.xml` when present, always include the
/// root, then BFS over internal links. The visited set is bounded at
/// `2 * max_pages` so link-dense sites cannot grow it without limit.
pub async fn crawl(site_url: &Url, max_pages: usize) -> CrawlResult {
    let mut result = CrawlResult::default();

    let client = match reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            result.errors.push(format!("client init: {e}"));
            return result;
        }
    };

    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();

    // Seed from the sitemap; any failure here is non-fatal.
    for seed in fetch_sitemap(&client, site_url).await {
        let normalised = normalise_url(&seed);
        if visited.insert(normalised.clone()) {
            queue.push_back(normalised);
        }
    }

    let root = normalise_url(site_url.as_str());
    if visited.insert(root.clone()) {
        queue.push_front(root);
    }

    while let Some(url) = queue.pop_front() {
        if result.pages.len() >= max_pages {
            break;
        }

        let response = match client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                result.errors.push(format!("GET {url}: {e}"));
                continue;
            }
        };

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.contains("text/html") {
            debug!(url = %url, content_type = %content_type, "skipping non-HTML response");
            continue;
        }

        let status = response.status().as_u16();
        if status >= 400 {
            result.errors.push(format!("GET {url}: HTTP {status}"));
            continue;
        }

        let html = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                result.errors.push(format!("GET {url}: {e}"));
                continue;
            }
        };

        let page_url = match Url::parse(&url) {
            Ok(parsed) => parsed,
            Err(e) => {
                result.errors.push(format!("GET {url}: {e}"));
                continue;
            }
        };

        info!(url = %url, fetched = result.pages.len() + 1, max = max_pages, "crawled page");
        let links = extract_links(&html, &page_url, site_url);
        result.pages.push(FetchedPage { url, html, status });

        for link in links {
            if !visited.contains(&link) && visited.len() < max_pages * 2 {
                visited.insert(link.clone());
                queue.push_back(link);
            }
        }
    }

    info!(
        pages = result.pages.len(),
        errors = result.errors.len(),
        "crawl complete"
    );
    result
}
