//! Process configuration, read once from the environment at startup.

use std::path::PathBuf;

use url::Url;

use crate::error::{FeederError, Result};

/// Analytics backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsProvider {
    None,
    Umami,
    Ga4,
}

impl AnalyticsProvider {
    fn parse(raw: &str) -> Self {
        match raw {
            "umami" => AnalyticsProvider::Umami,
            "ga4" => AnalyticsProvider::Ga4,
            _ => AnalyticsProvider::None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the site to crawl and serve. Required.
    pub site_url: Url,
    /// Display name, derived from the site host.
    pub site_name: String,
    /// BCP-47 language tag of the site content.
    pub site_lang: String,
    /// Seconds between scheduled re-crawls.
    pub crawl_interval: u64,
    /// Maximum pages per crawl run.
    pub max_pages: usize,
    /// HTTP listen port.
    pub port: u16,
    /// Embedding model name.
    pub embedding_model: String,
    /// Bearer secret for the webhook endpoint; auth is disabled when unset.
    pub webhook_secret: Option<String>,
    /// Directory for the persisted vector store.
    pub persist_dir: PathBuf,
    /// File path for the persisted tombstone map.
    pub tombstone_path: PathBuf,

    pub analytics_provider: AnalyticsProvider,
    pub analytics_url: String,
    pub analytics_site_id: String,
    pub analytics_api_key: String,
}

impl Config {
    /// Read the full configuration from the environment.
    ///
    /// Fails when `SITE_URL` is absent or unparseable; every other
    /// variable has a default.
    pub fn from_env() -> Result<Self> {
        let raw_site = std::env::var("SITE_URL")
            .map_err(|_| FeederError::Config("SITE_URL environment variable is required".into()))?;
        let site_url = Url::parse(&raw_site)
            .map_err(|e| FeederError::Config(format!("SITE_URL is not a valid URL: {e}")))?;
        let site_name = site_url
            .host_str()
            .map(str::to_string)
            .ok_or_else(|| FeederError::Config("SITE_URL has no host".into()))?;

        Ok(Self {
            site_url,
            site_name,
            site_lang: env_or("SITE_LANG", "en"),
            crawl_interval: env_parsed("CRAWL_INTERVAL", 3600),
            max_pages: env_parsed("MAX_PAGES", 500),
            port: env_parsed("PORT", 8080),
            embedding_model: env_or("EMBEDDING_MODEL", "all-MiniLM-L6-v2"),
            webhook_secret: std::env::var("OPENFEEDER_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            persist_dir: PathBuf::from(env_or("OPENFEEDER_DATA_DIR", "/data/chromadb")),
            tombstone_path: PathBuf::from(env_or(
                "OPENFEEDER_TOMBSTONE_PATH",
                "/app/data/tombstones.json",
            )),
            analytics_provider: AnalyticsProvider::parse(&env_or("ANALYTICS_PROVIDER", "none")),
            analytics_url: env_or("ANALYTICS_URL", ""),
            analytics_site_id: env_or("ANALYTICS_SITE_ID", ""),
            analytics_api_key: env_or("ANALYTICS_API_KEY", ""),
        })
    }

    /// Resolve a relative path (`/slug`) against the site base URL.
    /// Absolute URLs pass through unchanged.
    pub fn resolve_site_path(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.site_url.as_str().trim_end_matches('/');
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            site_url: Url::parse("https://example.com").unwrap(),
            site_name: "example.com".into(),
            site_lang: "en".into(),
            crawl_interval: 3600,
            max_pages: 500,
            port: 8080,
            embedding_model: "all-MiniLM-L6-v2".into(),
            webhook_secret: None,
            persist_dir: PathBuf::from("/tmp/openfeeder"),
            tombstone_path: PathBuf::from("/tmp/openfeeder/tombstones.json"),
            analytics_provider: AnalyticsProvider::None,
            analytics_url: String::new(),
            analytics_site_id: String::new(),
            analytics_api_key: String::new(),
        }
    }

    #[test]
    fn resolves_relative_paths_against_base() {
        let cfg = test_config();
        assert_eq!(
            cfg.resolve_site_path("/recipes/pie"),
            "https://example.com/recipes/pie"
        );
        assert_eq!(
            cfg.resolve_site_path("recipes/pie"),
            "https://example.com/recipes/pie"
        );
    }

    #[test]
    fn absolute_urls_pass_through() {
        let cfg = test_config();
        assert_eq!(
            cfg.resolve_site_path("https://example.com/a"),
            "https://example.com/a"
        );
    }

    #[test]
    fn analytics_provider_parsing() {
        assert_eq!(AnalyticsProvider::parse("umami"), AnalyticsProvider::Umami);
        assert_eq!(AnalyticsProvider::parse("ga4"), AnalyticsProvider::Ga4);
        assert_eq!(AnalyticsProvider::parse("none"), AnalyticsProvider::None);
        assert_eq!(AnalyticsProvider::parse("bogus"), AnalyticsProvider::None);
    }
}
