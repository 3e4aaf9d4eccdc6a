//! Fire-and-forget analytics dispatch (Umami or GA4).
//!
//! A send never delays or fails the originating request: events go out on
//! a detached task and failures are logged at debug level only.

use std::time::Duration;

use serde_json::json;
use tracing::debug;

use openfeeder_common::{AnalyticsProvider, Config};

/// Ordered AI-bot User-Agent substrings and their families. First match
/// wins.
const BOT_FAMILIES: [(&str, &str); 13] = [
    ("GPTBot", "openai"),
    ("ChatGPT-User", "openai"),
    ("ClaudeBot", "anthropic"),
    ("anthropic-ai", "anthropic"),
    ("PerplexityBot", "perplexity"),
    ("Google-Extended", "google"),
    ("Googlebot", "google"),
    ("CCBot", "common-crawl"),
    ("cohere-ai", "cohere"),
    ("FacebookBot", "meta"),
    ("Amazonbot", "amazon"),
    ("YouBot", "you"),
    ("Bytespider", "bytedance"),
];

/// Classify a User-Agent string into `(bot_name, bot_family)`.
pub fn detect_bot(user_agent: &str) -> (&'static str, &'static str) {
    if user_agent.is_empty() {
        return ("unknown", "unknown");
    }
    let ua_lower = user_agent.to_lowercase();
    for (pattern, family) in BOT_FAMILIES {
        if ua_lower.contains(&pattern.to_lowercase()) {
            return (pattern, family);
        }
    }
    ("human-or-unknown", "unknown")
}

/// One tracked request.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsEvent {
    pub hostname: String,
    pub url: String,
    pub bot_name: String,
    pub bot_family: String,
    pub endpoint: &'static str,
    pub query: String,
    pub intent: String,
    pub results: usize,
    pub cached: bool,
    pub response_ms: u128,
}

#[derive(Clone)]
pub struct Analytics {
    provider: AnalyticsProvider,
    url: String,
    site_id: String,
    api_key: String,
    client: Option<reqwest::Client>,
}

impl Analytics {
    pub fn from_config(config: &Config) -> Self {
        let enabled = config.analytics_provider != AnalyticsProvider::None
            && !config.analytics_url.is_empty()
            && !config.analytics_site_id.is_empty();

        let client = enabled.then(|| {
            reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default()
        });

        Self {
            provider: config.analytics_provider,
            url: config.analytics_url.trim_end_matches('/').to_string(),
            site_id: config.analytics_site_id.clone(),
            api_key: config.analytics_api_key.clone(),
            client,
        }
    }

    /// Disabled sender, for tests.
    pub fn disabled() -> Self {
        Self {
            provider: AnalyticsProvider::None,
            url: String::new(),
            site_id: String::new(),
            api_key: String::new(),
            client: None,
        }
    }

    pub fn enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Queue an event; returns immediately.
    pub fn track(&self, event: AnalyticsEvent) {
        if !self.enabled() {
            return;
        }
        let sender = self.clone();
        tokio::spawn(async move {
            if let Err(e) = sender.send(event).await {
                debug!(error = %e, "analytics send failed (non-critical)");
            }
        });
    }

    async fn send(&self, event: AnalyticsEvent) -> Result<(), reqwest::Error> {
        let Some(client) = &self.client else {
            return Ok(());
        };
        match self.provider {
            AnalyticsProvider::Umami => self.send_umami(client, &event).await,
            AnalyticsProvider::Ga4 => self.send_ga4(client, &event).await,
            AnalyticsProvider::None => Ok(()),
        }
    }

    async fn send_umami(
        &self,
        client: &reqwest::Client,
        event: &AnalyticsEvent,
    ) -> Result<(), reqwest::Error> {
        let payload = json!({
            "type": "event",
            "payload": {
                "website": self.site_id,
                "hostname": event.hostname,
                "url": if event.url.is_empty() { "/openfeeder" } else { &event.url },
                "name": "openfeeder_request",
                "data": {
                    "bot_name": event.bot_name,
                    "bot_family": event.bot_family,
                    "endpoint": event.endpoint,
                    "query": event.query,
                    "intent": event.intent,
                    "results": event.results,
                    "cached": event.cached,
                    "response_ms": event.response_ms,
                },
            },
        });

        let mut request = client.post(format!("{}/api/send", self.url)).json(&payload);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        request.send().await?;
        Ok(())
    }

    async fn send_ga4(
        &self,
        client: &reqwest::Client,
        event: &AnalyticsEvent,
    ) -> Result<(), reqwest::Error> {
        if self.api_key.is_empty() {
            return Ok(());
        }
        let payload = json!({
            "client_id": if event.bot_name.is_empty() { "bot" } else { &event.bot_name },
            "events": [{
                "name": "openfeeder_request",
                "params": {
                    "bot_name": event.bot_name,
                    "bot_family": event.bot_family,
                    "endpoint": event.endpoint,
                    "search_term": event.query,
                    "results": event.results,
                },
            }],
        });

        let url = format!(
            "https://www.google-analytics.com/mp/collect?measurement_id={}&api_secret={}",
            self.site_id, self.api_key
        );
        client.post(url).json(&payload).send().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_bots_map_to_families() {
        assert_eq!(detect_bot("GPTBot/1.0"), ("GPTBot", "openai"));
        assert_eq!(detect_bot("ClaudeBot"), ("ClaudeBot", "anthropic"));
        assert_eq!(
            detect_bot("PerplexityBot/1.0"),
            ("PerplexityBot", "perplexity")
        );
        assert_eq!(detect_bot("Mozilla/5.0 ccbot crawler"), ("CCBot", "common-crawl"));
    }

    #[test]
    fn humans_and_empty_agents() {
        assert_eq!(detect_bot("Mozilla/5.0 (human)"), ("human-or-unknown", "unknown"));
        assert_eq!(detect_bot(""), ("unknown", "unknown"));
    }

    #[test]
    fn first_match_wins() {
        // Contains both GPTBot and Googlebot substrings; GPTBot is first
        // in the table.
        assert_eq!(detect_bot("Googlebot GPTBot"), ("GPTBot", "openai"));
    }

    #[test]
    fn disabled_sender_tracks_nothing() {
        let analytics = Analytics::disabled();
        assert!(!analytics.enabled());
    }
}
