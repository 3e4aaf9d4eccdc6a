//! Discovery document with conditional GET.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::analytics::{detect_bot, AnalyticsEvent};
use crate::server::AppState;
use crate::types::{make_etag, ApiError, DiscoveryDoc, FeedInfo, SiteInfo, PROTOCOL_VERSION};

const CACHE_CONTROL: &str = "public, max-age=300, stale-while-revalidate=60";

pub async fn discovery(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let site_url = {
        let raw = state.config.site_url.as_str();
        if state.config.site_url.path() == "/" {
            raw.trim_end_matches('/').to_string()
        } else {
            raw.to_string()
        }
    };

    let doc = DiscoveryDoc {
        version: PROTOCOL_VERSION,
        site: SiteInfo {
            name: state.config.site_name.clone(),
            url: site_url,
            language: state.config.site_lang.clone(),
            description: format!("OpenFeeder sidecar for {}", state.config.site_name),
        },
        feed: FeedInfo {
            endpoint: "/openfeeder",
            kind: "paginated",
        },
        capabilities: vec!["search", "embeddings", "diff-sync"],
        contact: None,
    };

    let payload = match serde_json::to_vec(&doc) {
        Ok(payload) => payload,
        Err(e) => return ApiError::internal(e.to_string()).into_response(),
    };
    let etag = make_etag(&payload);

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let (bot_name, bot_family) = detect_bot(user_agent);
    state.analytics.track(AnalyticsEvent {
        hostname: state.config.site_name.clone(),
        url: "/.well-known/openfeeder.json".into(),
        bot_name: bot_name.into(),
        bot_family: bot_family.into(),
        endpoint: "discovery",
        ..AnalyticsEvent::default()
    });

    let matches = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == etag);
    if matches {
        return (
            StatusCode::NOT_MODIFIED,
            [
                (header::ETAG, etag),
                (header::CACHE_CONTROL, CACHE_CONTROL.to_string()),
            ],
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [
            (header::ETAG, etag),
            (header::CACHE_CONTROL, CACHE_CONTROL.to_string()),
            (header::CONTENT_TYPE, "application/json".to_string()),
        ],
        payload,
    )
        .into_response()
}
