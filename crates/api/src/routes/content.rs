//! The unified content endpoint: paginated index, single-page fetch,
//! semantic search, and differential sync under one query surface.
//!
//! Mode dispatch: `since`/`until` without `q` selects sync; `q` selects
//! search; `url` alone selects fetch; bare requests get the index.

use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};

use openfeeder_common::truncate_chars;

use crate::analytics::{detect_bot, AnalyticsEvent};
use crate::server::AppState;
use crate::sync::{encode_sync_token, parse_since};
use crate::types::{
    ApiError, ChunkOut, ContentParams, FetchMeta, IndexResponse, PageResponse, SyncCounts,
    SyncEnvelope, SyncResponse, PROTOCOL_VERSION, SCHEMA,
};

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 50;

/// Malformed numeric parameters silently fall back to their defaults.
fn parse_page(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.parse::<i64>().ok())
        .map(|v| v.max(1) as usize)
        .unwrap_or(1)
}

fn parse_limit(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.parse::<i64>().ok())
        .map(|v| v.clamp(1, MAX_LIMIT as i64) as usize)
        .unwrap_or(DEFAULT_LIMIT)
}

fn parse_min_score(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.parse::<f64>().ok())
        .map(|v| v.clamp(0.0, 1.0))
        .unwrap_or(0.0)
}

/// Resolve the `?url=` parameter against the site base, rejecting path
/// traversal outright.
fn resolve_url_param(state: &AppState, raw: &str) -> Result<String, ApiError> {
    if raw.contains("..") {
        return Err(ApiError::invalid_url(
            "The ?url= parameter must be a valid path without traversal.",
        ));
    }
    Ok(state.config.resolve_site_path(raw))
}

/// `(cached, cache_age_seconds)` derived from the last successful crawl.
fn cache_state(state: &AppState) -> (bool, Option<i64>) {
    match state.pipeline.last_crawl() {
        Some(ts) => (true, Some((Utc::now() - ts).num_seconds().max(0))),
        None => (false, None),
    }
}

fn with_cache_header(cached: bool, response: impl IntoResponse) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        "X-OpenFeeder-Cache",
        HeaderValue::from_static(if cached { "HIT" } else { "MISS" }),
    );
    response
}

pub async fn content(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ContentParams>,
) -> Response {
    let start = Instant::now();

    let query = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| truncate_chars(s, 200));

    let wants_sync = (params.since.is_some() || params.until.is_some()) && query.is_none();
    let (endpoint, outcome) = if wants_sync {
        ("sync", sync_mode(&state, &params).await)
    } else if let Some(q) = &query {
        ("search", search_mode(&state, &params, q).await)
    } else if let Some(url) = &params.url {
        ("fetch", fetch_mode(&state, &params, url).await)
    } else {
        ("index", index_mode(&state, &params).await)
    };

    let (cached, _) = cache_state(&state);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let (bot_name, bot_family) = detect_bot(user_agent);
    let results = outcome.as_ref().map(|(_, count)| *count).unwrap_or(0);
    state.analytics.track(AnalyticsEvent {
        hostname: state.config.site_name.clone(),
        url: "/openfeeder".into(),
        bot_name: bot_name.into(),
        bot_family: bot_family.into(),
        endpoint,
        query: query.unwrap_or_default(),
        intent: String::new(),
        results,
        cached,
        response_ms: start.elapsed().as_millis(),
    });

    match outcome {
        Ok((response, _)) => response,
        Err(e) => e.into_response(),
    }
}

// ---------------------------------------------------------------------------
// Index mode
// ---------------------------------------------------------------------------

async fn index_mode(
    state: &AppState,
    params: &ContentParams,
) -> Result<(Response, usize), ApiError> {
    let page = parse_page(params.page.as_deref());
    let limit = parse_limit(params.limit.as_deref());

    let (items, total) = state.pipeline.indexer().all_pages(page, limit).await?;
    let total_pages = std::cmp::max(1, total.div_ceil(limit));

    let count = items.len();
    let body = IndexResponse {
        schema: SCHEMA,
        kind: "index",
        page,
        total_pages,
        items,
    };
    let (cached, _) = cache_state(state);
    Ok((with_cache_header(cached, Json(body)), count))
}

// ---------------------------------------------------------------------------
// Search mode
// ---------------------------------------------------------------------------

async fn search_mode(
    state: &AppState,
    params: &ContentParams,
    query: &str,
) -> Result<(Response, usize), ApiError> {
    let limit = parse_limit(params.limit.as_deref());
    let min_score = parse_min_score(params.min_score.as_deref());
    let url_filter = match &params.url {
        Some(raw) => Some(resolve_url_param(state, raw)?),
        None => None,
    };

    let mut results = state
        .pipeline
        .indexer()
        .search(query, limit, url_filter.as_deref())
        .await?;
    results.retain(|r| r.relevance >= min_score);
    if results.is_empty() {
        return Err(ApiError::not_found("No results found for query."));
    }

    // The first (most relevant) hit's page supplies the envelope.
    let first_url = results[0].url.clone();
    let first_title = results[0].title.clone();
    let page_meta = state.pipeline.indexer().page_meta(&first_url).await?;

    let chunks: Vec<ChunkOut> = results
        .into_iter()
        .map(|r| ChunkOut {
            id: r.chunk_id,
            text: r.text,
            kind: r.chunk_type,
            relevance: Some(r.relevance),
        })
        .collect();
    let count = chunks.len();

    let (cached, cache_age) = cache_state(state);
    let body = PageResponse {
        schema: SCHEMA,
        url: first_url,
        title: page_meta
            .as_ref()
            .map(|m| m.title.clone())
            .unwrap_or(first_title),
        author: page_meta.as_ref().and_then(|m| m.author.clone()),
        published: page_meta.as_ref().and_then(|m| m.published.clone()),
        updated: page_meta.as_ref().and_then(|m| m.updated.clone()),
        language: page_meta
            .as_ref()
            .map(|m| m.language.clone())
            .unwrap_or_else(|| state.config.site_lang.clone()),
        summary: page_meta
            .as_ref()
            .map(|m| m.summary.clone())
            .unwrap_or_default(),
        chunks,
        meta: FetchMeta {
            total_chunks: count,
            returned_chunks: count,
            cached,
            cache_age_seconds: cache_age,
        },
    };
    Ok((with_cache_header(cached, Json(body)), count))
}

// ---------------------------------------------------------------------------
// Fetch mode
// ---------------------------------------------------------------------------

async fn fetch_mode(
    state: &AppState,
    params: &ContentParams,
    url: &str,
) -> Result<(Response, usize), ApiError> {
    let resolved = resolve_url_param(state, url)?;
    let limit = parse_limit(params.limit.as_deref());

    let meta = state
        .pipeline
        .indexer()
        .page_meta(&resolved)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Page not found: {url}")))?;

    let chunks: Vec<ChunkOut> = state
        .pipeline
        .indexer()
        .chunks_for_url(&resolved, limit)
        .await?
        .into_iter()
        .map(|c| ChunkOut {
            id: c.id,
            text: c.text,
            kind: c.chunk_type,
            relevance: None,
        })
        .collect();
    let count = chunks.len();

    let (cached, cache_age) = cache_state(state);
    let body = PageResponse {
        schema: SCHEMA,
        url: resolved,
        title: meta.title,
        author: meta.author,
        published: meta.published,
        updated: meta.updated,
        language: meta.language,
        summary: meta.summary,
        chunks,
        meta: FetchMeta {
            total_chunks: meta.chunk_count,
            returned_chunks: count,
            cached,
            cache_age_seconds: cache_age,
        },
    };
    Ok((with_cache_header(cached, Json(body)), count))
}

// ---------------------------------------------------------------------------
// Sync mode
// ---------------------------------------------------------------------------

async fn sync_mode(
    state: &AppState,
    params: &ContentParams,
) -> Result<(Response, usize), ApiError> {
    let since = parse_bound(params.since.as_deref(), "since")?;
    let until = parse_bound(params.until.as_deref(), "until")?;
    if let (Some(s), Some(u)) = (since, until) {
        if u < s {
            return Err(ApiError::invalid_param("until must not precede since"));
        }
    }

    let (added, updated) = state
        .pipeline
        .indexer()
        .pages_in_range(since, until)
        .await?;
    let deleted = state.pipeline.tombstones().in_range(since, until).await;

    let as_of = Utc::now().to_rfc3339();
    let counts = SyncCounts {
        added: added.len(),
        updated: updated.len(),
        deleted: deleted.len(),
    };
    let results = counts.added + counts.updated + counts.deleted;

    let body = SyncResponse {
        openfeeder_version: PROTOCOL_VERSION,
        sync: SyncEnvelope {
            sync_token: encode_sync_token(&as_of),
            as_of,
            since: since.map(|t| t.to_rfc3339()),
            until: until.map(|t| t.to_rfc3339()),
            counts,
        },
        added,
        updated,
        deleted,
    };

    let (cached, _) = cache_state(state);
    Ok((with_cache_header(cached, Json(body)), results))
}

fn parse_bound(raw: Option<&str>, name: &str) -> Result<Option<DateTime<Utc>>, ApiError> {
    match raw {
        None => Ok(None),
        Some(value) => parse_since(value).map(Some).ok_or_else(|| {
            ApiError::invalid_param(format!(
                "Could not parse {name}: expected RFC 3339 datetime or sync_token"
            ))
        }),
    }
}
