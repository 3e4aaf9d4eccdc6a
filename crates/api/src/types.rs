//! Wire types for the OpenFeeder protocol surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use openfeeder_common::{ChunkKind, IndexItem, SyncPage, Tombstone};

pub const SCHEMA: &str = "openfeeder/1.0";
pub const PROTOCOL_VERSION: &str = "1.0";

/// Compute the quoted ETag for a response body: first 16 hex chars of its
/// MD5 digest.
pub fn make_etag(body: &[u8]) -> String {
    let digest = format!("{:x}", md5::compute(body));
    format!("\"{}\"", &digest[..16])
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SiteInfo {
    pub name: String,
    pub url: String,
    pub language: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct FeedInfo {
    pub endpoint: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryDoc {
    pub version: &'static str,
    pub site: SiteInfo,
    pub feed: FeedInfo,
    pub capabilities: Vec<&'static str>,
    pub contact: Option<Value>,
}

// ---------------------------------------------------------------------------
// Content endpoint
// ---------------------------------------------------------------------------

/// Raw query parameters. Numeric fields arrive as strings so malformed
/// values can fall back to defaults silently.
#[derive(Debug, Default, Deserialize)]
pub struct ContentParams {
    pub url: Option<String>,
    pub q: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub min_score: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub schema: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub page: usize,
    pub total_pages: usize,
    pub items: Vec<IndexItem>,
}

#[derive(Debug, Serialize)]
pub struct ChunkOut {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    pub relevance: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct FetchMeta {
    pub total_chunks: usize,
    pub returned_chunks: usize,
    pub cached: bool,
    pub cache_age_seconds: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub schema: &'static str,
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub language: String,
    pub summary: String,
    pub chunks: Vec<ChunkOut>,
    pub meta: FetchMeta,
}

// ---------------------------------------------------------------------------
// Differential sync
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SyncCounts {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
}

#[derive(Debug, Serialize)]
pub struct SyncEnvelope {
    pub as_of: String,
    pub sync_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<String>,
    pub counts: SyncCounts,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub openfeeder_version: &'static str,
    pub sync: SyncEnvelope,
    pub added: Vec<SyncPage>,
    pub updated: Vec<SyncPage>,
    pub deleted: Vec<Tombstone>,
}

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub action: String,
    #[serde(default)]
    pub urls: Vec<String>,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub crawl_running: bool,
    pub last_crawl: f64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A protocol error rendered as the OpenFeeder error envelope.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND",
            message: message.into(),
        }
    }

    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "INVALID_URL",
            message: message.into(),
        }
    }

    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "INVALID_PARAM",
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR",
            message: message.into(),
        }
    }
}

impl From<openfeeder_common::FeederError> for ApiError {
    fn from(err: openfeeder_common::FeederError) -> Self {
        ApiError::internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "schema": SCHEMA,
            "error": { "code": self.code, "message": self.message },
        });
        (self.status, Json(body)).into_response()
    }
}
