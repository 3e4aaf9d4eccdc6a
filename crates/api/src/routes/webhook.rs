//! Webhook endpoint: CMS-driven upserts and deletes.
//!
//! Auth failures are plain `{"detail": …}` responses (401 missing,
//! 403 mismatch), not the OpenFeeder error envelope.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

use openfeeder_orchestrator::UpdateAction;

use crate::server::AppState;
use crate::types::{ApiError, UpdateRequest};

pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UpdateRequest>,
) -> Response {
    if let Some(secret) = &state.config.webhook_secret {
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let Some(auth) = auth else {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": "Missing Authorization header" })),
            )
                .into_response();
        };
        if auth.strip_prefix("Bearer ") != Some(secret.as_str()) {
            warn!("webhook request with invalid secret");
            return (
                StatusCode::FORBIDDEN,
                Json(json!({ "detail": "Invalid webhook secret" })),
            )
                .into_response();
        }
    }

    if request.urls.is_empty() {
        return ApiError::invalid_param("urls must be a non-empty list").into_response();
    }
    let Some(action) = UpdateAction::parse(&request.action) else {
        return ApiError::invalid_param(format!(
            "action must be \"upsert\" or \"delete\", got \"{}\"",
            request.action
        ))
        .into_response();
    };

    let response = state.pipeline.apply_update(action, request.urls).await;
    Json(response).into_response()
}
