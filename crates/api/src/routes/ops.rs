//! Operational endpoints: manual crawl trigger and health check.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::server::AppState;
use crate::types::HealthResponse;

pub async fn trigger_crawl(State(state): State<AppState>) -> Json<Value> {
    if state.pipeline.crawl_running() {
        return Json(json!({ "status": "already_running" }));
    }
    state.pipeline.spawn_crawl();
    Json(json!({ "status": "crawl_started" }))
}

pub async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let last_crawl = state
        .pipeline
        .last_crawl()
        .map(|ts| ts.timestamp_millis() as f64 / 1000.0)
        .unwrap_or(0.0);

    Json(HealthResponse {
        status: "ok",
        crawl_running: state.pipeline.crawl_running(),
        last_crawl,
    })
}
