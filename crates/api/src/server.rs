//! Router assembly and shared application state.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use openfeeder_common::Config;
use openfeeder_orchestrator::Pipeline;

use crate::analytics::Analytics;
use crate::{middleware, routes};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<Pipeline>,
    pub analytics: Analytics,
}

/// Build the full OpenFeeder router with blanket protocol headers, CORS
/// and request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/.well-known/openfeeder.json",
            get(routes::discovery::discovery),
        )
        .route("/openfeeder", get(routes::content::content))
        .route("/openfeeder/update", post(routes::webhook::update))
        .route("/crawl", post(routes::ops::trigger_crawl))
        .route("/healthz", get(routes::ops::healthz))
        .layer(axum::middleware::from_fn(middleware::openfeeder_headers))
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(axum::middleware::from_fn(middleware::request_logging))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
