//! # OpenFeeder API
//!
//! The HTTP surface of the sidecar: discovery document with conditional
//! GET, the unified content endpoint (index / fetch / search / sync),
//! the authenticated webhook, manual crawl trigger and health check —
//! plus the sync-token codec and fire-and-forget analytics dispatch.
//!
//! ```text
//! GET  /.well-known/openfeeder.json   discovery (ETag, Cache-Control)
//! GET  /openfeeder                    index | fetch | search | sync
//! POST /openfeeder/update             webhook upsert / delete
//! POST /crawl                         manual crawl trigger
//! GET  /healthz                       liveness + crawl state
//! ```

pub mod analytics;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod sync;
pub mod types;

pub use analytics::{detect_bot, Analytics, AnalyticsEvent};
pub use server::{router, AppState};
