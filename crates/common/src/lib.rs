//! # OpenFeeder Common
//!
//! Shared foundation for the OpenFeeder sidecar: the data model (pages,
//! chunks, typed metadata, tombstones), environment configuration, the
//! error taxonomy, and deterministic content identifiers.
//!
//! Every other crate in the workspace depends on this one; it depends on
//! nothing but the serialization/time/logging stack.

pub mod config;
pub mod error;
pub mod ids;
pub mod types;

pub use config::{AnalyticsProvider, Config};
pub use error::{FeederError, Result};
pub use ids::{chunk_id, page_id};
pub use types::*;

/// Initialise the process-wide tracing subscriber.
///
/// Respects `RUST_LOG`; falls back to `info` for the openfeeder crates.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
