//! # OpenFeeder Orchestrator
//!
//! Drives the ingestion pipeline: scheduled full crawls
//! (crawl → chunk → index), webhook upserts/deletes with bounded inline
//! processing, the tombstone store, and the crawl-state flags read by the
//! HTTP surface.

pub mod pipeline;
pub mod tombstones;

pub use pipeline::{Pipeline, UpdateAction, UpdateResponse, INLINE_WEBHOOK_LIMIT};
pub use tombstones::TombstoneStore;
