//! # OpenFeeder Extract
//!
//! HTML understanding for the sidecar: typed metadata extraction
//! (JSON-LD → OpenGraph → HTML fallbacks) and content chunking.
//!
//! Two chunkers live here. [`chunk_html`] is the full DOM chunker used by
//! the crawl pipeline: it strips boilerplate, emits typed chunks in
//! document order and augments recipes with ingredient/instruction
//! chunks. [`chunk_text`] is the lightweight plain-text variant that
//! operates on tag-stripped content.

pub mod chunker;
pub mod metadata;
pub mod textchunk;

pub use chunker::chunk_html;
pub use metadata::{extract_metadata, parse_iso_duration};
pub use textchunk::{chunk_text, clean_html, summarise};
