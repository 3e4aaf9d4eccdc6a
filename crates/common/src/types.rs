//! Core data model: chunks, parsed pages, typed metadata, index records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Content category of a single chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Paragraph,
    Heading,
    List,
    Code,
    Quote,
    Ingredients,
    Instructions,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Paragraph => "paragraph",
            ChunkKind::Heading => "heading",
            ChunkKind::List => "list",
            ChunkKind::Code => "code",
            ChunkKind::Quote => "quote",
            ChunkKind::Ingredients => "ingredients",
            ChunkKind::Instructions => "instructions",
        }
    }
}

/// A single content chunk extracted from a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub kind: ChunkKind,
}

impl Chunk {
    pub fn new(text: impl Into<String>, kind: ChunkKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// Discriminant of the typed metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataKind {
    Recipe,
    Article,
    Product,
    Event,
    Page,
}

/// Typed page metadata assembled from JSON-LD, OpenGraph and HTML tags.
///
/// The variant-specific fields (ingredients, price, startDate, …) live in
/// `extra`, which serializes flattened at the top level of the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    #[serde(rename = "type")]
    pub kind: MetadataKind,
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub published: Option<String>,
    pub modified: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub image: Option<String>,
    pub schema_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PageMetadata {
    pub fn empty(kind: MetadataKind) -> Self {
        Self {
            kind,
            title: None,
            description: None,
            author: None,
            published: None,
            modified: None,
            keywords: Vec::new(),
            image: None,
            schema_type: None,
            extra: Map::new(),
        }
    }
}

impl Default for PageMetadata {
    fn default() -> Self {
        Self::empty(MetadataKind::Page)
    }
}

/// Cleaned, chunked representation of one web page, ready for indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedPage {
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub language: String,
    pub summary: String,
    pub metadata: PageMetadata,
    pub chunks: Vec<Chunk>,
}

/// Denormalised metadata stored alongside each chunk vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub language: String,
    pub summary: String,
    pub chunk_type: ChunkKind,
    pub chunk_index: usize,
    pub indexed_at: DateTime<Utc>,
}

/// Page-level record carrying housekeeping timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub language: String,
    pub summary: String,
    pub metadata: PageMetadata,
    pub chunk_count: usize,
    pub first_indexed_at: DateTime<Utc>,
    pub indexed_at: DateTime<Utc>,
}

/// One semantic search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub chunk_id: String,
    pub text: String,
    pub chunk_type: ChunkKind,
    pub relevance: f64,
    pub url: String,
    pub title: String,
}

/// Index-mode projection of a page record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexItem {
    pub url: String,
    pub title: String,
    pub published: Option<String>,
    pub summary: String,
}

/// Sync-mode projection of a page record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPage {
    pub url: String,
    pub title: String,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub summary: String,
}

impl From<&PageRecord> for IndexItem {
    fn from(record: &PageRecord) -> Self {
        Self {
            url: record.url.clone(),
            title: record.title.clone(),
            published: record.published.clone(),
            summary: record.summary.clone(),
        }
    }
}

impl From<&PageRecord> for SyncPage {
    fn from(record: &PageRecord) -> Self {
        Self {
            url: record.url.clone(),
            title: record.title.clone(),
            published: record.published.clone(),
            updated: record.updated.clone(),
            summary: record.summary.clone(),
        }
    }
}

/// Durable marker that a URL was deleted, surfaced to sync clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tombstone {
    pub url: String,
    pub deleted_at: String,
}

/// Truncate a string to at most `max` characters on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_extras_flatten_in_json() {
        let mut meta = PageMetadata::empty(MetadataKind::Recipe);
        meta.title = Some("Tourtière".into());
        meta.extra
            .insert("yield".into(), Value::String("6 portions".into()));

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["type"], "recipe");
        assert_eq!(json["yield"], "6 portions");
        assert!(json.get("extra").is_none());
    }

    #[test]
    fn chunk_kind_serializes_lowercase() {
        let json = serde_json::to_string(&ChunkKind::Ingredients).unwrap();
        assert_eq!(json, "\"ingredients\"");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("pâté chinois", 4), "pâté");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
