//! The indexer: ingest, delete, search, fetch, pagination and
//! time-window queries over the chunk and page collections.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use openfeeder_common::{
    chunk_id, page_id, truncate_chars, ChunkKind, ChunkRecord, FeederError, IndexItem, PageRecord,
    ParsedPage, Result, SearchResult, SyncPage,
};

use crate::embedder::Embedder;
use crate::store::{StorePoint, VectorStore};

pub const CHUNKS_COLLECTION: &str = "openfeeder_chunks";
pub const PAGES_COLLECTION: &str = "openfeeder_pages";

/// A chunk as returned for single-page fetches (no relevance score).
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    pub text: String,
    pub chunk_type: ChunkKind,
    pub chunk_index: usize,
}

pub struct Indexer {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl Indexer {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Run the embedding model off the async executor.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let embedder = Arc::clone(&self.embedder);
        tokio::task::spawn_blocking(move || embedder.embed(texts))
            .await
            .map_err(|e| FeederError::Embedding(format!("embedding task failed: {e}")))?
    }

    // ------------------------------------------------------------------
    // Ingest
    // ------------------------------------------------------------------

    /// Index a parsed page, replacing any existing chunks for its URL.
    /// Returns the number of chunks indexed.
    #[instrument(skip(self, page), fields(url = %page.url, chunks = page.chunks.len()))]
    pub async fn index_page(&self, page: &ParsedPage) -> Result<usize> {
        let now = Utc::now();

        // first_indexed_at survives re-ingest.
        let first_indexed_at = self
            .page_meta(&page.url)
            .await?
            .map(|existing| existing.first_indexed_at)
            .unwrap_or(now);

        if page.chunks.is_empty() {
            self.store
                .replace_where(CHUNKS_COLLECTION, "url", &page.url, Vec::new())
                .await?;
            return Ok(0);
        }

        let texts: Vec<String> = page.chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed(texts).await?;
        if vectors.len() != page.chunks.len() {
            return Err(FeederError::Embedding(format!(
                "embedded {} texts but got {} vectors",
                page.chunks.len(),
                vectors.len()
            )));
        }

        let summary = truncate_chars(&page.summary, 500);
        let mut points = Vec::with_capacity(page.chunks.len());
        for (idx, (chunk, vector)) in page.chunks.iter().zip(&vectors).enumerate() {
            let record = ChunkRecord {
                url: page.url.clone(),
                title: page.title.clone(),
                author: page.author.clone(),
                published: page.published.clone(),
                updated: page.updated.clone(),
                language: page.language.clone(),
                summary: summary.clone(),
                chunk_type: chunk.kind,
                chunk_index: idx,
                indexed_at: now,
            };
            points.push(StorePoint {
                id: chunk_id(&page.url, idx),
                vector: vector.clone(),
                document: chunk.text.clone(),
                metadata: serde_json::to_value(&record)?,
            });
        }

        self.store
            .replace_where(CHUNKS_COLLECTION, "url", &page.url, points)
            .await?;

        // First chunk embedding stands in for the page embedding.
        let page_record = PageRecord {
            url: page.url.clone(),
            title: page.title.clone(),
            author: page.author.clone(),
            published: page.published.clone(),
            updated: page.updated.clone(),
            language: page.language.clone(),
            summary: summary.clone(),
            metadata: page.metadata.clone(),
            chunk_count: page.chunks.len(),
            first_indexed_at,
            indexed_at: now,
        };
        self.store
            .upsert(
                PAGES_COLLECTION,
                vec![StorePoint {
                    id: page_id(&page.url),
                    vector: vectors[0].clone(),
                    document: summary,
                    metadata: serde_json::to_value(&page_record)?,
                }],
            )
            .await?;

        info!(url = %page.url, chunks = page.chunks.len(), "indexed page");
        Ok(page.chunks.len())
    }

    /// Index multiple pages; returns the total chunk count.
    pub async fn index_pages(&self, pages: &[ParsedPage]) -> Result<usize> {
        let mut total = 0;
        for page in pages {
            total += self.index_page(page).await?;
        }
        Ok(total)
    }

    /// Remove all indexed data for a URL (chunks + page record).
    #[instrument(skip(self))]
    pub async fn delete_page(&self, url: &str) -> Result<()> {
        self.store
            .replace_where(CHUNKS_COLLECTION, "url", url, Vec::new())
            .await?;
        self.store
            .delete(PAGES_COLLECTION, &[page_id(url)])
            .await?;
        info!(url = %url, "deleted page from index");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Retrieval
    // ------------------------------------------------------------------

    /// Semantic search across all indexed chunks, best match first.
    #[instrument(skip(self), fields(query_len = query.len()))]
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        url_filter: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        let vectors = self.embed(vec![query.to_string()]).await?;
        let Some(query_vector) = vectors.first() else {
            return Ok(Vec::new());
        };

        let k = limit.min(50).max(1);
        let filter = url_filter.map(|u| ("url", u));
        let hits = self
            .store
            .query(CHUNKS_COLLECTION, query_vector, k, filter)
            .await?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let record: ChunkRecord = serde_json::from_value(hit.point.metadata)?;
            let relevance = ((1.0 - hit.distance as f64).max(0.0) * 10_000.0).round() / 10_000.0;
            results.push(SearchResult {
                chunk_id: hit.point.id,
                text: hit.point.document,
                chunk_type: record.chunk_type,
                relevance,
                url: record.url,
                title: record.title,
            });
        }
        Ok(results)
    }

    /// All chunks for one URL, in page order.
    pub async fn chunks_for_url(&self, url: &str, limit: usize) -> Result<Vec<StoredChunk>> {
        let points = self.store.get_where(CHUNKS_COLLECTION, "url", url).await?;

        let mut chunks = Vec::with_capacity(points.len());
        for point in points {
            let record: ChunkRecord = serde_json::from_value(point.metadata)?;
            chunks.push(StoredChunk {
                id: point.id,
                text: point.document,
                chunk_type: record.chunk_type,
                chunk_index: record.chunk_index,
            });
        }
        chunks.sort_by_key(|c| c.chunk_index);
        chunks.truncate(limit);
        Ok(chunks)
    }

    /// Metadata record for one page, if indexed.
    pub async fn page_meta(&self, url: &str) -> Result<Option<PageRecord>> {
        let points = self
            .store
            .get(PAGES_COLLECTION, &[page_id(url)])
            .await?;
        match points.into_iter().next() {
            Some(point) => Ok(Some(serde_json::from_value(point.metadata)?)),
            None => Ok(None),
        }
    }

    /// Paginated index of all pages, published-descending, missing
    /// published dates last. Returns `(items, total)`.
    ///
    /// Loads every page record before slicing; the backing store has no
    /// native offset pagination.
    pub async fn all_pages(&self, page: usize, limit: usize) -> Result<(Vec<IndexItem>, usize)> {
        let records = self.load_page_records().await?;
        let total = records.len();
        if total > 1000 {
            warn!(
                total,
                "large index: pagination loads all page records into memory"
            );
        }

        let mut items: Vec<IndexItem> = records.iter().map(IndexItem::from).collect();
        items.sort_by(|a, b| match (&a.published, &b.published) {
            (Some(x), Some(y)) => y.cmp(x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });

        let start = (page.saturating_sub(1)) * limit;
        let slice = items.into_iter().skip(start).take(limit).collect();
        Ok((slice, total))
    }

    /// Pages whose `indexed_at` falls within the optional window, split
    /// into (added, updated). A page is "added" when the lower bound is
    /// set and its `first_indexed_at` is at or after it.
    pub async fn pages_in_range(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<(Vec<SyncPage>, Vec<SyncPage>)> {
        let records = self.load_page_records().await?;

        let mut added = Vec::new();
        let mut updated = Vec::new();
        for record in &records {
            if since.is_some_and(|s| record.indexed_at < s) {
                continue;
            }
            if until.is_some_and(|u| record.indexed_at > u) {
                continue;
            }
            let is_added = since.is_some_and(|s| record.first_indexed_at >= s);
            if is_added {
                added.push(SyncPage::from(record));
            } else {
                updated.push(SyncPage::from(record));
            }
        }
        Ok((added, updated))
    }

    async fn load_page_records(&self) -> Result<Vec<PageRecord>> {
        let points = self.store.get_all(PAGES_COLLECTION).await?;
        points
            .into_iter()
            .map(|point| serde_json::from_value(point.metadata).map_err(FeederError::from))
            .collect()
    }
}
