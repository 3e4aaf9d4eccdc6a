//! # OpenFeeder Index
//!
//! The persistent vector index: a keyed store with cosine-ordered query
//! behind the [`VectorStore`] trait, an [`Embedder`] trait over the
//! embedding model, and the [`Indexer`] that owns chunk and page
//! collections, deterministic chunk identity and time-stamped change
//! tracking.

pub mod embedder;
pub mod indexer;
pub mod store;

pub use embedder::{DenseEmbedder, Embedder, HashEmbedder};
pub use indexer::{Indexer, StoredChunk, CHUNKS_COLLECTION, PAGES_COLLECTION};
pub use store::{FileStore, ScoredPoint, StorePoint, VectorStore};
