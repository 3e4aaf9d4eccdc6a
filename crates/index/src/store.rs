//! Keyed vector store with cosine-ordered query.
//!
//! The [`VectorStore`] trait is the seam between the indexer and the
//! backing storage. [`FileStore`] is the shipped implementation: an
//! in-memory collection map flushed to a JSON snapshot after every write
//! and reloaded at startup. `replace_where` performs the delete-then-insert
//! of one URL's chunk set under a single write lock, so concurrent readers
//! see either the old set or the new set, never a mix.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use openfeeder_common::{FeederError, Result};

/// One stored point: id, embedding, raw text, and a JSON metadata map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorePoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub document: String,
    pub metadata: Value,
}

/// A query hit with its cosine distance.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub point: StorePoint,
    pub distance: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, collection: &str, points: Vec<StorePoint>) -> Result<()>;
    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()>;
    async fn delete_where(&self, collection: &str, field: &str, value: &str) -> Result<()>;
    /// Atomically delete all points matching the filter and insert the
    /// replacement set.
    async fn replace_where(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        points: Vec<StorePoint>,
    ) -> Result<()>;
    async fn get(&self, collection: &str, ids: &[String]) -> Result<Vec<StorePoint>>;
    async fn get_where(&self, collection: &str, field: &str, value: &str)
        -> Result<Vec<StorePoint>>;
    async fn get_all(&self, collection: &str) -> Result<Vec<StorePoint>>;
    /// Nearest neighbours under cosine distance, ascending, at most `k`,
    /// optionally restricted by a metadata equality filter.
    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: Option<(&str, &str)>,
    ) -> Result<Vec<ScoredPoint>>;
}

/// Cosine distance (`1 − similarity`); degenerate vectors are maximally
/// distant.
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

fn matches_filter(point: &StorePoint, filter: Option<(&str, &str)>) -> bool {
    match filter {
        None => true,
        Some((field, value)) => point
            .metadata
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|v| v == value),
    }
}

type Collections = HashMap<String, BTreeMap<String, StorePoint>>;

/// JSON-snapshot-backed store. Pass no path for a pure in-memory store
/// (used by tests).
pub struct FileStore {
    snapshot_path: Option<PathBuf>,
    collections: RwLock<Collections>,
}

impl FileStore {
    /// Open (or create) a store persisted under `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let snapshot_path = dir.join("store.json");

        let collections = if snapshot_path.exists() {
            let raw = std::fs::read_to_string(&snapshot_path)?;
            let loaded: Collections = serde_json::from_str(&raw)?;
            debug!(
                path = %snapshot_path.display(),
                collections = loaded.len(),
                "loaded vector store snapshot"
            );
            loaded
        } else {
            Collections::new()
        };

        Ok(Self {
            snapshot_path: Some(snapshot_path),
            collections: RwLock::new(collections),
        })
    }

    /// Volatile store with no snapshot.
    pub fn in_memory() -> Self {
        Self {
            snapshot_path: None,
            collections: RwLock::new(Collections::new()),
        }
    }

    /// Persist the current state. Write failures are logged, not raised:
    /// the in-memory state stays authoritative for the process lifetime.
    fn flush(&self, collections: &Collections) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        let payload = match serde_json::to_vec(collections) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "could not serialize store snapshot");
                return;
            }
        };
        let tmp = path.with_extension("json.tmp");
        let result = std::fs::write(&tmp, payload).and_then(|_| std::fs::rename(&tmp, path));
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "could not persist store snapshot");
        }
    }
}

#[async_trait]
impl VectorStore for FileStore {
    async fn upsert(&self, collection: &str, points: Vec<StorePoint>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection.to_string()).or_default();
        for point in points {
            entries.insert(point.id.clone(), point);
        }
        self.flush(&collections);
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(entries) = collections.get_mut(collection) {
            for id in ids {
                entries.remove(id);
            }
        }
        self.flush(&collections);
        Ok(())
    }

    async fn delete_where(&self, collection: &str, field: &str, value: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(entries) = collections.get_mut(collection) {
            entries.retain(|_, point| !matches_filter(point, Some((field, value))));
        }
        self.flush(&collections);
        Ok(())
    }

    async fn replace_where(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        points: Vec<StorePoint>,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection.to_string()).or_default();
        entries.retain(|_, point| !matches_filter(point, Some((field, value))));
        for point in points {
            entries.insert(point.id.clone(), point);
        }
        self.flush(&collections);
        Ok(())
    }

    async fn get(&self, collection: &str, ids: &[String]) -> Result<Vec<StorePoint>> {
        let collections = self.collections.read().await;
        let Some(entries) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| entries.get(id).cloned())
            .collect())
    }

    async fn get_where(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<StorePoint>> {
        let collections = self.collections.read().await;
        let Some(entries) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(entries
            .values()
            .filter(|point| matches_filter(point, Some((field, value))))
            .cloned()
            .collect())
    }

    async fn get_all(&self, collection: &str) -> Result<Vec<StorePoint>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: Option<(&str, &str)>,
    ) -> Result<Vec<ScoredPoint>> {
        if k == 0 {
            return Err(FeederError::Store("query with k = 0".into()));
        }
        let collections = self.collections.read().await;
        let Some(entries) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<ScoredPoint> = entries
            .values()
            .filter(|point| matches_filter(point, filter))
            .map(|point| ScoredPoint {
                distance: cosine_distance(vector, &point.vector),
                point: point.clone(),
            })
            .collect();
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(k);
        Ok(scored)
    }
}
