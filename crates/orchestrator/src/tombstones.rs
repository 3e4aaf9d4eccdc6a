//! Durable deletion markers for differential sync.
//!
//! A flat `{url: deleted_at}` JSON map, rewritten after every change and
//! FIFO-capped at 1000 entries (oldest deleted-at evicted first).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use openfeeder_common::Tombstone;

const MAX_TOMBSTONES: usize = 1000;

pub struct TombstoneStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl TombstoneStore {
    /// Load tombstones from disk; a missing or corrupt file yields an
    /// empty store.
    pub fn load(path: &Path) -> Self {
        let entries = std::fs::read_to_string(path)
            .ok()
            .and_then(|raw| serde_json::from_str::<HashMap<String, String>>(&raw).ok())
            .unwrap_or_default();
        debug!(path = %path.display(), count = entries.len(), "loaded tombstones");
        Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        }
    }

    /// Record a deletion tombstone and persist before returning.
    pub async fn add(&self, url: &str) {
        let mut entries = self.entries.lock().await;
        entries.insert(url.to_string(), Utc::now().to_rfc3339());

        if entries.len() > MAX_TOMBSTONES {
            let mut sorted: Vec<(String, String)> =
                entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            sorted.sort_by(|a, b| a.1.cmp(&b.1));
            let keep = sorted.split_off(sorted.len() - MAX_TOMBSTONES);
            *entries = keep.into_iter().collect();
        }

        self.save(&entries);
    }

    /// Tombstones whose `deleted_at` falls within the optional window.
    pub async fn in_range(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Vec<Tombstone> {
        let entries = self.entries.lock().await;
        let mut out = Vec::new();
        for (url, deleted_at) in entries.iter() {
            let Ok(parsed) = DateTime::parse_from_rfc3339(deleted_at) else {
                continue;
            };
            let ts = parsed.with_timezone(&Utc);
            if since.is_some_and(|s| ts < s) || until.is_some_and(|u| ts > u) {
                continue;
            }
            out.push(Tombstone {
                url: url.clone(),
                deleted_at: deleted_at.clone(),
            });
        }
        out
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Best-effort persistence; a write failure keeps the in-memory map.
    fn save(&self, entries: &HashMap<String, String>) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %self.path.display(), error = %e, "could not create tombstone dir");
                return;
            }
        }
        let payload = match serde_json::to_vec(entries) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "could not serialize tombstones");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, payload) {
            warn!(path = %self.path.display(), error = %e, "could not persist tombstones");
        }
    }
}
