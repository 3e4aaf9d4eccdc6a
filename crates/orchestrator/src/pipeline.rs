//! The pipeline orchestrator.
//!
//! Owns the crawl flag, the last-crawl timestamp and the tombstone store.
//! At most one crawl runs at a time; concurrent triggers observe the flag
//! and back off. Crawl failures are logged, never propagated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use openfeeder_common::{Config, Result};
use openfeeder_crawler::crawl;
use openfeeder_extract::chunk_html;
use openfeeder_index::Indexer;

use crate::tombstones::TombstoneStore;

/// Webhook batches up to this size are processed before the response
/// returns; larger batches run in the background.
pub const INLINE_WEBHOOK_LIMIT: usize = 10;

const WEBHOOK_USER_AGENT: &str = "OpenFeeder/1.0 (webhook updater)";
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateAction {
    Upsert,
    Delete,
}

impl UpdateAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "upsert" => Some(UpdateAction::Upsert),
            "delete" => Some(UpdateAction::Delete),
            _ => None,
        }
    }
}

/// Wire shape of the webhook response.
#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub status: String,
    pub processed: usize,
    pub errors: Vec<String>,
}

pub struct Pipeline {
    config: Arc<Config>,
    indexer: Arc<Indexer>,
    tombstones: Arc<TombstoneStore>,
    crawl_running: AtomicBool,
    last_crawl: RwLock<Option<DateTime<Utc>>>,
    webhook_client: reqwest::Client,
}

impl Pipeline {
    pub fn new(
        config: Arc<Config>,
        indexer: Arc<Indexer>,
        tombstones: Arc<TombstoneStore>,
    ) -> Result<Arc<Self>> {
        let webhook_client = reqwest::Client::builder()
            .user_agent(WEBHOOK_USER_AGENT)
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| openfeeder_common::FeederError::Http(e.to_string()))?;

        Ok(Arc::new(Self {
            config,
            indexer,
            tombstones,
            crawl_running: AtomicBool::new(false),
            last_crawl: RwLock::new(None),
            webhook_client,
        }))
    }

    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.indexer
    }

    pub fn tombstones(&self) -> &Arc<TombstoneStore> {
        &self.tombstones
    }

    pub fn crawl_running(&self) -> bool {
        self.crawl_running.load(Ordering::SeqCst)
    }

    pub fn last_crawl(&self) -> Option<DateTime<Utc>> {
        *self.last_crawl.read().unwrap_or_else(|e| e.into_inner())
    }

    // ------------------------------------------------------------------
    // Full crawl
    // ------------------------------------------------------------------

    /// Execute a full crawl → chunk → index pass. Re-entrant calls are
    /// rejected by the crawl flag.
    #[instrument(skip(self))]
    pub async fn run_crawl(&self) {
        if self
            .crawl_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("crawl already in progress, skipping");
            return;
        }

        info!(
            site = %self.config.site_url,
            max_pages = self.config.max_pages,
            "starting crawl"
        );

        let outcome = self.crawl_and_index().await;
        match outcome {
            Ok((pages, chunks)) => {
                *self.last_crawl.write().unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());
                info!(pages, chunks, "crawl finished");
            }
            Err(e) => error!(error = %e, "crawl failed"),
        }

        self.crawl_running.store(false, Ordering::SeqCst);
    }

    async fn crawl_and_index(&self) -> Result<(usize, usize)> {
        let result = crawl(&self.config.site_url, self.config.max_pages).await;
        info!(
            pages = result.pages.len(),
            errors = result.errors.len(),
            "crawl fetched pages"
        );
        for err in result.errors.iter().take(10) {
            warn!(error = %err, "crawl error");
        }

        let parsed: Vec<_> = result
            .pages
            .iter()
            .map(|page| chunk_html(&page.url, &page.html))
            .collect();

        let total_chunks = self.indexer.index_pages(&parsed).await?;
        Ok((parsed.len(), total_chunks))
    }

    /// Start a crawl in the background.
    pub fn spawn_crawl(self: &Arc<Self>) {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            pipeline.run_crawl().await;
        });
    }

    /// Start the recurring crawl schedule. The first crawl runs
    /// immediately; subsequent ones every `crawl_interval` seconds.
    /// Abort the returned handle to cancel without awaiting in-flight work.
    pub fn spawn_scheduler(self: &Arc<Self>) -> JoinHandle<()> {
        let pipeline = Arc::clone(self);
        let interval = Duration::from_secs(pipeline.config.crawl_interval.max(1));
        info!(seconds = interval.as_secs(), "scheduled recurring crawl");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                pipeline.run_crawl().await;
            }
        })
    }

    // ------------------------------------------------------------------
    // Webhook updates
    // ------------------------------------------------------------------

    /// Apply a webhook update. Small batches run inline; anything larger
    /// than [`INLINE_WEBHOOK_LIMIT`] is queued to the background and
    /// acknowledged immediately.
    pub async fn apply_update(
        self: &Arc<Self>,
        action: UpdateAction,
        paths: Vec<String>,
    ) -> UpdateResponse {
        let urls: Vec<String> = paths
            .iter()
            .map(|p| self.config.resolve_site_path(p))
            .collect();

        if urls.len() > INLINE_WEBHOOK_LIMIT {
            info!(count = urls.len(), "queueing webhook batch in background");
            let pipeline = Arc::clone(self);
            tokio::spawn(async move {
                let (processed, errors) = pipeline.process_batch(action, urls).await;
                info!(processed, errors = errors.len(), "background webhook batch done");
            });
            return UpdateResponse {
                status: "queued".into(),
                processed: 0,
                errors: Vec::new(),
            };
        }

        let (processed, errors) = self.process_batch(action, urls).await;
        UpdateResponse {
            status: "ok".into(),
            processed,
            errors,
        }
    }

    /// Process one batch of URLs. A failing URL is recorded and skipped,
    /// never aborting the rest of the batch.
    async fn process_batch(&self, action: UpdateAction, urls: Vec<String>) -> (usize, Vec<String>) {
        let mut processed = 0;
        let mut errors = Vec::new();

        for url in urls {
            let outcome = match action {
                UpdateAction::Upsert => self.upsert_one(&url).await,
                UpdateAction::Delete => self.delete_one(&url).await,
            };
            match outcome {
                Ok(()) => processed += 1,
                Err(e) => {
                    warn!(url = %url, error = %e, "webhook update failed for url");
                    errors.push(format!("{url}: {e}"));
                }
            }
        }

        (processed, errors)
    }

    async fn upsert_one(&self, url: &str) -> Result<()> {
        let response = self
            .webhook_client
            .get(url)
            .send()
            .await
            .map_err(|e| openfeeder_common::FeederError::Http(e.to_string()))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(openfeeder_common::FeederError::Http(format!("HTTP {status}")));
        }

        let html = response
            .text()
            .await
            .map_err(|e| openfeeder_common::FeederError::Http(e.to_string()))?;

        let parsed = chunk_html(url, &html);
        self.indexer.index_page(&parsed).await?;
        Ok(())
    }

    async fn delete_one(&self, url: &str) -> Result<()> {
        self.indexer.delete_page(url).await?;
        self.tombstones.add(url).await;
        Ok(())
    }
}
