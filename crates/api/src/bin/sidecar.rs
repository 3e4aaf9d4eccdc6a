//! OpenFeeder sidecar entry point.
//!
//! Reads configuration from the environment, restores persistent state
//! (vector store + tombstones), kicks off the crawl schedule and serves
//! the OpenFeeder protocol.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use openfeeder_api::{router, Analytics, AppState};
use openfeeder_common::Config;
use openfeeder_index::{DenseEmbedder, FileStore, Indexer};
use openfeeder_orchestrator::{Pipeline, TombstoneStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    openfeeder_common::init_tracing();

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!(error = %e, "FATAL: invalid configuration");
            std::process::exit(1);
        }
    };
    info!(
        site = %config.site_url,
        crawl_interval = config.crawl_interval,
        max_pages = config.max_pages,
        "starting OpenFeeder sidecar"
    );

    let store = Arc::new(
        FileStore::open(&config.persist_dir)
            .with_context(|| format!("opening vector store at {}", config.persist_dir.display()))?,
    );
    let embedder = Arc::new(
        DenseEmbedder::new(&config.embedding_model)
            .with_context(|| format!("loading embedding model {}", config.embedding_model))?,
    );
    let indexer = Arc::new(Indexer::new(store, embedder));
    let tombstones = Arc::new(TombstoneStore::load(&config.tombstone_path));

    let pipeline = Pipeline::new(Arc::clone(&config), indexer, tombstones)?;
    let scheduler = pipeline.spawn_scheduler();

    let analytics = Analytics::from_config(&config);
    if analytics.enabled() {
        info!("analytics dispatch enabled");
    }

    let app = router(AppState {
        config: Arc::clone(&config),
        pipeline,
        analytics,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cancel the schedule without waiting for an in-flight crawl.
    scheduler.abort();
    info!("sidecar stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "could not install shutdown handler");
    }
}
