//! `mailsift` - archive extraction worker
//!
//! Reads commands from stdin and writes replies and progress events to
//! stdout, one JSON document per line. Logs go to stderr.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use anyhow::Context;
use mailsift_core::{Coordinator, DumpOpener, IndexStore, WorkerConfig, serve};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailsift=info,mailsift_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        error!("Worker terminated: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = WorkerConfig::load()
        .await
        .context("Failed to load worker config")?;

    info!(
        "Starting mailsift worker, cache at {}",
        config.store_root().display()
    );

    let store = IndexStore::open(&config.cache_dir, config.clear_cache_on_start)
        .await
        .context("Failed to open index store")?;
    let (coordinator, events) = Coordinator::new(DumpOpener, store);
    let coordinator = coordinator.with_default_interval(config.default_progress_interval());

    serve(tokio::io::stdin(), tokio::io::stdout(), coordinator, events).await?;

    info!("Worker stopped");
    Ok(())
}
