mod cli;

use crate::cli::CLI;
use anyhow::Context;
use clap::Parser;
use shrinkray_generator::RandomGenerator;
use shrinkray_shortener::{DeletionWorker, ShortenerService};
use shrinkray_storage::Storage;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();

    shrinkray_telemetry::init(config.log_format)?;

    let storage = Storage::open(&config.storage_config())
        .await
        .context("failed to open storage")?;

    info!(
        backend = %storage.kind(),
        base_url = %config.base_url,
        log_format = %config.log_format,
        "starting shortener"
    );

    let shortener =
        ShortenerService::with_storage(&storage, RandomGenerator::new(), config.base_url.clone());
    let (worker, _handle, listener) =
        DeletionWorker::new(shortener.clone(), config.worker_settings());

    let cancel = CancellationToken::new();
    let worker_task = tokio::spawn(worker.run(cancel.clone()));
    let listener_task = tokio::spawn(listener.run(cancel.clone()));

    shortener.ping().await.context("storage is unreachable")?;
    info!(backend = %storage.kind(), "storage reachable");

    let stats = shortener.stats().await?;
    info!(urls = stats.urls, users = stats.users, "shortener ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    cancel.cancel();
    worker_task.await?;
    listener_task.await?;

    Ok(())
}
