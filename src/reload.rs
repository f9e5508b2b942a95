//! Hot-reload of the worker catalog for `cascade serve`.
//!
//! Watches the `mcpServers` JSON file with `notify`. Each change is debounced
//! for 100ms, then the file is re-parsed and the inner `Arc<WorkerCatalog>` is
//! swapped. A catalog that fails to load or validate leaves the previous one in
//! place. In-flight calls keep the catalog snapshot they started with.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerCatalog;

const DEBOUNCE: Duration = Duration::from_millis(100);

/// Watch `catalog_path` and swap `catalog_handle` on each change until `cancel` fires.
pub async fn run_catalog_reload(
    catalog_path: PathBuf,
    catalog_handle: Arc<RwLock<Arc<WorkerCatalog>>>,
    cancel: CancellationToken,
) {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<notify::Result<notify::Event>>();

    // notify calls back on its own thread; forward into the tokio channel.
    let mut watcher = match notify::recommended_watcher(move |event| {
        let _ = tx.send(event);
    }) {
        Ok(w) => w,
        Err(e) => {
            tracing::error!(error = %e, "failed to create catalog watcher");
            return;
        }
    };

    if let Err(e) = watcher.watch(&catalog_path, RecursiveMode::NonRecursive) {
        tracing::error!(
            path = %catalog_path.display(),
            error = %e,
            "failed to watch worker catalog"
        );
        return;
    }

    // Dropping the watcher stops events.
    let _watcher = watcher;

    tracing::info!(path = %catalog_path.display(), "watching worker catalog");

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(Ok(_)) => {
                        tokio::time::sleep(DEBOUNCE).await;
                        while rx.try_recv().is_ok() {}

                        match reload_catalog(&catalog_path).await {
                            Ok(catalog) => {
                                let workers = catalog.names();
                                *catalog_handle.write().await = Arc::new(catalog);
                                tracing::info!(
                                    path = %catalog_path.display(),
                                    ?workers,
                                    "worker catalog reloaded"
                                );
                            }
                            Err(e) => {
                                tracing::warn!(
                                    error = %e,
                                    path = %catalog_path.display(),
                                    "catalog reload failed, keeping previous catalog"
                                );
                            }
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "catalog watcher error");
                    }
                    None => {
                        tracing::debug!("catalog watcher channel closed");
                        return;
                    }
                }
            }
            _ = cancel.cancelled() => {
                tracing::debug!("catalog reload cancelled");
                return;
            }
        }
    }
}

async fn reload_catalog(path: &Path) -> crate::Result<WorkerCatalog> {
    WorkerCatalog::load(path).await
}
