use estate_listings::config::AppConfig;
use estate_listings::error::AppError;
use estate_listings::store::{InMemoryListingStore, ListingStore, PgListingStore};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Connects to PostgreSQL, or builds a seeded process-local store when `memory` is set.
pub(crate) async fn open_store(
    config: &AppConfig,
    memory: bool,
) -> Result<Arc<dyn ListingStore>, AppError> {
    if memory {
        warn!("using in-memory listing store; data is lost on exit");
        return Ok(Arc::new(InMemoryListingStore::seeded()));
    }

    let store = PgListingStore::connect(&config.database).await?;
    info!(
        max_connections = config.database.max_connections,
        "connected to listing store"
    );
    Ok(Arc::new(store))
}

/// Flips to `true` on ctrl-c.
pub(crate) fn shutdown_signal() -> watch::Receiver<bool> {
    let (sender, receiver) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(err) => {
                warn!(error = %err, "unable to listen for shutdown signal");
                return;
            }
        }
        let _ = sender.send(true);
        // Keep the channel open so receivers observe the value instead of a closed sender.
        sender.closed().await;
    });
    receiver
}

/// Resolves once `shutdown` turns true.
pub(crate) async fn wait_for(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
