use crate::cli::IngestArgs;
use crate::infra::{open_store, shutdown_signal, wait_for, AppState};
use crate::routes::operational_routes;
use axum::{Extension, Router};
use estate_listings::config::AppConfig;
use estate_listings::error::AppError;
use estate_listings::ingest::{DirectoryPoller, IngestPipeline};
use estate_listings::telemetry::{self, TelemetryError};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

pub(crate) async fn run(mut args: IngestArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(staging_dir) = args.staging_dir.take() {
        config.ingest.staging_dir = staging_dir;
    }
    if let Some(secs) = args.interval_secs {
        config.ingest.poll_interval = Duration::from_secs(secs);
    }

    telemetry::init(&config.telemetry)?;

    let store = open_store(&config, args.memory_store).await?;
    let pipeline = IngestPipeline::from_config(store, &config.ingest);
    pipeline.router().ensure_layout().await?;
    tokio::fs::create_dir_all(&config.ingest.staging_dir).await?;

    let poller = DirectoryPoller::new(
        pipeline,
        config.ingest.staging_dir.clone(),
        config.ingest.poll_interval,
    );

    if args.once {
        let summary = poller.run_cycle().await?;
        println!(
            "processed {} file(s), errored {} file(s)",
            summary.processed, summary.errored
        );
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|err| TelemetryError::Recorder(Box::new(err)))?;
    let readiness = Arc::new(AtomicBool::new(false));
    let app = operational_routes().layer(Extension(AppState {
        readiness: readiness.clone(),
        metrics: Arc::new(handle),
    }));

    let addr = SocketAddr::new(config.server.socket_addr()?.ip(), config.ingest.metrics_port);
    let shutdown = shutdown_signal();
    let http_server = bind_operational(addr)
        .await
        .map(|listener| tokio::spawn(listen(listener, app, shutdown.clone())));
    readiness.store(true, Ordering::Release);
    info!(inbox = %poller.staging_dir().display(), "ingestion worker ready");

    // The poller owns the exit: a file in flight always reaches its routing step.
    let result = poller.run(shutdown).await;
    if let Some(http_server) = http_server {
        http_server.abort();
    }
    if let Err(err) = &result {
        error!(error = %err, "ingestion stopped");
    }
    result?;

    info!("exiting");
    Ok(())
}

/// Binds the operational listener. A busy or forbidden address is logged and ingestion runs
/// without it.
async fn bind_operational(addr: SocketAddr) -> Option<TcpListener> {
    match TcpListener::bind(addr).await {
        Ok(listener) => {
            info!(%addr, "operational endpoints listening");
            Some(listener)
        }
        Err(err) => {
            warn!(%addr, error = %err, "operational endpoints disabled; set INGEST_METRICS_PORT");
            None
        }
    }
}

async fn listen(listener: TcpListener, app: Router, shutdown: watch::Receiver<bool>) {
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(wait_for(shutdown))
        .await
    {
        error!(error = %err, "operational http server failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn busy_operational_port_does_not_block_ingestion() {
        let taken = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = taken.local_addr().expect("local addr");

        assert!(bind_operational(addr).await.is_none());

        drop(taken);
        let free = SocketAddr::new(addr.ip(), 0);
        assert!(bind_operational(free).await.is_some());
    }
}
