use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use taskfetch::api::{self, AppState};
use taskfetch::config::Config;
use taskfetch::ledger::FjallStore;
use taskfetch::observability::Metrics;
use taskfetch::worker::{Dispatcher, HttpFetcher, TaskProcessor, recover_interrupted};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub async fn run(address: Option<SocketAddr>, config_path: Option<PathBuf>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = Config::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let address = address.unwrap_or(config.server.bind_addr);

    let store = Arc::new(
        FjallStore::open(config.storage.ledger_path())
            .map_err(|e| format!("Failed to open Fjall store: {e}"))?,
    );
    let metrics = Arc::new(Metrics::new());

    let fetcher = Arc::new(
        HttpFetcher::new(&config.fetch).map_err(|e| format!("Failed to build HTTP client: {e}"))?,
    );
    let processor = Arc::new(TaskProcessor::new(
        store.clone(),
        fetcher,
        config.storage.downloads_dir(),
        metrics.clone(),
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        processor,
        &config.dispatcher,
        metrics.clone(),
    ));

    let report = dispatcher.start()?;
    info!(
        tasks_reset = report.tasks_reset,
        files_reset = report.files_reset,
        "Dispatcher started"
    );

    let state = AppState::new(config, store.clone(), metrics).with_dispatcher(dispatcher.clone());
    let app = api::router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "taskfetch API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dispatcher.stop().await;
    store.persist()?;
    info!("Shutdown complete");

    Ok(())
}

/// Offline recovery pass against the configured ledger
pub fn recover(config_path: Option<PathBuf>) -> Result<(), AnyError> {
    let config = Config::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let store = FjallStore::open(config.storage.ledger_path())
        .map_err(|e| format!("Failed to open Fjall store: {e}"))?;

    let report = recover_interrupted(&store)?;
    store.persist()?;

    info!(
        tasks_reset = report.tasks_reset,
        files_reset = report.files_reset,
        "Recovery complete"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
