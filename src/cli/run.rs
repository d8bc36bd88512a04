use crate::coalesce::Coalescer;
use crate::config::{load_or_default, Config, ConfigError};
use crate::ingress::{start_server, IngressState};
use crate::rotate::{run_rotation_task, Rotator};
use crate::store::{IntervalStore, StoreError};
use crate::upload::{LighthouseUploader, UploadError};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tokio::sync::{watch, Notify};
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("upload client error: {0}")]
    Upload(#[from] UploadError),

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("invalid listen address '{0}'")]
    ListenAddr(String),
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = &config_path {
        info!(config_path = %path.display(), "Loading configuration");
    }
    let config = load_or_default(config_path.as_deref())?;

    run_logging_server(config).await.map_err(|e| e.into())
}

/// Open the store and build a rotator that uploads with the configured client
pub(crate) async fn open(config: &Config) -> Result<(Arc<IntervalStore>, Rotator), RunError> {
    let store = Arc::new(IntervalStore::new(&config.store.active_path));
    store.prepare().await?;

    tokio::fs::create_dir_all(&config.store.closed_dir)
        .await
        .map_err(|source| StoreError::Io {
            path: config.store.closed_dir.clone(),
            source,
        })?;

    let uploader = LighthouseUploader::new(&config.upload)?;
    if !uploader.has_api_key() {
        warn!(
            env = crate::config::types::API_KEY_ENV,
            "No upload API key configured, closed batches will stay on disk"
        );
    }

    let rotator = Rotator::new(store.clone(), &config.store.closed_dir, Arc::new(uploader));
    Ok((store, rotator))
}

async fn run_logging_server(config: Config) -> Result<(), RunError> {
    let listen_addr: SocketAddr = config
        .server
        .listen
        .parse()
        .map_err(|_| RunError::ListenAddr(config.server.listen.clone()))?;

    info!(
        active_path = %config.store.active_path.display(),
        closed_dir = %config.store.closed_dir.display(),
        "Opening interval store"
    );
    let (store, rotator) = open(&config).await?;

    let wake = Arc::new(Notify::new());
    let mut coalescer = Coalescer::new(store, config.coalesce.end_policy);
    if let Some(max_records) = config.rotation.max_records {
        coalescer = coalescer.with_rotate_trigger(max_records, wake.clone());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    let rotation_handle = if config.rotation.enabled {
        info!(interval = ?config.rotation.interval, "Starting rotation task");
        Some(tokio::spawn(run_rotation_task(
            Arc::new(rotator),
            config.rotation.interval,
            wake,
            shutdown_rx.clone(),
        )))
    } else {
        warn!("Rotation disabled, the active batch grows until `camlog flush --include-active`");
        None
    };

    let signal_tx = Arc::clone(&shutdown_tx);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                let _ = signal_tx.send(true);
            }
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    let state = Arc::new(IngressState { coalescer });
    let server_result = start_server(listen_addr, state, shutdown_rx).await;

    // Stop the rotator too if the server exited on its own
    let _ = shutdown_tx.send(true);

    if let Some(handle) = rotation_handle {
        info!("Waiting for rotation task to finish");
        handle.await?;
    }

    server_result?;
    info!("Shutdown complete");
    Ok(())
}
