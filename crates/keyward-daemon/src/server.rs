use std::future::Future;

use anyhow::{Context, Result};
use keyward_observer::Hub;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::app::{self, AppState};
use crate::config::DaemonConfig;

/// Bind the configured address and serve until `shutdown` resolves.
pub async fn run(
    config: DaemonConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    serve(listener, Hub::new(config.hub), shutdown).await
}

/// Serve the daemon API on an already-bound listener.
///
/// Starts `hub`, and stops it once `shutdown` resolves so open progress
/// streams end and the graceful shutdown can complete.
pub async fn serve(
    listener: TcpListener,
    hub: Hub,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let drain = hub.start()?;
    let addr = listener.local_addr()?;
    info!(%addr, pid = std::process::id(), "keyward daemon started");

    let stopper = hub.clone();
    let result = axum::serve(listener, app::router(AppState::new(hub.clone())))
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("shutting down...");
            stopper.stop();
        })
        .await
        .context("daemon server failed");

    hub.stop();
    if let Err(err) = drain.await {
        warn!("hub drain task failed: {err}");
    }
    result
}
