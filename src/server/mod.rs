//! HTTP server for the chat service.
//!
//! This module provides:
//! - Configuration types and loading (`config`)
//! - The axum routes (`http`)
//! - [`serve`], which runs the router until a shutdown signal
//! - [`install_metrics`], the Prometheus recorder behind `/metrics`

pub mod config;
pub mod http;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tracing::info;

use crate::service::ChatService;
use crate::{Result, VendoraError};

pub use http::{ChatResponse, metrics_router, router};

/// How often histogram buckets are drained in the installed recorder.
const METRICS_UPKEEP: Duration = Duration::from_secs(5);

/// Install the process-wide Prometheus recorder and start its upkeep task.
///
/// Must run inside a tokio runtime. Fails if a recorder is already installed.
pub fn install_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        VendoraError::Configuration(format!("Failed to install metrics recorder: {e}"))
    })?;
    let upkeep = handle.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(METRICS_UPKEEP);
        loop {
            interval.tick().await;
            upkeep.run_upkeep();
        }
    });
    Ok(handle)
}

/// Serve `service` on `addr` until `shutdown` resolves, then tear it down.
///
/// `/metrics` is mounted when a Prometheus handle is given. In-flight
/// requests finish before this returns.
pub async fn serve<S>(
    service: Arc<ChatService>,
    addr: SocketAddr,
    metrics: Option<PrometheusHandle>,
    shutdown: S,
) -> Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| VendoraError::Configuration(format!("Failed to bind {addr}: {e}")))?;
    info!(%addr, "listening");

    let mut app = router(Arc::clone(&service));
    if let Some(handle) = metrics {
        app = app.merge(metrics_router(handle));
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| VendoraError::Internal(format!("server error: {e}")))?;

    service.shutdown();
    Ok(())
}
