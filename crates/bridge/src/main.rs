//! Flow Scheduler Bridge - pod lifecycle adapter
//!
//! This binary watches the orchestrator's pods and keeps the flow
//! scheduler backend's view of outstanding tasks consistent with them.

use anyhow::Result;
use bridge_lib::{
    backend::{BackendClientBuilder, SchedulerBackend, TlsPaths},
    health::{components, HealthRegistry},
    observability::{BridgeMetrics, StructuredLogger},
    queue::WorkQueue,
    watch::{PodEventHandler, SnapshotStore},
    worker::TransitionWorker,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod informer;

const BRIDGE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting flow-bridge");

    // Load configuration
    let config = config::BridgeConfig::load()?;
    info!(
        scheduler = %config.scheduler_name,
        backend = %config.backend_endpoint,
        workers = config.workers,
        "Bridge configured"
    );

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::WATCHER).await;
    health_registry.register(components::WORK_QUEUE).await;
    health_registry.register(components::WORKER).await;
    health_registry.register(components::BACKEND_CLIENT).await;

    // Initialize metrics
    let metrics = BridgeMetrics::new();

    // Initialize structured logger
    let logger = StructuredLogger::new(&config.scheduler_name);
    logger.log_startup(BRIDGE_VERSION);

    // Backend client, optionally with mTLS
    let mut builder = BackendClientBuilder::new().endpoint(&config.backend_endpoint);
    if let (Some(ca), Some(cert), Some(key)) = (
        config.ca_cert_path.as_ref(),
        config.client_cert_path.as_ref(),
        config.client_key_path.as_ref(),
    ) {
        builder = builder.tls(TlsPaths {
            ca_cert_path: ca.into(),
            client_cert_path: cert.into(),
            client_key_path: key.into(),
        });
    }
    let backend: Arc<dyn SchedulerBackend> = Arc::new(builder.build());

    // Work queue and worker pool
    let queue = WorkQueue::new(config.queue_config());
    let mut workers = Vec::new();
    for _ in 0..config.workers.max(1) {
        let worker = TransitionWorker::new(
            Arc::clone(&queue),
            Arc::clone(&backend),
            logger.clone(),
            metrics.clone(),
        );
        workers.push(worker.spawn());
    }

    // Watch boundary
    let store = Arc::new(SnapshotStore::new());
    let handler = Arc::new(PodEventHandler::new(
        Arc::clone(&queue),
        &config.scheduler_name,
        config.compat(),
    ));

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let kube_client = kube::Client::try_default().await?;
    let watch_handle = tokio::spawn(informer::run_pod_watch(
        kube_client,
        handler,
        store,
        metrics.clone(),
        shutdown_tx.subscribe(),
    ));

    // Create shared application state
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics.clone()));

    // Mark bridge as ready after initialization
    health_registry.set_ready(true).await;

    // Start health and metrics server
    let _api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    // Stop the watch, drain the queue, let workers exit
    let _ = shutdown_tx.send(());
    queue.shutdown();
    for worker in workers {
        let _ = worker.await;
    }
    let _ = watch_handle.await;
    info!("Shutting down");

    Ok(())
}
