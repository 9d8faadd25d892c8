//! Pod watch wiring
//!
//! Drives the orchestrator's watch stream and folds its events into the
//! three boundary callbacks. The stream only carries current states, so the
//! snapshot store supplies the old side of update pairs and lets a re-list
//! synthesize deletions for units that vanished while the watch was down.

use anyhow::Result;
use bridge_lib::models::TaskId;
use bridge_lib::observability::BridgeMetrics;
use bridge_lib::watch::{PodEventHandler, SnapshotStore};
use futures::{pin_mut, TryStreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::watcher;
use kube::{Api, Client};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Watch pods across all namespaces until shutdown.
pub async fn run_pod_watch(
    client: Client,
    handler: Arc<PodEventHandler>,
    store: Arc<SnapshotStore>,
    metrics: BridgeMetrics,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> Result<()> {
    let pods: Api<Pod> = Api::all(client);
    let events = watcher(pods, watcher::Config::default());
    pin_mut!(events);

    info!("Starting pod watch");
    loop {
        tokio::select! {
            next = events.try_next() => {
                match next {
                    Ok(Some(event)) => apply(&handler, &store, &metrics, event),
                    Ok(None) => {
                        info!("Pod watch stream ended");
                        break;
                    }
                    Err(e) => {
                        // The watcher re-establishes itself; the error is
                        // informational
                        warn!(error = %e, "Pod watch error");
                    }
                }
            }
            _ = shutdown.recv() => {
                info!("Shutting down pod watch");
                break;
            }
        }
    }

    Ok(())
}

/// Fold one watch event into the boundary callbacks.
fn apply(
    handler: &PodEventHandler,
    store: &SnapshotStore,
    metrics: &BridgeMetrics,
    event: watcher::Event<Pod>,
) {
    match event {
        watcher::Event::Applied(pod) => match store.record(&pod) {
            Some(old) => handler.on_update(&old, &pod),
            None => handler.on_add(&pod),
        },
        watcher::Event::Deleted(pod) => {
            if let Some(key) = TaskId::from_pod(&pod) {
                store.remove(&key);
            }
            handler.on_delete(&pod);
        }
        watcher::Event::Restarted(pods) => {
            // Units missing from the re-list were deleted while the watch
            // was down
            let listed: HashSet<TaskId> = pods.iter().filter_map(TaskId::from_pod).collect();
            for key in store.known_keys() {
                if !listed.contains(&key) {
                    if let Some(old) = store.remove(&key) {
                        handler.on_delete(&old);
                    }
                }
            }
            for pod in pods {
                match store.record(&pod) {
                    Some(old) => handler.on_update(&old, &pod),
                    None => handler.on_add(&pod),
                }
            }
        }
    }
    metrics.set_units_tracked(store.len() as i64);
}
