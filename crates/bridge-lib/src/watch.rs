//! Watch-event boundary
//!
//! The orchestrator's watch subsystem delivers add/update/delete callbacks;
//! this module turns them into work-queue entries. Units addressed to a
//! different scheduler are ignored. How a unit names its scheduler depends
//! on the orchestrator API generation, resolved once at startup.

use crate::models::TaskId;
use crate::queue::WorkQueue;
use dashmap::DashMap;
use k8s_openapi::api::core::v1::Pod;
use std::sync::Arc;
use tracing::{debug, warn};

/// Annotation the pre-1.6 orchestrator used to name a unit's scheduler
pub const LEGACY_SCHEDULER_ANNOTATION: &str = "scheduler.alpha.kubernetes.io/name";

/// Orchestrator API compatibility mode, resolved once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiCompat {
    /// Scheduler selection via the legacy annotation (API < 1.6)
    Legacy,
    /// Scheduler selection via the spec schedulerName field
    Stable,
}

impl ApiCompat {
    pub fn from_version(major: u32, minor: u32) -> Self {
        if major > 1 || (major == 1 && minor >= 6) {
            ApiCompat::Stable
        } else {
            ApiCompat::Legacy
        }
    }
}

/// Turns watch callbacks into work-queue entries
///
/// `on_add` enqueues with an absent old side, `on_delete` with an absent
/// new side. Enqueueing never blocks, so a stalled backend slows only the
/// workers, never the watch callbacks.
pub struct PodEventHandler {
    queue: Arc<WorkQueue>,
    scheduler_name: String,
    compat: ApiCompat,
}

impl PodEventHandler {
    pub fn new(queue: Arc<WorkQueue>, scheduler_name: impl Into<String>, compat: ApiCompat) -> Self {
        Self {
            queue,
            scheduler_name: scheduler_name.into(),
            compat,
        }
    }

    pub fn on_add(&self, pod: &Pod) {
        if !self.selected(pod) {
            return;
        }
        let Some(key) = TaskId::from_pod(pod) else {
            warn!("Snapshot without identity in add event, dropping");
            return;
        };
        debug!(key = %key, "Unit added");
        self.queue.enqueue(key, None, Some(pod.clone()));
    }

    pub fn on_update(&self, old: &Pod, new: &Pod) {
        if !self.selected(new) {
            return;
        }
        let Some(key) = TaskId::from_pod(new) else {
            warn!("Snapshot without identity in update event, dropping");
            return;
        };
        debug!(key = %key, "Unit updated");
        self.queue
            .enqueue(key, Some(old.clone()), Some(new.clone()));
    }

    pub fn on_delete(&self, pod: &Pod) {
        if !self.selected(pod) {
            return;
        }
        let Some(key) = TaskId::from_pod(pod) else {
            warn!("Snapshot without identity in delete event, dropping");
            return;
        };
        debug!(key = %key, "Unit deleted");
        self.queue.enqueue(key, Some(pod.clone()), None);
    }

    /// Is this unit addressed to our scheduler?
    fn selected(&self, pod: &Pod) -> bool {
        match self.compat {
            ApiCompat::Stable => pod
                .spec
                .as_ref()
                .and_then(|spec| spec.scheduler_name.as_deref())
                .map(|name| name == self.scheduler_name)
                .unwrap_or(false),
            ApiCompat::Legacy => pod
                .metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get(LEGACY_SCHEDULER_ANNOTATION))
                .map(|name| name == &self.scheduler_name)
                .unwrap_or(false),
        }
    }
}

/// Last-observed snapshot per unit
///
/// Lets the watch loop derive (old, new) pairs from a stream that only
/// carries current states, and synthesize deletions on a re-list.
#[derive(Default)]
pub struct SnapshotStore {
    pods: DashMap<TaskId, Pod>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a snapshot, returning the previously observed one.
    pub fn record(&self, pod: &Pod) -> Option<Pod> {
        let key = TaskId::from_pod(pod)?;
        self.pods.insert(key, pod.clone())
    }

    pub fn remove(&self, key: &TaskId) -> Option<Pod> {
        self.pods.remove(key).map(|(_, pod)| pod)
    }

    pub fn known_keys(&self) -> Vec<TaskId> {
        self.pods.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }
}
