//! Transition dispatch worker
//!
//! Pulls keys from the work queue, re-derives the lifecycle transition from
//! the latest snapshot pair and issues the matching backend call. All
//! failure handling concentrates here: transient backend errors requeue
//! with backoff, permanent rejections and malformed input are logged and
//! dropped. Running several workers over one queue is safe because the
//! queue never hands the same key to two of them.

use crate::backend::{BackendError, SchedulerBackend};
use crate::classify::{classify, Transition};
use crate::models::TaskId;
use crate::observability::{BridgeMetrics, StructuredLogger};
use crate::queue::{SnapshotPair, WorkQueue};
use crate::translate::{translate, TranslateError};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

#[derive(Debug, Error)]
enum DispatchError {
    #[error(transparent)]
    Translate(#[from] TranslateError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Long-lived worker mapping transitions to backend lifecycle calls
#[derive(Clone)]
pub struct TransitionWorker {
    queue: Arc<WorkQueue>,
    backend: Arc<dyn SchedulerBackend>,
    logger: StructuredLogger,
    metrics: BridgeMetrics,
}

impl TransitionWorker {
    pub fn new(
        queue: Arc<WorkQueue>,
        backend: Arc<dyn SchedulerBackend>,
        logger: StructuredLogger,
        metrics: BridgeMetrics,
    ) -> Self {
        Self {
            queue,
            backend,
            logger,
            metrics,
        }
    }

    /// Run until the queue shuts down and drains.
    pub async fn run(self) {
        info!("Starting transition worker");
        while let Some((key, pair)) = self.queue.dequeue().await {
            self.metrics.set_queue_depth(self.queue.len() as i64);
            self.process(key, pair).await;
        }
        info!("Work queue shut down, worker exiting");
    }

    /// Spawn the worker onto the runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn process(&self, key: TaskId, pair: SnapshotPair) {
        let transition = match classify(pair.old.as_ref(), pair.new.as_ref()) {
            Ok(transition) => transition,
            Err(e) => {
                // Malformed input: fatal for this event only
                self.drop_event(&key, &e.to_string());
                return;
            }
        };

        if transition == Transition::NoOp {
            self.queue.forget(&key);
            self.queue.done(&key);
            return;
        }

        let start = Instant::now();
        let result = self.dispatch(transition, &key, &pair).await;
        self.metrics
            .observe_dispatch_latency(start.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                self.metrics.inc_backend_call(transition.as_str());
                self.logger
                    .log_dispatch(transition.as_str(), &key.to_string());
                self.queue.forget(&key);
                self.queue.done(&key);
            }
            Err(DispatchError::Translate(e)) => {
                self.drop_event(&key, &e.to_string());
            }
            Err(DispatchError::Backend(e)) if e.is_retryable() => {
                self.metrics
                    .inc_backend_error(transition.as_str(), "transient");
                self.logger.log_backend_retry(
                    transition.as_str(),
                    &key.to_string(),
                    &e.to_string(),
                );
                self.queue.requeue_with_backoff(key.clone());
                self.queue.done(&key);
            }
            Err(DispatchError::Backend(e)) => {
                self.metrics
                    .inc_backend_error(transition.as_str(), "permanent");
                self.logger.log_backend_drop(
                    transition.as_str(),
                    &key.to_string(),
                    &e.to_string(),
                );
                self.queue.forget(&key);
                self.queue.done(&key);
            }
        }
    }

    async fn dispatch(
        &self,
        transition: Transition,
        key: &TaskId,
        pair: &SnapshotPair,
    ) -> Result<(), DispatchError> {
        match (transition, pair.new.as_ref()) {
            (Transition::Submit, Some(new)) => {
                let task = translate(new)?;
                self.backend.submit(&task).await?;
            }
            (Transition::Update, Some(new)) => {
                let task = translate(new)?;
                self.backend.update(&task).await?;
            }
            (Transition::Remove, _) => self.backend.remove(key).await?,
            (Transition::Complete, _) => self.backend.complete(key).await?,
            (Transition::Fail, _) => self.backend.fail(key).await?,
            // Unreachable by the classification rules
            (Transition::NoOp, _) | (Transition::Submit, None) | (Transition::Update, None) => {}
        }
        Ok(())
    }

    fn drop_event(&self, key: &TaskId, reason: &str) {
        self.metrics.inc_events_dropped();
        self.logger.log_event_dropped(&key.to_string(), reason);
        self.queue.forget(key);
        self.queue.done(key);
    }
}
