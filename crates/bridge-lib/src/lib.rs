//! Bridge library between a cluster orchestrator and a flow scheduler
//!
//! This crate provides the core functionality for:
//! - Translating pod snapshots into the normalized task model
//! - Classifying lifecycle transitions between snapshots
//! - Deduplicating per-unit work with in-flight exclusivity
//! - Dispatching lifecycle calls against the scheduler backend
//! - Health checks and observability

pub mod backend;
pub mod classify;
pub mod health;
pub mod models;
pub mod observability;
pub mod queue;
pub mod translate;
pub mod watch;
pub mod worker;

pub use backend::{BackendClient, BackendError, SchedulerBackend};
pub use classify::{classify, Transition};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{BridgeMetrics, StructuredLogger};
pub use queue::{QueueConfig, SnapshotPair, WorkQueue};
pub use translate::{translate, TranslateError};
pub use watch::{ApiCompat, PodEventHandler, SnapshotStore};
pub use worker::TransitionWorker;
