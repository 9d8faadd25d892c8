//! Scheduler backend access
//!
//! This module provides:
//! - the capability trait the worker dispatches through, so production and
//!   test backends are interchangeable
//! - the error taxonomy separating retryable failures from permanent
//!   rejections
//! - a gRPC client with connection management and optional mTLS

mod client;
pub mod proto;

pub use client::{BackendClient, BackendClientBuilder, ClientConfig, TlsPaths};

use crate::models::{Task, TaskId};
use proto::ReplyCode;
use thiserror::Error;

pub use async_trait::async_trait;

/// Failures surfaced by backend calls
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Connection or RPC-level failure; the call never reached a verdict
    #[error("transport failure: {0}")]
    Transport(String),
    /// Reply-level rejection; repeating the same call cannot succeed
    #[error("backend rejected call ({code:?}): {message}")]
    Rejected { code: ReplyCode, message: String },
}

impl BackendError {
    /// Transient failures are retried with backoff; permanent rejections
    /// are logged and dropped. An internal backend error counts as
    /// transient since the backend may recover.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Transport(_) => true,
            BackendError::Rejected { code, .. } => *code == ReplyCode::InternalError,
        }
    }
}

/// The five lifecycle operations the flow scheduler accepts
///
/// All operations are expected to be safe to repeat: retries re-run the
/// whole classify+dispatch pass for a key against the latest snapshots.
#[async_trait]
pub trait SchedulerBackend: Send + Sync {
    async fn submit(&self, task: &Task) -> Result<(), BackendError>;
    async fn update(&self, task: &Task) -> Result<(), BackendError>;
    async fn remove(&self, id: &TaskId) -> Result<(), BackendError>;
    async fn complete(&self, id: &TaskId) -> Result<(), BackendError>;
    async fn fail(&self, id: &TaskId) -> Result<(), BackendError>;
}

/// Map a backend reply onto the error taxonomy.
fn check_reply(reply: proto::TaskReply) -> Result<(), BackendError> {
    match ReplyCode::from_i32(reply.code) {
        ReplyCode::Ok => Ok(()),
        code => Err(BackendError::Rejected {
            code,
            message: reply.message,
        }),
    }
}

fn to_task_ref(id: &TaskId) -> proto::TaskRef {
    proto::TaskRef {
        namespace: id.namespace.clone(),
        name: id.name.clone(),
    }
}

/// Shape a normalized task into the backend's wire descriptor.
pub fn to_task_description(task: &Task) -> proto::TaskDescription {
    proto::TaskDescription {
        r#ref: Some(to_task_ref(&task.id)),
        cpu_request_millicores: task.cpu_request_millis,
        memory_request_kb: task.mem_request_kb,
        owner_ref: task.owner_ref.clone(),
        constraints: task.constraints.as_ref().map(|c| proto::TaskConstraints {
            node_terms: c
                .node_terms
                .iter()
                .map(|term| proto::NodeSelectorTerm {
                    match_expressions: to_match_expressions(&term.match_expressions),
                })
                .collect(),
            colocate_terms: to_affinity_terms(&c.colocate_terms),
            spread_terms: to_affinity_terms(&c.spread_terms),
        }),
        tolerations: task
            .tolerations
            .iter()
            .map(|t| proto::Toleration {
                key: t.key.clone(),
                operator: t.operator.clone(),
                value: t.value.clone(),
                effect: t.effect.clone(),
            })
            .collect(),
    }
}

fn to_affinity_terms(terms: &[crate::models::AffinityTerm]) -> Vec<proto::AffinityTerm> {
    terms
        .iter()
        .map(|term| proto::AffinityTerm {
            match_expressions: to_match_expressions(&term.match_expressions),
            topology_key: term.topology_key.clone(),
        })
        .collect()
}

fn to_match_expressions(
    expressions: &[crate::models::MatchExpression],
) -> Vec<proto::MatchExpression> {
    expressions
        .iter()
        .map(|expr| proto::MatchExpression {
            key: expr.key.clone(),
            operator: expr.operator.clone(),
            values: expr.values.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchExpression, TaskConstraints, TaskPhase, Toleration};

    fn reply(code: ReplyCode, message: &str) -> proto::TaskReply {
        proto::TaskReply {
            code: code as i32,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_ok_reply_is_success() {
        assert!(check_reply(reply(ReplyCode::Ok, "")).is_ok());
    }

    #[test]
    fn test_rejection_carries_code_and_message() {
        let err = check_reply(reply(ReplyCode::TaskNotFound, "no such task")).unwrap_err();
        match err {
            BackendError::Rejected { code, message } => {
                assert_eq!(code, ReplyCode::TaskNotFound);
                assert_eq!(message, "no such task");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(BackendError::Transport("connection refused".to_string()).is_retryable());
        assert!(check_reply(reply(ReplyCode::InternalError, ""))
            .unwrap_err()
            .is_retryable());

        for code in [
            ReplyCode::Unspecified,
            ReplyCode::TaskNotFound,
            ReplyCode::TaskAlreadyExists,
            ReplyCode::InvalidTask,
        ] {
            assert!(
                !check_reply(reply(code, "")).unwrap_err().is_retryable(),
                "{code:?} must be permanent"
            );
        }
    }

    #[test]
    fn test_task_description_shape() {
        let task = Task {
            id: TaskId::new("prod", "unit-1"),
            phase: TaskPhase::Pending,
            cpu_request_millis: 2000,
            mem_request_kb: 1,
            owner_ref: "abcdfe12345".to_string(),
            constraints: Some(TaskConstraints {
                node_terms: vec![crate::models::NodeSelectorTerm {
                    match_expressions: vec![MatchExpression {
                        key: "mem-type".to_string(),
                        operator: "NotIn".to_string(),
                        values: vec!["DDR".to_string()],
                    }],
                }],
                ..Default::default()
            }),
            tolerations: vec![Toleration {
                key: "key".to_string(),
                operator: "Equal".to_string(),
                value: "value".to_string(),
                effect: "NoSchedule".to_string(),
            }],
        };

        let desc = to_task_description(&task);
        let r = desc.r#ref.as_ref().unwrap();
        assert_eq!(r.namespace, "prod");
        assert_eq!(r.name, "unit-1");
        assert_eq!(desc.cpu_request_millicores, 2000);
        assert_eq!(desc.memory_request_kb, 1);
        assert_eq!(desc.owner_ref, "abcdfe12345");
        assert_eq!(
            desc.constraints.as_ref().unwrap().node_terms[0].match_expressions[0].operator,
            "NotIn"
        );
        assert_eq!(desc.tolerations[0].effect, "NoSchedule");
    }
}
