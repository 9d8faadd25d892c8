//! Core data models for the scheduler bridge

use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a workload unit: (namespace, name)
///
/// Unique within the orchestrator's namespace scope and immutable for the
/// life of a unit. Used as the work queue key and as the backend's task
/// correlation key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId {
    pub namespace: String,
    pub name: String,
}

impl TaskId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Derive the identity from a pod snapshot, if it carries one.
    pub fn from_pod(pod: &Pod) -> Option<Self> {
        let name = pod.metadata.name.as_deref()?;
        let namespace = pod.metadata.namespace.as_deref()?;
        if name.is_empty() || namespace.is_empty() {
            return None;
        }
        Some(Self::new(namespace, name))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Lifecycle phase as reported by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl TaskPhase {
    /// Extract the phase from a pod snapshot. Anything outside the modeled
    /// set (including an absent status) maps to `Pending`.
    pub fn from_pod(pod: &Pod) -> Self {
        let phase = pod
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .unwrap_or("");
        match phase {
            "Running" => TaskPhase::Running,
            "Succeeded" => TaskPhase::Succeeded,
            "Failed" => TaskPhase::Failed,
            _ => TaskPhase::Pending,
        }
    }

    /// Returns true for phases the backend treats as terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskPhase::Succeeded | TaskPhase::Failed)
    }
}

/// A single key/operator/values match clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchExpression {
    pub key: String,
    pub operator: String,
    pub values: Vec<String>,
}

/// One group of node match clauses; groups are OR-ed by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSelectorTerm {
    pub match_expressions: Vec<MatchExpression>,
}

/// A hard co-location (or anti-co-location) term: label clauses scoped
/// to a topology domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffinityTerm {
    pub match_expressions: Vec<MatchExpression>,
    pub topology_key: String,
}

/// Hard placement constraints for a task
///
/// Only must-satisfy constraints are modeled; soft/preferred constraints
/// are out of scope for the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConstraints {
    /// Required node-selector term groups
    pub node_terms: Vec<NodeSelectorTerm>,
    /// Required co-location terms
    pub colocate_terms: Vec<AffinityTerm>,
    /// Required anti-co-location terms
    pub spread_terms: Vec<AffinityTerm>,
}

impl TaskConstraints {
    pub fn is_empty(&self) -> bool {
        self.node_terms.is_empty()
            && self.colocate_terms.is_empty()
            && self.spread_terms.is_empty()
    }
}

/// Scheduling toleration, passed through to the backend verbatim
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toleration {
    pub key: String,
    pub operator: String,
    pub value: String,
    pub effect: String,
}

/// The normalized, orchestrator-independent representation of a unit
///
/// Derived fresh from each snapshot and never persisted; the work queue
/// holds keys, not tasks. Two tasks are equal for change-detection
/// purposes iff every field compares equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub phase: TaskPhase,
    /// CPU request in millicores (fixed point, no float drift across diffs)
    pub cpu_request_millis: u64,
    /// Memory request in kilobytes, truncated toward zero
    pub mem_request_kb: u64,
    /// Opaque correlation string, carried through unchanged
    pub owner_ref: String,
    pub constraints: Option<TaskConstraints>,
    pub tolerations: Vec<Toleration>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodStatus;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn pod_with_phase(phase: Option<&str>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("unit-1".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            status: phase.map(|p| PodStatus {
                phase: Some(p.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_task_id_from_pod() {
        let pod = pod_with_phase(Some("Running"));
        let id = TaskId::from_pod(&pod).unwrap();
        assert_eq!(id, TaskId::new("default", "unit-1"));
        assert_eq!(id.to_string(), "default/unit-1");
    }

    #[test]
    fn test_task_id_requires_both_parts() {
        let mut pod = pod_with_phase(None);
        pod.metadata.namespace = None;
        assert!(TaskId::from_pod(&pod).is_none());

        let mut pod = pod_with_phase(None);
        pod.metadata.name = Some(String::new());
        assert!(TaskId::from_pod(&pod).is_none());
    }

    #[test]
    fn test_phase_extraction() {
        assert_eq!(
            TaskPhase::from_pod(&pod_with_phase(Some("Running"))),
            TaskPhase::Running
        );
        assert_eq!(
            TaskPhase::from_pod(&pod_with_phase(Some("Succeeded"))),
            TaskPhase::Succeeded
        );
        assert_eq!(
            TaskPhase::from_pod(&pod_with_phase(Some("Failed"))),
            TaskPhase::Failed
        );
        // Unknown and absent phases map to the zero value
        assert_eq!(
            TaskPhase::from_pod(&pod_with_phase(Some("Unknown"))),
            TaskPhase::Pending
        );
        assert_eq!(TaskPhase::from_pod(&pod_with_phase(None)), TaskPhase::Pending);
    }

    #[test]
    fn test_terminal_phases() {
        assert!(!TaskPhase::Pending.is_terminal());
        assert!(!TaskPhase::Running.is_terminal());
        assert!(TaskPhase::Succeeded.is_terminal());
        assert!(TaskPhase::Failed.is_terminal());
    }

    #[test]
    fn test_constraints_is_empty() {
        assert!(TaskConstraints::default().is_empty());

        let constraints = TaskConstraints {
            node_terms: vec![NodeSelectorTerm {
                match_expressions: vec![],
            }],
            ..Default::default()
        };
        assert!(!constraints.is_empty());
    }
}
