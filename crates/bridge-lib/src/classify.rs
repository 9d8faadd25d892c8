//! Lifecycle transition classification
//!
//! Given the old/new snapshot pair for a unit (either side may be absent),
//! decides which backend lifecycle call the pair implies. Pure: equal
//! inputs always classify identically.

use crate::models::TaskPhase;
use crate::translate::{translate, TranslateError};
use k8s_openapi::api::core::v1::Pod;

/// The kind of lifecycle transition observed between two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No prior snapshot: the backend has no task yet
    Submit,
    /// Deletion observed; terminal at the backend regardless of last phase
    Remove,
    /// Phase moved to Succeeded
    Complete,
    /// Phase moved to Failed
    Fail,
    /// Material change to resources or constraints while non-terminal
    Update,
    /// Nothing the backend needs to hear about
    NoOp,
}

impl Transition {
    /// Stable lowercase name, used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Submit => "submit",
            Transition::Remove => "remove",
            Transition::Complete => "complete",
            Transition::Fail => "fail",
            Transition::Update => "update",
            Transition::NoOp => "noop",
        }
    }
}

/// Classify the transition between two snapshots of the same unit.
///
/// Rules are evaluated in precedence order; in particular a submission
/// (absent old) wins over everything, a deletion wins over phase changes,
/// and terminal phase changes win over resource diffs. The error arm is
/// reachable only when a resource comparison (rule 5) must translate a
/// malformed snapshot.
pub fn classify(old: Option<&Pod>, new: Option<&Pod>) -> Result<Transition, TranslateError> {
    let Some(new) = new else {
        // Deletion observed (or a degenerate empty pair)
        return Ok(if old.is_some() {
            Transition::Remove
        } else {
            Transition::NoOp
        });
    };

    let Some(old) = old else {
        return Ok(Transition::Submit);
    };

    let old_phase = TaskPhase::from_pod(old);
    let new_phase = TaskPhase::from_pod(new);

    // A snapshot already flagged for deletion that reports Failed is torn
    // down, not marked failed: the deletion is what the backend must mirror.
    if deletion_flagged(new) && new_phase == TaskPhase::Failed {
        return Ok(Transition::Remove);
    }

    if new_phase == TaskPhase::Succeeded && old_phase != TaskPhase::Succeeded {
        return Ok(Transition::Complete);
    }
    if new_phase == TaskPhase::Failed && old_phase != TaskPhase::Failed {
        return Ok(Transition::Fail);
    }

    if !new_phase.is_terminal() {
        let old_task = translate(old)?;
        let new_task = translate(new)?;
        let materially_changed = old_task.cpu_request_millis != new_task.cpu_request_millis
            || old_task.mem_request_kb != new_task.mem_request_kb
            || old_task.constraints != new_task.constraints
            || old_task.tolerations != new_task.tolerations;
        if materially_changed {
            return Ok(Transition::Update);
        }
    }

    Ok(Transition::NoOp)
}

fn deletion_flagged(pod: &Pod) -> bool {
    pod.metadata.deletion_timestamp.is_some()
}
