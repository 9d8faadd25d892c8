//! Snapshot translation into the normalized task model
//!
//! Converts raw pod snapshots into [`Task`] values:
//! - resource quantities parse into fixed-point sub-units (integer math only)
//! - absent fields map to zero/absent values, never errors
//! - the only error arm is a precondition violation (missing identity,
//!   malformed quantity), which the worker logs and drops

use crate::models::{
    AffinityTerm, MatchExpression, NodeSelectorTerm, Task, TaskConstraints, TaskId, TaskPhase,
    Toleration,
};
use k8s_openapi::api::core::v1::{Affinity, Pod, PodAffinityTerm};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use thiserror::Error;

/// Precondition violations surfaced by translation
///
/// The orchestrator is assumed to supply well-formed snapshots; over such
/// input translation is total. These arise only from malformed input and
/// are fatal for the single event that carried them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("snapshot carries no namespace/name identity")]
    MissingIdentity,
    #[error("unparseable {resource} quantity {value:?}")]
    BadQuantity {
        resource: &'static str,
        value: String,
    },
}

/// Translate a pod snapshot into the normalized task model.
///
/// Deterministic: repeated calls on identical input yield field-wise equal
/// tasks. Performs no I/O.
pub fn translate(pod: &Pod) -> Result<Task, TranslateError> {
    let id = TaskId::from_pod(pod).ok_or(TranslateError::MissingIdentity)?;
    let phase = TaskPhase::from_pod(pod);
    let (cpu_request_millis, mem_request_kb) = request_totals(pod)?;

    let constraints = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.affinity.as_ref())
        .map(convert_constraints)
        .filter(|c| !c.is_empty());

    let tolerations = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.tolerations.as_ref())
        .map(|ts| ts.iter().map(convert_toleration).collect())
        .unwrap_or_default();

    Ok(Task {
        id,
        phase,
        cpu_request_millis,
        mem_request_kb,
        owner_ref: owner_ref(pod),
        constraints,
        tolerations,
    })
}

/// Sum resource requests across all containers of the pod.
fn request_totals(pod: &Pod) -> Result<(u64, u64), TranslateError> {
    let mut cpu_millis: u64 = 0;
    let mut mem_kb: u64 = 0;

    let containers = match pod.spec.as_ref() {
        Some(spec) => &spec.containers,
        None => return Ok((0, 0)),
    };

    for container in containers {
        let requests = container
            .resources
            .as_ref()
            .and_then(|r| r.requests.as_ref());
        let Some(requests) = requests else { continue };

        if let Some(q) = requests.get("cpu") {
            cpu_millis += parse_cpu_millis(q)?;
        }
        if let Some(q) = requests.get("memory") {
            mem_kb += parse_memory_kb(q)?;
        }
    }

    Ok((cpu_millis, mem_kb))
}

/// Parse a CPU quantity into millicores: "2" -> 2000, "500m" -> 500.
pub fn parse_cpu_millis(q: &Quantity) -> Result<u64, TranslateError> {
    milli_base_units(&q.0).ok_or_else(|| TranslateError::BadQuantity {
        resource: "cpu",
        value: q.0.clone(),
    })
}

/// Parse a memory quantity into kilobytes, truncating toward zero:
/// "1024" (bytes) -> 1, "1Ki" -> 1.
///
/// Truncation is deliberate: a request must never be reported as larger
/// than what the orchestrator recorded.
pub fn parse_memory_kb(q: &Quantity) -> Result<u64, TranslateError> {
    let milli_bytes = milli_base_units(&q.0).ok_or_else(|| TranslateError::BadQuantity {
        resource: "memory",
        value: q.0.clone(),
    })?;
    Ok(milli_bytes / 1000 / 1024)
}

/// Parse an orchestrator quantity string into base units x 1000.
///
/// Accepts plain decimals, scientific notation, decimal suffixes
/// (k/M/G/T/P/E), binary suffixes (Ki/Mi/Gi/Ti/Pi/Ei) and the `m` milli
/// suffix. Fractional digits beyond milli precision truncate. Negative and
/// malformed quantities yield `None`.
fn milli_base_units(raw: &str) -> Option<u64> {
    let s = raw.trim();
    let bytes = s.as_bytes();
    if bytes.is_empty() || bytes[0] == b'-' {
        return None;
    }
    let mut idx = usize::from(bytes[0] == b'+');

    // Integer digits
    let int_start = idx;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    let int_digits = &s[int_start..idx];

    // Fractional digits
    let mut frac_digits = "";
    if idx < bytes.len() && bytes[idx] == b'.' {
        idx += 1;
        let frac_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        frac_digits = &s[frac_start..idx];
    }
    if int_digits.is_empty() && frac_digits.is_empty() {
        return None;
    }

    // value x 1000, truncating fractional digits beyond milli precision
    let mut milli: i128 = int_digits.parse::<i128>().unwrap_or(0) * 1000;
    for (pos, d) in frac_digits.bytes().take(3).enumerate() {
        milli += i128::from(d - b'0') * 10i128.pow(2 - pos as u32);
    }

    let rest = &s[idx..];
    let scaled = match rest {
        "" => milli,
        "m" => milli / 1000,
        "k" => milli * 1_000,
        "M" => milli * 1_000_000,
        "G" => milli * 1_000_000_000,
        "T" => milli * 1_000_000_000_000,
        "P" => milli * 1_000_000_000_000_000,
        "E" => milli * 1_000_000_000_000_000_000,
        "Ki" => milli * 1024,
        "Mi" => milli * 1024 * 1024,
        "Gi" => milli * 1024 * 1024 * 1024,
        "Ti" => milli << 40,
        "Pi" => milli << 50,
        "Ei" => milli << 60,
        _ => {
            // Scientific notation: e/E followed by a signed integer
            let exp_part = rest.strip_prefix(['e', 'E'])?;
            let exp: i32 = exp_part.parse().ok()?;
            if !(-9..=18).contains(&exp) {
                return None;
            }
            if exp >= 0 {
                milli.checked_mul(10i128.checked_pow(exp as u32)?)?
            } else {
                milli / 10i128.pow(exp.unsigned_abs())
            }
        }
    };

    u64::try_from(scaled).ok()
}

/// Correlation reference: the controller owner UID when present, else the
/// unit's own UID.
fn owner_ref(pod: &Pod) -> String {
    if let Some(refs) = pod.metadata.owner_references.as_ref() {
        if let Some(owner) = refs
            .iter()
            .find(|r| r.controller.unwrap_or(false))
            .or_else(|| refs.first())
        {
            return owner.uid.clone();
        }
    }
    pod.metadata.uid.clone().unwrap_or_default()
}

/// Extract only the hard (must-satisfy) constraint class.
fn convert_constraints(affinity: &Affinity) -> TaskConstraints {
    let node_terms = affinity
        .node_affinity
        .as_ref()
        .and_then(|na| na.required_during_scheduling_ignored_during_execution.as_ref())
        .map(|selector| {
            selector
                .node_selector_terms
                .iter()
                .map(|term| NodeSelectorTerm {
                    match_expressions: term
                        .match_expressions
                        .as_deref()
                        .unwrap_or_default()
                        .iter()
                        .map(|req| MatchExpression {
                            key: req.key.clone(),
                            operator: req.operator.clone(),
                            values: req.values.clone().unwrap_or_default(),
                        })
                        .collect(),
                })
                .collect()
        })
        .unwrap_or_default();

    let colocate_terms = affinity
        .pod_affinity
        .as_ref()
        .and_then(|pa| pa.required_during_scheduling_ignored_during_execution.as_deref())
        .map(convert_affinity_terms)
        .unwrap_or_default();

    let spread_terms = affinity
        .pod_anti_affinity
        .as_ref()
        .and_then(|pa| pa.required_during_scheduling_ignored_during_execution.as_deref())
        .map(convert_affinity_terms)
        .unwrap_or_default();

    TaskConstraints {
        node_terms,
        colocate_terms,
        spread_terms,
    }
}

fn convert_affinity_terms(terms: &[PodAffinityTerm]) -> Vec<AffinityTerm> {
    terms
        .iter()
        .map(|term| AffinityTerm {
            match_expressions: term
                .label_selector
                .as_ref()
                .map(selector_expressions)
                .unwrap_or_default(),
            topology_key: term.topology_key.clone(),
        })
        .collect()
}

/// Normalize a label selector into match expressions so constraint
/// comparison stays structural: matchLabels entries become `In` clauses
/// with a single value (BTreeMap iteration keeps the order deterministic).
fn selector_expressions(selector: &LabelSelector) -> Vec<MatchExpression> {
    let mut expressions: Vec<MatchExpression> = selector
        .match_expressions
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|req| MatchExpression {
            key: req.key.clone(),
            operator: req.operator.clone(),
            values: req.values.clone().unwrap_or_default(),
        })
        .collect();

    if let Some(labels) = selector.match_labels.as_ref() {
        expressions.extend(labels.iter().map(|(key, value)| MatchExpression {
            key: key.clone(),
            operator: "In".to_string(),
            values: vec![value.clone()],
        }));
    }

    expressions
}

fn convert_toleration(t: &k8s_openapi::api::core::v1::Toleration) -> Toleration {
    Toleration {
        key: t.key.clone().unwrap_or_default(),
        operator: t.operator.clone().unwrap_or_default(),
        value: t.value.clone().unwrap_or_default(),
        effect: t.effect.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        Container, NodeAffinity, NodeSelector, NodeSelectorRequirement, PodAffinity,
        PodAntiAffinity, PodSpec, PodStatus, ResourceRequirements,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
        LabelSelectorRequirement, ObjectMeta, OwnerReference,
    };
    use std::collections::BTreeMap;

    fn requests(cpu: &str, memory: &str) -> BTreeMap<String, Quantity> {
        let mut map = BTreeMap::new();
        map.insert("cpu".to_string(), Quantity(cpu.to_string()));
        map.insert("memory".to_string(), Quantity(memory.to_string()));
        map
    }

    /// Full snapshot fixture: one container with requests, hard node and
    /// workload constraints, one toleration.
    fn build_pod(namespace: &str, name: &str, phase: &str, cpu: &str, memory: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                uid: Some("abcdfe12345".to_string()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![Container {
                    resources: Some(ResourceRequirements {
                        requests: Some(requests(cpu, memory)),
                        ..Default::default()
                    }),
                    ..Default::default()
                }],
                affinity: Some(Affinity {
                    node_affinity: Some(NodeAffinity {
                        required_during_scheduling_ignored_during_execution: Some(NodeSelector {
                            node_selector_terms: vec![
                                k8s_openapi::api::core::v1::NodeSelectorTerm {
                                    match_expressions: Some(vec![NodeSelectorRequirement {
                                        key: "mem-type".to_string(),
                                        operator: "NotIn".to_string(),
                                        values: Some(vec![
                                            "DDR".to_string(),
                                            "DDR2".to_string(),
                                        ]),
                                    }]),
                                    ..Default::default()
                                },
                            ],
                        }),
                        ..Default::default()
                    }),
                    pod_affinity: Some(PodAffinity {
                        required_during_scheduling_ignored_during_execution: Some(vec![
                            PodAffinityTerm {
                                label_selector: Some(LabelSelector {
                                    match_expressions: Some(vec![LabelSelectorRequirement {
                                        key: "service".to_string(),
                                        operator: "In".to_string(),
                                        values: Some(vec![
                                            "securityscan".to_string(),
                                            "value2".to_string(),
                                        ]),
                                    }]),
                                    ..Default::default()
                                }),
                                topology_key: "region".to_string(),
                                ..Default::default()
                            },
                        ]),
                        ..Default::default()
                    }),
                    pod_anti_affinity: Some(PodAntiAffinity {
                        required_during_scheduling_ignored_during_execution: Some(vec![
                            PodAffinityTerm {
                                label_selector: Some(LabelSelector {
                                    match_expressions: Some(vec![LabelSelectorRequirement {
                                        key: "service".to_string(),
                                        operator: "In".to_string(),
                                        values: Some(vec![
                                            "antivirusscan".to_string(),
                                            "value2".to_string(),
                                        ]),
                                    }]),
                                    ..Default::default()
                                }),
                                topology_key: "node".to_string(),
                                ..Default::default()
                            },
                        ]),
                        ..Default::default()
                    }),
                }),
                tolerations: Some(vec![k8s_openapi::api::core::v1::Toleration {
                    key: Some("key".to_string()),
                    operator: Some("Equal".to_string()),
                    value: Some("value".to_string()),
                    effect: Some("NoSchedule".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_translate_full_snapshot() {
        let pod = build_pod("prod", "unit-1", "Pending", "2", "1024");
        let task = translate(&pod).unwrap();

        assert_eq!(task.id, TaskId::new("prod", "unit-1"));
        assert_eq!(task.phase, TaskPhase::Pending);
        assert_eq!(task.cpu_request_millis, 2000);
        assert_eq!(task.mem_request_kb, 1);
        assert_eq!(task.owner_ref, "abcdfe12345");

        let constraints = task.constraints.as_ref().unwrap();
        assert_eq!(constraints.node_terms.len(), 1);
        assert_eq!(
            constraints.node_terms[0].match_expressions[0],
            MatchExpression {
                key: "mem-type".to_string(),
                operator: "NotIn".to_string(),
                values: vec!["DDR".to_string(), "DDR2".to_string()],
            }
        );
        assert_eq!(constraints.colocate_terms[0].topology_key, "region");
        assert_eq!(constraints.spread_terms[0].topology_key, "node");

        assert_eq!(
            task.tolerations,
            vec![Toleration {
                key: "key".to_string(),
                operator: "Equal".to_string(),
                value: "value".to_string(),
                effect: "NoSchedule".to_string(),
            }]
        );
    }

    #[test]
    fn test_translate_is_deterministic() {
        let pod = build_pod("prod", "unit-1", "Running", "500m", "3072");
        assert_eq!(translate(&pod).unwrap(), translate(&pod).unwrap());
    }

    #[test]
    fn test_translate_bare_pod() {
        // No spec, no status: everything maps to zero/absent values
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("bare".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let task = translate(&pod).unwrap();
        assert_eq!(task.phase, TaskPhase::Pending);
        assert_eq!(task.cpu_request_millis, 0);
        assert_eq!(task.mem_request_kb, 0);
        assert_eq!(task.owner_ref, "");
        assert!(task.constraints.is_none());
        assert!(task.tolerations.is_empty());
    }

    #[test]
    fn test_translate_missing_identity() {
        let pod = Pod::default();
        assert_eq!(translate(&pod), Err(TranslateError::MissingIdentity));
    }

    #[test]
    fn test_translate_bad_quantity() {
        let pod = build_pod("prod", "unit-1", "Pending", "lots", "1024");
        assert_eq!(
            translate(&pod),
            Err(TranslateError::BadQuantity {
                resource: "cpu",
                value: "lots".to_string(),
            })
        );
    }

    #[test]
    fn test_requests_sum_across_containers() {
        let mut pod = build_pod("prod", "unit-1", "Pending", "1", "2048");
        let spec = pod.spec.as_mut().unwrap();
        spec.containers.push(Container {
            resources: Some(ResourceRequirements {
                requests: Some(requests("250m", "1024")),
                ..Default::default()
            }),
            ..Default::default()
        });
        // A container without requests contributes nothing
        spec.containers.push(Container::default());

        let task = translate(&pod).unwrap();
        assert_eq!(task.cpu_request_millis, 1250);
        assert_eq!(task.mem_request_kb, 3);
    }

    #[test]
    fn test_controller_owner_preferred() {
        let mut pod = build_pod("prod", "unit-1", "Pending", "1", "1024");
        pod.metadata.owner_references = Some(vec![
            OwnerReference {
                uid: "bystander".to_string(),
                controller: None,
                ..Default::default()
            },
            OwnerReference {
                uid: "controller-uid".to_string(),
                controller: Some(true),
                ..Default::default()
            },
        ]);
        assert_eq!(translate(&pod).unwrap().owner_ref, "controller-uid");
    }

    #[test]
    fn test_match_labels_normalize_to_expressions() {
        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "web".to_string());
        let selector = LabelSelector {
            match_labels: Some(labels),
            ..Default::default()
        };
        assert_eq!(
            selector_expressions(&selector),
            vec![MatchExpression {
                key: "app".to_string(),
                operator: "In".to_string(),
                values: vec!["web".to_string()],
            }]
        );
    }

    #[test]
    fn test_cpu_quantity_parsing() {
        let cases = [
            ("2", 2000),
            ("500m", 500),
            ("0.5", 500),
            ("2.5", 2500),
            ("1.2345", 1234), // sub-milli digits truncate
            ("3e2", 300_000),
            ("1k", 1_000_000),
        ];
        for (raw, expected) in cases {
            let got = parse_cpu_millis(&Quantity(raw.to_string())).unwrap();
            assert_eq!(got, expected, "cpu quantity {raw:?}");
        }
    }

    #[test]
    fn test_memory_quantity_parsing() {
        let cases = [
            ("1024", 1),
            ("3072", 3),
            ("1Ki", 1),
            ("1Mi", 1024),
            ("1Gi", 1024 * 1024),
            ("1M", 976),     // 1_000_000 / 1024 truncates
            ("1500", 1),     // truncation toward zero
            ("1023", 0),     // below one kilobyte
            ("1.5Ki", 1),    // 1536 bytes
            ("2e3", 1),      // 2000 bytes
        ];
        for (raw, expected) in cases {
            let got = parse_memory_kb(&Quantity(raw.to_string())).unwrap();
            assert_eq!(got, expected, "memory quantity {raw:?}");
        }
    }

    #[test]
    fn test_quantity_rejects_malformed() {
        for raw in ["", "abc", "-1", "1.2.3", "1Qi", "12e", "1e99"] {
            assert!(
                parse_cpu_millis(&Quantity(raw.to_string())).is_err(),
                "expected rejection for {raw:?}"
            );
        }
    }
}
