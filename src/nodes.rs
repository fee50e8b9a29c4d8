/*
* Copyright (C) 2025 Pedro Henrique / phkaiser13
*
* File: src/nodes.rs
*
* Node records and the GPU eligibility classifier.
*
* A node counts as eligible when it can take new pods right now and advertises
* a GPU. The scheduling checks (cordon, blocking taints, readiness) run first
* and short-circuit, so a cordoned GPU node never tips the decision.
*
* SPDX-License-Identifier: Apache-2.0
*/

use k8s_openapi::api::core::v1::Node;
use std::collections::BTreeMap;
use tracing::warn;

pub const DEFAULT_GPU_LABEL: &str = "nvidia.com/gpu.present";
pub const DEFAULT_GPU_RESOURCE: &str = "nvidia.com/gpu";

const BLOCKING_TAINT_EFFECTS: [&str; 2] = ["NoSchedule", "NoExecute"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taint {
    pub key: String,
    pub value: Option<String>,
    pub effect: String,
}

/// The slice of a Kubernetes Node the classifier looks at.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeRecord {
    pub name: String,
    pub schedulable: bool,
    pub taints: Vec<Taint>,
    pub ready: bool,
    pub labels: BTreeMap<String, String>,
    pub allocatable: BTreeMap<String, String>,
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        let spec = node.spec.as_ref();
        let status = node.status.as_ref();

        NodeRecord {
            name: node.metadata.name.clone().unwrap_or_default(),
            schedulable: !spec.and_then(|s| s.unschedulable).unwrap_or(false),
            taints: spec
                .and_then(|s| s.taints.as_ref())
                .map(|taints| {
                    taints
                        .iter()
                        .map(|t| Taint {
                            key: t.key.clone(),
                            value: t.value.clone(),
                            effect: t.effect.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            ready: status
                .and_then(|s| s.conditions.as_ref())
                .map_or(false, |conditions| {
                    conditions
                        .iter()
                        .any(|c| c.type_ == "Ready" && c.status == "True")
                }),
            labels: node.metadata.labels.clone().unwrap_or_default(),
            allocatable: status
                .and_then(|s| s.allocatable.as_ref())
                .map(|alloc| alloc.iter().map(|(k, q)| (k.clone(), q.0.clone())).collect())
                .unwrap_or_default(),
        }
    }
}

/// Which label and allocatable resource advertise a GPU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuSelector {
    pub label: String,
    pub resource: String,
}

impl Default for GpuSelector {
    fn default() -> Self {
        GpuSelector {
            label: DEFAULT_GPU_LABEL.to_string(),
            resource: DEFAULT_GPU_RESOURCE.to_string(),
        }
    }
}

/// Classifies a node with the default NVIDIA selector.
pub fn classify(node: &NodeRecord) -> bool {
    classify_with(node, &GpuSelector::default())
}

/// Returns true when `node` is schedulable, ready, untainted and has a GPU.
///
/// An allocatable GPU quantity that is not a plain integer fails closed: the
/// node is ineligible and a data-quality warning is logged.
pub fn classify_with(node: &NodeRecord, selector: &GpuSelector) -> bool {
    if !node.schedulable {
        return false;
    }
    if node
        .taints
        .iter()
        .any(|t| BLOCKING_TAINT_EFFECTS.contains(&t.effect.as_str()))
    {
        return false;
    }
    if !node.ready {
        return false;
    }

    if node.labels.get(&selector.label).map(String::as_str) == Some("true") {
        return true;
    }

    match node.allocatable.get(&selector.resource) {
        None => false,
        Some(quantity) => match quantity.trim().parse::<i64>() {
            Ok(count) => count > 0,
            Err(_) => {
                warn!(
                    node = %node.name,
                    resource = %selector.resource,
                    quantity = %quantity,
                    "Unparseable GPU quantity on node; treating it as ineligible"
                );
                false
            }
        },
    }
}

/// Eligibility counts for one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClusterState {
    pub eligible: usize,
    pub ineligible: usize,
}

impl ClusterState {
    pub fn from_nodes(nodes: &[NodeRecord], selector: &GpuSelector) -> Self {
        let eligible = nodes.iter().filter(|n| classify_with(n, selector)).count();
        ClusterState {
            eligible,
            ineligible: nodes.len() - eligible,
        }
    }
}

#[cfg(test)]
pub(crate) fn gpu_node(name: &str) -> NodeRecord {
    NodeRecord {
        labels: [(DEFAULT_GPU_LABEL.to_string(), "true".to_string())].into(),
        ..cpu_node(name)
    }
}

#[cfg(test)]
pub(crate) fn cpu_node(name: &str) -> NodeRecord {
    NodeRecord {
        name: name.to_string(),
        schedulable: true,
        ready: true,
        ..Default::default()
    }
}
