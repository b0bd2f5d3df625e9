//! Cluster-wide GPU totals built from classified nodes, pods and plugins

use super::classify::{
    device_count, node_gpu_type, node_is_intel_gpu, plugin_status_to_status, pod_device_requests,
    GpuType, PluginHealth,
};
use super::{GpuDevicePlugin, Node, Pod};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Device totals across a set of nodes
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuAllocationSummary {
    /// GPU nodes among the inputs
    pub gpu_nodes: usize,
    pub capacity: i64,
    pub allocatable: i64,
    /// Devices requested by running pods
    pub in_use: i64,
    /// `allocatable - in_use`, never below 0
    pub available: i64,
    pub allocation_pct: u32,
}

/// Device totals for one node
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeGpuAllocation {
    pub node_name: String,
    pub gpu_type: GpuType,
    pub capacity: i64,
    pub allocatable: i64,
    pub in_use: i64,
    pub allocation_pct: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GpuTypeCounts {
    pub discrete: usize,
    pub integrated: usize,
    pub unknown: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PluginStatusCounts {
    pub success: usize,
    pub warning: usize,
    pub error: usize,
}

/// `round(100 * in_use / capacity)`, 0 when there is no capacity
pub fn allocation_percent(in_use: i64, capacity: i64) -> u32 {
    if capacity <= 0 {
        return 0;
    }
    (100.0 * in_use.max(0) as f64 / capacity as f64).round() as u32
}

/// Merge pod lists from overlapping selector queries
///
/// The first pod seen with a given UID wins and order is kept. Pods without a
/// UID cannot be matched and are always kept.
pub fn dedupe_pods_by_uid<I>(lists: I) -> Vec<Pod>
where
    I: IntoIterator<Item = Vec<Pod>>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for pod in lists.into_iter().flatten() {
        if let Some(uid) = pod.uid() {
            if !seen.insert(uid.to_string()) {
                continue;
            }
        }
        merged.push(pod);
    }

    debug!(unique = merged.len(), "Deduplicated pods by UID");
    merged
}

fn running_device_requests<'a>(pods: impl Iterator<Item = &'a Pod>) -> i64 {
    pods.filter(|pod| pod.is_running())
        .map(pod_device_requests)
        .fold(0, i64::saturating_add)
        .max(0)
}

/// Capacity, allocatable and in-use GPU devices across the cluster
pub fn summarize_allocation(nodes: &[Node], pods: &[Pod]) -> GpuAllocationSummary {
    let capacity = nodes
        .iter()
        .map(|n| device_count(&n.status.capacity))
        .fold(0, i64::saturating_add);
    let allocatable = nodes
        .iter()
        .map(|n| device_count(&n.status.allocatable))
        .fold(0, i64::saturating_add);
    let capacity = capacity.max(0);
    let allocatable = allocatable.max(0);
    let in_use = running_device_requests(pods.iter());

    let summary = GpuAllocationSummary {
        gpu_nodes: nodes.iter().filter(|n| node_is_intel_gpu(n)).count(),
        capacity,
        allocatable,
        in_use,
        available: (allocatable - in_use).max(0),
        allocation_pct: allocation_percent(in_use, capacity),
    };

    debug!(
        capacity = summary.capacity,
        allocatable = summary.allocatable,
        in_use = summary.in_use,
        "Summarized GPU allocation"
    );
    summary
}

/// Per-node device totals, joining running pods on `spec.nodeName`
pub fn node_allocations(nodes: &[Node], pods: &[Pod]) -> Vec<NodeGpuAllocation> {
    nodes
        .iter()
        .map(|node| {
            let capacity = device_count(&node.status.capacity).max(0);
            let in_use = running_device_requests(
                pods.iter()
                    .filter(|pod| pod.spec.node_name.as_deref() == Some(node.name())),
            );

            NodeGpuAllocation {
                node_name: node.name().to_string(),
                gpu_type: node_gpu_type(node),
                capacity,
                allocatable: device_count(&node.status.allocatable).max(0),
                in_use,
                allocation_pct: allocation_percent(in_use, capacity),
            }
        })
        .collect()
}

pub fn count_nodes_by_type(nodes: &[Node]) -> GpuTypeCounts {
    nodes
        .iter()
        .fold(GpuTypeCounts::default(), |mut counts, node| {
            match node_gpu_type(node) {
                GpuType::Discrete => counts.discrete += 1,
                GpuType::Integrated => counts.integrated += 1,
                GpuType::Unknown => counts.unknown += 1,
            }
            counts
        })
}

pub fn summarize_plugins(plugins: &[GpuDevicePlugin]) -> PluginStatusCounts {
    plugins
        .iter()
        .fold(PluginStatusCounts::default(), |mut counts, plugin| {
            match plugin_status_to_status(plugin) {
                PluginHealth::Success => counts.success += 1,
                PluginHealth::Warning => counts.warning += 1,
                PluginHealth::Error => counts.error += 1,
            }
            counts
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn node(value: Value) -> Node {
        Node::from_value(&value).unwrap()
    }

    fn pod(value: Value) -> Pod {
        Pod::from_value(&value).unwrap()
    }

    fn pod_with_uid(uid: &str, name: &str) -> Pod {
        pod(json!({"metadata": {"uid": uid, "name": name}}))
    }

    fn gpu_pod(node_name: &str, phase: &str, i915: &str) -> Pod {
        pod(json!({
            "spec": {
                "nodeName": node_name,
                "containers": [{"resources": {"requests": {"gpu.intel.com/i915": i915}}}]
            },
            "status": {"phase": phase}
        }))
    }

    fn cluster() -> (Vec<Node>, Vec<Pod>) {
        let nodes = vec![
            node(json!({
                "metadata": {"name": "gpu-1", "labels": {"node-role.kubernetes.io/gpu": "true"}},
                "status": {
                    "capacity": {"gpu.intel.com/i915": "2", "gpu.intel.com/millicores": "2000"},
                    "allocatable": {"gpu.intel.com/i915": "2"}
                }
            })),
            node(json!({
                "metadata": {"name": "gpu-2", "labels": {"node-role.kubernetes.io/igpu": "true"}},
                "status": {
                    "capacity": {"gpu.intel.com/xe": "2"},
                    "allocatable": {"gpu.intel.com/xe": "1"}
                }
            })),
            node(json!({"metadata": {"name": "cpu-1"}, "status": {"capacity": {"cpu": "16"}}})),
        ];
        let pods = vec![
            gpu_pod("gpu-1", "Running", "1"),
            gpu_pod("gpu-1", "Pending", "1"),
            gpu_pod("gpu-2", "Succeeded", "1"),
        ];
        (nodes, pods)
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let lists = vec![
            vec![pod_with_uid("abc", "first"), pod_with_uid("def", "other")],
            vec![pod_with_uid("abc", "second")],
            vec![pod_with_uid("ghi", "third"), pod_with_uid("abc", "third-copy")],
        ];
        let merged = dedupe_pods_by_uid(lists);

        let uids: Vec<&str> = merged.iter().filter_map(|p| p.uid()).collect();
        assert_eq!(uids, vec!["abc", "def", "ghi"]);
        assert_eq!(merged[0].metadata.name, "first");
        assert_eq!(merged.iter().filter(|p| p.uid() == Some("abc")).count(), 1);
    }

    #[test]
    fn test_dedupe_keeps_pods_without_uid() {
        let merged = dedupe_pods_by_uid(vec![vec![Pod::default()], vec![Pod::default()]]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_allocation_percent() {
        assert_eq!(allocation_percent(1, 4), 25);
        assert_eq!(allocation_percent(1, 3), 33);
        assert_eq!(allocation_percent(2, 3), 67);
        assert_eq!(allocation_percent(5, 0), 0);
        assert_eq!(allocation_percent(-1, 4), 0);
    }

    #[test]
    fn test_summarize_allocation() {
        let (nodes, pods) = cluster();
        let summary = summarize_allocation(&nodes, &pods);
        assert_eq!(
            summary,
            GpuAllocationSummary {
                gpu_nodes: 2,
                capacity: 4,
                allocatable: 3,
                in_use: 1,
                available: 2,
                allocation_pct: 25,
            }
        );
    }

    #[test]
    fn test_available_never_negative() {
        let nodes = vec![node(json!({"status": {
            "capacity": {"gpu.intel.com/i915": "1"},
            "allocatable": {"gpu.intel.com/i915": "1"}
        }}))];
        let pods = vec![gpu_pod("n", "Running", "3")];
        let summary = summarize_allocation(&nodes, &pods);
        assert_eq!(summary.available, 0);
        assert_eq!(summary.allocation_pct, 300);
    }

    #[test]
    fn test_huge_quantities_saturate() {
        let huge = "9223372036854775807";
        let nodes = vec![
            node(json!({"metadata": {"name": "a"}, "status": {
                "capacity": {"gpu.intel.com/i915": huge, "gpu.intel.com/xe": "1"},
                "allocatable": {"gpu.intel.com/i915": huge}
            }})),
            node(json!({"metadata": {"name": "b"}, "status": {
                "capacity": {"gpu.intel.com/i915": "1"},
                "allocatable": {"gpu.intel.com/i915": "1"}
            }})),
        ];
        let pods = vec![gpu_pod("a", "Running", huge), gpu_pod("a", "Running", "1")];

        let summary = summarize_allocation(&nodes, &pods);
        assert_eq!(summary.capacity, i64::MAX);
        assert_eq!(summary.allocatable, i64::MAX);
        assert_eq!(summary.in_use, i64::MAX);
        assert_eq!(summary.available, 0);
        assert_eq!(summary.allocation_pct, 100);

        let allocations = node_allocations(&nodes, &pods);
        assert_eq!(allocations[0].in_use, i64::MAX);
    }

    #[test]
    fn test_empty_cluster() {
        assert_eq!(summarize_allocation(&[], &[]), GpuAllocationSummary::default());
    }

    #[test]
    fn test_node_allocations() {
        let (nodes, pods) = cluster();
        let allocations = node_allocations(&nodes, &pods);
        assert_eq!(allocations.len(), 3);

        assert_eq!(allocations[0].node_name, "gpu-1");
        assert_eq!(allocations[0].gpu_type, GpuType::Discrete);
        assert_eq!(allocations[0].in_use, 1);
        assert_eq!(allocations[0].allocation_pct, 50);

        assert_eq!(allocations[1].gpu_type, GpuType::Integrated);
        assert_eq!(allocations[1].allocatable, 1);
        assert_eq!(allocations[1].in_use, 0);

        assert_eq!(allocations[2].capacity, 0);
        assert_eq!(allocations[2].allocation_pct, 0);
    }

    #[test]
    fn test_count_nodes_by_type() {
        let (nodes, _) = cluster();
        assert_eq!(
            count_nodes_by_type(&nodes),
            GpuTypeCounts {
                discrete: 1,
                integrated: 1,
                unknown: 1,
            }
        );
    }

    #[test]
    fn test_summarize_plugins() {
        let plugins: Vec<GpuDevicePlugin> = [(3, 3, 0), (0, 0, 0), (2, 1, 1), (2, 1, 0)]
            .iter()
            .map(|(desired, ready, unavailable)| {
                GpuDevicePlugin::from_value(&json!({
                    "kind": "GpuDevicePlugin",
                    "status": {
                        "desiredNumberScheduled": desired,
                        "numberReady": ready,
                        "numberUnavailable": unavailable
                    }
                }))
                .unwrap()
            })
            .collect();

        assert_eq!(
            summarize_plugins(&plugins),
            PluginStatusCounts {
                success: 1,
                warning: 2,
                error: 1,
            }
        );
    }
}
