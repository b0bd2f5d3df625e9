//! GPU classification of nodes, pods and device plugin instances

use super::{GpuDevicePlugin, Node, Pod, ResourceList};
use crate::config;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Kind of Intel GPU a node carries, from its role labels
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuType {
    Discrete,
    Integrated,
    Unknown,
}

/// Health of a GpuDevicePlugin rollout
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginHealth {
    Success,
    Warning,
    Error,
}

/// Integer value of a quantity string, `parseInt` style
///
/// Reads an optional sign and the leading digits; anything that does not start
/// with a digit counts as 0. `"2"` is 2, `"500m"` is 500, `"abc"` is 0.
/// Totals built from these values saturate at the `i64` bounds.
pub fn quantity_to_int(quantity: &str) -> i64 {
    let trimmed = quantity.trim();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let value = digits[..end].parse::<i64>().unwrap_or(0);
    if negative {
        -value
    } else {
        value
    }
}

fn is_gpu_resource(name: &str) -> bool {
    name.starts_with(config::GPU_RESOURCE_PREFIX)
}

fn label_is_true(node: &Node, label: &str) -> bool {
    node.metadata.label(label) == Some("true")
}

/// Keep only `gpu.intel.com/*` entries of a capacity or allocatable list
pub fn gpu_resources(resources: &ResourceList) -> ResourceList {
    resources
        .iter()
        .filter(|(name, _)| is_gpu_resource(name))
        .map(|(name, quantity)| (name.clone(), quantity.clone()))
        .collect()
}

/// Whole GPU devices in a resource list (`i915` plus `xe`)
pub fn device_count(resources: &ResourceList) -> i64 {
    config::DEVICE_COUNT_RESOURCES
        .iter()
        .filter_map(|name| resources.get(*name))
        .map(|quantity| quantity_to_int(quantity))
        .fold(0, i64::saturating_add)
}

/// GPU node check on a typed node
pub fn node_is_intel_gpu(node: &Node) -> bool {
    config::GPU_NODE_LABELS
        .iter()
        .any(|label| label_is_true(node, label))
        || node.status.capacity.keys().any(|name| is_gpu_resource(name))
}

/// Whether an untyped API object is a node carrying an Intel GPU
///
/// Anything that is not a readable node object is not a GPU node.
pub fn is_intel_gpu_node(value: &Value) -> bool {
    Node::from_value(value)
        .map(|node| node_is_intel_gpu(&node))
        .unwrap_or(false)
}

/// Discrete role label wins over integrated, integrated over the generic label
pub fn node_gpu_type(node: &Node) -> GpuType {
    if label_is_true(node, config::DISCRETE_GPU_ROLE_LABEL) {
        GpuType::Discrete
    } else if label_is_true(node, config::INTEGRATED_GPU_ROLE_LABEL) {
        GpuType::Integrated
    } else if label_is_true(node, config::GENERIC_GPU_LABEL) {
        GpuType::Discrete
    } else {
        GpuType::Unknown
    }
}

/// Number of GPU devices in the node's capacity
pub fn node_gpu_count(node: &Node) -> i64 {
    device_count(&node.status.capacity)
}

/// Card names from the NFD `gpu.intel.com/cards` label (`card0.card1`)
pub fn node_gpu_cards(node: &Node) -> Vec<String> {
    node.metadata
        .label(config::GPU_CARDS_LABEL)
        .map(|cards| {
            cards
                .split('.')
                .filter(|card| !card.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// GPU request check on a typed pod
pub fn pod_requests_gpu(pod: &Pod) -> bool {
    pod.all_containers().any(|container| {
        container
            .resources
            .requests
            .keys()
            .chain(container.resources.limits.keys())
            .any(|name| is_gpu_resource(name))
    })
}

/// Whether an untyped API object is a pod asking for any Intel GPU resource
pub fn is_gpu_requesting_pod(value: &Value) -> bool {
    Pod::from_value(value)
        .map(|pod| pod_requests_gpu(&pod))
        .unwrap_or(false)
}

fn sum_gpu_resources<'a>(lists: impl Iterator<Item = &'a ResourceList>) -> BTreeMap<String, String> {
    let mut totals: BTreeMap<String, i64> = BTreeMap::new();
    for list in lists {
        for (name, quantity) in list.iter().filter(|(name, _)| is_gpu_resource(name)) {
            let total = totals.entry(name.clone()).or_default();
            *total = total.saturating_add(quantity_to_int(quantity));
        }
    }
    totals
        .into_iter()
        .map(|(name, total)| (name, total.to_string()))
        .collect()
}

/// GPU requests summed per resource across init and regular containers
pub fn pod_gpu_requests(pod: &Pod) -> BTreeMap<String, String> {
    sum_gpu_resources(pod.all_containers().map(|c| &c.resources.requests))
}

/// GPU limits summed per resource across init and regular containers
pub fn pod_gpu_limits(pod: &Pod) -> BTreeMap<String, String> {
    sum_gpu_resources(pod.all_containers().map(|c| &c.resources.limits))
}

/// Whole GPU devices a pod requests (`i915` plus `xe`)
pub fn pod_device_requests(pod: &Pod) -> i64 {
    pod.all_containers()
        .map(|c| device_count(&c.resources.requests))
        .fold(0, i64::saturating_add)
}

/// Whether an untyped API object is a GpuDevicePlugin instance
pub fn is_gpu_device_plugin(value: &Value) -> bool {
    value.get("kind").and_then(Value::as_str) == Some(config::GPU_DEVICE_PLUGIN_KIND)
}

/// Rollout health of a plugin
///
/// Nothing scheduled and any unavailable pod both need attention before the
/// ready count is compared.
pub fn plugin_status_to_status(plugin: &GpuDevicePlugin) -> PluginHealth {
    let status = &plugin.status;
    if status.desired_number_scheduled == 0 || status.number_unavailable > 0 {
        PluginHealth::Warning
    } else if status.number_ready == status.desired_number_scheduled {
        PluginHealth::Success
    } else {
        PluginHealth::Error
    }
}
