// Extended resource naming used by the Intel GPU device plugin
pub const GPU_RESOURCE_PREFIX: &str = "gpu.intel.com/";
pub const I915_RESOURCE: &str = "gpu.intel.com/i915";
pub const XE_RESOURCE: &str = "gpu.intel.com/xe";
pub const MILLICORES_RESOURCE: &str = "gpu.intel.com/millicores";
pub const MEMORY_MAX_RESOURCE: &str = "gpu.intel.com/memory.max";
pub const TILES_RESOURCE: &str = "gpu.intel.com/tiles";

/// Resources that count whole GPU devices. Everything else under the prefix
/// (millicores, memory.max, tiles) is a shared-resource dimension.
pub const DEVICE_COUNT_RESOURCES: [&str; 2] = [I915_RESOURCE, XE_RESOURCE];

// Node labels
pub const GENERIC_GPU_LABEL: &str = "intel.feature.node.kubernetes.io/gpu";
pub const DISCRETE_GPU_ROLE_LABEL: &str = "node-role.kubernetes.io/gpu";
pub const INTEGRATED_GPU_ROLE_LABEL: &str = "node-role.kubernetes.io/igpu";
pub const GPU_CARDS_LABEL: &str = "gpu.intel.com/cards";

/// Boolean node labels that mark a node as carrying an Intel GPU
pub const GPU_NODE_LABELS: [&str; 3] = [
    GENERIC_GPU_LABEL,
    DISCRETE_GPU_ROLE_LABEL,
    INTEGRATED_GPU_ROLE_LABEL,
];

// Device plugin custom resource
pub const GPU_DEVICE_PLUGIN_KIND: &str = "GpuDevicePlugin";

// Pod phase counted as holding its GPU requests
pub const POD_PHASE_RUNNING: &str = "Running";

// i915 exporter metric families
pub const ENGINE_ACTIVE_TICKS: &str = "gpu_i915_engine_active_ticks";
pub const ENGINE_TOTAL_TICKS: &str = "gpu_i915_engine_total_ticks";
pub const BOOST_FREQ_MHZ: &str = "gpu_i915_gt_boost_freq_mhz";
pub const MEMORY_LOCAL: &str = "gpu_i915_memory_local";
pub const MEMORY_SYSTEM: &str = "gpu_i915_memory_system";
pub const ENERGY_MICROJOULES: &str = "gpu_i915_energy_microjoules";

// node-exporter hwmon families
pub const HWMON_CHIP_NAMES: &str = "node_hwmon_chip_names";
pub const HWMON_POWER_AVERAGE: &str = "node_hwmon_power_average_watt";
pub const HWMON_POWER_INPUT: &str = "node_hwmon_power_input_watt";
pub const HWMON_POWER_MAX: &str = "node_hwmon_power_max_watt";

/// hwmon chip driver names that belong to Intel GPUs
pub const GPU_HWMON_DRIVERS: [&str; 2] = ["i915", "xe"];

// Label fallbacks
pub const DEFAULT_CARD: &str = "gpu0";
pub const DEFAULT_ENGINE: &str = "render/0";

/// Friendly names for the known extended resources
pub fn resource_display_name(resource: &str) -> &str {
    match resource {
        I915_RESOURCE => "Intel GPU (i915)",
        XE_RESOURCE => "Intel GPU (Xe)",
        MILLICORES_RESOURCE => "GPU millicores",
        MEMORY_MAX_RESOURCE => "GPU memory",
        TILES_RESOURCE => "GPU tiles",
        other => other.strip_prefix(GPU_RESOURCE_PREFIX).unwrap_or(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_resource_names() {
        assert_eq!(resource_display_name(I915_RESOURCE), "Intel GPU (i915)");
        assert_eq!(resource_display_name(XE_RESOURCE), "Intel GPU (Xe)");
        assert_eq!(resource_display_name(MEMORY_MAX_RESOURCE), "GPU memory");
    }

    #[test]
    fn test_unknown_resource_names_fall_back() {
        assert_eq!(resource_display_name("gpu.intel.com/vf"), "vf");
        assert_eq!(resource_display_name("nvidia.com/gpu"), "nvidia.com/gpu");
    }
}
