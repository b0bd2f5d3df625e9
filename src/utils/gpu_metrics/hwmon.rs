//! Per-chip power readings from node-exporter hwmon families

use crate::config;
use crate::utils::prometheus_parser::{MetricSample, ParsedMetrics};
use serde::Serialize;

/// Power readings of one GPU hwmon chip
///
/// `None` means the exporter had no reading, which is not the same as 0 W.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuChipMetrics {
    pub node_name: String,
    /// PCI address style chip id (e.g. `0000:03:00_0`)
    pub chip: String,
    /// Scrape target the chip was reported by
    pub instance: String,
    pub power_watts: Option<f64>,
    pub power_max_watts: Option<f64>,
}

fn first_reading(samples: &[MetricSample], chip: &str) -> Option<f64> {
    samples
        .iter()
        .find(|s| s.label("chip") == Some(chip))
        .map(|s| s.value)
}

/// Chips to report, with the scrape instance each was seen on
fn gpu_chips(families: &ParsedMetrics) -> Vec<(String, String)> {
    let mut chips: Vec<(String, String)> = Vec::new();
    let mut push = |sample: &MetricSample| {
        if let Some(chip) = sample.label("chip") {
            if !chips.iter().any(|(c, _)| c == chip) {
                let instance = sample.label("instance").unwrap_or_default();
                chips.push((chip.to_string(), instance.to_string()));
            }
        }
    };

    match families.get(config::HWMON_CHIP_NAMES) {
        Some(names) => names
            .samples
            .iter()
            .filter(|s| {
                s.label("chip_name")
                    .is_some_and(|driver| config::GPU_HWMON_DRIVERS.contains(&driver))
            })
            .for_each(&mut push),
        // Without chip names every chip reporting power is assumed to be a GPU
        None => [
            config::HWMON_POWER_AVERAGE,
            config::HWMON_POWER_INPUT,
            config::HWMON_POWER_MAX,
        ]
        .iter()
        .flat_map(|name| families.samples(name))
        .for_each(&mut push),
    }

    chips
}

/// Build per-chip power readings for the GPU chips of one node
pub fn extract_chip_metrics(families: &ParsedMetrics, node_name: &str) -> Vec<GpuChipMetrics> {
    let average = families.samples(config::HWMON_POWER_AVERAGE);
    let input = families.samples(config::HWMON_POWER_INPUT);
    let max = families.samples(config::HWMON_POWER_MAX);

    gpu_chips(families)
        .into_iter()
        .map(|(chip, instance)| GpuChipMetrics {
            node_name: node_name.to_string(),
            power_watts: first_reading(average, &chip).or_else(|| first_reading(input, &chip)),
            power_max_watts: first_reading(max, &chip),
            chip,
            instance,
        })
        .collect()
}
