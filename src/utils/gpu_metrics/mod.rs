//! GPU metric extraction from parsed i915 exporter scrapes
//!
//! Turns the families produced by [`prometheus_parser`](crate::utils::prometheus_parser)
//! into per-card readings for one (node, plugin pod) pair.
//!
//! ## Label fallbacks
//!
//! The exporter has labelled cards as `card` in some releases and `gpu` in
//! others. Every reading resolves its card through [`card_label`]:
//! `card`, then `gpu`, then the literal `gpu0`. Engines resolve through
//! [`engine_label`]: `engine`, then `render/0`.
//!
//! When joining active ticks to total ticks, the total side is matched on the
//! resolved card but on the *raw* `engine` label. A total sample without an
//! `engine` label therefore never matches.

pub mod hwmon;
pub mod power;

pub use hwmon::{extract_chip_metrics, GpuChipMetrics};
pub use power::{card_power_watts, elapsed_from_secs};

use crate::config;
use crate::utils::prometheus_parser::{MetricSample, ParsedMetrics};
use serde::Serialize;
use tracing::debug;

/// Utilization of one engine on one card
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EngineUtilization {
    pub card: String,
    pub engine: String,
    /// Busy percentage, always within 0..=100
    pub pct: u32,
}

/// A single per-card reading (MHz, bytes or microjoules depending on the family)
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CardValue {
    pub card: String,
    pub value: f64,
}

/// Average engine utilization of a card
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CardUtilization {
    pub card: String,
    pub pct: u32,
    pub engines: usize,
}

/// Snapshot of one GPU plugin pod's metrics on one node
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuNodeMetrics {
    pub node_name: String,
    pub pod_name: String,
    pub engine_utilization: Vec<EngineUtilization>,
    /// Boost frequency in MHz
    pub frequency: Vec<CardValue>,
    /// Device-local memory in bytes
    pub memory_local: Vec<CardValue>,
    /// System memory in bytes
    pub memory_system: Vec<CardValue>,
    /// Cumulative energy in microjoules
    pub energy: Vec<CardValue>,
    /// The full scrape, for families not covered above
    pub raw: ParsedMetrics,
}

/// Resolve the card a sample belongs to: `card`, then `gpu`, then `gpu0`
pub fn card_label(sample: &MetricSample) -> &str {
    sample
        .label("card")
        .or_else(|| sample.label("gpu"))
        .unwrap_or(config::DEFAULT_CARD)
}

/// Resolve the engine a sample belongs to: `engine`, then `render/0`
pub fn engine_label(sample: &MetricSample) -> &str {
    sample.label("engine").unwrap_or(config::DEFAULT_ENGINE)
}

/// `round(100 * active / total)` clamped to 0..=100; 0 when total is 0
fn busy_percent(active: f64, total: f64) -> u32 {
    if total == 0.0 {
        return 0;
    }
    (100.0 * active / total).round().clamp(0.0, 100.0) as u32
}

fn card_values(samples: &[MetricSample]) -> Vec<CardValue> {
    samples
        .iter()
        .map(|sample| CardValue {
            card: card_label(sample).to_string(),
            value: sample.value,
        })
        .collect()
}

fn engine_utilization(active: &[MetricSample], total: &[MetricSample]) -> Vec<EngineUtilization> {
    active
        .iter()
        .map(|sample| {
            let card = card_label(sample);
            let engine = engine_label(sample);
            let pct = total
                .iter()
                .find(|t| card_label(t) == card && t.label("engine") == Some(engine))
                .map(|t| busy_percent(sample.value, t.value))
                .unwrap_or(0);

            EngineUtilization {
                card: card.to_string(),
                engine: engine.to_string(),
                pct,
            }
        })
        .collect()
}

/// Extract per-card GPU readings from a parsed scrape
///
/// Missing families produce empty sequences. Every active-ticks sample yields
/// exactly one utilization entry, 0% when no total sample matches.
pub fn extract(families: ParsedMetrics, node_name: &str, pod_name: &str) -> GpuNodeMetrics {
    let engine_utilization = engine_utilization(
        families.samples(config::ENGINE_ACTIVE_TICKS),
        families.samples(config::ENGINE_TOTAL_TICKS),
    );
    let frequency = card_values(families.samples(config::BOOST_FREQ_MHZ));
    let memory_local = card_values(families.samples(config::MEMORY_LOCAL));
    let memory_system = card_values(families.samples(config::MEMORY_SYSTEM));
    let energy = card_values(families.samples(config::ENERGY_MICROJOULES));

    debug!(
        node = node_name,
        pod = pod_name,
        engines = engine_utilization.len(),
        frequency = frequency.len(),
        energy = energy.len(),
        "Extracted GPU metrics"
    );

    GpuNodeMetrics {
        node_name: node_name.to_string(),
        pod_name: pod_name.to_string(),
        engine_utilization,
        frequency,
        memory_local,
        memory_system,
        energy,
        raw: families,
    }
}

impl GpuNodeMetrics {
    /// Average engine utilization per card, in first-seen card order
    pub fn card_utilization(&self) -> Vec<CardUtilization> {
        let mut cards: Vec<(String, u32, usize)> = Vec::new();
        for entry in &self.engine_utilization {
            match cards.iter_mut().find(|(card, _, _)| *card == entry.card) {
                Some((_, sum, count)) => {
                    *sum += entry.pct;
                    *count += 1;
                }
                None => cards.push((entry.card.clone(), entry.pct, 1)),
            }
        }

        cards
            .into_iter()
            .map(|(card, sum, engines)| CardUtilization {
                card,
                pct: (sum as f64 / engines as f64).round() as u32,
                engines,
            })
            .collect()
    }

    /// The engine with the highest utilization; the first one wins ties
    pub fn busiest_engine(&self) -> Option<&EngineUtilization> {
        self.engine_utilization
            .iter()
            .reduce(|best, entry| if entry.pct > best.pct { entry } else { best })
    }
}
