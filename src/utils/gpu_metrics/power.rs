//! Average power from two cumulative energy snapshots

use super::{CardValue, GpuNodeMetrics};
use std::time::Duration;
use tracing::debug;

const MICROJOULES_PER_JOULE: f64 = 1_000_000.0;

/// Elapsed time from a seconds value; zero, negative and NaN give
/// `Duration::ZERO`, values too large for a `Duration` give `Duration::MAX`
pub fn elapsed_from_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Average watts per card between two scrapes of the same plugin pod
///
/// Cards absent from `previous` and counters that went backwards (exporter
/// restart) produce no entry. A zero `elapsed` produces nothing.
pub fn card_power_watts(
    previous: &GpuNodeMetrics,
    current: &GpuNodeMetrics,
    elapsed: Duration,
) -> Vec<CardValue> {
    let seconds = elapsed.as_secs_f64();
    if seconds <= 0.0 {
        return Vec::new();
    }

    current
        .energy
        .iter()
        .filter_map(|now| {
            let before = previous.energy.iter().find(|e| e.card == now.card)?;
            let delta = now.value - before.value;
            if delta < 0.0 {
                debug!(card = %now.card, "Energy counter reset, skipping power sample");
                return None;
            }
            Some(CardValue {
                card: now.card.clone(),
                value: delta / MICROJOULES_PER_JOULE / seconds,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::gpu_metrics::extract;
    use crate::utils::prometheus_parser::parse;

    fn snapshot(text: &str) -> GpuNodeMetrics {
        extract(parse(text), "node-a", "plugin")
    }

    #[test]
    fn test_power_from_energy_delta() {
        let before = snapshot(
            "gpu_i915_energy_microjoules{card=\"card0\"} 1000000\ngpu_i915_energy_microjoules{card=\"card1\"} 0",
        );
        let after = snapshot(
            "gpu_i915_energy_microjoules{card=\"card0\"} 21000000\ngpu_i915_energy_microjoules{card=\"card1\"} 5000000",
        );

        let power = card_power_watts(&before, &after, Duration::from_secs(2));
        assert_eq!(power.len(), 2);
        assert_eq!(power[0].card, "card0");
        assert_eq!(power[0].value, 10.0);
        assert_eq!(power[1].value, 2.5);
    }

    #[test]
    fn test_counter_reset_and_new_cards_are_skipped() {
        let before = snapshot("gpu_i915_energy_microjoules{card=\"card0\"} 9000000");
        let after = snapshot(
            "gpu_i915_energy_microjoules{card=\"card0\"} 100\ngpu_i915_energy_microjoules{card=\"card1\"} 100",
        );
        assert!(card_power_watts(&before, &after, Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn test_elapsed_from_secs() {
        assert_eq!(elapsed_from_secs(2.5), Duration::from_millis(2500));
        assert_eq!(elapsed_from_secs(0.0), Duration::ZERO);
        assert_eq!(elapsed_from_secs(-3.0), Duration::ZERO);
        assert_eq!(elapsed_from_secs(f64::NAN), Duration::ZERO);
        assert_eq!(elapsed_from_secs(f64::INFINITY), Duration::MAX);
    }

    #[test]
    fn test_negative_elapsed_yields_no_power() {
        let before = snapshot("gpu_i915_energy_microjoules{card=\"card0\"} 1");
        let after = snapshot("gpu_i915_energy_microjoules{card=\"card0\"} 2");
        assert!(card_power_watts(&before, &after, elapsed_from_secs(-10.0)).is_empty());
    }

    #[test]
    fn test_zero_elapsed() {
        let before = snapshot("gpu_i915_energy_microjoules{card=\"card0\"} 1");
        let after = snapshot("gpu_i915_energy_microjoules{card=\"card0\"} 2");
        assert!(card_power_watts(&before, &after, Duration::ZERO).is_empty());
    }
}
