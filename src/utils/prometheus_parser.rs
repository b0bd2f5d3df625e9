use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::trace;

/// `key="value"` pairs inside a label block
static LABEL_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(\w+)="([^"]*)""#).expect("label pattern is a valid regex")
});

/// Represents a single sample of a metric with its labels and value
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricSample {
    /// Label key-value pairs (e.g., {"card": "card0", "engine": "render/0"})
    pub labels: HashMap<String, String>,
    /// Metric value
    pub value: f64,
}

impl MetricSample {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// All samples sharing a metric name
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MetricFamily {
    /// Metric name
    pub name: String,
    /// Metric help/description, empty when no `# HELP` preceded the family
    pub help: String,
    /// Metric type (counter, gauge, ...), empty when unknown
    #[serde(rename = "type")]
    pub metric_type: String,
    /// Samples in the order they appeared
    pub samples: Vec<MetricSample>,
}

/// Parsed Prometheus metrics text format, keyed by family name
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParsedMetrics {
    pub families: HashMap<String, MetricFamily>,
}

/// Metadata carried from `# HELP` / `# TYPE` lines to the next new family
#[derive(Default)]
struct PendingMetadata {
    name: String,
    help: String,
    metric_type: String,
}

impl ParsedMetrics {
    /// Create an empty metrics container
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn get(&self, name: &str) -> Option<&MetricFamily> {
        self.families.get(name)
    }

    /// Samples of a family, empty when the family was never scraped
    pub fn samples(&self, name: &str) -> &[MetricSample] {
        self.families
            .get(name)
            .map(|family| family.samples.as_slice())
            .unwrap_or(&[])
    }

    /// Parse Prometheus text format metrics
    ///
    /// Malformed lines are skipped; this never fails.
    pub fn parse(content: &str) -> Self {
        let mut metrics = ParsedMetrics::new();
        let mut pending = PendingMetadata::default();

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            // A new HELP keeps the pending type from an earlier TYPE line
            if let Some(rest) = trimmed.strip_prefix("# HELP ") {
                let (name, help) = split_first_space(rest);
                pending.name = name.to_string();
                pending.help = help.to_string();
                continue;
            }

            // The name on a TYPE line is not matched against the HELP name
            if let Some(rest) = trimmed.strip_prefix("# TYPE ") {
                let (_, metric_type) = split_first_space(rest);
                pending.metric_type = metric_type.to_string();
                continue;
            }

            if trimmed.starts_with('#') {
                continue;
            }

            let Some((name, sample)) = parse_metric_sample(trimmed) else {
                trace!(line = trimmed, "Dropping unparseable metric line");
                continue;
            };

            let family = metrics
                .families
                .entry(name.to_string())
                .or_insert_with(|| {
                    let mut family = MetricFamily {
                        name: name.to_string(),
                        ..Default::default()
                    };
                    if name == pending.name {
                        family.help = pending.help.clone();
                        family.metric_type = pending.metric_type.clone();
                    }
                    family
                });
            family.samples.push(sample);
        }

        metrics
    }
}

/// Split on the first space; the right side is empty when there is none
fn split_first_space(rest: &str) -> (&str, &str) {
    rest.split_once(' ').unwrap_or((rest, ""))
}

/// Parse a single metric sample line
/// Format: metric_name{label1="value1",label2="value2"} value [timestamp]
fn parse_metric_sample(line: &str) -> Option<(&str, MetricSample)> {
    let (name, labels, rest) = match line.find('{') {
        Some(brace_start) => {
            let brace_end = line.rfind('}').filter(|end| *end > brace_start)?;
            (
                line[..brace_start].trim(),
                parse_labels(&line[brace_start + 1..brace_end]),
                &line[brace_end + 1..],
            )
        }
        // First whitespace, so a trailing timestamp never lands in the name
        None => {
            let (name, rest) = line.split_once(char::is_whitespace)?;
            (name, HashMap::new(), rest)
        }
    };

    if name.is_empty() {
        return None;
    }

    // Optional timestamp after the value is ignored
    let value = rest.split_whitespace().next()?.parse::<f64>().ok()?;
    if !value.is_finite() {
        return None;
    }

    Some((name, MetricSample { labels, value }))
}

/// Parse label pairs from a label string
/// Format: label1="value1",label2="value2"
fn parse_labels(labels_str: &str) -> HashMap<String, String> {
    LABEL_PAIR
        .captures_iter(labels_str)
        .map(|cap| (cap[1].to_string(), cap[2].to_string()))
        .collect()
}

/// Parse Prometheus text format metrics
pub fn parse(content: &str) -> ParsedMetrics {
    ParsedMetrics::parse(content)
}
