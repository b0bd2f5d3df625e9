//! Loading scrape text and Kubernetes list documents from disk

use crate::k8s::ShapeError;
use crate::utils::prometheus_parser::ParsedMetrics;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Read and parse a Prometheus scrape saved to a file
pub async fn read_scrape(path: &Path) -> Result<ParsedMetrics> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read scrape file: {}", path.display()))?;

    let metrics = ParsedMetrics::parse(&content);
    debug!(path = %path.display(), families = metrics.len(), "Parsed scrape file");
    Ok(metrics)
}

/// Items of a `kubectl get -o json` style document
///
/// Accepts a list object with `items` or a bare JSON array.
pub fn list_items(document: Value) -> Result<Vec<Value>> {
    match document {
        Value::Array(items) => Ok(items),
        Value::Object(mut object) => match object.remove("items") {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(_) => Err(anyhow::anyhow!("`items` is not an array")),
        },
        _ => Err(anyhow::anyhow!("expected a list object or an array")),
    }
}

/// Read one list document
pub async fn read_list(path: &Path) -> Result<Vec<Value>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read list file: {}", path.display()))?;
    let document: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON file: {}", path.display()))?;

    list_items(document).with_context(|| format!("Invalid list document: {}", path.display()))
}

/// Read several list documents concurrently, keeping their order
pub async fn read_lists(paths: &[PathBuf]) -> Result<Vec<Vec<Value>>> {
    futures::future::try_join_all(paths.iter().map(|path| read_list(path))).await
}

/// Convert untyped items, logging and skipping the ones that do not fit
pub fn typed_items<T>(
    items: &[Value],
    kind: &str,
    from_value: impl Fn(&Value) -> Result<T, ShapeError>,
) -> Vec<T> {
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match from_value(item) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!(kind, index, error = %e, "Skipping unreadable item");
                None
            }
        })
        .collect()
}
