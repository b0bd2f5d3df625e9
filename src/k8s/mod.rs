//! Typed views of the Kubernetes objects the classifier reads
//!
//! Only the fields that GPU classification needs are modelled. Every field is
//! optional on the wire and read per field: a missing, `null` or mistyped
//! scalar falls back to its default, and map or array entries of the wrong
//! shape are dropped. One bad field never hides the others, so an unrelated
//! integer label cannot turn a GPU node into a non-GPU node.
//!
//! `from_value` is the single boundary where untyped API JSON becomes a typed
//! record. It rejects only values that are not objects (or have the wrong
//! `kind`) and reports why through [`ShapeError`]; the bool-returning
//! predicates in [`classify`] treat any rejection as `false`.

pub mod aggregate;
pub mod classify;

use crate::config;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Resource name to quantity string (e.g. `"gpu.intel.com/i915": "2"`)
pub type ResourceList = BTreeMap<String, String>;

/// Why a JSON value could not be read as a Kubernetes record
#[derive(Error, Debug)]
pub enum ShapeError {
    #[error("expected a JSON object")]
    NotAnObject,

    #[error("expected kind {expected}, found {found:?}")]
    WrongKind {
        expected: &'static str,
        found: Option<String>,
    },

    #[error("malformed field: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A field of the wrong type (or `null`) reads as its default
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(&value).unwrap_or_default())
}

/// Array entries of the wrong shape are dropped; a non-array is empty
fn lenient_items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| T::deserialize(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Map entries whose value is not a string are dropped
fn string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(entries) => entries
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key, s)),
                _ => None,
            })
            .collect(),
        _ => BTreeMap::new(),
    })
}

/// Quantities arrive as strings from the API server, but hand-written
/// fixtures often use numbers. `null` entries are dropped.
fn quantities<'de, D>(deserializer: D) -> Result<ResourceList, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(entries) => entries
            .into_iter()
            .filter_map(|(name, quantity)| match quantity {
                Value::String(s) => Some((name, s)),
                Value::Number(n) => Some((name, n.to_string())),
                _ => None,
            })
            .collect(),
        _ => ResourceList::new(),
    })
}

fn deserialize_object<T: DeserializeOwned>(value: &Value) -> Result<T, ShapeError> {
    if !value.is_object() {
        return Err(ShapeError::NotAnObject);
    }
    Ok(T::deserialize(value)?)
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ObjectMeta {
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub namespace: String,
    #[serde(default, deserialize_with = "lenient")]
    pub uid: Option<String>,
    #[serde(default, deserialize_with = "string_map")]
    pub labels: BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct NodeStatus {
    #[serde(default, deserialize_with = "quantities")]
    pub capacity: ResourceList,
    #[serde(default, deserialize_with = "quantities")]
    pub allocatable: ResourceList,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Node {
    #[serde(default, deserialize_with = "lenient")]
    pub metadata: ObjectMeta,
    #[serde(default, deserialize_with = "lenient")]
    pub status: NodeStatus,
}

impl Node {
    /// Read a node from API JSON. List items carry no `kind`, so none is required.
    pub fn from_value(value: &Value) -> Result<Self, ShapeError> {
        deserialize_object(value)
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ResourceRequirements {
    #[serde(default, deserialize_with = "quantities")]
    pub requests: ResourceList,
    #[serde(default, deserialize_with = "quantities")]
    pub limits: ResourceList,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Container {
    #[serde(default, deserialize_with = "lenient")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient")]
    pub resources: ResourceRequirements,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default, deserialize_with = "lenient")]
    pub node_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_items")]
    pub containers: Vec<Container>,
    #[serde(default, deserialize_with = "lenient_items")]
    pub init_containers: Vec<Container>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PodStatus {
    #[serde(default, deserialize_with = "lenient")]
    pub phase: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Pod {
    #[serde(default, deserialize_with = "lenient")]
    pub metadata: ObjectMeta,
    #[serde(default, deserialize_with = "lenient")]
    pub spec: PodSpec,
    #[serde(default, deserialize_with = "lenient")]
    pub status: PodStatus,
}

impl Pod {
    pub fn from_value(value: &Value) -> Result<Self, ShapeError> {
        deserialize_object(value)
    }

    pub fn uid(&self) -> Option<&str> {
        self.metadata.uid.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.status.phase.as_deref() == Some(config::POD_PHASE_RUNNING)
    }

    /// Init containers first, then regular containers
    pub fn all_containers(&self) -> impl Iterator<Item = &Container> {
        self.spec
            .init_containers
            .iter()
            .chain(self.spec.containers.iter())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuDevicePluginStatus {
    #[serde(default, deserialize_with = "lenient")]
    pub desired_number_scheduled: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub number_ready: i64,
    #[serde(default, deserialize_with = "lenient")]
    pub number_unavailable: i64,
    #[serde(default, deserialize_with = "lenient_items")]
    pub node_names: Vec<String>,
}

/// `deviceplugin.intel.com/v1` GpuDevicePlugin instance
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GpuDevicePlugin {
    #[serde(default, deserialize_with = "lenient")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient")]
    pub metadata: ObjectMeta,
    #[serde(default, deserialize_with = "lenient")]
    pub status: GpuDevicePluginStatus,
}

impl GpuDevicePlugin {
    /// Read a plugin instance, rejecting anything whose `kind` is not `GpuDevicePlugin`
    pub fn from_value(value: &Value) -> Result<Self, ShapeError> {
        if !value.is_object() {
            return Err(ShapeError::NotAnObject);
        }
        let kind = value.get("kind").and_then(Value::as_str);
        if kind != Some(config::GPU_DEVICE_PLUGIN_KIND) {
            return Err(ShapeError::WrongKind {
                expected: config::GPU_DEVICE_PLUGIN_KIND,
                found: kind.map(str::to_string),
            });
        }
        deserialize_object(value)
    }
}
