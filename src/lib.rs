//! Intel GPU device plugin data, parsed and classified
//!
//! Pure transformations over data a caller has already fetched:
//!
//! - [`utils::prometheus_parser`] turns exposition-format scrape text into
//!   metric families.
//! - [`utils::gpu_metrics`] derives per-card utilization, frequency, memory,
//!   energy and hwmon power readings from those families.
//! - [`k8s::classify`] decides whether nodes, pods and `GpuDevicePlugin`
//!   objects are GPU related and reads their GPU quantities.
//! - [`k8s::aggregate`] sums and joins those quantities across the cluster.
//!
//! Nothing here performs I/O except [`input`], which the CLI uses to load
//! saved scrapes and list documents from disk.

pub mod config;
pub mod input;
pub mod k8s;
pub mod utils;
