use anyhow::Result;
use clap::{Parser, Subcommand};
use intel_gpu_pulse::input;
use intel_gpu_pulse::k8s::aggregate::{
    count_nodes_by_type, dedupe_pods_by_uid, node_allocations, summarize_allocation,
    summarize_plugins, GpuAllocationSummary, GpuTypeCounts, NodeGpuAllocation, PluginStatusCounts,
};
use intel_gpu_pulse::k8s::classify::{
    is_gpu_device_plugin, is_gpu_requesting_pod, node_is_intel_gpu,
};
use intel_gpu_pulse::k8s::{GpuDevicePlugin, Node, Pod};
use intel_gpu_pulse::utils::gpu_metrics::{
    self, card_power_watts, elapsed_from_secs, extract_chip_metrics, CardUtilization, CardValue,
    GpuChipMetrics, GpuNodeMetrics,
};
use intel_gpu_pulse::utils::prometheus_parser::ParsedMetrics;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const APP_NAME: &str = "intel-gpu-pulse";
const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_LOG_LEVEL: &str = "warn";
const DEFAULT_NODE_NAME: &str = "unknown";
const DEFAULT_POD_NAME: &str = "intel-gpu-plugin";

#[derive(Parser, Debug)]
#[command(
    name = APP_NAME,
    version = VERSION,
    about = "Intel GPU device plugin metrics and resource summaries",
    long_about = "Parses saved GPU exporter scrapes and Kubernetes list documents into per-card metrics and cluster GPU allocation summaries, printed as JSON"
)]
struct Args {
    /// Log level
    #[arg(
        long,
        global = true,
        env = "INTEL_GPU_PULSE_LOG",
        default_value = DEFAULT_LOG_LEVEL,
        help = "Log level (trace/debug/info/warn/error)"
    )]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract per-card GPU metrics from a saved scrape
    Metrics {
        /// Scrape text from the GPU plugin's metrics endpoint
        #[arg(long)]
        file: PathBuf,

        /// Node the scrape came from
        #[arg(long, env = "INTEL_GPU_PULSE_NODE", default_value = DEFAULT_NODE_NAME)]
        node: String,

        /// Plugin pod the scrape came from
        #[arg(long, env = "INTEL_GPU_PULSE_POD", default_value = DEFAULT_POD_NAME)]
        pod: String,

        /// Earlier scrape of the same pod, for power from energy counters
        #[arg(long, requires = "elapsed_secs")]
        previous: Option<PathBuf>,

        /// Seconds between --previous and --file
        #[arg(long)]
        elapsed_secs: Option<f64>,

        /// Include every parsed family in the output
        #[arg(long)]
        include_raw: bool,
    },

    /// Summarize GPU capacity and allocation from node, pod and plugin lists
    Cluster {
        /// Node list (`kubectl get nodes -o json`)
        #[arg(long)]
        nodes: PathBuf,

        /// Pod lists; overlapping lists are deduplicated by UID
        #[arg(long)]
        pods: Vec<PathBuf>,

        /// GpuDevicePlugin list
        #[arg(long)]
        plugins: Option<PathBuf>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetricsReport {
    metrics: GpuNodeMetrics,
    cards: Vec<CardUtilization>,
    chips: Vec<GpuChipMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    power_watts: Option<Vec<CardValue>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClusterReport {
    summary: GpuAllocationSummary,
    nodes: Vec<NodeGpuAllocation>,
    node_types: GpuTypeCounts,
    gpu_pods: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    plugins: Option<PluginStatusCounts>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        return;
    }

    info!(
        app = APP_NAME,
        version = VERSION,
        log_level = %args.log_level,
        "announcement"
    );

    let output = match args.command {
        Command::Metrics {
            file,
            node,
            pod,
            previous,
            elapsed_secs,
            include_raw,
        } => metrics_report(file, &node, &pod, previous, elapsed_secs, include_raw)
            .await
            .and_then(|report| Ok(serde_json::to_string_pretty(&report)?)),
        Command::Cluster {
            nodes,
            pods,
            plugins,
        } => cluster_report(nodes, pods, plugins)
            .await
            .and_then(|report| Ok(serde_json::to_string_pretty(&report)?)),
    };

    match output {
        Ok(json) => println!("{}", json),
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn metrics_report(
    file: PathBuf,
    node: &str,
    pod: &str,
    previous: Option<PathBuf>,
    elapsed_secs: Option<f64>,
    include_raw: bool,
) -> Result<MetricsReport> {
    let families = input::read_scrape(&file).await?;
    let chips = extract_chip_metrics(&families, node);
    let mut metrics = gpu_metrics::extract(families, node, pod);

    let power_watts = match (previous, elapsed_secs) {
        (Some(previous), Some(secs)) => {
            let elapsed = elapsed_from_secs(secs);
            let before = gpu_metrics::extract(input::read_scrape(&previous).await?, node, pod);
            Some(card_power_watts(&before, &metrics, elapsed))
        }
        _ => None,
    };

    let cards = metrics.card_utilization();
    if !include_raw {
        metrics.raw = ParsedMetrics::new();
    }

    Ok(MetricsReport {
        metrics,
        cards,
        chips,
        power_watts,
    })
}

async fn cluster_report(
    nodes: PathBuf,
    pods: Vec<PathBuf>,
    plugins: Option<PathBuf>,
) -> Result<ClusterReport> {
    let node_items = input::read_list(&nodes).await?;
    let pod_lists = input::read_lists(&pods).await?;

    let nodes: Vec<Node> = input::typed_items(&node_items, "Node", Node::from_value);
    let gpu_nodes: Vec<Node> = nodes
        .iter()
        .filter(|n| node_is_intel_gpu(n))
        .cloned()
        .collect();

    // Classify before typing so unreadable pods never count
    let pods = dedupe_pods_by_uid(pod_lists.iter().map(|items| {
        let gpu_items: Vec<_> = items
            .iter()
            .filter(|item| is_gpu_requesting_pod(item))
            .cloned()
            .collect();
        input::typed_items(&gpu_items, "Pod", Pod::from_value)
    }));

    let plugins = match plugins {
        Some(path) => {
            let items: Vec<_> = input::read_list(&path)
                .await?
                .into_iter()
                .filter(is_gpu_device_plugin)
                .collect();
            let plugins = input::typed_items(&items, "GpuDevicePlugin", GpuDevicePlugin::from_value);
            Some(summarize_plugins(&plugins))
        }
        None => None,
    };

    info!(
        nodes = nodes.len(),
        gpu_nodes = gpu_nodes.len(),
        gpu_pods = pods.len(),
        "Loaded cluster inputs"
    );

    Ok(ClusterReport {
        summary: summarize_allocation(&nodes, &pods),
        nodes: node_allocations(&gpu_nodes, &pods),
        node_types: count_nodes_by_type(&gpu_nodes),
        gpu_pods: pods.len(),
        plugins,
    })
}

/// Initialize the logging system
fn init_logging(log_level: &str) -> Result<()> {
    let env_filter = match log_level {
        "trace" => EnvFilter::new("trace"),
        "debug" => EnvFilter::new("debug"),
        "info" => EnvFilter::new("info"),
        "warn" => EnvFilter::new("warn"),
        "error" => EnvFilter::new("error"),
        _ => EnvFilter::new("warn"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .try_init()?;

    Ok(())
}
