pub mod gpu_metrics;
pub mod prometheus_parser;
