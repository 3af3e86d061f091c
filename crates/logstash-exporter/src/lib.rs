//! Logstash monitoring API collector and Prometheus exporter.
//!
//! The crate fetches the engine's root and `/_node/stats` documents,
//! normalizes both pipeline response shapes into one model and publishes
//! the result in the Prometheus text exposition format.

pub mod client;
pub mod collector;
pub mod error;
pub mod exporter;
pub mod metrics;
pub mod server;
pub mod stats;

pub use client::{DEFAULT_TIMEOUT, Endpoint, RawBody, StatsClient};
pub use collector::{Collector, NodeStatsCollector};
pub use error::{Error, Result};
pub use exporter::{BuildInfo, ExporterOptions, LogstashExporter, Scrape, ScrapeOutcome};
pub use server::{DEFAULT_METRICS_PATH, ExporterServer, ServerConfig};
