//! Sub-collectors fanned out by the exporter on every scrape.

mod node_stats;

use async_trait::async_trait;

use crate::error::Result;
use crate::metrics::MetricSample;

pub use node_stats::{NODE_STATS_PATH, NodeStatsCollector};

/// Produces one family group of samples from one upstream source.
///
/// Implementations are shared across concurrent tasks and must not hold
/// per-scrape state.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Stable name used in logs and in the collector failure counter.
    fn name(&self) -> &'static str;

    async fn collect(&self) -> Result<Vec<MetricSample>>;
}
