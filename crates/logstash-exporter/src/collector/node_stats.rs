use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::Collector;
use crate::client::StatsClient;
use crate::error::Result;
use crate::metrics::{MetricCatalog, MetricId, MetricSample, NO_LABELS};
use crate::stats::{self, NodeStats, PipelineStats};

/// Upstream path of the node statistics document.
pub const NODE_STATS_PATH: &str = "/_node/stats";

/// Collects JVM, process and pipeline metrics from `/_node/stats`.
pub struct NodeStatsCollector {
    client: Arc<StatsClient>,
    catalog: Arc<MetricCatalog>,
}

impl NodeStatsCollector {
    pub fn new(client: Arc<StatsClient>, catalog: Arc<MetricCatalog>) -> Self {
        Self { client, catalog }
    }

    /// Maps decoded statistics to samples.
    pub fn samples(&self, stats: &NodeStats) -> Vec<MetricSample> {
        let mut samples = Vec::new();
        self.jvm_samples(stats, &mut samples);
        self.process_samples(stats, &mut samples);
        for (pipeline_id, pipeline) in &stats.pipelines {
            self.pipeline_samples(pipeline_id, pipeline, &mut samples);
        }
        samples
    }

    fn jvm_samples(&self, stats: &NodeStats, out: &mut Vec<MetricSample>) {
        let c = &self.catalog;
        let jvm = &stats.jvm;
        let mem = &jvm.mem;

        out.extend([
            c.sample(MetricId::JvmThreadsCount, jvm.threads.count as f64, NO_LABELS),
            c.sample(MetricId::JvmThreadsPeakCount, jvm.threads.peak_count as f64, NO_LABELS),
            c.sample(MetricId::MemHeapUsedBytes, mem.heap_used_in_bytes as f64, NO_LABELS),
            c.sample(MetricId::MemHeapUsedPercent, mem.heap_used_percent as f64, NO_LABELS),
            c.sample(MetricId::MemHeapCommittedBytes, mem.heap_committed_in_bytes as f64, NO_LABELS),
            c.sample(MetricId::MemHeapMaxBytes, mem.heap_max_in_bytes as f64, NO_LABELS),
            c.sample(MetricId::MemNonHeapUsedBytes, mem.non_heap_used_in_bytes as f64, NO_LABELS),
            c.sample(
                MetricId::MemNonHeapCommittedBytes,
                mem.non_heap_committed_in_bytes as f64,
                NO_LABELS,
            ),
        ]);

        for (pool, usage) in mem.pools.iter() {
            out.extend([
                c.sample(MetricId::MemPoolUsedBytes, usage.used_in_bytes as f64, [pool]),
                c.sample(MetricId::MemPoolPeakUsedBytes, usage.peak_used_in_bytes as f64, [pool]),
                c.sample(MetricId::MemPoolPeakMaxBytes, usage.peak_max_in_bytes as f64, [pool]),
                c.sample(MetricId::MemPoolMaxBytes, usage.max_in_bytes as f64, [pool]),
                c.sample(MetricId::MemPoolCommittedBytes, usage.committed_in_bytes as f64, [pool]),
            ]);
        }

        for (collector, gc) in jvm.gc.collectors.iter() {
            out.extend([
                c.sample(
                    MetricId::GcCollectionDurationSeconds,
                    millis_to_seconds(gc.collection_time_in_millis),
                    [collector],
                ),
                c.sample(MetricId::GcCollectionCount, gc.collection_count as f64, [collector]),
            ]);
        }
    }

    fn process_samples(&self, stats: &NodeStats, out: &mut Vec<MetricSample>) {
        let c = &self.catalog;
        let process = &stats.process;

        out.extend([
            c.sample(
                MetricId::ProcessOpenFileDescriptors,
                process.open_file_descriptors as f64,
                NO_LABELS,
            ),
            c.sample(
                MetricId::ProcessPeakOpenFileDescriptors,
                process.peak_open_file_descriptors as f64,
                NO_LABELS,
            ),
            c.sample(
                MetricId::ProcessMaxFileDescriptors,
                process.max_file_descriptors as f64,
                NO_LABELS,
            ),
            c.sample(
                MetricId::ProcessMemTotalVirtualBytes,
                process.mem.total_virtual_in_bytes as f64,
                NO_LABELS,
            ),
            c.sample(
                MetricId::ProcessCpuTotalSeconds,
                millis_to_seconds(process.cpu.total_in_millis),
                NO_LABELS,
            ),
            c.sample(MetricId::ProcessCpuPercent, process.cpu.percent as f64, NO_LABELS),
        ]);
    }

    fn pipeline_samples(&self, id: &str, pipeline: &PipelineStats, out: &mut Vec<MetricSample>) {
        let c = &self.catalog;
        let events = &pipeline.events;

        out.extend([
            c.sample(
                MetricId::PipelineDurationSeconds,
                millis_to_seconds(events.duration_in_millis),
                [id],
            ),
            c.sample(MetricId::PipelineEventsIn, events.in_ as f64, [id]),
            c.sample(MetricId::PipelineEventsFiltered, events.filtered as f64, [id]),
            c.sample(MetricId::PipelineEventsOut, events.out as f64, [id]),
            c.sample(MetricId::PipelineReloadSuccesses, pipeline.reloads.successes as f64, [id]),
            c.sample(MetricId::PipelineReloadFailures, pipeline.reloads.failures as f64, [id]),
            c.sample(MetricId::PipelineQueueEvents, pipeline.queue.events as f64, [id]),
            c.sample(
                MetricId::PipelineQueueMaxSizeBytes,
                pipeline.queue.capacity.max_queue_size_in_bytes as f64,
                [id],
            ),
            c.sample(
                MetricId::PipelineDeadLetterQueueSizeBytes,
                pipeline.dead_letter_queue.queue_size_in_bytes as f64,
                [id],
            ),
        ]);

        for (plugin_type, plugin) in pipeline.plugins.iter() {
            let labels = [id, plugin_type, plugin.name.as_str(), plugin.id.as_str()];
            out.push(c.sample(MetricId::PluginEventsIn, plugin.events.in_ as f64, labels));
            out.push(c.sample(MetricId::PluginEventsOut, plugin.events.out as f64, labels));
            if let Some(duration) = plugin.events.duration_in_millis {
                out.push(c.sample(
                    MetricId::PluginDurationSeconds,
                    millis_to_seconds(duration),
                    labels,
                ));
            }
        }
    }
}

#[async_trait]
impl Collector for NodeStatsCollector {
    fn name(&self) -> &'static str {
        "node_stats"
    }

    async fn collect(&self) -> Result<Vec<MetricSample>> {
        let raw = self.client.get(NODE_STATS_PATH).await?;
        let stats = stats::parse_node_stats(&raw.body)?;
        let samples = self.samples(&stats);
        debug!(
            pipelines = stats.pipelines.len(),
            samples = samples.len(),
            "collected node stats"
        );
        Ok(samples)
    }
}

fn millis_to_seconds(millis: u64) -> f64 {
    millis as f64 / 1000.0
}
