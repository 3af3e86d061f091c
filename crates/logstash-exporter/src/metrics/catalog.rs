//! The fixed set of metric identities the exporter publishes.
//!
//! Identities are built once per process from the namespace, the local
//! hostname and the usage tag. Names and label schemas here are consumed by
//! dashboards; treat any rename as a breaking change.

use std::sync::Arc;

use strum::{EnumIter, IntoEnumIterator};

/// Label carrying the exporter host on every identity.
pub const HOSTNAME_LABEL: &str = "hostname";
/// Label carrying the usage tag on every identity.
pub const USAGE_LABEL: &str = "logstash_usage";

/// Label values for identities without dynamic labels.
pub const NO_LABELS: [&str; 0] = [];

const NODE_STATS_SUBSYSTEM: &str = "node_stats";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Counter,
    Gauge,
}

/// Every metric family produced from upstream data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum MetricId {
    InstanceInfo,

    JvmThreadsCount,
    JvmThreadsPeakCount,
    MemHeapUsedBytes,
    MemHeapUsedPercent,
    MemHeapCommittedBytes,
    MemHeapMaxBytes,
    MemNonHeapUsedBytes,
    MemNonHeapCommittedBytes,

    MemPoolUsedBytes,
    MemPoolPeakUsedBytes,
    MemPoolPeakMaxBytes,
    MemPoolMaxBytes,
    MemPoolCommittedBytes,

    GcCollectionDurationSeconds,
    GcCollectionCount,

    ProcessOpenFileDescriptors,
    ProcessPeakOpenFileDescriptors,
    ProcessMaxFileDescriptors,
    ProcessMemTotalVirtualBytes,
    ProcessCpuTotalSeconds,
    ProcessCpuPercent,

    PipelineDurationSeconds,
    PipelineEventsIn,
    PipelineEventsFiltered,
    PipelineEventsOut,
    PipelineReloadSuccesses,
    PipelineReloadFailures,
    PipelineQueueEvents,
    PipelineQueueMaxSizeBytes,
    PipelineDeadLetterQueueSizeBytes,

    PluginEventsIn,
    PluginEventsOut,
    PluginDurationSeconds,
}

struct Definition {
    subsystem: &'static str,
    name: &'static str,
    help: &'static str,
    labels: &'static [&'static str],
    kind: MetricKind,
}

const POOL: &[&str] = &["pool"];
const COLLECTOR: &[&str] = &["collector"];
const PIPELINE: &[&str] = &["pipeline"];
const PLUGIN: &[&str] = &["pipeline", "plugin_type", "plugin", "plugin_id"];

impl MetricId {
    fn definition(self) -> Definition {
        use MetricKind::{Counter, Gauge};

        let node = |name: &'static str,
                    help: &'static str,
                    labels: &'static [&'static str],
                    kind: MetricKind| Definition {
            subsystem: NODE_STATS_SUBSYSTEM,
            name,
            help,
            labels,
            kind,
        };

        match self {
            Self::InstanceInfo => Definition {
                subsystem: "",
                name: "instance_info",
                help: "Logstash instance identity; always 1.",
                labels: &["version", "http_address"],
                kind: Gauge,
            },

            Self::JvmThreadsCount => node("jvm_threads_count", "Live JVM threads.", &[], Gauge),
            Self::JvmThreadsPeakCount => node(
                "jvm_threads_peak_count",
                "Peak number of live JVM threads.",
                &[],
                Gauge,
            ),
            Self::MemHeapUsedBytes => node(
                "mem_heap_used_bytes",
                "JVM heap memory in use, in bytes.",
                &[],
                Gauge,
            ),
            Self::MemHeapUsedPercent => node(
                "heap_used_percent",
                "JVM heap usage as a percentage of the maximum heap.",
                &[],
                Gauge,
            ),
            Self::MemHeapCommittedBytes => node(
                "mem_heap_committed_bytes",
                "JVM heap memory committed, in bytes.",
                &[],
                Gauge,
            ),
            Self::MemHeapMaxBytes => node(
                "mem_heap_max_bytes",
                "Maximum JVM heap size, in bytes.",
                &[],
                Gauge,
            ),
            Self::MemNonHeapUsedBytes => node(
                "mem_nonheap_used_bytes",
                "JVM non-heap memory in use, in bytes.",
                &[],
                Gauge,
            ),
            Self::MemNonHeapCommittedBytes => node(
                "mem_nonheap_committed_bytes",
                "JVM non-heap memory committed, in bytes.",
                &[],
                Gauge,
            ),

            Self::MemPoolUsedBytes => node(
                "mem_pool_used_bytes",
                "Memory pool usage, in bytes.",
                POOL,
                Gauge,
            ),
            Self::MemPoolPeakUsedBytes => node(
                "mem_pool_peak_used_bytes",
                "Memory pool peak usage, in bytes.",
                POOL,
                Gauge,
            ),
            Self::MemPoolPeakMaxBytes => node(
                "mem_pool_peak_max_bytes",
                "Memory pool peak maximum, in bytes.",
                POOL,
                Gauge,
            ),
            Self::MemPoolMaxBytes => node(
                "mem_pool_max_bytes",
                "Memory pool maximum, in bytes.",
                POOL,
                Gauge,
            ),
            Self::MemPoolCommittedBytes => node(
                "mem_pool_committed_bytes",
                "Memory pool committed, in bytes.",
                POOL,
                Gauge,
            ),

            Self::GcCollectionDurationSeconds => node(
                "gc_collection_duration_seconds_total",
                "Time spent in garbage collection, in seconds.",
                COLLECTOR,
                Counter,
            ),
            Self::GcCollectionCount => node(
                "gc_collection_total",
                "Number of garbage collections.",
                COLLECTOR,
                Counter,
            ),

            Self::ProcessOpenFileDescriptors => node(
                "process_open_file_descriptors",
                "Open file descriptors.",
                &[],
                Gauge,
            ),
            Self::ProcessPeakOpenFileDescriptors => node(
                "process_peak_open_file_descriptors",
                "Peak number of open file descriptors.",
                &[],
                Gauge,
            ),
            Self::ProcessMaxFileDescriptors => node(
                "process_max_file_descriptors",
                "Limit on open file descriptors.",
                &[],
                Gauge,
            ),
            Self::ProcessMemTotalVirtualBytes => node(
                "process_mem_total_virtual_bytes",
                "Total virtual memory of the process, in bytes.",
                &[],
                Gauge,
            ),
            Self::ProcessCpuTotalSeconds => node(
                "process_cpu_total_seconds_total",
                "CPU time consumed by the process, in seconds.",
                &[],
                Counter,
            ),
            Self::ProcessCpuPercent => node(
                "process_cpu_percent",
                "Recent CPU usage of the process, in percent.",
                &[],
                Gauge,
            ),

            Self::PipelineDurationSeconds => node(
                "pipeline_duration_seconds_total",
                "Time events spent in the pipeline, in seconds.",
                PIPELINE,
                Counter,
            ),
            Self::PipelineEventsIn => node(
                "pipeline_events_in_total",
                "Events received by the pipeline.",
                PIPELINE,
                Counter,
            ),
            Self::PipelineEventsFiltered => node(
                "pipeline_events_filtered_total",
                "Events that passed the pipeline filters.",
                PIPELINE,
                Counter,
            ),
            Self::PipelineEventsOut => node(
                "pipeline_events_out_total",
                "Events emitted by the pipeline outputs.",
                PIPELINE,
                Counter,
            ),
            Self::PipelineReloadSuccesses => node(
                "pipeline_reloads_successes_total",
                "Successful pipeline configuration reloads.",
                PIPELINE,
                Counter,
            ),
            Self::PipelineReloadFailures => node(
                "pipeline_reloads_failures_total",
                "Failed pipeline configuration reloads.",
                PIPELINE,
                Counter,
            ),
            Self::PipelineQueueEvents => node(
                "pipeline_queue_events",
                "Events currently held in the pipeline queue.",
                PIPELINE,
                Gauge,
            ),
            Self::PipelineQueueMaxSizeBytes => node(
                "pipeline_queue_max_size_bytes",
                "Configured maximum size of the persisted queue, in bytes.",
                PIPELINE,
                Gauge,
            ),
            Self::PipelineDeadLetterQueueSizeBytes => node(
                "pipeline_dead_letter_queue_size_bytes",
                "Size of the dead letter queue, in bytes.",
                PIPELINE,
                Gauge,
            ),

            Self::PluginEventsIn => node(
                "pipeline_plugin_events_in_total",
                "Events received by a pipeline plugin.",
                PLUGIN,
                Counter,
            ),
            Self::PluginEventsOut => node(
                "pipeline_plugin_events_out_total",
                "Events emitted by a pipeline plugin.",
                PLUGIN,
                Counter,
            ),
            Self::PluginDurationSeconds => node(
                "pipeline_plugin_duration_seconds_total",
                "Time spent processing events in a pipeline plugin, in seconds.",
                PLUGIN,
                Counter,
            ),
        }
    }

    pub fn kind(self) -> MetricKind {
        self.definition().kind
    }
}

/// Name, help text and label schema of one metric family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricIdentity {
    pub namespace: String,
    pub subsystem: &'static str,
    pub name: &'static str,
    pub help: &'static str,
    pub label_names: &'static [&'static str],
    /// Labels attached to every sample of this identity.
    pub const_labels: Vec<(&'static str, String)>,
    pub kind: MetricKind,
}

impl MetricIdentity {
    /// Fully qualified name, `namespace_subsystem_name`.
    pub fn fq_name(&self) -> String {
        [self.namespace.as_str(), self.subsystem, self.name]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// One value of a metric family, produced during a single scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub identity: Arc<MetricIdentity>,
    pub value: f64,
    pub label_values: Vec<String>,
    pub kind: MetricKind,
}

/// Read-only catalog of metric identities.
#[derive(Debug)]
pub struct MetricCatalog {
    identities: Vec<Arc<MetricIdentity>>,
}

impl MetricCatalog {
    pub fn new(namespace: &str, hostname: &str, usage: &str) -> Self {
        let const_labels = vec![
            (HOSTNAME_LABEL, hostname.to_string()),
            (USAGE_LABEL, usage.to_string()),
        ];

        let identities = MetricId::iter()
            .map(|id| {
                let def = id.definition();
                Arc::new(MetricIdentity {
                    namespace: namespace.to_string(),
                    subsystem: def.subsystem,
                    name: def.name,
                    help: def.help,
                    label_names: def.labels,
                    const_labels: const_labels.clone(),
                    kind: def.kind,
                })
            })
            .collect();

        Self { identities }
    }

    /// All identities in declaration order.
    pub fn describe(&self) -> &[Arc<MetricIdentity>] {
        &self.identities
    }

    pub fn identity(&self, id: MetricId) -> &Arc<MetricIdentity> {
        &self.identities[id as usize]
    }

    /// Builds a sample for `id`.
    ///
    /// # Panics
    ///
    /// Panics when the number of label values differs from the identity's
    /// label schema. That means a collector and the catalog disagree, which
    /// is a programming error rather than a scrape failure.
    pub fn build<S: Into<String>>(
        &self,
        id: MetricId,
        value: f64,
        kind: MetricKind,
        label_values: impl IntoIterator<Item = S>,
    ) -> MetricSample {
        let identity = self.identity(id);
        let label_values: Vec<String> = label_values.into_iter().map(Into::into).collect();

        assert_eq!(
            label_values.len(),
            identity.label_names.len(),
            "metric {} expects labels {:?}, got {:?}",
            identity.fq_name(),
            identity.label_names,
            label_values,
        );

        MetricSample {
            identity: Arc::clone(identity),
            value,
            label_values,
            kind,
        }
    }

    /// Builds a sample using the identity's declared kind.
    pub fn sample<S: Into<String>>(
        &self,
        id: MetricId,
        value: f64,
        label_values: impl IntoIterator<Item = S>,
    ) -> MetricSample {
        self.build(id, value, id.kind(), label_values)
    }
}
