//! Wire records of the `/_node/stats` document.
//!
//! Sections the exporter depends on are required: a missing numeric field in
//! `jvm` or `process` fails the decode. Pipeline sub-sections vary between
//! engine versions and settings, so they default when absent.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Identifier under which a single-pipeline (legacy) engine reports its
/// pipeline.
pub const LEGACY_PIPELINE_ID: &str = "main";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JvmStats {
    pub threads: ThreadStats,
    pub mem: JvmMemStats,
    pub gc: GcStats,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThreadStats {
    pub count: i64,
    pub peak_count: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JvmMemStats {
    pub heap_used_in_bytes: i64,
    pub heap_used_percent: i64,
    pub heap_committed_in_bytes: i64,
    pub heap_max_in_bytes: i64,
    pub non_heap_used_in_bytes: i64,
    pub non_heap_committed_in_bytes: i64,
    pub pools: MemPools,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemPools {
    pub young: MemPoolStats,
    pub old: MemPoolStats,
    pub survivor: MemPoolStats,
}

impl MemPools {
    /// Pools paired with the label value they are exposed under.
    pub fn iter(&self) -> [(&'static str, &MemPoolStats); 3] {
        [
            ("young", &self.young),
            ("old", &self.old),
            ("survivor", &self.survivor),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemPoolStats {
    pub used_in_bytes: i64,
    pub peak_used_in_bytes: i64,
    pub max_in_bytes: i64,
    pub peak_max_in_bytes: i64,
    pub committed_in_bytes: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GcStats {
    pub collectors: GcCollectors,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GcCollectors {
    pub young: GcCollectorStats,
    pub old: GcCollectorStats,
}

impl GcCollectors {
    pub fn iter(&self) -> [(&'static str, &GcCollectorStats); 2] {
        [("young", &self.young), ("old", &self.old)]
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GcCollectorStats {
    pub collection_time_in_millis: u64,
    pub collection_count: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProcessStats {
    pub open_file_descriptors: i64,
    pub peak_open_file_descriptors: i64,
    pub max_file_descriptors: i64,
    pub mem: ProcessMemStats,
    pub cpu: ProcessCpuStats,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProcessMemStats {
    pub total_virtual_in_bytes: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProcessCpuStats {
    pub total_in_millis: u64,
    pub percent: i64,
}

/// Cumulative statistics of one pipeline.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PipelineStats {
    pub events: PipelineEvents,
    #[serde(default)]
    pub plugins: PluginSet,
    #[serde(default)]
    pub reloads: ReloadStats,
    #[serde(default)]
    pub queue: QueueStats,
    #[serde(default)]
    pub dead_letter_queue: DeadLetterQueueStats,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PipelineEvents {
    pub duration_in_millis: u64,
    #[serde(rename = "in")]
    pub in_: u64,
    pub filtered: u64,
    pub out: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PluginSet {
    #[serde(default)]
    pub inputs: Vec<PluginStats>,
    #[serde(default)]
    pub filters: Vec<PluginStats>,
    #[serde(default)]
    pub outputs: Vec<PluginStats>,
}

impl PluginSet {
    /// All plugins tagged with their stage.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &PluginStats)> {
        let inputs = self.inputs.iter().map(|p| ("input", p));
        let filters = self.filters.iter().map(|p| ("filter", p));
        let outputs = self.outputs.iter().map(|p| ("output", p));
        inputs.chain(filters).chain(outputs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PluginStats {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub events: PluginEvents,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PluginEvents {
    #[serde(default, rename = "in")]
    pub in_: u64,
    #[serde(default)]
    pub out: u64,
    #[serde(default)]
    pub duration_in_millis: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReloadStats {
    #[serde(default)]
    pub successes: u64,
    #[serde(default)]
    pub failures: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueueStats {
    #[serde(default, alias = "events_count")]
    pub events: i64,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub capacity: QueueCapacity,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueueCapacity {
    #[serde(default)]
    pub max_queue_size_in_bytes: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeadLetterQueueStats {
    #[serde(default)]
    pub queue_size_in_bytes: i64,
}

/// The document as it comes off the wire, before the pipeline shape is
/// resolved.
#[derive(Debug, Deserialize)]
pub(crate) struct RawNodeStats {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub http_address: String,
    pub jvm: JvmStats,
    pub process: ProcessStats,
    /// Single-pipeline engines (5.x).
    #[serde(default)]
    pub pipeline: Option<PipelineStats>,
    /// Multi-pipeline engines (6.x and later).
    #[serde(default)]
    pub pipelines: Option<BTreeMap<String, PipelineStats>>,
}

/// Which of the two response shapes the engine used.
#[derive(Debug)]
pub(crate) enum PipelineShape {
    Legacy(PipelineStats),
    Current(BTreeMap<String, PipelineStats>),
}

impl PipelineShape {
    /// Only the emptiness of the multi-pipeline mapping decides the shape.
    pub fn detect(
        pipeline: Option<PipelineStats>,
        pipelines: BTreeMap<String, PipelineStats>,
    ) -> Self {
        if pipelines.is_empty() {
            Self::Legacy(pipeline.unwrap_or_default())
        } else {
            Self::Current(pipelines)
        }
    }

    pub fn into_pipelines(self) -> BTreeMap<String, PipelineStats> {
        match self {
            Self::Legacy(pipeline) => {
                BTreeMap::from([(LEGACY_PIPELINE_ID.to_string(), pipeline)])
            }
            Self::Current(pipelines) => pipelines,
        }
    }
}
