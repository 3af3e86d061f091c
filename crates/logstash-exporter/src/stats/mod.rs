//! Decoding of the engine's monitoring documents.
//!
//! Both single-pipeline and multi-pipeline `/_node/stats` responses are
//! resolved here into one [`NodeStats`] shape; nothing downstream needs to
//! know which engine generation answered.

mod model;

use std::collections::BTreeMap;

use bytes::Bytes;
use serde_json::Value;

use crate::error::{Error, Result};

pub use model::{
    DeadLetterQueueStats, GcCollectorStats, GcCollectors, GcStats, JvmMemStats, JvmStats,
    LEGACY_PIPELINE_ID, MemPoolStats, MemPools, PipelineEvents, PipelineStats, PluginEvents,
    PluginSet, PluginStats, ProcessCpuStats, ProcessMemStats, ProcessStats, QueueCapacity,
    QueueStats, ReloadStats, ThreadStats,
};
use model::{PipelineShape, RawNodeStats};

/// Identity of the engine answering on `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootInfo {
    pub host: String,
    pub version: String,
    pub http_address: String,
}

/// Version-agnostic node statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStats {
    pub host: String,
    pub version: String,
    pub http_address: String,
    pub jvm: JvmStats,
    pub process: ProcessStats,
    /// Pipeline identifier to statistics, always non-empty.
    pub pipelines: BTreeMap<String, PipelineStats>,
}

/// Extracts the identity fields from the root document.
///
/// The body must be a JSON object; individual fields are optional and
/// default to an empty string.
pub fn parse_root(body: &Bytes) -> Result<RootInfo> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| Error::decode("root info", body.clone(), e))?;

    if !value.is_object() {
        let source = <serde_json::Error as serde::de::Error>::custom("expected a JSON object");
        return Err(Error::decode("root info", body.clone(), source));
    }

    Ok(RootInfo {
        host: lookup_string(&value, "host"),
        version: lookup_string(&value, "version"),
        http_address: lookup_string(&value, "http_address"),
    })
}

/// Decodes a `/_node/stats` document and resolves its pipeline shape.
pub fn parse_node_stats(body: &Bytes) -> Result<NodeStats> {
    let raw: RawNodeStats =
        serde_json::from_slice(body).map_err(|e| Error::decode("node stats", body.clone(), e))?;

    let pipelines =
        PipelineShape::detect(raw.pipeline, raw.pipelines.unwrap_or_default()).into_pipelines();

    Ok(NodeStats {
        host: raw.host,
        version: raw.version,
        http_address: raw.http_address,
        jvm: raw.jvm,
        process: raw.process,
        pipelines,
    })
}

fn lookup_string(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
