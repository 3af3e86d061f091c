//! Prometheus text exposition of collected samples.
//!
//! Samples are loaded into a registry that lives for one render only, so
//! nothing from a previous scrape can leak into the next response.

use std::collections::HashMap;

use prometheus::proto::MetricFamily;
use prometheus::{CounterVec, GaugeVec, Opts, Registry, TextEncoder};

use super::catalog::{MetricIdentity, MetricKind, MetricSample};
use crate::error::Result;

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

enum FamilyVec {
    Counter(CounterVec),
    Gauge(GaugeVec),
}

impl FamilyVec {
    fn new(identity: &MetricIdentity, kind: MetricKind) -> Result<Self> {
        let const_labels = identity
            .const_labels
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        let opts = Opts::new(identity.name, identity.help)
            .namespace(identity.namespace.clone())
            .subsystem(identity.subsystem)
            .const_labels(const_labels);

        Ok(match kind {
            MetricKind::Counter => Self::Counter(CounterVec::new(opts, identity.label_names)?),
            MetricKind::Gauge => Self::Gauge(GaugeVec::new(opts, identity.label_names)?),
        })
    }

    fn record(&self, sample: &MetricSample) -> Result<()> {
        let values: Vec<&str> = sample.label_values.iter().map(String::as_str).collect();
        match self {
            Self::Counter(vec) => vec
                .get_metric_with_label_values(&values)?
                .inc_by(sample.value),
            Self::Gauge(vec) => vec.get_metric_with_label_values(&values)?.set(sample.value),
        }
        Ok(())
    }

    fn register(&self, registry: &Registry) -> Result<()> {
        match self {
            Self::Counter(vec) => registry.register(Box::new(vec.clone()))?,
            Self::Gauge(vec) => registry.register(Box::new(vec.clone()))?,
        }
        Ok(())
    }
}

/// Groups samples into one metric family per identity, sorted by name.
pub fn to_families(samples: &[MetricSample]) -> Result<Vec<MetricFamily>> {
    let registry = Registry::new();
    let mut families: HashMap<String, FamilyVec> = HashMap::new();

    for sample in samples {
        let name = sample.identity.fq_name();
        if !families.contains_key(&name) {
            let family = FamilyVec::new(&sample.identity, sample.kind)?;
            family.register(&registry)?;
            families.insert(name.clone(), family);
        }
        families[&name].record(sample)?;
    }

    Ok(registry.gather())
}

/// Encodes bookkeeping families followed by the sample families.
pub fn render(bookkeeping: &[MetricFamily], samples: &[MetricSample]) -> Result<String> {
    let mut families = bookkeeping.to_vec();
    families.extend(to_families(samples)?);
    Ok(TextEncoder::new().encode_to_string(&families)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::catalog::{MetricCatalog, MetricId, NO_LABELS};

    fn catalog() -> MetricCatalog {
        MetricCatalog::new("logstash", "exporter-host", "sms")
    }

    #[test]
    fn test_render_gauge_and_counter() {
        let catalog = catalog();
        let samples = vec![
            catalog.sample(MetricId::JvmThreadsCount, 30.0, NO_LABELS),
            catalog.sample(MetricId::PipelineEventsIn, 100.0, ["main"]),
        ];

        let text = render(&[], &samples).unwrap();

        assert!(text.contains("# TYPE logstash_node_stats_jvm_threads_count gauge"));
        assert!(text.contains(
            "logstash_node_stats_jvm_threads_count{hostname=\"exporter-host\",logstash_usage=\"sms\"} 30\n"
        ));
        assert!(text.contains("# TYPE logstash_node_stats_pipeline_events_in_total counter"));
        assert!(text.contains(
            "logstash_node_stats_pipeline_events_in_total{hostname=\"exporter-host\",logstash_usage=\"sms\",pipeline=\"main\"} 100\n"
        ));
    }

    #[test]
    fn test_samples_of_one_identity_share_a_family() {
        let catalog = catalog();
        let samples: Vec<_> = ["young", "old", "survivor"]
            .into_iter()
            .map(|pool| catalog.sample(MetricId::MemPoolUsedBytes, 1.0, [pool]))
            .collect();

        let families = to_families(&samples).unwrap();
        assert_eq!(families.len(), 1);

        let text = render(&[], &samples).unwrap();
        assert_eq!(
            text.matches("# TYPE logstash_node_stats_mem_pool_used_bytes gauge")
                .count(),
            1
        );
        assert!(text.contains("pool=\"survivor\""));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&[], &[]).unwrap(), "");
    }
}
