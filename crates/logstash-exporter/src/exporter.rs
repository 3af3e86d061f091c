//! Scrape orchestration.
//!
//! One scrape holds the exporter's lock from start to finish: the root
//! probe, the concurrent sub-collector fan-out and the bookkeeping updates
//! all happen under it, so concurrent requests are served one after another.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::client::{Endpoint, StatsClient};
use crate::collector::{Collector, NodeStatsCollector};
use crate::error::{Error, Result};
use crate::metrics::{self, HOSTNAME_LABEL, MetricCatalog, MetricId, MetricSample, USAGE_LABEL};
use crate::stats::{self, RootInfo};

/// Version and provenance of this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    pub commit_sha: &'static str,
    pub date: &'static str,
}

impl BuildInfo {
    pub fn from_env() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            commit_sha: option_env!("LOGSTASH_EXPORTER_COMMIT").unwrap_or("unknown"),
            date: option_env!("LOGSTASH_EXPORTER_BUILD_DATE").unwrap_or("unknown"),
        }
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Settings fixed for the lifetime of one exporter.
#[derive(Debug, Clone)]
pub struct ExporterOptions {
    /// Prefix of every metric name.
    pub namespace: String,
    /// Free-text tag distinguishing exporters that watch different engines.
    pub usage: String,
    /// Local hostname, attached to every sample.
    pub hostname: String,
    pub endpoint: Endpoint,
}

/// Result of the root probe of one scrape.
#[derive(Debug)]
pub struct ScrapeOutcome {
    pub up: bool,
    pub error: Option<Error>,
    pub elapsed: Duration,
}

/// Everything one scrape produced, ready to be encoded.
#[derive(Debug)]
pub struct Scrape {
    pub outcome: ScrapeOutcome,
    /// Instance identity and sub-collector samples.
    pub samples: Vec<MetricSample>,
    /// Exporter self-metrics, gathered before the lock was released.
    pub bookkeeping: Vec<MetricFamily>,
}

impl Scrape {
    /// Encodes the scrape in the text exposition format.
    pub fn render(&self) -> Result<String> {
        metrics::render(&self.bookkeeping, &self.samples)
    }
}

/// Mutable exporter self-metrics. Only touched while the scrape lock is held.
struct ScrapeState {
    registry: Registry,
    total_scrapes: IntCounterVec,
    scrape_duration: HistogramVec,
    up: GaugeVec,
    collector_failures: IntCounterVec,
}

impl ScrapeState {
    fn new(namespace: &str) -> Result<Self> {
        let registry = Registry::new();
        let labels = &[HOSTNAME_LABEL, USAGE_LABEL];

        let total_scrapes = IntCounterVec::new(
            Opts::new(
                "exporter_scrapes_total",
                "Total number of scrapes of the Logstash monitoring API.",
            )
            .namespace(namespace),
            labels,
        )?;
        let scrape_duration = HistogramVec::new(
            HistogramOpts::new(
                "exporter_scrape_duration_seconds",
                "Duration of successful scrapes, in seconds.",
            )
            .namespace(namespace),
            labels,
        )?;
        let up = GaugeVec::new(
            Opts::new("up", "Whether the last probe of the Logstash API succeeded.")
                .namespace(namespace),
            labels,
        )?;
        let collector_failures = IntCounterVec::new(
            Opts::new(
                "exporter_collector_failures_total",
                "Sub-collector runs that produced no samples because of an error.",
            )
            .namespace(namespace),
            &[HOSTNAME_LABEL, USAGE_LABEL, "collector"],
        )?;

        registry.register(Box::new(total_scrapes.clone()))?;
        registry.register(Box::new(scrape_duration.clone()))?;
        registry.register(Box::new(up.clone()))?;
        registry.register(Box::new(collector_failures.clone()))?;

        Ok(Self {
            registry,
            total_scrapes,
            scrape_duration,
            up,
            collector_failures,
        })
    }
}

/// Exporter for one Logstash instance.
pub struct LogstashExporter {
    options: ExporterOptions,
    client: Arc<StatsClient>,
    catalog: Arc<MetricCatalog>,
    collectors: Vec<Arc<dyn Collector>>,
    state: Mutex<ScrapeState>,
}

impl LogstashExporter {
    /// Creates an exporter with the node stats collector registered.
    pub fn new(options: ExporterOptions) -> Result<Self> {
        let mut exporter = Self::without_collectors(options)?;
        let node_stats = NodeStatsCollector::new(
            Arc::clone(&exporter.client),
            Arc::clone(&exporter.catalog),
        );
        exporter.collectors.push(Arc::new(node_stats));
        Ok(exporter)
    }

    /// Creates an exporter that only probes the root document until
    /// collectors are added with [`LogstashExporter::with_collector`].
    pub fn without_collectors(options: ExporterOptions) -> Result<Self> {
        if options.namespace.trim().is_empty() {
            return Err(Error::config("namespace must not be empty"));
        }

        let client = Arc::new(StatsClient::new(options.endpoint.clone())?);
        let catalog = Arc::new(MetricCatalog::new(
            &options.namespace,
            &options.hostname,
            &options.usage,
        ));
        let state = Mutex::new(ScrapeState::new(&options.namespace)?);

        Ok(Self {
            options,
            client,
            catalog,
            collectors: Vec::new(),
            state,
        })
    }

    pub fn with_collector(mut self, collector: Arc<dyn Collector>) -> Self {
        self.collectors.push(collector);
        self
    }

    pub fn options(&self) -> &ExporterOptions {
        &self.options
    }

    pub fn client(&self) -> &Arc<StatsClient> {
        &self.client
    }

    pub fn catalog(&self) -> &Arc<MetricCatalog> {
        &self.catalog
    }

    /// Runs one full scrape.
    ///
    /// Upstream failures never fail the scrape; they are reported through
    /// the `up` gauge and the collector failure counter.
    pub async fn scrape(&self) -> Scrape {
        let state = self.state.lock().await;
        let started = Instant::now();
        let local = [self.options.hostname.as_str(), self.options.usage.as_str()];

        let (outcome, samples) = match self.probe().await {
            Err(err) => {
                warn!(
                    endpoint = %self.options.endpoint.base_url(),
                    error = %err,
                    "Logstash root probe failed"
                );
                // Only the latest probe outcome is exposed.
                state.up.reset();
                state.up.with_label_values(&local).set(0.0);
                let outcome = ScrapeOutcome {
                    up: false,
                    error: Some(err),
                    elapsed: started.elapsed(),
                };
                (outcome, Vec::new())
            }
            Ok(root) => {
                let engine_host = if root.host.is_empty() {
                    self.options.hostname.as_str()
                } else {
                    root.host.as_str()
                };
                state.up.reset();
                state
                    .up
                    .with_label_values(&[engine_host, self.options.usage.as_str()])
                    .set(1.0);

                let mut samples = vec![self.catalog.sample(
                    MetricId::InstanceInfo,
                    1.0,
                    [root.version.as_str(), root.http_address.as_str()],
                )];
                samples.extend(self.fan_out(&state.collector_failures).await);

                let elapsed = started.elapsed();
                state
                    .scrape_duration
                    .with_label_values(&local)
                    .observe(elapsed.as_secs_f64());
                debug!(
                    samples = samples.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "scrape finished"
                );

                let outcome = ScrapeOutcome {
                    up: true,
                    error: None,
                    elapsed,
                };
                (outcome, samples)
            }
        };

        // Counts completed scrapes only.
        state.total_scrapes.with_label_values(&local).inc();
        let bookkeeping = state.registry.gather();
        Scrape {
            outcome,
            samples,
            bookkeeping,
        }
    }

    /// Total number of scrapes completed by this exporter.
    pub async fn total_scrapes(&self) -> u64 {
        let state = self.state.lock().await;
        state
            .total_scrapes
            .with_label_values(&[self.options.hostname.as_str(), self.options.usage.as_str()])
            .get()
    }

    async fn probe(&self) -> Result<RootInfo> {
        let raw = self.client.get("/").await?;
        stats::parse_root(&raw.body)
    }

    /// Runs every collector concurrently and joins them all.
    ///
    /// A failed or panicked collector contributes nothing. Dropping the
    /// returned future aborts the collectors still running.
    async fn fan_out(&self, failures: &IntCounterVec) -> Vec<MetricSample> {
        let mut tasks = JoinSet::new();
        let mut names = HashMap::with_capacity(self.collectors.len());

        for collector in &self.collectors {
            let collector = Arc::clone(collector);
            let name = collector.name();
            let handle = tasks.spawn(async move { collector.collect().await });
            names.insert(handle.id(), name);
        }

        let mut samples = Vec::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, result)) => (id, result),
                Err(join_err) => {
                    let id = join_err.id();
                    let name = names.get(&id).copied().unwrap_or("unknown");
                    error!(collector = name, error = %join_err, "collector task failed");
                    self.record_failure(failures, name);
                    continue;
                }
            };

            let name = names.get(&id).copied().unwrap_or("unknown");
            match result {
                Ok(batch) => samples.extend(batch),
                Err(err) => {
                    error!(collector = name, error = %err, "collector failed");
                    self.record_failure(failures, name);
                }
            }
        }
        samples
    }

    fn record_failure(&self, failures: &IntCounterVec, collector: &str) {
        failures
            .with_label_values(&[
                self.options.hostname.as_str(),
                self.options.usage.as_str(),
                collector,
            ])
            .inc();
    }
}
