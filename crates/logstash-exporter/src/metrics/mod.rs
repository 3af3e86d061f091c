//! Metric identities, samples and their text exposition.

pub mod catalog;
pub mod exposition;

pub use catalog::{
    HOSTNAME_LABEL, MetricCatalog, MetricId, MetricIdentity, MetricKind, MetricSample, NO_LABELS,
    USAGE_LABEL,
};
pub use exposition::{CONTENT_TYPE, render, to_families};
