//! Observability module
//!
//! In-process counters and histograms for rule, mapping and pipeline
//! execution. Structured logs go through `tracing`; these metrics back the
//! server's `/metrics` endpoint.

pub mod metrics;

pub use metrics::{Counter, Histogram, HistogramSummary, Metrics, MetricsCollector, MetricsSnapshot};
