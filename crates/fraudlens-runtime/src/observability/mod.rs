//! Observability
//!
//! In-process counters and histograms for the assessment pipeline. Logging
//! goes through `tracing`; exporters are left to the embedding application.

pub mod metrics;

pub use metrics::{Counter, Histogram, HistogramSummary, Metrics, MetricsCollector, MetricsSnapshot};
