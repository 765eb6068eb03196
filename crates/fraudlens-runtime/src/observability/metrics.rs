//! In-process assessment metrics

use fraudlens_core::{Action, RiskLevel};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Assessments completed
pub const ASSESSMENTS_TOTAL: &str = "assessments_total";
/// Assessments that fell back to the analysis-error result
pub const ASSESSMENT_ERRORS: &str = "assessment_errors";
/// Assessment latency in seconds
pub const ASSESSMENT_DURATION: &str = "assessment_duration";
/// Blacklist and whitelist short-circuits
pub const BLACKLIST_HITS: &str = "blacklist_hits";
pub const WHITELIST_HITS: &str = "whitelist_hits";

/// Monotonic counter
#[derive(Debug)]
pub struct Counter {
    name: String,
    value: RwLock<u64>,
}

impl Counter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: RwLock::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, value: u64) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) += value;
    }

    pub fn get(&self) -> u64 {
        *self.value.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reset(&self) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = 0;
    }
}

/// Upper bounds in seconds of the default latency buckets
pub const DEFAULT_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

#[derive(Debug)]
struct HistogramState {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    /// One count per bound, plus the overflow bucket
    buckets: Vec<u64>,
}

impl HistogramState {
    fn empty(bucket_count: usize) -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            buckets: vec![0; bucket_count + 1],
        }
    }
}

/// Bucketed distribution of observed values
///
/// Keeps counts, not samples, so memory stays fixed however many values are
/// observed. Percentiles are estimated as the upper bound of the bucket
/// holding the requested rank, capped at the largest observed value.
#[derive(Debug)]
pub struct Histogram {
    name: String,
    bounds: Vec<f64>,
    state: RwLock<HistogramState>,
}

impl Histogram {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_buckets(name, DEFAULT_LATENCY_BUCKETS.to_vec())
    }

    /// Histogram with custom bucket upper bounds
    pub fn with_buckets(name: impl Into<String>, mut bounds: Vec<f64>) -> Self {
        bounds.retain(|b| !b.is_nan());
        bounds.sort_by(|a, b| a.total_cmp(b));
        bounds.dedup();
        let state = HistogramState::empty(bounds.len());
        Self {
            name: name.into(),
            bounds,
            state: RwLock::new(state),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn observe(&self, value: f64) {
        if value.is_nan() {
            return;
        }
        let bucket = self.bounds.partition_point(|bound| *bound < value);
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.count += 1;
        state.sum += value;
        state.min = state.min.min(value);
        state.max = state.max.max(value);
        state.buckets[bucket] += 1;
    }

    /// Observe a duration in seconds
    pub fn observe_duration(&self, duration: Duration) {
        self.observe(duration.as_secs_f64());
    }

    pub fn count(&self) -> u64 {
        self.state.read().unwrap_or_else(PoisonError::into_inner).count
    }

    pub fn sum(&self) -> f64 {
        self.state.read().unwrap_or_else(PoisonError::into_inner).sum
    }

    pub fn avg(&self) -> f64 {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.count == 0 {
            0.0
        } else {
            state.sum / state.count as f64
        }
    }

    /// Largest observed value, 0 when empty
    pub fn max(&self) -> f64 {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.count == 0 {
            0.0
        } else {
            state.max
        }
    }

    /// Estimated percentile, `p` in 0-100
    pub fn percentile(&self, p: f64) -> f64 {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.count == 0 {
            return 0.0;
        }

        let rank = ((p.clamp(0.0, 100.0) / 100.0) * state.count as f64).ceil().max(1.0) as u64;
        let mut seen = 0;
        for (i, count) in state.buckets.iter().enumerate() {
            seen += count;
            if seen >= rank {
                return match self.bounds.get(i) {
                    Some(bound) => bound.min(state.max),
                    None => state.max,
                };
            }
        }
        state.max
    }

    pub fn reset(&self) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) =
            HistogramState::empty(self.bounds.len());
    }
}

/// Summary of one histogram
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramSummary {
    pub count: u64,
    pub avg: f64,
    pub p50: f64,
    pub p95: f64,
    pub max: f64,
}

/// Point-in-time copy of all metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub histograms: BTreeMap<String, HistogramSummary>,
}

/// Metrics sink used by the assessment pipeline
pub trait Metrics: Send + Sync {
    fn counter(&self, name: &str) -> Arc<Counter>;

    fn histogram(&self, name: &str) -> Arc<Histogram>;

    /// Record a completed assessment
    fn record_assessment(&self, level: RiskLevel, recommendation: Action, duration: Duration) {
        self.counter(ASSESSMENTS_TOTAL).inc();
        self.counter(&format!("assessments_level_{}", level)).inc();
        self.counter(&format!("recommendations_{}", recommendation)).inc();
        self.histogram(ASSESSMENT_DURATION).observe_duration(duration);
    }

    /// Record a generator that failed or timed out
    fn record_generator_failure(&self, generator: &str) {
        self.counter(&format!("generator_failures_{}", generator)).inc();
    }
}

/// Registry of named counters and histograms
#[derive(Debug, Default)]
pub struct MetricsCollector {
    counters: RwLock<HashMap<String, Arc<Counter>>>,
    histograms: RwLock<HashMap<String, Arc<Histogram>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Current value of a counter, 0 if it was never touched
    pub fn counter_value(&self, name: &str) -> u64 {
        self.counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map_or(0, |c| c.get())
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self
            .counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, c)| (name.clone(), c.get()))
            .collect();
        let histograms = self
            .histograms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, h)| {
                (
                    name.clone(),
                    HistogramSummary {
                        count: h.count(),
                        avg: h.avg(),
                        p50: h.percentile(50.0),
                        p95: h.percentile(95.0),
                        max: h.max(),
                    },
                )
            })
            .collect();
        MetricsSnapshot {
            counters,
            histograms,
        }
    }

    pub fn reset_all(&self) {
        for counter in self
            .counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
        {
            counter.reset();
        }
        for histogram in self
            .histograms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
        {
            histogram.reset();
        }
    }
}

impl Metrics for MetricsCollector {
    fn counter(&self, name: &str) -> Arc<Counter> {
        self.counters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Counter::new(name)))
            .clone()
    }

    fn histogram(&self, name: &str) -> Arc<Histogram> {
        self.histograms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Histogram::new(name)))
            .clone()
    }
}
