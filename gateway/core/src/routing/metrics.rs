//! Gateway Metrics
//!
//! Per-(model, tenant) request counters and latency histograms, exposed in
//! Prometheus text format.
//!
//! Recording never fails the request path. When a sample cannot be recorded
//! (too many series, nonsense latency) it is logged, counted in
//! `llm_metrics_dropped_total` and discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use thiserror::Error;
use tracing::warn;

/// Latency bucket upper bounds, in seconds
pub const LATENCY_BUCKETS: [f64; 14] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0,
];

/// Default ceiling on distinct (model, tenant) series
pub const DEFAULT_MAX_SERIES: usize = 10_000;

/// Why a sample was dropped
#[derive(Clone, Debug, Error, PartialEq)]
pub enum MetricsError {
    /// Adding a new series would exceed the cardinality ceiling
    #[error("metrics series limit of {limit} reached")]
    CardinalityExceeded {
        /// Configured ceiling
        limit: usize,
    },

    /// Latency was negative or not a finite number
    #[error("invalid latency observation {0}")]
    InvalidLatency(f64),
}

// ============================================================================
// Counter
// ============================================================================

/// Monotonic atomic counter
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Create a zeroed counter
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Current value
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Histogram
// ============================================================================

/// Bucketed latency histogram with a trailing `+Inf` bucket
#[derive(Debug)]
pub struct Histogram {
    /// Non-cumulative count per bucket, `LATENCY_BUCKETS.len() + 1` entries
    counts: Vec<AtomicU64>,
    total_count: AtomicU64,
    /// Sum of observations in microseconds
    sum_micros: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    /// Create an empty histogram over `LATENCY_BUCKETS`
    pub fn new() -> Self {
        Self {
            counts: (0..=LATENCY_BUCKETS.len())
                .map(|_| AtomicU64::new(0))
                .collect(),
            total_count: AtomicU64::new(0),
            sum_micros: AtomicU64::new(0),
        }
    }

    /// Record an observation in seconds
    pub fn observe(&self, seconds: f64) {
        let idx = LATENCY_BUCKETS
            .iter()
            .position(|&b| seconds <= b)
            .unwrap_or(LATENCY_BUCKETS.len());

        self.counts[idx].fetch_add(1, Ordering::Relaxed);
        self.total_count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros
            .fetch_add((seconds * 1_000_000.0).round() as u64, Ordering::Relaxed);
    }

    /// Number of observations
    pub fn count(&self) -> u64 {
        self.total_count.load(Ordering::Relaxed)
    }

    /// Get histogram snapshot
    pub fn snapshot(&self) -> HistogramSnapshot {
        let mut cumulative = 0;
        let buckets = self
            .counts
            .iter()
            .map(|c| {
                cumulative += c.load(Ordering::Relaxed);
                cumulative
            })
            .collect();

        HistogramSnapshot {
            cumulative: buckets,
            count: self.count(),
            sum_seconds: self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        }
    }
}

/// Snapshot of histogram data
#[derive(Clone, Debug, PartialEq)]
pub struct HistogramSnapshot {
    /// Cumulative counts aligned with `LATENCY_BUCKETS`, then `+Inf`
    pub cumulative: Vec<u64>,
    /// Total observations
    pub count: u64,
    /// Sum of observations in seconds
    pub sum_seconds: f64,
}

// ============================================================================
// Recorder
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct SeriesKey {
    model: String,
    org: String,
}

impl SeriesKey {
    fn new(model: &str, org: &str) -> Self {
        Self {
            model: model.to_string(),
            org: org.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct Series {
    requests: Counter,
    latency: Histogram,
}

/// Request and latency aggregation keyed by (model, tenant)
#[derive(Debug)]
pub struct MetricsRecorder {
    series: DashMap<SeriesKey, Arc<Series>>,
    max_series: usize,
    dropped: Counter,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    /// Create a recorder with the default series ceiling
    pub fn new() -> Self {
        Self::with_max_series(DEFAULT_MAX_SERIES)
    }

    /// Create a recorder with a custom series ceiling
    pub fn with_max_series(max_series: usize) -> Self {
        Self {
            series: DashMap::new(),
            max_series,
            dropped: Counter::new(),
        }
    }

    fn series(&self, model_id: &str, tenant_id: &str) -> Result<Arc<Series>, MetricsError> {
        let key = SeriesKey::new(model_id, tenant_id);
        if let Some(series) = self.series.get(&key) {
            return Ok(Arc::clone(series.value()));
        }
        if self.series.len() >= self.max_series {
            return Err(MetricsError::CardinalityExceeded {
                limit: self.max_series,
            });
        }
        Ok(Arc::clone(self.series.entry(key).or_default().value()))
    }

    /// Count one completed request, reporting failures to the caller
    pub fn try_record_request(&self, model_id: &str, tenant_id: &str) -> Result<(), MetricsError> {
        self.series(model_id, tenant_id)?.requests.inc();
        Ok(())
    }

    /// Record one latency observation, reporting failures to the caller
    pub fn try_record_latency(
        &self,
        model_id: &str,
        tenant_id: &str,
        seconds: f64,
    ) -> Result<(), MetricsError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(MetricsError::InvalidLatency(seconds));
        }
        self.series(model_id, tenant_id)?.latency.observe(seconds);
        Ok(())
    }

    /// Count one completed request
    pub fn record_request(&self, model_id: &str, tenant_id: &str) {
        if let Err(e) = self.try_record_request(model_id, tenant_id) {
            self.drop_sample(model_id, tenant_id, &e);
        }
    }

    /// Record one latency observation
    pub fn record_latency(&self, model_id: &str, tenant_id: &str, seconds: f64) {
        if let Err(e) = self.try_record_latency(model_id, tenant_id, seconds) {
            self.drop_sample(model_id, tenant_id, &e);
        }
    }

    fn drop_sample(&self, model_id: &str, tenant_id: &str, error: &MetricsError) {
        self.dropped.inc();
        warn!(model_id = %model_id, tenant = %tenant_id, error = %error, "Dropping metrics sample");
    }

    /// Start a latency timer that records when dropped
    pub fn start_timer<'a>(&'a self, model_id: &str, tenant_id: &str) -> LatencyTimer<'a> {
        LatencyTimer {
            recorder: self,
            model_id: model_id.to_string(),
            tenant_id: tenant_id.to_string(),
            start: Instant::now(),
        }
    }

    /// Requests counted for a series
    #[must_use]
    pub fn request_count(&self, model_id: &str, tenant_id: &str) -> u64 {
        self.series
            .get(&SeriesKey::new(model_id, tenant_id))
            .map_or(0, |s| s.requests.get())
    }

    /// Latency observations for a series
    #[must_use]
    pub fn latency_count(&self, model_id: &str, tenant_id: &str) -> u64 {
        self.series
            .get(&SeriesKey::new(model_id, tenant_id))
            .map_or(0, |s| s.latency.count())
    }

    /// Latency snapshot for a series
    #[must_use]
    pub fn latency_snapshot(&self, model_id: &str, tenant_id: &str) -> Option<HistogramSnapshot> {
        self.series
            .get(&SeriesKey::new(model_id, tenant_id))
            .map(|s| s.latency.snapshot())
    }

    /// Samples discarded so far
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.get()
    }

    /// Number of live series
    #[must_use]
    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Export metrics in Prometheus text format
    pub fn render_prometheus(&self) -> String {
        let mut series: Vec<(SeriesKey, Arc<Series>)> = self
            .series
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        series.sort_by(|a, b| a.0.cmp(&b.0));

        let mut output = String::new();

        output.push_str(
            "# HELP llm_requests_total Completed completion requests\n\
             # TYPE llm_requests_total counter\n",
        );
        for (key, s) in &series {
            output.push_str(&format!(
                "llm_requests_total{{{}}} {}\n",
                labels(key),
                s.requests.get()
            ));
        }
        output.push('\n');

        output.push_str(
            "# HELP llm_latency_seconds Completion request latency\n\
             # TYPE llm_latency_seconds histogram\n",
        );
        for (key, s) in &series {
            let labels = labels(key);
            let snapshot = s.latency.snapshot();
            for (bound, count) in LATENCY_BUCKETS.iter().zip(&snapshot.cumulative) {
                output.push_str(&format!(
                    "llm_latency_seconds_bucket{{{labels},le=\"{bound}\"}} {count}\n"
                ));
            }
            output.push_str(&format!(
                "llm_latency_seconds_bucket{{{labels},le=\"+Inf\"}} {}\n",
                snapshot.count
            ));
            output.push_str(&format!(
                "llm_latency_seconds_sum{{{labels}}} {}\n",
                snapshot.sum_seconds
            ));
            output.push_str(&format!(
                "llm_latency_seconds_count{{{labels}}} {}\n",
                snapshot.count
            ));
        }
        output.push('\n');

        output.push_str(&format!(
            "# HELP llm_metrics_dropped_total Metrics samples discarded\n\
             # TYPE llm_metrics_dropped_total counter\n\
             llm_metrics_dropped_total {}\n",
            self.dropped.get()
        ));

        output
    }
}

fn labels(key: &SeriesKey) -> String {
    format!(
        "model=\"{}\",org=\"{}\"",
        escape_label(&key.model),
        escape_label(&key.org)
    )
}

fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

// ============================================================================
// Latency timer
// ============================================================================

/// Records elapsed time for one request when dropped
///
/// Dropping happens on every exit path, including cancellation of the
/// enclosing future, so each request yields exactly one observation.
#[derive(Debug)]
pub struct LatencyTimer<'a> {
    recorder: &'a MetricsRecorder,
    model_id: String,
    tenant_id: String,
    start: Instant,
}

impl Drop for LatencyTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed().as_secs_f64();
        self.recorder
            .record_latency(&self.model_id, &self.tenant_id, elapsed);
    }
}
