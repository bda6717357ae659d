//! Prometheus-compatible metrics for the reasoning engine.
//!
//! Counters cover question volume and the recoverable failure paths
//! (unresolved mentions, store outages, degraded answers); histograms cover
//! answer latency, live path latency and startup warm-up time.

use prometheus::{self, Histogram, HistogramOpts, IntCounter, IntGauge, Registry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Global metrics instance.
static METRICS: std::sync::OnceLock<Arc<Metrics>> = std::sync::OnceLock::new();

/// Get or initialize the global metrics instance.
pub fn get_metrics() -> Arc<Metrics> {
    METRICS.get_or_init(|| Arc::new(Metrics::new())).clone()
}

/// Latency buckets in seconds, from 100µs (cache-only answers) to 10s.
fn default_latency_buckets() -> Vec<f64> {
    vec![
        0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0,
    ]
}

fn register_counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("failed to create counter");
    registry
        .register(Box::new(counter.clone()))
        .expect("failed to register metric");
    counter
}

fn register_gauge(registry: &Registry, name: &str, help: &str) -> IntGauge {
    let gauge = IntGauge::new(name, help).expect("failed to create gauge");
    registry
        .register(Box::new(gauge.clone()))
        .expect("failed to register metric");
    gauge
}

fn register_histogram(registry: &Registry, name: &str, help: &str) -> Histogram {
    let histogram =
        Histogram::with_opts(HistogramOpts::new(name, help).buckets(default_latency_buckets()))
            .expect("failed to create histogram");
    registry
        .register(Box::new(histogram.clone()))
        .expect("failed to register metric");
    histogram
}

/// All metrics for the engine.
pub struct Metrics {
    /// Prometheus registry for all metrics.
    pub registry: Registry,

    // =========================================================================
    // Counters
    // =========================================================================
    pub boolean_questions_total: IntCounter,
    pub mcq_questions_total: IntCounter,
    pub reason_questions_total: IntCounter,
    /// Questions where fewer entities resolved than the pattern needed.
    pub unresolved_entities_total: IntCounter,
    /// Resolutions decided by the deterministic tie-break.
    pub ambiguous_matches_total: IntCounter,
    /// Lookups answered from the relationship cache.
    pub cache_hits_total: IntCounter,
    /// Lookups for names absent from the relationship cache.
    pub cache_misses_total: IntCounter,
    pub live_queries_total: IntCounter,
    pub path_memo_hits_total: IntCounter,
    pub store_errors_total: IntCounter,
    /// Answers produced after a live query failed.
    pub degraded_answers_total: IntCounter,

    // =========================================================================
    // Gauges
    // =========================================================================
    pub cached_edges: IntGauge,
    pub canonical_names: IntGauge,
    pub alias_entries: IntGauge,
    /// Unix timestamp of the last snapshot build.
    pub snapshot_built_at: IntGauge,

    // =========================================================================
    // Histograms (durations in seconds)
    // =========================================================================
    pub answer_duration_seconds: Histogram,
    pub live_query_duration_seconds: Histogram,
    pub warmup_duration_seconds: Histogram,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with all metrics registered.
    pub fn new() -> Self {
        let registry = Registry::new();
        let r = &registry;

        Self {
            boolean_questions_total: register_counter(
                r,
                "kgqa_boolean_questions_total",
                "Total number of boolean questions answered",
            ),
            mcq_questions_total: register_counter(
                r,
                "kgqa_mcq_questions_total",
                "Total number of multiple-choice questions answered",
            ),
            reason_questions_total: register_counter(
                r,
                "kgqa_reason_questions_total",
                "Total number of open questions reasoned over",
            ),
            unresolved_entities_total: register_counter(
                r,
                "kgqa_unresolved_entities_total",
                "Questions answered with fewer resolved entities than required",
            ),
            ambiguous_matches_total: register_counter(
                r,
                "kgqa_ambiguous_matches_total",
                "Entity resolutions decided by tie-break",
            ),
            cache_hits_total: register_counter(
                r,
                "kgqa_cache_hits_total",
                "Total number of relationship cache hits",
            ),
            cache_misses_total: register_counter(
                r,
                "kgqa_cache_misses_total",
                "Total number of relationship cache misses",
            ),
            live_queries_total: register_counter(
                r,
                "kgqa_live_queries_total",
                "Total number of live graph queries issued",
            ),
            path_memo_hits_total: register_counter(
                r,
                "kgqa_path_memo_hits_total",
                "Live path lookups served from the memo",
            ),
            store_errors_total: register_counter(
                r,
                "kgqa_store_errors_total",
                "Total number of failed or timed-out live queries",
            ),
            degraded_answers_total: register_counter(
                r,
                "kgqa_degraded_answers_total",
                "Answers produced after a live query failure",
            ),
            cached_edges: register_gauge(r, "kgqa_cached_edges", "Edges held in the relationship cache"),
            canonical_names: register_gauge(
                r,
                "kgqa_canonical_names",
                "Canonical names held in the entity index",
            ),
            alias_entries: register_gauge(r, "kgqa_alias_entries", "Entries in the alias table"),
            snapshot_built_at: register_gauge(
                r,
                "kgqa_snapshot_built_at",
                "Unix time of the last knowledge snapshot build",
            ),
            answer_duration_seconds: register_histogram(
                r,
                "kgqa_answer_duration_seconds",
                "Question answering duration in seconds",
            ),
            live_query_duration_seconds: register_histogram(
                r,
                "kgqa_live_query_duration_seconds",
                "Live graph query duration in seconds",
            ),
            warmup_duration_seconds: register_histogram(
                r,
                "kgqa_warmup_duration_seconds",
                "Knowledge snapshot build duration in seconds",
            ),
            registry,
        }
    }

    /// Export metrics in Prometheus text format.
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!("Failed to encode metrics: {}", e);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Export metrics as JSON.
    pub fn export_json(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: MetricsCounters {
                boolean_questions_total: self.boolean_questions_total.get(),
                mcq_questions_total: self.mcq_questions_total.get(),
                reason_questions_total: self.reason_questions_total.get(),
                unresolved_entities_total: self.unresolved_entities_total.get(),
                ambiguous_matches_total: self.ambiguous_matches_total.get(),
                cache_hits_total: self.cache_hits_total.get(),
                cache_misses_total: self.cache_misses_total.get(),
                live_queries_total: self.live_queries_total.get(),
                path_memo_hits_total: self.path_memo_hits_total.get(),
                store_errors_total: self.store_errors_total.get(),
                degraded_answers_total: self.degraded_answers_total.get(),
            },
            gauges: MetricsGauges {
                cached_edges: self.cached_edges.get(),
                canonical_names: self.canonical_names.get(),
                alias_entries: self.alias_entries.get(),
                snapshot_built_at: self.snapshot_built_at.get(),
            },
            histograms: MetricsHistograms {
                answer_duration_seconds: HistogramSnapshot::from_prometheus(
                    &self.answer_duration_seconds,
                ),
                live_query_duration_seconds: HistogramSnapshot::from_prometheus(
                    &self.live_query_duration_seconds,
                ),
                warmup_duration_seconds: HistogramSnapshot::from_prometheus(
                    &self.warmup_duration_seconds,
                ),
            },
        }
    }

    /// Start a timer that records duration to a histogram when dropped.
    pub fn start_timer(histogram: &Histogram) -> HistogramTimer {
        HistogramTimer {
            histogram: histogram.clone(),
            start: Instant::now(),
        }
    }
}

/// Timer that records duration to a histogram when dropped.
pub struct HistogramTimer {
    histogram: Histogram,
    start: Instant,
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

impl HistogramTimer {
    /// Get the elapsed time without stopping the timer.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Serializable snapshot of all metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub counters: MetricsCounters,
    pub gauges: MetricsGauges,
    pub histograms: MetricsHistograms,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsCounters {
    pub boolean_questions_total: u64,
    pub mcq_questions_total: u64,
    pub reason_questions_total: u64,
    pub unresolved_entities_total: u64,
    pub ambiguous_matches_total: u64,
    pub cache_hits_total: u64,
    pub cache_misses_total: u64,
    pub live_queries_total: u64,
    pub path_memo_hits_total: u64,
    pub store_errors_total: u64,
    pub degraded_answers_total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsGauges {
    pub cached_edges: i64,
    pub canonical_names: i64,
    pub alias_entries: i64,
    pub snapshot_built_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsHistograms {
    pub answer_duration_seconds: HistogramSnapshot,
    pub live_query_duration_seconds: HistogramSnapshot,
    pub warmup_duration_seconds: HistogramSnapshot,
}

/// Snapshot of a histogram for serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum: f64,
    pub mean: Option<f64>,
}

impl HistogramSnapshot {
    /// Create a snapshot from a prometheus histogram.
    pub fn from_prometheus(h: &Histogram) -> Self {
        let count = h.get_sample_count();
        let sum = h.get_sample_sum();
        Self {
            count,
            sum,
            mean: (count > 0).then(|| sum / count as f64),
        }
    }
}
