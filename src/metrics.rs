//! Observability: bounded histograms for block processing and session control.
//! Hosts read them as a p50/p95/p99 summary.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

/// A span measuring elapsed time from creation to explicit end.
pub struct TimingSpan {
    name: &'static str,
    start: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    /// End the span, recording elapsed duration in microseconds.
    pub fn finish(self) -> f64 {
        let elapsed_us = self.start.elapsed().as_micros() as f64;
        self.registry.record(self.name, elapsed_us);
        elapsed_us
    }
}

/// Most recent samples per metric, oldest evicted first.
pub struct MetricsRegistry {
    histograms: Mutex<HashMap<&'static str, VecDeque<f64>>>,
    window: usize,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_window(1024)
    }

    pub fn with_window(window: usize) -> Self {
        Self {
            histograms: Mutex::new(HashMap::new()),
            window: window.max(1),
        }
    }

    pub fn record(&self, name: &'static str, value: f64) {
        let mut hists = self.histograms.lock();
        let samples = hists
            .entry(name)
            .or_insert_with(|| VecDeque::with_capacity(self.window));
        if samples.len() == self.window {
            samples.pop_front();
        }
        samples.push_back(value);
        tracing::trace!(metric = name, value, "metric_recorded");
    }

    /// Start a timing span that records on finish.
    pub fn span(self: &Arc<Self>, name: &'static str) -> TimingSpan {
        TimingSpan {
            name,
            start: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    pub fn summary(&self) -> HashMap<String, MetricSummary> {
        let hists = self.histograms.lock();
        hists
            .iter()
            .map(|(&name, samples)| (name.to_string(), MetricSummary::of(samples)))
            .collect()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricSummary {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub count: usize,
}

impl MetricSummary {
    fn of(samples: &VecDeque<f64>) -> Self {
        let mut sorted: Vec<f64> = samples.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        let rank = |p: f64| match sorted.len() {
            0 => 0.0,
            n => sorted[((p / 100.0) * (n - 1) as f64).round() as usize],
        };
        Self {
            p50: rank(50.0),
            p95: rank(95.0),
            p99: rank(99.0),
            count: sorted.len(),
        }
    }
}

/// Well-known metric names (constants to avoid typos).
pub mod metric_names {
    /// Estimator + detector time per captured block, microseconds.
    pub const BLOCK_PROCESS: &str = "t_block_process";
    /// Published detection scores (only non-zero ones).
    pub const EVENT_SCORE: &str = "event_score";
    pub const SESSION_START: &str = "t_session_start";
    pub const SESSION_STOP: &str = "t_session_stop";
    /// Stop request to worker exit, microseconds.
    pub const CANCEL_LATENCY: &str = "cancel_latency";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_over_known_samples() {
        let reg = MetricsRegistry::new();
        for v in 1..=100 {
            reg.record(metric_names::BLOCK_PROCESS, v as f64);
        }
        let s = &reg.summary()[metric_names::BLOCK_PROCESS];
        assert_eq!(s.count, 100);
        assert!((50.0..=51.0).contains(&s.p50));
        assert_eq!(s.p95, 95.0);
        assert_eq!(s.p99, 99.0);
    }

    #[test]
    fn window_keeps_latest_samples() {
        let reg = MetricsRegistry::with_window(4);
        for v in [500.0, 400.0, 1.0, 2.0, 3.0, 4.0] {
            reg.record(metric_names::EVENT_SCORE, v);
        }
        let s = &reg.summary()[metric_names::EVENT_SCORE];
        assert_eq!(s.count, 4);
        assert_eq!(s.p99, 4.0);
    }

    #[test]
    fn empty_registry_has_no_summary() {
        assert!(MetricsRegistry::new().summary().is_empty());
    }

    #[test]
    fn span_records_on_finish() {
        let reg = Arc::new(MetricsRegistry::new());
        reg.span(metric_names::SESSION_START).finish();
        assert_eq!(reg.summary()[metric_names::SESSION_START].count, 1);
    }
}
