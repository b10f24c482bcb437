// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-process metrics.
//!
//! Tool latency and success, per-operation latency histograms, and token
//! counts. Operation names in use: `workspace.boot`, `provider.request`,
//! `agent.submit`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

/// Global metrics instance.
pub static GLOBAL_METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

/// Central metrics collection.
#[derive(Debug)]
pub struct Metrics {
    tools: RwLock<BTreeMap<String, ToolMetrics>>,
    operations: RwLock<BTreeMap<String, OperationMetrics>>,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    start_time: Instant,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(BTreeMap::new()),
            operations: RwLock::new(BTreeMap::new()),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a tool execution.
    pub fn record_tool(&self, name: &str, duration: Duration, success: bool) {
        write(&self.tools)
            .entry(name.to_string())
            .or_default()
            .record(duration, success);
    }

    /// Record a named operation.
    pub fn record_operation(&self, name: &str, duration: Duration) {
        write(&self.operations)
            .entry(name.to_string())
            .or_default()
            .record(duration);
    }

    /// Record token usage.
    pub fn record_tokens(&self, input: u64, output: u64) {
        self.input_tokens.fetch_add(input, Ordering::Relaxed);
        self.output_tokens.fetch_add(output, Ordering::Relaxed);
    }

    pub fn tool_metrics(&self, name: &str) -> Option<ToolMetrics> {
        read(&self.tools).get(name).cloned()
    }

    pub fn operation_metrics(&self, name: &str) -> Option<OperationMetrics> {
        read(&self.operations).get(name).cloned()
    }

    /// Total (input, output) tokens.
    pub fn token_counts(&self) -> (u64, u64) {
        (
            self.input_tokens.load(Ordering::Relaxed),
            self.output_tokens.load(Ordering::Relaxed),
        )
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Take a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let (input_tokens, output_tokens) = self.token_counts();
        MetricsSnapshot {
            tools: read(&self.tools).clone(),
            operations: read(&self.operations).clone(),
            input_tokens,
            output_tokens,
            uptime: self.uptime(),
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        write(&self.tools).clear();
        write(&self.operations).clear();
        self.input_tokens.store(0, Ordering::Relaxed);
        self.output_tokens.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics for a specific tool.
#[derive(Debug, Clone, Default)]
pub struct ToolMetrics {
    pub invocations: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_duration: Duration,
    pub max_duration: Duration,
}

impl ToolMetrics {
    pub fn record(&mut self, duration: Duration, success: bool) {
        self.invocations += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.total_duration += duration;
        self.max_duration = self.max_duration.max(duration);
    }

    pub fn avg_duration(&self) -> Duration {
        average(self.total_duration, self.invocations)
    }

    /// Success rate (0.0 to 1.0). A tool never called counts as 1.0.
    pub fn success_rate(&self) -> f64 {
        if self.invocations == 0 {
            1.0
        } else {
            self.successes as f64 / self.invocations as f64
        }
    }
}

/// Operation metrics with a latency histogram.
#[derive(Debug, Clone, Default)]
pub struct OperationMetrics {
    pub count: u64,
    pub total_duration: Duration,
    pub max_duration: Duration,
    pub histogram: Histogram,
}

impl OperationMetrics {
    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total_duration += duration;
        self.max_duration = self.max_duration.max(duration);
        self.histogram.record(duration);
    }

    pub fn avg_duration(&self) -> Duration {
        average(self.total_duration, self.count)
    }
}

fn average(total: Duration, count: u64) -> Duration {
    match u32::try_from(count) {
        Ok(0) => Duration::ZERO,
        Ok(n) => total / n,
        Err(_) => Duration::from_secs_f64(total.as_secs_f64() / count as f64),
    }
}

/// Fixed-bucket latency histogram.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Upper bounds in microseconds; one overflow bucket follows.
    buckets: Vec<u64>,
    counts: Vec<u64>,
}

impl Histogram {
    /// Create a histogram with custom bucket boundaries (in microseconds).
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = vec![0; buckets.len() + 1];
        Self { buckets, counts }
    }

    pub fn record(&mut self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        let index = self
            .buckets
            .iter()
            .position(|&b| micros <= b)
            .unwrap_or(self.buckets.len());
        self.counts[index] += 1;
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    /// Upper bound of the bucket holding the `p`th percentile.
    ///
    /// The overflow bucket reports ten times the largest bound.
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;
        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                let micros = match self.buckets.get(i) {
                    Some(&bound) => bound,
                    None => self.buckets.last().copied().unwrap_or(0) * 10,
                };
                return Duration::from_micros(micros);
            }
        }
        Duration::ZERO
    }

    pub fn p50(&self) -> Duration {
        self.percentile(50.0)
    }

    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // 1ms, 10ms, 100ms, 1s, 10s, 60s. Provider requests routinely take seconds.
        Self::with_buckets(vec![1_000, 10_000, 100_000, 1_000_000, 10_000_000, 60_000_000])
    }
}

/// A snapshot of all metrics at a point in time.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub tools: BTreeMap<String, ToolMetrics>,
    pub operations: BTreeMap<String, OperationMetrics>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Format as a human-readable report, sorted by name.
    pub fn format_report(&self) -> String {
        let mut report = format!(
            "Uptime: {:.2?}\nTokens: {} input, {} output\n",
            self.uptime, self.input_tokens, self.output_tokens
        );

        if !self.tools.is_empty() {
            report.push_str("\nTools:\n");
            for (name, metrics) in &self.tools {
                report.push_str(&format!(
                    "  {}: {} calls, {:.1}% success, avg {:.2?}\n",
                    name,
                    metrics.invocations,
                    metrics.success_rate() * 100.0,
                    metrics.avg_duration()
                ));
            }
        }

        if !self.operations.is_empty() {
            report.push_str("\nOperations:\n");
            for (name, metrics) in &self.operations {
                report.push_str(&format!(
                    "  {}: {} ops, avg {:.2?}, p50 {:.2?}, p99 {:.2?}\n",
                    name,
                    metrics.count,
                    metrics.avg_duration(),
                    metrics.histogram.p50(),
                    metrics.histogram.p99()
                ));
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_metrics() {
        let mut metrics = ToolMetrics::default();
        metrics.record(Duration::from_millis(100), true);
        metrics.record(Duration::from_millis(200), true);
        metrics.record(Duration::from_millis(50), false);

        assert_eq!(metrics.invocations, 3);
        assert_eq!(metrics.failures, 1);
        assert_eq!(metrics.max_duration, Duration::from_millis(200));
        assert!((metrics.success_rate() - 0.666).abs() < 0.01);
    }

    #[test]
    fn test_operation_metrics() {
        let mut metrics = OperationMetrics::default();
        metrics.record(Duration::from_millis(10));
        metrics.record(Duration::from_millis(20));
        metrics.record(Duration::from_millis(30));

        assert_eq!(metrics.count, 3);
        assert_eq!(metrics.avg_duration(), Duration::from_millis(20));
    }

    #[test]
    fn test_histogram_buckets_and_percentiles() {
        let mut hist = Histogram::default();
        hist.record(Duration::from_micros(500));
        hist.record(Duration::from_millis(5));
        hist.record(Duration::from_secs(2));
        hist.record(Duration::from_secs(120));

        assert_eq!(hist.counts(), &[1, 1, 0, 0, 1, 0, 1]);
        assert_eq!(hist.p50(), Duration::from_millis(10));
        assert_eq!(hist.p99(), Duration::from_secs(600));
    }

    #[test]
    fn test_snapshot_and_report() {
        let metrics = Metrics::new();
        metrics.record_tool("read_file", Duration::from_millis(3), true);
        metrics.record_operation("provider.request", Duration::from_millis(800));
        metrics.record_tokens(1000, 500);

        let snapshot = metrics.snapshot();
        assert!(snapshot.tools.contains_key("read_file"));
        assert_eq!(snapshot.input_tokens, 1000);

        let report = snapshot.format_report();
        assert!(report.contains("Tokens: 1000 input, 500 output"));
        assert!(report.contains("read_file: 1 calls, 100.0% success"));
        assert!(report.contains("provider.request: 1 ops"));
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = Metrics::new();
        metrics.record_tool("grep_search", Duration::from_millis(100), true);
        metrics.record_tokens(100, 50);

        metrics.reset();

        assert!(metrics.tool_metrics("grep_search").is_none());
        assert_eq!(metrics.token_counts(), (0, 0));
    }
}
