//! Result aggregation and summary rendering

use crate::error::ErrorKind;
use crate::response::{RunMetrics, RunOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// Final benchmark summary
///
/// Averages are `None` when no run succeeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Runs dispatched (the configured run count)
    pub attempted: usize,
    /// Runs that produced metrics
    pub succeeded: usize,
    /// Average completion tokens per successful run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_completion_tokens: Option<f64>,
    /// Average total tokens per successful run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_total_tokens: Option<f64>,
    /// Mean of per-run tokens/sec
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_tok_per_sec: Option<f64>,
    /// Sum of completion tokens
    pub sum_completion_tokens: usize,
    /// Sum of total tokens
    pub sum_total_tokens: usize,
    /// Failure count per kind
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<ErrorKind, usize>,
    /// Latency distribution over successful runs (milliseconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyPercentiles>,
}

impl Summary {
    /// Runs that failed (including ones that never reported, e.g. cancelled)
    pub fn unsuccessful(&self) -> usize {
        self.attempted.saturating_sub(self.succeeded)
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "=== Summary ===")?;
        writeln!(f, "Successful calls  : {} / {}", self.succeeded, self.attempted)?;

        if let (Some(avg_c), Some(avg_t), Some(avg_tps)) = (
            self.avg_completion_tokens,
            self.avg_total_tokens,
            self.avg_tok_per_sec,
        ) {
            writeln!(f, "Avg completion tokens    : {:.2}", avg_c)?;
            writeln!(f, "Avg total tokens         : {:.2}", avg_t)?;
            writeln!(f, "Avg tokens / sec         : {:.2}", avg_tps)?;
            writeln!(f, "Total completion tokens  : {}", self.sum_completion_tokens)?;
            writeln!(f, "Total tokens             : {}", self.sum_total_tokens)?;
        }

        if let Some(latency) = &self.latency {
            writeln!(
                f,
                "Latency ms (p50/p95/p99) : {:.2} / {:.2} / {:.2}",
                latency.p50, latency.p95, latency.p99
            )?;
        }

        if !self.failures.is_empty() {
            let parts: Vec<String> = self
                .failures
                .iter()
                .map(|(kind, count)| format!("{}={}", kind, count))
                .collect();
            writeln!(f, "Failures                 : {}", parts.join(", "))?;
        }

        Ok(())
    }
}

/// Order-agnostic accumulator over run outcomes
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    attempted: usize,
    succeeded: usize,
    sum_completion_tokens: usize,
    sum_total_tokens: usize,
    sum_tok_per_sec: f64,
    latencies_ms: Vec<f64>,
    failures: BTreeMap<ErrorKind, usize>,
}

impl Aggregator {
    /// Create an aggregator for a session of `attempted` runs
    pub fn new(attempted: usize) -> Self {
        Self {
            attempted,
            ..Default::default()
        }
    }

    /// Fold one outcome into the running sums
    pub fn record(&mut self, outcome: &RunOutcome) {
        match outcome {
            RunOutcome::Success(metrics) => self.record_metrics(metrics),
            RunOutcome::Failure(failure) => {
                *self.failures.entry(failure.kind).or_insert(0) += 1;
            }
        }
    }

    fn record_metrics(&mut self, metrics: &RunMetrics) {
        self.succeeded += 1;
        self.sum_completion_tokens += metrics.completion_tokens;
        self.sum_total_tokens += metrics.total_tokens;
        self.sum_tok_per_sec += metrics.tok_per_sec;
        self.latencies_ms.push(metrics.latency_ms);
    }

    /// Number of successful runs recorded so far
    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// Drain the result channel until it closes, then summarize
    ///
    /// The channel closes only after every dispatched task has finished,
    /// so the returned summary covers the complete set of outcomes.
    pub async fn collect(mut self, mut results: mpsc::Receiver<RunOutcome>) -> Summary {
        while let Some(outcome) = results.recv().await {
            self.record(&outcome);
        }
        self.summary()
    }

    /// Compute the summary from the sums recorded so far
    pub fn summary(&self) -> Summary {
        let (avg_completion_tokens, avg_total_tokens, avg_tok_per_sec, latency) =
            if self.succeeded > 0 {
                let n = self.succeeded as f64;
                (
                    Some(self.sum_completion_tokens as f64 / n),
                    Some(self.sum_total_tokens as f64 / n),
                    Some(self.sum_tok_per_sec / n),
                    Some(LatencyPercentiles::from_values(&self.latencies_ms)),
                )
            } else {
                (None, None, None, None)
            };

        Summary {
            attempted: self.attempted.max(self.succeeded),
            succeeded: self.succeeded,
            avg_completion_tokens,
            avg_total_tokens,
            avg_tok_per_sec,
            sum_completion_tokens: self.sum_completion_tokens,
            sum_total_tokens: self.sum_total_tokens,
            failures: self.failures.clone(),
            latency,
        }
    }
}

/// Latency percentiles (all values in milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct LatencyPercentiles {
    /// Minimum value
    pub min: f64,
    /// 50th percentile (median)
    pub p50: f64,
    /// 90th percentile
    pub p90: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
    /// Maximum value
    pub max: f64,
    /// Mean value
    pub mean: f64,
}

impl LatencyPercentiles {
    /// Calculate percentiles from a slice of values
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut sorted: Vec<f64> = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let len = sorted.len();
        let mean = sorted.iter().sum::<f64>() / len as f64;

        Self {
            min: sorted[0],
            p50: percentile(&sorted, 0.50),
            p90: percentile(&sorted, 0.90),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
            max: sorted[len - 1],
            mean,
        }
    }
}

/// Calculate percentile from sorted values using linear interpolation
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let idx = p * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    let frac = idx - lower as f64;

    if upper >= sorted.len() {
        sorted[sorted.len() - 1]
    } else {
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}
