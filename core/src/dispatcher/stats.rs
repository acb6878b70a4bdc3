//! Dispatch statistics tracking

use std::time::{Duration, Instant};

/// Bookkeeping for one dispatcher session
///
/// These counts describe task lifecycles, not token throughput; the
/// [`Aggregator`](crate::metrics::Aggregator) owns the metric sums.
#[derive(Debug, Default, Clone)]
pub struct DispatchStats {
    /// Runs handed to the dispatcher
    pub requested: usize,

    /// Runs that were admitted and launched
    pub dispatched: usize,

    /// Launched runs that produced metrics
    pub succeeded: usize,

    /// Launched runs that produced a failure
    pub failed: usize,

    /// Launched runs stopped by the shutdown signal
    pub cancelled: usize,

    /// Admission bound after clamping
    pub concurrency: usize,

    /// Highest number of runs in flight at once
    pub peak_in_flight: usize,

    /// Session start time
    pub started_at: Option<Instant>,

    /// Session end time
    pub ended_at: Option<Instant>,
}

impl DispatchStats {
    /// Create new empty stats
    pub fn new(requested: usize, concurrency: usize) -> Self {
        Self {
            requested,
            concurrency,
            ..Default::default()
        }
    }

    /// Start tracking (records start time)
    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    /// Stop tracking (records end time)
    pub fn stop(&mut self) {
        self.ended_at = Some(Instant::now());
    }

    /// Runs never launched because shutdown arrived first
    pub fn not_started(&self) -> usize {
        self.requested.saturating_sub(self.dispatched)
    }

    /// Runs that reached a terminal state (success or failure)
    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|start| {
            self.ended_at
                .map(|end| end.duration_since(start))
                .unwrap_or_else(|| start.elapsed())
        })
    }

    /// Completed runs per second of wall-clock time
    pub fn runs_per_second(&self) -> f64 {
        self.elapsed()
            .map(|d| {
                let secs = d.as_secs_f64();
                if secs > 0.0 {
                    self.completed() as f64 / secs
                } else {
                    0.0
                }
            })
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_counts() {
        let mut stats = DispatchStats::new(10, 4);
        stats.dispatched = 8;
        stats.succeeded = 5;
        stats.failed = 2;
        stats.cancelled = 1;

        assert_eq!(stats.completed(), 7);
        assert_eq!(stats.not_started(), 2);
    }

    #[test]
    fn test_stats_elapsed() {
        let mut stats = DispatchStats::new(1, 1);
        assert!(stats.elapsed().is_none());
        assert_eq!(stats.runs_per_second(), 0.0);

        stats.start();
        std::thread::sleep(Duration::from_millis(5));
        stats.stop();

        assert!(stats.elapsed().unwrap() >= Duration::from_millis(5));
    }
}
