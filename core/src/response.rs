//! Per-run results: metrics on success, a typed failure otherwise

pub use crate::error::ErrorKind;

use crate::request::RunId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Canonical metrics for one successful run
///
/// Created once by the response normalizer and never mutated after it is
/// sent to the result channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Run identifier
    #[serde(rename = "run")]
    pub run_id: RunId,
    /// Model identifier
    pub model: String,
    /// Whether the response was streamed
    pub stream: bool,
    /// Prompt tokens (server-reported or approximated)
    pub prompt_tokens: usize,
    /// Completion tokens
    pub completion_tokens: usize,
    /// Total tokens
    pub total_tokens: usize,
    /// Wall-clock latency in milliseconds
    pub latency_ms: f64,
    /// Approximate throughput
    pub tok_per_sec: f64,
}

/// Tokens divided by elapsed seconds, or 0 when no time has elapsed
pub fn tokens_per_second(tokens: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        tokens as f64 / secs
    } else {
        0.0
    }
}

/// Elapsed time in fractional milliseconds
pub fn elapsed_ms(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1e3
}

/// A run that did not produce metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("run {run_id} failed ({kind}): {detail}")]
pub struct RunFailure {
    /// Run identifier
    pub run_id: RunId,
    /// Failure classification
    pub kind: ErrorKind,
    /// Human-readable detail (error message or raw body)
    pub detail: String,
}

impl RunFailure {
    /// Create a new failure
    pub fn new(run_id: RunId, kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            run_id,
            kind,
            detail: detail.into(),
        }
    }

    /// Network or connect failure
    pub fn transport(run_id: RunId, detail: impl Into<String>) -> Self {
        Self::new(run_id, ErrorKind::Transport, detail)
    }

    /// Non-200 response; the detail carries the status and trimmed body
    pub fn http_status(run_id: RunId, status: u16, body: &str) -> Self {
        Self::new(
            run_id,
            ErrorKind::HttpStatus,
            format!("status {}: {}", status, body.trim()),
        )
    }

    /// Undecodable body
    pub fn parse(run_id: RunId, detail: impl Into<String>) -> Self {
        Self::new(run_id, ErrorKind::Parse, detail)
    }

    /// Server-reported error message
    pub fn api(run_id: RunId, message: impl Into<String>) -> Self {
        Self::new(run_id, ErrorKind::Api, message)
    }
}

/// What a finished run sends to the aggregator
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Run completed and produced metrics
    Success(RunMetrics),
    /// Run failed
    Failure(RunFailure),
}

impl RunOutcome {
    /// Run identifier
    pub fn run_id(&self) -> RunId {
        match self {
            RunOutcome::Success(m) => m.run_id,
            RunOutcome::Failure(f) => f.run_id,
        }
    }

    /// Check if the run succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success(_))
    }

    /// Metrics if the run succeeded
    pub fn metrics(&self) -> Option<&RunMetrics> {
        match self {
            RunOutcome::Success(m) => Some(m),
            RunOutcome::Failure(_) => None,
        }
    }

    /// Failure kind if the run failed
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            RunOutcome::Success(_) => None,
            RunOutcome::Failure(f) => Some(f.kind),
        }
    }
}

impl From<Result<RunMetrics, RunFailure>> for RunOutcome {
    fn from(result: Result<RunMetrics, RunFailure>) -> Self {
        match result {
            Ok(metrics) => RunOutcome::Success(metrics),
            Err(failure) => RunOutcome::Failure(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_serialize_with_wire_keys() {
        let metrics = RunMetrics {
            run_id: RunId(1),
            model: "gpt-4o-mini".into(),
            stream: false,
            prompt_tokens: 2,
            completion_tokens: 9,
            total_tokens: 11,
            latency_ms: 500.0,
            tok_per_sec: 22.0,
        };
        let value = serde_json::to_value(&metrics).unwrap();
        assert_eq!(value["run"], 1);
        assert_eq!(value["prompt_tokens"], 2);
        assert_eq!(value["latency_ms"], 500.0);
        assert_eq!(value["tok_per_sec"], 22.0);
    }

    #[test]
    fn test_tokens_per_second() {
        assert_eq!(tokens_per_second(11, Duration::from_millis(500)), 22.0);
        assert_eq!(tokens_per_second(11, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_http_status_failure_trims_body() {
        let failure = RunFailure::http_status(RunId(4), 429, "  slow down\n");
        assert_eq!(failure.kind, ErrorKind::HttpStatus);
        assert_eq!(failure.detail, "status 429: slow down");
        assert_eq!(
            failure.to_string(),
            "run 004 failed (http_status): status 429: slow down"
        );
    }

    #[test]
    fn test_outcome_from_result() {
        let outcome: RunOutcome = Err(RunFailure::parse(RunId(2), "eof")).into();
        assert!(!outcome.is_success());
        assert_eq!(outcome.run_id(), RunId(2));
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Parse));
        assert!(outcome.metrics().is_none());
    }
}
