//! Per-run event logging
//!
//! Run lifecycle events go through an injected [`RunLogger`] rather than a
//! process-wide logger, so the dispatcher and normalizer can be observed in
//! tests and embedded without touching global state.

use crate::request::RunId;

/// A single `key=value` pair attached to a run event
pub type Field<'a> = (&'a str, String);

/// Receives run lifecycle events
///
/// Events used by llmbench: `request`, `stream-start`, `success`, `error`,
/// `response-stored`, `metrics-stored`, `cancelled`.
pub trait RunLogger: Send + Sync {
    /// Record `event` for `run` with the given fields
    fn event(&self, run: RunId, event: &str, fields: &[Field<'_>]);
}

/// Forwards run events to `tracing`.
///
/// Lines render as `Run 001 | event | k=v | ...` with keys sorted. `error`
/// events are emitted at WARN, everything else at INFO.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRunLogger;

impl RunLogger for TracingRunLogger {
    fn event(&self, run: RunId, event: &str, fields: &[Field<'_>]) {
        let line = format_event(run, event, fields);
        if event == "error" {
            tracing::warn!(target: "llmbench::run", run = run.0, event, "{}", line);
        } else {
            tracing::info!(target: "llmbench::run", run = run.0, event, "{}", line);
        }
    }
}

/// Render an event as `Run 001 | event | k=v | ...` with keys sorted
pub fn format_event(run: RunId, event: &str, fields: &[Field<'_>]) -> String {
    let mut sorted: Vec<&Field<'_>> = fields.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut parts = Vec::with_capacity(sorted.len() + 2);
    parts.push(format!("Run {}", run));
    parts.push(event.to_string());
    parts.extend(sorted.iter().map(|(k, v)| format!("{}={}", k, v)));
    parts.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_event_sorts_keys() {
        let line = format_event(
            RunId(1),
            "request",
            &[
                ("stream", "false".to_string()),
                ("model", "gpt-4o-mini".to_string()),
                ("prompt_tokens", "8".to_string()),
            ],
        );
        assert_eq!(
            line,
            "Run 001 | request | model=gpt-4o-mini | prompt_tokens=8 | stream=false"
        );
    }

    #[test]
    fn test_format_event_without_fields() {
        assert_eq!(format_event(RunId(12), "stream-start", &[]), "Run 012 | stream-start");
    }
}
