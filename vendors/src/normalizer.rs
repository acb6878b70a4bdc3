//! Response normalization: HTTP response in, one `RunMetrics` or `RunFailure` out.
//!
//! ```text
//! INIT ──► status != 200 ──────────────────────────────► FAILED(http_status)
//!   │
//!   ├──► stream=false ─► BATCH_PARSE ─► SUCCESS | FAILED(parse | api)
//!   └──► stream=true  ─► STREAM_READ ─► SUCCESS
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use llmbench_core::{
    elapsed_ms, tokens_per_second, ApiStyle, ArtifactKind, Field, PersistenceSink, RunFailure,
    RunId, RunLogger, RunMetrics, RunRequest, TokenCounter, TracingRunLogger,
    WhitespaceTokenCounter,
};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::streaming::{classify_line, JsonLinesParser, StreamAccumulator, StreamLine};

// ============================================================================
// Batch decoding
// ============================================================================

/// Why a batch body could not be turned into token counts
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Body is not the expected envelope
    #[error("{0}")]
    Parse(String),
    /// Server returned an error envelope
    #[error("{0}")]
    Api(String),
}

impl DecodeError {
    /// Convert into a run failure
    pub fn into_failure(self, run_id: RunId) -> RunFailure {
        match self {
            DecodeError::Parse(detail) => RunFailure::parse(run_id, detail),
            DecodeError::Api(message) => RunFailure::api(run_id, message),
        }
    }

    /// Value of the `type` field in the run's `error` event
    pub fn log_type(&self) -> &'static str {
        match self {
            DecodeError::Parse(_) => "json_parse",
            DecodeError::Api(_) => "api",
        }
    }
}

/// Token counts and artifact text from a batch body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTally {
    /// Prompt tokens
    pub prompt_tokens: usize,
    /// Completion tokens
    pub completion_tokens: usize,
    /// Total tokens
    pub total_tokens: usize,
    /// What the response artifact stores: message content for ollama, the
    /// JSON body for openai
    pub response_text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    completion_tokens: usize,
    #[serde(default)]
    total_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct OpenAISuccess {
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorEnvelope {
    error: serde_json::Value,
}

impl OpenAIErrorEnvelope {
    /// `{"error": "msg"}` or `{"error": {"message": "msg"}}`
    fn message(&self) -> Option<&str> {
        let message = match &self.error {
            serde_json::Value::String(s) => Some(s.as_str()),
            serde_json::Value::Object(obj) => obj.get("message").and_then(|m| m.as_str()),
            _ => None,
        };
        message.filter(|m| !m.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

/// Drop anything before the first `{`
pub fn strip_preamble(body: &[u8]) -> &[u8] {
    match body.iter().position(|&b| b == b'{') {
        Some(start) => &body[start..],
        None => body,
    }
}

/// Decode a complete (non-streamed) 200 body.
///
/// openai counts come from the `usage` block; ollama counts are the
/// approximate token count of `message.content`. Prompt tokens keep the
/// precomputed value in both styles.
pub fn decode_batch(
    style: ApiStyle,
    body: &[u8],
    prompt_tokens: usize,
    tokenizer: &dyn TokenCounter,
) -> Result<BatchTally, DecodeError> {
    let raw = strip_preamble(body);

    match style {
        ApiStyle::Ollama => {
            let resp: OllamaResponse =
                serde_json::from_slice(raw).map_err(|e| DecodeError::Parse(e.to_string()))?;
            let tokens = tokenizer.count(&resp.message.content);
            Ok(BatchTally {
                prompt_tokens,
                completion_tokens: tokens,
                total_tokens: tokens,
                response_text: resp.message.content,
            })
        }
        ApiStyle::OpenAI => match serde_json::from_slice::<OpenAISuccess>(raw) {
            Ok(ok) => Ok(BatchTally {
                prompt_tokens,
                completion_tokens: ok.usage.completion_tokens,
                total_tokens: ok.usage.total_tokens,
                response_text: String::from_utf8_lossy(raw).into_owned(),
            }),
            Err(e) => {
                let api_message = serde_json::from_slice::<OpenAIErrorEnvelope>(raw)
                    .ok()
                    .and_then(|env| env.message().map(str::to_string));
                match api_message {
                    Some(message) => Err(DecodeError::Api(message)),
                    None => Err(DecodeError::Parse(e.to_string())),
                }
            }
        },
    }
}

// ============================================================================
// Response Normalizer
// ============================================================================

/// Timing captured by the caller around `send`
#[derive(Debug, Clone, Copy)]
pub struct ExchangeTiming {
    /// When the request was sent
    pub started: Instant,
    /// Time until response headers arrived
    pub headers: Duration,
}

impl ExchangeTiming {
    /// Record header arrival for a request sent at `started`
    pub fn headers_received(started: Instant) -> Self {
        Self {
            started,
            headers: started.elapsed(),
        }
    }
}

/// Turns HTTP responses into run metrics, logging and persisting as it goes
#[derive(Clone)]
pub struct ResponseNormalizer {
    style: ApiStyle,
    logger: Arc<dyn RunLogger>,
    sink: Option<Arc<dyn PersistenceSink>>,
    tokenizer: Arc<dyn TokenCounter>,
}

impl ResponseNormalizer {
    /// Create a normalizer with the tracing logger, no sink and the
    /// whitespace token counter
    pub fn new(style: ApiStyle) -> Self {
        Self {
            style,
            logger: Arc::new(TracingRunLogger),
            sink: None,
            tokenizer: Arc::new(WhitespaceTokenCounter),
        }
    }

    /// Set the run logger
    pub fn with_logger(mut self, logger: Arc<dyn RunLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Persist response and metrics artifacts to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the token counter
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn TokenCounter>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Run logger
    pub fn logger(&self) -> &Arc<dyn RunLogger> {
        &self.logger
    }

    /// Normalize one response
    pub async fn normalize(
        &self,
        request: &RunRequest,
        response: reqwest::Response,
        prompt_tokens: usize,
        timing: ExchangeTiming,
    ) -> Result<RunMetrics, RunFailure> {
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            self.logger.event(
                request.id,
                "error",
                &[
                    ("type", "http".to_string()),
                    ("status_code", status.as_u16().to_string()),
                    ("response", body.trim().to_string()),
                ],
            );
            return Err(RunFailure::http_status(request.id, status.as_u16(), &body));
        }

        if request.stream {
            Ok(self.read_stream(request, response, prompt_tokens, timing.started).await)
        } else {
            self.read_batch(request, response, prompt_tokens, timing.headers)
                .await
        }
    }

    async fn read_batch(
        &self,
        request: &RunRequest,
        response: reqwest::Response,
        prompt_tokens: usize,
        elapsed: Duration,
    ) -> Result<RunMetrics, RunFailure> {
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                self.log_error(request.id, "transport", e.to_string());
                return Err(RunFailure::transport(request.id, e.to_string()));
            }
        };

        let tally = match decode_batch(self.style, &body, prompt_tokens, self.tokenizer.as_ref())
        {
            Ok(tally) => tally,
            Err(e) => {
                self.log_error(request.id, e.log_type(), e.to_string());
                return Err(e.into_failure(request.id));
            }
        };

        // openai rates total tokens, ollama rates completion tokens
        let rated = match self.style {
            ApiStyle::OpenAI => tally.total_tokens,
            ApiStyle::Ollama => tally.completion_tokens,
        };

        let metrics = RunMetrics {
            run_id: request.id,
            model: request.model.clone(),
            stream: request.stream,
            prompt_tokens: tally.prompt_tokens,
            completion_tokens: tally.completion_tokens,
            total_tokens: tally.total_tokens,
            latency_ms: elapsed_ms(elapsed),
            tok_per_sec: tokens_per_second(rated, elapsed),
        };

        self.logger
            .event(request.id, "success", &metrics_fields(&metrics));
        self.persist(&metrics, tally.response_text.as_bytes()).await;

        Ok(metrics)
    }

    async fn read_stream(
        &self,
        request: &RunRequest,
        response: reqwest::Response,
        prompt_tokens: usize,
        started: Instant,
    ) -> RunMetrics {
        self.logger.event(
            request.id,
            "stream-start",
            &[("model", request.model.clone())],
        );

        let mut parser = JsonLinesParser::new();
        let mut acc = StreamAccumulator::new();
        let mut body = response.bytes_stream();

        'read: while let Some(chunk) = body.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::debug!(run = request.id.0, error = %e, "Stream read failed");
                    break;
                }
            };

            for line in parser.feed(&bytes) {
                let classified = classify_line(self.style, &line);
                let terminal = classified.is_terminal();

                match classified {
                    StreamLine::Fragment(fragment) => {
                        let running = acc.push(&fragment);
                        if let Some(sink) = &self.sink {
                            if let Err(e) = sink
                                .store(request.id, ArtifactKind::Response, running.as_bytes())
                                .await
                            {
                                self.log_error(request.id, "store_data", e.to_string());
                            }
                        }
                    }
                    StreamLine::Done(meta) => acc.finish(meta),
                    StreamLine::End | StreamLine::Empty => {}
                    StreamLine::Malformed(err) => {
                        acc.skip_malformed();
                        tracing::debug!(run = request.id.0, error = %err, line = %line, "Skipping malformed stream line");
                    }
                }

                if terminal {
                    break 'read;
                }
            }
        }

        let discarded = parser.discard_remainder();
        if discarded > 0 {
            tracing::debug!(run = request.id.0, bytes = discarded, "Discarded unterminated stream tail");
        }

        let elapsed = started.elapsed();
        let tokens = self.tokenizer.count(acc.text());

        tracing::debug!(
            run = request.id.0,
            fragments = acc.fragments(),
            malformed = acc.malformed(),
            done_reason = acc.meta().and_then(|m| m.done_reason.as_deref()).unwrap_or("-"),
            "Stream finished"
        );

        let metrics = RunMetrics {
            run_id: request.id,
            model: request.model.clone(),
            stream: request.stream,
            prompt_tokens: acc.prompt_eval_count().unwrap_or(prompt_tokens),
            completion_tokens: tokens,
            total_tokens: tokens,
            latency_ms: elapsed_ms(elapsed),
            tok_per_sec: tokens_per_second(tokens, elapsed),
        };

        self.logger
            .event(request.id, "success", &metrics_fields(&metrics));
        self.persist(&metrics, acc.text().as_bytes()).await;

        metrics
    }

    /// Store the response and metrics artifacts; failures are logged only
    async fn persist(&self, metrics: &RunMetrics, response: &[u8]) {
        let Some(sink) = &self.sink else {
            return;
        };
        let run = metrics.run_id;

        match sink.store(run, ArtifactKind::Response, response).await {
            Ok(location) => self
                .logger
                .event(run, "response-stored", &[("file", location)]),
            Err(e) => self.log_error(run, "store_data", e.to_string()),
        }

        let encoded = match serde_json::to_vec(metrics) {
            Ok(encoded) => encoded,
            Err(e) => {
                self.log_error(run, "json_marshal", e.to_string());
                return;
            }
        };

        match sink.store(run, ArtifactKind::Metrics, &encoded).await {
            Ok(location) => self
                .logger
                .event(run, "metrics-stored", &[("file", location)]),
            Err(e) => self.log_error(run, "store_data", e.to_string()),
        }
    }

    fn log_error(&self, run: RunId, kind: &str, error: String) {
        self.logger.event(
            run,
            "error",
            &[("type", kind.to_string()), ("error", error)],
        );
    }
}

impl std::fmt::Debug for ResponseNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseNormalizer")
            .field("style", &self.style)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

/// Fields of the `success` event
pub fn metrics_fields(metrics: &RunMetrics) -> Vec<Field<'static>> {
    vec![
        ("run", metrics.run_id.0.to_string()),
        ("model", metrics.model.clone()),
        ("stream", metrics.stream.to_string()),
        ("prompt_tokens", metrics.prompt_tokens.to_string()),
        ("completion_tokens", metrics.completion_tokens.to_string()),
        ("total_tokens", metrics.total_tokens.to_string()),
        ("latency_ms", metrics.latency_ms.to_string()),
        ("tok_per_sec", metrics.tok_per_sec.to_string()),
    ]
}
