//! Chat client for openai- and ollama-style servers

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use llmbench_core::{
    ApiStyle, BenchConfig, BenchError, BenchResult, PersistenceSink, RunFailure, RunLogger,
    RunMetrics, RunRequest, TokenCounter, VendorClient,
};
use reqwest::StatusCode;

use crate::http::HttpClientPool;
use crate::normalizer::{ExchangeTiming, ResponseNormalizer};
use crate::payload::{RequestBuilder, UnloadRequest};

/// Executes runs against one server over a shared connection pool.
///
/// Cloning shares the pool, logger and sink.
#[derive(Clone)]
pub struct ChatClient {
    pool: HttpClientPool,
    builder: RequestBuilder,
    normalizer: ResponseNormalizer,
    style: ApiStyle,
    model: String,
    timeout: Duration,
    unload_timeout: Option<Duration>,
}

impl ChatClient {
    /// Create a client for the server, style and model in `config`
    pub fn new(pool: HttpClientPool, config: &BenchConfig) -> Self {
        Self {
            pool,
            builder: RequestBuilder::new(&config.base_url, config.api_key.clone()),
            normalizer: ResponseNormalizer::new(config.style),
            style: config.style,
            model: config.model.clone(),
            timeout: config.per_call_timeout,
            unload_timeout: config.request_timeout(),
        }
    }

    /// Set the run logger
    pub fn with_logger(mut self, logger: Arc<dyn RunLogger>) -> Self {
        self.normalizer = self.normalizer.with_logger(logger);
        self
    }

    /// Persist run artifacts to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn PersistenceSink>) -> Self {
        self.normalizer = self.normalizer.with_sink(sink);
        self
    }

    /// Use a different token counter for prompt and completion counts
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn TokenCounter>) -> Self {
        self.builder = self.builder.with_tokenizer(Arc::clone(&tokenizer));
        self.normalizer = self.normalizer.with_tokenizer(tokenizer);
        self
    }

    /// Per-call timeout for `request`; streaming runs have none
    pub fn request_timeout(&self, request: &RunRequest) -> Option<Duration> {
        if request.stream {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Ask an ollama server to evict the model from memory
    ///
    /// Bounded by the per-call timeout in batch sessions only; a streaming
    /// session sends the unload without one.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Unload`] on transport failure or a non-200
    /// status.
    pub async fn unload_model(&self) -> BenchResult<()> {
        let endpoint = self.builder.unload_endpoint();

        tracing::info!(model = %self.model, endpoint = %endpoint, "Unloading model");

        let mut request = self
            .pool
            .client()
            .post(&endpoint)
            .json(&UnloadRequest::new(self.model.clone()));
        if let Some(timeout) = self.unload_timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BenchError::unload(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(BenchError::unload(format!(
                "{} (status code {})",
                body.trim(),
                status.as_u16()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl VendorClient for ChatClient {
    fn style(&self) -> ApiStyle {
        self.style
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn execute(&self, request: &RunRequest) -> Result<RunMetrics, RunFailure> {
        let logger = self.normalizer.logger();
        let built = self.builder.build(request);

        let body = built
            .body()
            .map_err(|e| RunFailure::transport(request.id, format!("encode request: {}", e)))?;

        logger.event(
            request.id,
            "request",
            &[
                ("model", request.model.clone()),
                ("stream", request.stream.to_string()),
                ("prompt_tokens", built.prompt_tokens.to_string()),
            ],
        );

        let mut http_request = self.pool.client().post(&built.endpoint).body(body);
        for (name, value) in &built.headers {
            http_request = http_request.header(*name, value);
        }
        if let Some(timeout) = self.request_timeout(request) {
            http_request = http_request.timeout(timeout);
        }

        let started = Instant::now();
        let response = match http_request.send().await {
            Ok(response) => response,
            Err(e) => {
                let detail = if e.is_timeout() {
                    format!("timeout: {}", e)
                } else {
                    e.to_string()
                };
                logger.event(
                    request.id,
                    "error",
                    &[("type", "transport".to_string()), ("error", detail.clone())],
                );
                return Err(RunFailure::transport(request.id, detail));
            }
        };
        let timing = ExchangeTiming::headers_received(started);

        self.normalizer
            .normalize(request, response, built.prompt_tokens, timing)
            .await
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("style", &self.style)
            .field("model", &self.model)
            .field("builder", &self.builder)
            .field("timeout", &self.timeout)
            .finish()
    }
}
