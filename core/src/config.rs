//! Benchmark configuration types

use crate::request::{ApiStyle, RunRequest};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default OpenAI-compatible endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default user message
pub const DEFAULT_PROMPT: &str = "Explain the fundamental concepts of relativity in detail.";

/// Benchmark configuration
///
/// Populated by the CLI and consumed by the dispatcher and vendor clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    /// API base URL (trailing slashes are ignored)
    pub base_url: String,

    /// Bearer token (required for openai style, unused for ollama)
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Protocol dialect
    pub style: ApiStyle,

    /// Request streaming responses
    pub stream: bool,

    /// Total requests to send
    pub runs: usize,

    /// Simultaneous requests (0 = runs)
    pub concurrency: usize,

    /// `max_tokens` per request (openai style only)
    pub max_tokens: u32,

    /// Model identifier
    pub model: String,

    /// User message
    pub prompt: String,

    /// Per-call timeout (ignored when streaming)
    #[serde(with = "humantime_serde")]
    pub per_call_timeout: Duration,

    /// Unload the model after all runs complete (ollama only)
    pub unload_model: bool,

    /// Directory for stored artifacts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Store responses and metrics for every run
    pub store_data: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            style: ApiStyle::OpenAI,
            stream: false,
            runs: 100,
            concurrency: 0,
            max_tokens: 4096,
            model: "gpt-4o-mini".to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            per_call_timeout: Duration::from_secs(60),
            unload_model: false,
            data_dir: Some(PathBuf::from("./runs")),
            store_data: false,
        }
    }
}

impl BenchConfig {
    /// Create a new config for the given style and model
    pub fn new(style: ApiStyle, model: impl Into<String>) -> Self {
        Self {
            style,
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Enable or disable streaming
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Set the number of runs
    pub fn with_runs(mut self, runs: usize) -> Self {
        self.runs = runs;
        self
    }

    /// Set the concurrency (0 = runs)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the completion token cap
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the prompt
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set the per-call timeout
    pub fn with_per_call_timeout(mut self, timeout: Duration) -> Self {
        self.per_call_timeout = timeout;
        self
    }

    /// Unload the model after the benchmark
    pub fn with_unload_model(mut self, unload: bool) -> Self {
        self.unload_model = unload;
        self
    }

    /// Store artifacts under `dir`
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Enable or disable artifact storage
    pub fn with_store_data(mut self, store: bool) -> Self {
        self.store_data = store;
        self
    }

    /// Concurrency after clamping: 0 or anything above `runs` means `runs`
    pub fn effective_concurrency(&self) -> usize {
        effective_concurrency(self.concurrency, self.runs)
    }

    /// Per-call timeout, or `None` for streaming runs
    pub fn request_timeout(&self) -> Option<Duration> {
        if self.stream {
            None
        } else {
            Some(self.per_call_timeout)
        }
    }

    /// Whether the post-run unload call applies
    pub fn should_unload(&self) -> bool {
        self.unload_model && self.style == ApiStyle::Ollama
    }

    /// Build the run requests for this session, numbered from 1
    pub fn run_requests(&self) -> Vec<RunRequest> {
        (1..=self.runs as u64)
            .map(|id| {
                RunRequest::new(id, self.style, self.model.clone(), self.prompt.clone())
                    .with_stream(self.stream)
                    .with_max_tokens(self.max_tokens)
            })
            .collect()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_data && self.data_dir.as_ref().map_or(true, |d| d.as_os_str().is_empty()) {
            return Err(ConfigError::MissingDataDir);
        }

        if self.style.requires_api_key() && self.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingApiKey);
        }

        if self.runs == 0 {
            return Err(ConfigError::InvalidRuns(
                "runs must be at least 1".into(),
            ));
        }

        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField("base_url"));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingField("model"));
        }

        if !self.stream && self.per_call_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(self.per_call_timeout));
        }

        Ok(())
    }
}

/// Clamp a requested concurrency to `[1, total]`, treating 0 as `total`
pub fn effective_concurrency(requested: usize, total: usize) -> usize {
    if requested == 0 || requested > total {
        total
    } else {
        requested
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// openai style without a key
    #[error("missing API key (use --key or set LLM_API_KEY)")]
    MissingApiKey,

    /// Artifact storage requested without a directory
    #[error("data-dir must be set when store-data is enabled")]
    MissingDataDir,

    /// Invalid run count
    #[error("Invalid runs: {0}")]
    InvalidRuns(String),

    /// A required field is empty
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Timeout out of range
    #[error("invalid timeout: {0:?}")]
    InvalidTimeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openai_config() -> BenchConfig {
        BenchConfig::new(ApiStyle::OpenAI, "gpt-4o-mini").with_api_key("sk-test")
    }

    #[test]
    fn test_default_config() {
        let config = BenchConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.runs, 100);
        assert_eq!(config.concurrency, 0);
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.per_call_timeout, Duration::from_secs(60));
        assert!(!config.store_data);
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(openai_config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_missing_key() {
        let config = BenchConfig::new(ApiStyle::OpenAI, "gpt-4o-mini");
        assert_eq!(config.validate(), Err(ConfigError::MissingApiKey));

        let config = config.with_api_key("");
        assert_eq!(config.validate(), Err(ConfigError::MissingApiKey));
    }

    #[test]
    fn test_ollama_does_not_need_key() {
        let config = BenchConfig::new(ApiStyle::Ollama, "llama3");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_store_without_dir() {
        let mut config = openai_config().with_store_data(true);
        config.data_dir = None;
        assert_eq!(config.validate(), Err(ConfigError::MissingDataDir));

        let config = openai_config().with_store_data(true).with_data_dir("");
        assert_eq!(config.validate(), Err(ConfigError::MissingDataDir));
    }

    #[test]
    fn test_config_validation_zero_runs() {
        let config = openai_config().with_runs(0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRuns(_))));
    }

    #[test]
    fn test_zero_timeout_allowed_only_when_streaming() {
        let config = openai_config().with_per_call_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
        assert!(config.with_stream(true).validate().is_ok());
    }

    #[test]
    fn test_effective_concurrency() {
        assert_eq!(effective_concurrency(0, 10), 10);
        assert_eq!(effective_concurrency(20, 10), 10);
        assert_eq!(effective_concurrency(3, 10), 3);
        assert_eq!(effective_concurrency(0, 0), 0);
    }

    #[test]
    fn test_request_timeout_ignored_when_streaming() {
        let config = openai_config();
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.with_stream(true).request_timeout(), None);
    }

    #[test]
    fn test_should_unload_only_for_ollama() {
        assert!(!openai_config().with_unload_model(true).should_unload());
        let ollama = BenchConfig::new(ApiStyle::Ollama, "llama3").with_unload_model(true);
        assert!(ollama.should_unload());
    }

    #[test]
    fn test_run_requests_are_numbered_from_one() {
        let config = openai_config().with_runs(3).with_stream(true).with_max_tokens(64);
        let requests = config.run_requests();

        let ids: Vec<u64> = requests.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(requests.iter().all(|r| r.stream && r.max_tokens == 64));
    }

    #[test]
    fn test_config_serialization_skips_key() {
        let json = serde_json::to_string(&openai_config()).unwrap();
        assert!(!json.contains("sk-test"));
        assert!(json.contains("\"per_call_timeout\":\"1m\""));

        let deserialized: BenchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.per_call_timeout, Duration::from_secs(60));
        assert!(deserialized.api_key.is_none());
    }
}
