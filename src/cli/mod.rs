//! CLI argument parsing

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use llmbench_core::{ApiStyle, BenchConfig, DEFAULT_BASE_URL, DEFAULT_PROMPT};

/// Tiny load-tester for OpenAI- and Ollama-like chat APIs
#[derive(Debug, Parser)]
#[command(name = "llmbench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// API base URL
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Bearer token (not used by Ollama)
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub key: Option<String>,

    /// API style: openai or ollama
    #[arg(long, default_value = "openai")]
    pub style: ApiStyle,

    /// Enable streaming mode
    #[arg(long)]
    pub stream: bool,

    /// Total requests to send
    #[arg(long, default_value_t = 100)]
    pub runs: usize,

    /// Simultaneous requests (0 = runs)
    #[arg(long, default_value_t = 0)]
    pub concurrency: usize,

    /// max_tokens per request (OpenAI only)
    #[arg(long, default_value_t = 4096)]
    pub max_tokens: u32,

    /// Model ID
    #[arg(long, default_value = "gpt-4o-mini")]
    pub model: String,

    /// User message
    #[arg(long, default_value = DEFAULT_PROMPT)]
    pub prompt: String,

    /// HTTP timeout, e.g. "60s" or "2m" (ignored in streaming)
    #[arg(long, default_value = "60s", value_parser = humantime::parse_duration)]
    pub timeout: Duration,

    /// Unload model after all runs complete (Ollama only)
    #[arg(long)]
    pub unload_model: bool,

    /// Directory to save data files
    #[arg(long, default_value = "./runs")]
    pub data_dir: String,

    /// Store data files (responses, metrics)
    #[arg(long)]
    pub store_data: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Convert parsed flags into a benchmark configuration
    pub fn into_config(self) -> BenchConfig {
        let mut config = BenchConfig::new(self.style, self.model)
            .with_base_url(self.base_url)
            .with_stream(self.stream)
            .with_runs(self.runs)
            .with_concurrency(self.concurrency)
            .with_max_tokens(self.max_tokens)
            .with_prompt(self.prompt)
            .with_per_call_timeout(self.timeout)
            .with_unload_model(self.unload_model)
            .with_store_data(self.store_data);

        config.api_key = self.key.filter(|k| !k.is_empty());
        config.data_dir = Some(self.data_dir)
            .filter(|d| !d.is_empty())
            .map(PathBuf::from);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmbench_core::ConfigError;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["llmbench"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--key", "sk"]).into_config();

        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.style, ApiStyle::OpenAI);
        assert!(!config.stream);
        assert_eq!(config.runs, 100);
        assert_eq!(config.concurrency, 0);
        assert_eq!(config.effective_concurrency(), 100);
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.prompt, DEFAULT_PROMPT);
        assert_eq!(config.per_call_timeout, Duration::from_secs(60));
        assert_eq!(config.data_dir, Some(PathBuf::from("./runs")));
        assert!(!config.store_data);
        assert!(!config.unload_model);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ollama_flags() {
        let config = parse(&[
            "--style",
            "OLLAMA",
            "--base-url",
            "http://localhost:11434/api",
            "--model",
            "llama3",
            "--stream",
            "--runs",
            "5",
            "--concurrency",
            "2",
            "--timeout",
            "1m 30s",
            "--unload-model",
        ])
        .into_config();

        assert_eq!(config.style, ApiStyle::Ollama);
        assert_eq!(config.runs, 5);
        assert_eq!(config.effective_concurrency(), 2);
        assert_eq!(config.per_call_timeout, Duration::from_secs(90));
        assert_eq!(config.request_timeout(), None);
        assert!(config.should_unload());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_style_rejected() {
        assert!(Cli::try_parse_from(["llmbench", "--style", "anthropic"]).is_err());
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        assert!(Cli::try_parse_from(["llmbench", "--timeout", "soon"]).is_err());
    }

    #[test]
    fn test_store_data_without_dir_fails_validation() {
        let config = parse(&["--key", "sk", "--store-data", "--data-dir", ""]).into_config();

        assert_eq!(config.data_dir, None);
        assert_eq!(config.validate(), Err(ConfigError::MissingDataDir));
    }

    #[test]
    fn test_zero_runs_fails_validation() {
        let config = parse(&["--key", "sk", "--runs", "0"]).into_config();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRuns(_))));
    }
}
