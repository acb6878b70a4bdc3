//! Shared HTTP client with connection pooling.

use std::time::Duration;

use llmbench_core::{BenchError, BenchResult};
use reqwest::Client;

/// Connection settings for the session-wide client.
///
/// No client-wide request timeout is set. Non-streaming runs carry one per
/// request and streaming runs are unbounded.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// How long an idle pooled connection is kept
    pub pool_idle_timeout: Duration,

    /// Idle connections kept per host (sized to the concurrency bound)
    pub pool_max_idle_per_host: usize,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// TCP keepalive probe interval
    pub tcp_keepalive: Option<Duration>,

    /// User agent string
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 32,
            connect_timeout: Duration::from_secs(30),
            tcp_keepalive: Some(Duration::from_secs(60)),
            user_agent: format!("llmbench/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    /// Size the idle pool for the expected number of concurrent runs.
    pub fn with_pool_max_idle(mut self, max_idle: usize) -> Self {
        self.pool_max_idle_per_host = max_idle;
        self
    }
}

/// One pooled `reqwest::Client` shared by every run task.
///
/// Cloning is cheap; every clone shares the same connection pool, so one
/// pool serves all run tasks of a session.
///
/// # Example
///
/// ```rust,ignore
/// let pool = HttpClientPool::new(&HttpConfig::default().with_pool_max_idle(64))?;
/// let client = ChatClient::new(pool, &config);
/// ```
#[derive(Debug, Clone)]
pub struct HttpClientPool {
    client: Client,
    config: HttpConfig,
}

impl HttpClientPool {
    /// Build the pooled client.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::HttpClient`] if reqwest rejects the settings
    /// (e.g. the TLS backend fails to initialize).
    pub fn new(config: &HttpConfig) -> BenchResult<Self> {
        let mut builder = Client::builder()
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent);

        if let Some(keepalive) = config.tcp_keepalive {
            builder = builder.tcp_keepalive(keepalive);
        }

        let client = builder
            .build()
            .map_err(|e| BenchError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Settings the client was built with
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }
}
