//! Builder pattern for Dispatcher construction

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::channel::ChannelConfig;
use crate::error::{BenchError, BenchResult};
use crate::logging::{RunLogger, TracingRunLogger};
use crate::response::RunOutcome;
use crate::traits::VendorClient;

use super::executor::Dispatcher;

/// Builder for creating a Dispatcher
///
/// # Example
///
/// ```ignore
/// let (dispatcher, results_rx) = DispatcherBuilder::new()
///     .client(client)
///     .concurrency(10)
///     .build()?;
///
/// let summary = tokio::spawn(Aggregator::new(runs).collect(results_rx));
/// let stats = dispatcher.run(config.run_requests()).await?;
/// ```
pub struct DispatcherBuilder {
    client: Option<Arc<dyn VendorClient>>,
    logger: Option<Arc<dyn RunLogger>>,
    concurrency: usize,
    channel_config: ChannelConfig,
}

impl DispatcherBuilder {
    /// Create a new builder (concurrency 0 = all runs at once)
    pub fn new() -> Self {
        Self {
            client: None,
            logger: None,
            concurrency: 0,
            channel_config: ChannelConfig::default(),
        }
    }

    /// Set the vendor client
    pub fn client(mut self, client: Arc<dyn VendorClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the run logger (defaults to [`TracingRunLogger`])
    pub fn logger(mut self, logger: Arc<dyn RunLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Set the concurrency level
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the channel configuration
    pub fn channel_config(mut self, config: ChannelConfig) -> Self {
        self.channel_config = config;
        self
    }

    /// Build the dispatcher and return it along with the result receiver
    ///
    /// # Errors
    ///
    /// Returns an error if no client was set.
    pub fn build(self) -> BenchResult<(Dispatcher, mpsc::Receiver<RunOutcome>)> {
        let client = self
            .client
            .ok_or_else(|| BenchError::missing_config("client"))?;

        let logger = self
            .logger
            .unwrap_or_else(|| Arc::new(TracingRunLogger));

        let (results_tx, results_rx) = mpsc::channel(self.channel_config.results_buffer);

        let dispatcher = Dispatcher::new(client, logger, results_tx, self.concurrency);

        Ok((dispatcher, results_rx))
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
