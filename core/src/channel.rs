//! Channel configuration for dispatcher communication

/// Channel buffer configuration for dispatcher communication
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Result channel buffer size (run tasks -> aggregator)
    pub results_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            results_buffer: 10_000,
        }
    }
}

impl ChannelConfig {
    /// Set a custom result buffer size (minimum 1)
    pub fn with_results_buffer(mut self, size: usize) -> Self {
        self.results_buffer = size.max(1);
        self
    }
}
