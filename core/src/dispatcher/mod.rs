//! Dispatcher for the benchmark session lifecycle
//!
//! The Dispatcher coordinates a complete benchmark session:
//! - Admitting runs through a semaphore sized to the concurrency bound
//! - Spawning one task per run and holding its permit until it finishes
//! - Cancelling queued and in-flight runs via a broadcast shutdown signal
//! - Fanning every outcome into a single result channel
//!
//! # Example
//!
//! ```ignore
//! use llmbench_core::{Aggregator, DispatcherBuilder};
//!
//! let (dispatcher, results_rx) = DispatcherBuilder::new()
//!     .client(client)
//!     .concurrency(config.concurrency)
//!     .build()?;
//!
//! let aggregator = tokio::spawn(Aggregator::new(config.runs).collect(results_rx));
//! let stats = dispatcher.run_with_signal_handling(config.run_requests()).await?;
//! let summary = aggregator.await?;
//! ```

mod builder;
mod executor;
mod stats;

pub use builder::DispatcherBuilder;
pub use executor::{Dispatcher, ShutdownHandle};
pub use stats::DispatchStats;
