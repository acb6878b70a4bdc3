//! llmbench-core: Core data structures for load-testing chat-completion APIs
//!
//! This crate provides the foundational types used across all llmbench
//! components, including:
//!
//! - Run data structures (requests, metrics, failures)
//! - Core traits (VendorClient, PersistenceSink, RunLogger, TokenCounter)
//! - The bounded-concurrency dispatcher
//! - Metrics aggregation and the session summary
//! - Configuration and error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod request;
pub mod response;
pub mod tokenizer;
pub mod traits;

pub use channel::ChannelConfig;
pub use config::{BenchConfig, ConfigError, DEFAULT_BASE_URL, DEFAULT_PROMPT};
pub use dispatcher::{DispatchStats, Dispatcher, DispatcherBuilder, ShutdownHandle};
pub use error::*;
pub use logging::{format_event, Field, RunLogger, TracingRunLogger};
pub use metrics::*;
pub use request::*;
pub use response::*;
pub use tokenizer::{count_tokens, TokenCounter, WhitespaceTokenCounter};
pub use traits::*;
