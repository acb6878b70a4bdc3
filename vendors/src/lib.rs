//! Chat clients for llmbench
//!
//! This crate implements the `VendorClient` trait for the two supported
//! wire protocols:
//!
//! - openai-style: `POST {base}/chat/completions`, bearer auth, `usage` block
//! - ollama-style: `POST {base}/chat`, JSON-lines streaming with a
//!   `done_reason` metadata line
//!
//! It also provides the pieces the client is built from: payload
//! construction, the JSON-lines stream parser and accumulator, response
//! normalization and the pooled HTTP client.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod http;
pub mod normalizer;
pub mod payload;
pub mod streaming;

pub use client::ChatClient;
pub use http::{HttpClientPool, HttpConfig};
pub use normalizer::{decode_batch, strip_preamble, DecodeError, ExchangeTiming, ResponseNormalizer};
pub use payload::{BuiltRequest, ChatPayload, OllamaRequest, OpenAIRequest, RequestBuilder, UnloadRequest};
pub use streaming::{classify_line, JsonLinesParser, OllamaDone, StreamAccumulator, StreamLine};
