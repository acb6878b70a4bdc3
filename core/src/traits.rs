//! Core traits for vendor clients and persistence sinks
//!
//! These traits are defined in core so the dispatcher can drive any client
//! and the clients can write to any sink. Implementations live in their
//! respective crates (vendors/, storage/).

use crate::error::StorageError;
use crate::request::{ApiStyle, RunId, RunRequest};
use crate::response::{RunFailure, RunMetrics};
use async_trait::async_trait;

// ============================================================================
// Vendor Client Trait
// ============================================================================

/// Executes one run end to end.
///
/// An implementation owns the full lifecycle of a run: building the payload,
/// the HTTP exchange, response normalization, and any persistence side
/// effects. The dispatcher holds the run's admission slot until `execute`
/// returns.
#[async_trait]
pub trait VendorClient: Send + Sync {
    /// Protocol dialect this client speaks
    fn style(&self) -> ApiStyle;

    /// Model identifier (e.g., "gpt-4o-mini", "llama3")
    fn model_name(&self) -> &str;

    /// Execute a run and return its metrics or a typed failure
    async fn execute(&self, request: &RunRequest) -> Result<RunMetrics, RunFailure>;
}

// ============================================================================
// Persistence Sink Trait
// ============================================================================

/// Kind of artifact stored for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Raw (batch) or accumulated (stream) response text
    Response,
    /// Serialized [`RunMetrics`]
    Metrics,
}

impl ArtifactKind {
    /// Identifier used in artifact names
    pub fn id(&self) -> &'static str {
        match self {
            ArtifactKind::Response => "response",
            ArtifactKind::Metrics => "metrics",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Stores run artifacts.
///
/// Writing the same `(run, kind)` twice replaces the earlier artifact, which
/// is how streaming runs publish their running concatenation.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Store `content` and return the artifact's location
    async fn store(
        &self,
        run: RunId,
        kind: ArtifactKind,
        content: &[u8],
    ) -> Result<String, StorageError>;
}
