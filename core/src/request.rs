//! Request types for benchmark runs

use serde::{Deserialize, Serialize};

/// Wire protocol dialect spoken by the target server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiStyle {
    /// `POST {base}/chat/completions` with bearer auth and a `usage` block
    #[default]
    #[serde(rename = "openai")]
    OpenAI,
    /// `POST {base}/chat` without auth, JSON-lines streaming
    #[serde(rename = "ollama")]
    Ollama,
}

impl ApiStyle {
    /// Identifier string for this style
    pub fn id(&self) -> &'static str {
        match self {
            ApiStyle::OpenAI => "openai",
            ApiStyle::Ollama => "ollama",
        }
    }

    /// Whether requests of this style carry an `Authorization` header
    pub fn requires_api_key(&self) -> bool {
        matches!(self, ApiStyle::OpenAI)
    }

    /// All supported styles
    pub fn all() -> &'static [ApiStyle] {
        &[ApiStyle::OpenAI, ApiStyle::Ollama]
    }
}

impl std::fmt::Display for ApiStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for ApiStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ApiStyle::OpenAI),
            "ollama" => Ok(ApiStyle::Ollama),
            _ => Err(format!("Unknown API style: {}", s)),
        }
    }
}

/// 1-based ordinal identifying one run within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub u64);

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

impl From<u64> for RunId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A single chat-completion run
///
/// Immutable once constructed; the dispatcher hands each task its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Run identifier
    pub id: RunId,
    /// Protocol dialect
    pub style: ApiStyle,
    /// Model identifier
    pub model: String,
    /// User message
    pub prompt: String,
    /// Whether to request a streaming response
    pub stream: bool,
    /// `max_tokens` for openai-style requests (ignored for ollama)
    pub max_tokens: u32,
}

impl RunRequest {
    /// Create a new run request
    pub fn new(
        id: impl Into<RunId>,
        style: ApiStyle,
        model: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            style,
            model: model.into(),
            prompt: prompt.into(),
            stream: false,
            max_tokens: 4096,
        }
    }

    /// Request a streaming response
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Set the completion token cap
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message (instructions)
    System,
    /// User message (input)
    User,
    /// Assistant message (output)
    Assistant,
}

/// Chat message as sent on the wire by both styles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,
    /// Message text
    pub content: String,
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_style_from_str_is_case_insensitive() {
        assert_eq!("OpenAI".parse::<ApiStyle>().unwrap(), ApiStyle::OpenAI);
        assert_eq!("OLLAMA".parse::<ApiStyle>().unwrap(), ApiStyle::Ollama);
        assert!("bedrock".parse::<ApiStyle>().is_err());
    }

    #[test]
    fn test_api_style_requires_key() {
        assert!(ApiStyle::OpenAI.requires_api_key());
        assert!(!ApiStyle::Ollama.requires_api_key());
    }

    #[test]
    fn test_run_id_display_is_zero_padded() {
        assert_eq!(RunId(7).to_string(), "007");
        assert_eq!(RunId(1234).to_string(), "1234");
    }

    #[test]
    fn test_run_request_builder() {
        let req = RunRequest::new(3u64, ApiStyle::Ollama, "llama3", "hi")
            .with_stream(true)
            .with_max_tokens(16);
        assert_eq!(req.id, RunId(3));
        assert!(req.stream);
        assert_eq!(req.max_tokens, 16);
    }

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_string(&Message::user("Hello")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"Hello"}"#);
    }
}
