//! Wire payloads and endpoint construction for both API styles.

use std::sync::Arc;

use llmbench_core::{ApiStyle, Message, RunRequest, TokenCounter, WhitespaceTokenCounter};
use serde::{Deserialize, Serialize};

/// Sampling temperature sent with openai-style requests
pub const OPENAI_TEMPERATURE: f64 = 0.7;

/// Path appended to the base URL for ollama-style requests
pub const OLLAMA_CHAT_PATH: &str = "/chat";

/// Path appended to the base URL for openai-style requests
pub const OPENAI_CHAT_PATH: &str = "/chat/completions";

// ============================================================================
// Payloads
// ============================================================================

/// `POST {base}/chat/completions` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIRequest {
    /// Model identifier
    pub model: String,
    /// Conversation (a single user message)
    pub messages: Vec<Message>,
    /// Sampling temperature
    pub temperature: f64,
    /// Completion token cap
    pub max_tokens: u32,
    /// Streaming flag
    pub stream: bool,
}

/// `POST {base}/chat` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaRequest {
    /// Model identifier
    pub model: String,
    /// Conversation (a single user message)
    pub messages: Vec<Message>,
    /// Streaming flag
    pub stream: bool,
}

/// Chat payload for either style
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChatPayload {
    /// openai-style body
    OpenAI(OpenAIRequest),
    /// ollama-style body
    Ollama(OllamaRequest),
}

impl ChatPayload {
    /// Build the payload for a run
    pub fn for_request(request: &RunRequest) -> Self {
        let messages = vec![Message::user(request.prompt.clone())];
        match request.style {
            ApiStyle::Ollama => ChatPayload::Ollama(OllamaRequest {
                model: request.model.clone(),
                messages,
                stream: request.stream,
            }),
            ApiStyle::OpenAI => ChatPayload::OpenAI(OpenAIRequest {
                model: request.model.clone(),
                messages,
                temperature: OPENAI_TEMPERATURE,
                max_tokens: request.max_tokens,
                stream: request.stream,
            }),
        }
    }
}

/// Body of the ollama unload call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnloadRequest {
    /// Model to evict
    pub model: String,
    /// Always 0: evict immediately
    pub keep_alive: u32,
}

impl UnloadRequest {
    /// Create an unload request for `model`
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            keep_alive: 0,
        }
    }
}

// ============================================================================
// Request Builder
// ============================================================================

/// Everything needed to send one run
#[derive(Debug, Clone)]
pub struct BuiltRequest {
    /// Full URL
    pub endpoint: String,
    /// JSON body
    pub payload: ChatPayload,
    /// Request headers
    pub headers: Vec<(&'static str, String)>,
    /// Approximate prompt token count
    pub prompt_tokens: usize,
}

impl BuiltRequest {
    /// Serialize the payload
    pub fn body(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.payload)
    }

    /// Look up a header by name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Produces payloads, endpoints and headers for runs against one server
#[derive(Clone)]
pub struct RequestBuilder {
    base_url: String,
    api_key: Option<String>,
    tokenizer: Arc<dyn TokenCounter>,
}

impl RequestBuilder {
    /// Create a builder for `base_url`; trailing slashes are stripped
    pub fn new(base_url: impl AsRef<str>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            tokenizer: Arc::new(WhitespaceTokenCounter),
        }
    }

    /// Use a different token counter for prompt tokens
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn TokenCounter>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Base URL without trailing slashes
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Chat endpoint for `style`
    pub fn endpoint(&self, style: ApiStyle) -> String {
        match style {
            ApiStyle::Ollama => format!("{}{}", self.base_url, OLLAMA_CHAT_PATH),
            ApiStyle::OpenAI => format!("{}{}", self.base_url, OPENAI_CHAT_PATH),
        }
    }

    /// Endpoint of the ollama unload call
    pub fn unload_endpoint(&self) -> String {
        self.endpoint(ApiStyle::Ollama)
    }

    /// Build endpoint, payload and headers for a run
    pub fn build(&self, request: &RunRequest) -> BuiltRequest {
        let mut headers = vec![("Content-Type", "application/json".to_string())];

        if request.style.requires_api_key() {
            if let Some(key) = &self.api_key {
                headers.push(("Authorization", format!("Bearer {}", key)));
            }
        }

        BuiltRequest {
            endpoint: self.endpoint(request.style),
            payload: ChatPayload::for_request(request),
            headers,
            prompt_tokens: self.tokenizer.count(&request.prompt),
        }
    }
}

impl std::fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(style: ApiStyle) -> RunRequest {
        RunRequest::new(1, style, "m", "say hi please").with_max_tokens(128)
    }

    #[test]
    fn test_openai_payload_shape() {
        let builder = RequestBuilder::new("https://api.example.com/v1/", Some("sk".into()));
        let built = builder.build(&request(ApiStyle::OpenAI));

        assert_eq!(built.endpoint, "https://api.example.com/v1/chat/completions");
        let body: serde_json::Value = serde_json::from_slice(&built.body().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "m",
                "messages": [{"role": "user", "content": "say hi please"}],
                "temperature": 0.7,
                "max_tokens": 128,
                "stream": false
            })
        );
        assert_eq!(built.header("authorization"), Some("Bearer sk"));
        assert_eq!(built.header("content-type"), Some("application/json"));
        assert_eq!(built.prompt_tokens, 3);
    }

    #[test]
    fn test_ollama_payload_shape() {
        let builder = RequestBuilder::new("http://localhost:11434/api//", Some("sk".into()));
        let built = builder.build(&request(ApiStyle::Ollama).with_stream(true));

        assert_eq!(built.endpoint, "http://localhost:11434/api/chat");
        let body: serde_json::Value = serde_json::from_slice(&built.body().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "m",
                "messages": [{"role": "user", "content": "say hi please"}],
                "stream": true
            })
        );
        assert!(built.header("authorization").is_none());
    }

    #[test]
    fn test_unload_body() {
        let body = serde_json::to_value(UnloadRequest::new("llama3")).unwrap();
        assert_eq!(body, json!({"model": "llama3", "keep_alive": 0}));

        let builder = RequestBuilder::new("http://h/api/", None);
        assert_eq!(builder.unload_endpoint(), "http://h/api/chat");
    }

    #[test]
    fn test_debug_hides_key() {
        let builder = RequestBuilder::new("http://h", Some("secret".into()));
        let debug = format!("{:?}", builder);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("has_api_key: true"));
    }
}
