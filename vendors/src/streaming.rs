//! Streaming response processing.
//!
//! Both styles stream newline-delimited JSON. Ollama sends bare JSON lines
//! and ends with a metadata line carrying `done_reason`; openai-compatible
//! servers wrap each line in an SSE `data:` field and end with `[DONE]`.

use llmbench_core::ApiStyle;
use serde::{Deserialize, Serialize};

// ============================================================================
// JSON Lines Parser
// ============================================================================

/// Maximum buffer size (1MB) to prevent unbounded memory growth from malformed streams.
const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// JSON Lines (newline-delimited JSON) parser.
///
/// Bytes are buffered until a `\n` arrives, so a multi-byte character split
/// across network chunks is decoded intact. A trailing fragment with no
/// terminating newline is never emitted.
#[derive(Debug, Default)]
pub struct JsonLinesParser {
    buffer: Vec<u8>,
    /// Whether the buffer has been truncated due to size limits
    truncated: bool,
}

impl JsonLinesParser {
    /// Create a new JSON Lines parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return complete, trimmed, non-blank lines.
    ///
    /// Only the unterminated remainder counts against the 1MB cap. A
    /// remainder past the cap is dropped and a warning logged once per
    /// oversized line.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;

        while let Some(pos) = self.buffer[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            let text = String::from_utf8_lossy(&self.buffer[start..end]);
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
            start = end + 1;
            self.truncated = false;
        }
        self.buffer.drain(..start);

        if self.buffer.len() > MAX_BUFFER_SIZE {
            if !self.truncated {
                tracing::warn!(
                    bytes = self.buffer.len(),
                    "Unterminated stream line exceeded {} bytes, dropping it",
                    MAX_BUFFER_SIZE
                );
                self.truncated = true;
            }
            self.buffer.clear();
        }

        lines
    }

    /// Drop any unterminated trailing fragment, returning its length in bytes.
    pub fn discard_remainder(&mut self) -> usize {
        let len = self.buffer.len();
        self.buffer.clear();
        self.truncated = false;
        len
    }
}

// ============================================================================
// Line classification
// ============================================================================

/// Ollama's terminal metadata line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OllamaDone {
    /// Model that served the request
    #[serde(default)]
    pub model: Option<String>,
    /// Server timestamp
    #[serde(default)]
    pub created_at: Option<String>,
    /// Why generation stopped (e.g. "stop", "length"); servers may send null
    #[serde(default)]
    pub done_reason: Option<String>,
    /// Total time (ns)
    #[serde(default)]
    pub total_duration: Option<u64>,
    /// Model load time (ns)
    #[serde(default)]
    pub load_duration: Option<u64>,
    /// Authoritative prompt token count
    #[serde(default)]
    pub prompt_eval_count: Option<usize>,
    /// Prompt evaluation time (ns)
    #[serde(default)]
    pub prompt_eval_duration: Option<u64>,
    /// Generated token count
    #[serde(default)]
    pub eval_count: Option<usize>,
    /// Generation time (ns)
    #[serde(default)]
    pub eval_duration: Option<u64>,
}

/// What one stream line means to the accumulator
#[derive(Debug, Clone, PartialEq)]
pub enum StreamLine {
    /// A content fragment to append
    Fragment(String),
    /// Ollama terminal metadata; stop reading
    Done(OllamaDone),
    /// `[DONE]` marker; stop reading
    End,
    /// Valid JSON with nothing to append
    Empty,
    /// Undecodable line, with the decode error
    Malformed(String),
}

impl StreamLine {
    /// Whether reading should stop after this line
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamLine::Done(_) | StreamLine::End)
    }
}

/// Decode one trimmed stream line.
pub fn classify_line(style: ApiStyle, line: &str) -> StreamLine {
    let payload = strip_sse_data(line);

    if payload == "[DONE]" {
        return StreamLine::End;
    }

    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => return StreamLine::Malformed(e.to_string()),
    };

    if !value.is_object() {
        return StreamLine::Malformed("expected a JSON object".to_string());
    }

    // Any line carrying `done_reason` ends the stream, even if its
    // metadata fields have unexpected types.
    if style == ApiStyle::Ollama && value.get("done_reason").is_some() {
        let meta = match serde_json::from_value::<OllamaDone>(value.clone()) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::debug!(error = %e, "Undecodable ollama done metadata");
                OllamaDone {
                    done_reason: value
                        .get("done_reason")
                        .and_then(|r| r.as_str())
                        .map(str::to_string),
                    ..Default::default()
                }
            }
        };
        return StreamLine::Done(meta);
    }

    match extract_content(&value) {
        Some(content) => StreamLine::Fragment(content.to_string()),
        None => StreamLine::Empty,
    }
}

fn strip_sse_data(line: &str) -> &str {
    line.strip_prefix("data:").map(str::trim).unwrap_or(line)
}

/// `message.content`, or openai's `choices[0].delta.content`
fn extract_content(value: &serde_json::Value) -> Option<&str> {
    if let Some(content) = value
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
    {
        return Some(content);
    }

    value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
}

// ============================================================================
// Stream Accumulator
// ============================================================================

/// Per-run buffer for a streamed response
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    fragments: usize,
    meta: Option<OllamaDone>,
    malformed: usize,
}

impl StreamAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and return the running concatenation
    pub fn push(&mut self, fragment: &str) -> &str {
        self.text.push_str(fragment);
        self.fragments += 1;
        &self.text
    }

    /// Record ollama's terminal metadata
    pub fn finish(&mut self, meta: OllamaDone) {
        self.meta = Some(meta);
    }

    /// Count a skipped line
    pub fn skip_malformed(&mut self) {
        self.malformed += 1;
    }

    /// Accumulated text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of fragments appended
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    /// Number of malformed lines skipped
    pub fn malformed(&self) -> usize {
        self.malformed
    }

    /// Terminal metadata, if the server sent it
    pub fn meta(&self) -> Option<&OllamaDone> {
        self.meta.as_ref()
    }

    /// Server-reported prompt token count
    pub fn prompt_eval_count(&self) -> Option<usize> {
        self.meta.as_ref().and_then(|m| m.prompt_eval_count)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jsonl_parser_basic() {
        let mut parser = JsonLinesParser::new();

        let lines = parser.feed(b"{\"a\": 1}\n{\"b\": 2}\n");
        assert_eq!(lines, vec!["{\"a\": 1}", "{\"b\": 2}"]);
        assert_eq!(parser.discard_remainder(), 0);
    }

    #[test]
    fn test_jsonl_parser_partial_and_blank() {
        let mut parser = JsonLinesParser::new();

        assert!(parser.feed(b"  {\"a\":").is_empty());

        let lines = parser.feed(b" 1}  \r\n\n   \n");
        assert_eq!(lines, vec!["{\"a\": 1}"]);
    }

    #[test]
    fn test_jsonl_parser_discards_unterminated_tail() {
        let mut parser = JsonLinesParser::new();

        let lines = parser.feed(b"{\"a\":1}\n{\"tail\":");
        assert_eq!(lines.len(), 1);
        assert_eq!(parser.discard_remainder(), 8);
        assert_eq!(parser.discard_remainder(), 0);
    }

    #[test]
    fn test_jsonl_parser_split_utf8() {
        let mut parser = JsonLinesParser::new();
        let line = "{\"c\":\"héllo\"}\n".as_bytes();
        // Split inside the two-byte 'é'
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;

        assert!(parser.feed(&line[..split]).is_empty());
        let lines = parser.feed(&line[split..]);
        assert_eq!(lines, vec!["{\"c\":\"héllo\"}"]);
    }

    #[test]
    fn test_classify_ollama_fragment_and_done() {
        let line = r#"{"model":"llama3","message":{"role":"assistant","content":"Hel"},"done":false}"#;
        assert_eq!(
            classify_line(ApiStyle::Ollama, line),
            StreamLine::Fragment("Hel".into())
        );

        let done = r#"{"model":"llama3","message":{"role":"assistant","content":"ignored"},"done":true,"done_reason":"stop","prompt_eval_count":7,"eval_count":2}"#;
        match classify_line(ApiStyle::Ollama, done) {
            StreamLine::Done(meta) => {
                assert_eq!(meta.done_reason.as_deref(), Some("stop"));
                assert_eq!(meta.prompt_eval_count, Some(7));
                assert_eq!(meta.eval_count, Some(2));
                assert_eq!(meta.model.as_deref(), Some("llama3"));
            }
            other => panic!("expected Done, got {:?}", other),
        }
    }

    #[test]
    fn test_done_reason_only_terminal_for_ollama() {
        let line = r#"{"message":{"content":"x"},"done_reason":"stop"}"#;
        assert_eq!(
            classify_line(ApiStyle::OpenAI, line),
            StreamLine::Fragment("x".into())
        );
    }

    #[test]
    fn test_classify_malformed_concatenation() {
        let line = r#"{"message":{"content":"a"}}{"message":{"content":"b"}}"#;
        assert!(matches!(
            classify_line(ApiStyle::Ollama, line),
            StreamLine::Malformed(_)
        ));
        assert!(matches!(
            classify_line(ApiStyle::Ollama, "[1, 2]"),
            StreamLine::Malformed(_)
        ));
    }

    #[test]
    fn test_classify_sse_lines() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#;
        assert_eq!(
            classify_line(ApiStyle::OpenAI, line),
            StreamLine::Fragment("Hi".into())
        );
        assert_eq!(classify_line(ApiStyle::OpenAI, "data: [DONE]"), StreamLine::End);
        assert!(classify_line(ApiStyle::OpenAI, "data: [DONE]").is_terminal());
        assert_eq!(
            classify_line(ApiStyle::OpenAI, r#"data: {"choices":[{"delta":{}}]}"#),
            StreamLine::Empty
        );
    }

    #[test]
    fn test_jsonl_parser_keeps_complete_lines_past_buffer_cap() {
        let mut parser = JsonLinesParser::new();
        let line = b"{\"message\":{\"content\":\"word \"}}\n";
        let count = MAX_BUFFER_SIZE / line.len() + 1000;
        let mut chunk = line.repeat(count);
        chunk.extend_from_slice(b"{\"message\":");

        assert!(chunk.len() > MAX_BUFFER_SIZE);
        let lines = parser.feed(&chunk);

        assert_eq!(lines.len(), count);
        assert!(lines
            .iter()
            .all(|l| classify_line(ApiStyle::Ollama, l) == StreamLine::Fragment("word ".into())));
        assert_eq!(parser.discard_remainder(), 11);
    }

    #[test]
    fn test_jsonl_parser_drops_oversized_unterminated_line() {
        let mut parser = JsonLinesParser::new();
        let huge = vec![b'x'; MAX_BUFFER_SIZE + 1];

        assert!(parser.feed(&huge).is_empty());
        assert_eq!(parser.discard_remainder(), 0);

        let lines = parser.feed(b"{\"a\":1}\n");
        assert_eq!(lines, vec!["{\"a\":1}"]);
    }

    #[test]
    fn test_classify_done_reason_null_is_terminal() {
        let line = r#"{"message":{"content":"x"},"done":true,"done_reason":null,"prompt_eval_count":3}"#;
        match classify_line(ApiStyle::Ollama, line) {
            StreamLine::Done(meta) => {
                assert_eq!(meta.done_reason, None);
                assert_eq!(meta.prompt_eval_count, Some(3));
            }
            other => panic!("expected Done, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_done_reason_with_odd_metadata_is_terminal() {
        let line = r#"{"done_reason":7,"prompt_eval_count":"many"}"#;
        let classified = classify_line(ApiStyle::Ollama, line);

        assert!(classified.is_terminal());
        assert_eq!(classified, StreamLine::Done(OllamaDone::default()));
    }

    #[test]
    fn test_accumulator() {
        let mut acc = StreamAccumulator::new();
        assert_eq!(acc.push("Hel"), "Hel");
        assert_eq!(acc.push("lo"), "Hello");
        acc.skip_malformed();
        assert!(acc.prompt_eval_count().is_none());

        acc.finish(OllamaDone {
            done_reason: Some("stop".into()),
            prompt_eval_count: Some(4),
            ..Default::default()
        });

        assert_eq!(acc.fragments(), 2);
        assert_eq!(acc.malformed(), 1);
        assert_eq!(acc.prompt_eval_count(), Some(4));
        assert_eq!(acc.meta().and_then(|m| m.done_reason.as_deref()), Some("stop"));
        assert_eq!(acc.text(), "Hello");
    }
}
