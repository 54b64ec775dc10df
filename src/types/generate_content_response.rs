use serde::{Deserialize, Serialize};

use crate::types::Content;

/// One streamed chunk of a `streamGenerateContent` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Candidate continuations; the client reads the first.
    #[serde(default)]
    pub candidates: Vec<Candidate>,

    /// Set when the prompt itself was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<PromptFeedback>,

    /// Token accounting, usually only on the final chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,

    /// An error reported inside the stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl GenerateContentResponse {
    /// The answer text carried by this chunk, excluding reasoning parts.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|part| part.thought != Some(true))
                    .filter_map(|part| part.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The finish reason of the first candidate, if the model stopped.
    pub fn finish_reason(&self) -> Option<&FinishReason> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.finish_reason.as_ref())
    }
}

/// A candidate continuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// The generated content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,

    /// Why generation stopped; absent on intermediate chunks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinishReason {
    /// Natural end of the answer.
    Stop,

    /// The token limit was reached.
    MaxTokens,

    /// Stopped by a safety filter.
    Safety,

    /// Stopped for reciting protected material.
    Recitation,

    /// Any reason this client does not distinguish.
    #[serde(other)]
    Other,
}

impl FinishReason {
    /// True if the answer was cut off by a content filter.
    pub fn is_blocked(&self) -> bool {
        matches!(self, FinishReason::Safety | FinishReason::Recitation)
    }
}

/// Feedback about the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    /// Set when the prompt was blocked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
}

/// Token counts for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    /// Tokens in the prompt.
    #[serde(default)]
    pub prompt_token_count: u32,

    /// Tokens generated so far.
    #[serde(default)]
    pub candidates_token_count: u32,

    /// Prompt plus generated tokens.
    #[serde(default)]
    pub total_token_count: u32,
}

/// Error payload used by the API both in error responses and inside streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ErrorBody {
    /// HTTP-like status code.
    #[serde(default)]
    pub code: u16,

    /// Human-readable message.
    #[serde(default)]
    pub message: String,

    /// Canonical status name, e.g. `RESOURCE_EXHAUSTED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Envelope of a non-success HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ErrorResponse {
    /// The error details.
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_streamed_chunk() {
        let json = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hi "},{"text":"there!"}]},"index":0}],"modelVersion":"gemini-2.5-flash"}"#;
        let chunk: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.text(), "Hi there!");
        assert!(chunk.finish_reason().is_none());
    }

    #[test]
    fn parse_final_chunk() {
        let json = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"."}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":4,"candidatesTokenCount":3,"totalTokenCount":7}}"#;
        let chunk: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.finish_reason(), Some(&FinishReason::Stop));
        assert_eq!(chunk.usage_metadata.unwrap().total_token_count, 7);
    }

    #[test]
    fn thoughts_are_not_answer_text() {
        let json = r#"{"candidates":[{"content":{"parts":[{"text":"pondering","thought":true},{"text":"42"}]}}]}"#;
        let chunk: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.text(), "42");
    }

    #[test]
    fn unknown_finish_reason() {
        let json = r#"{"candidates":[{"finishReason":"MALFORMED_FUNCTION_CALL"}]}"#;
        let chunk: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.finish_reason(), Some(&FinishReason::Other));
        assert_eq!(chunk.text(), "");
    }

    #[test]
    fn parse_error_envelope() {
        let json = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let response: ErrorResponse = serde_json::from_str(json).unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, 429);
        assert_eq!(error.status.as_deref(), Some("RESOURCE_EXHAUSTED"));
    }
}
