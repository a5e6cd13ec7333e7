use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, Role};

/// A message as transmitted to the completions endpoint.
///
/// This is the wire shape only; conversions from [`ChatMessage`] are lossy
/// on purpose (id, timestamp, and model attribution stay client-side).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireMessage {
    /// Wire role: `system`, `user`, or `assistant`.
    pub role: String,

    /// The message text.
    pub content: String,
}

impl WireMessage {
    /// Creates a wire message with the given role and content.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Creates a wire-level system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        let role = match message.role {
            Role::System => "system",
            Role::Human => "user",
            Role::Assistant => "assistant",
        };
        Self::new(role, message.text.clone())
    }
}

/// Request body for the chat completions endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    /// Model identifier.
    pub model: String,

    /// Ordered prompt context.
    pub messages: Vec<WireMessage>,

    /// Whether the response should be streamed.
    pub stream: bool,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Cap on generated tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// Creates a streaming request for `model` over `messages`.
    pub fn new(model: impl Into<String>, messages: Vec<WireMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the generated-token cap.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// One server-sent chunk of a streaming completion.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct CompletionChunk {
    /// Server-assigned completion id.
    #[serde(default)]
    pub id: String,

    /// Alternative completions; streaming requests carry exactly one.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// One choice within a streamed chunk.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChunkChoice {
    /// Index of the choice within the completion.
    #[serde(default)]
    pub index: u32,

    /// The incremental payload.
    #[serde(default)]
    pub delta: ChunkDelta,

    /// Why generation stopped, present only on the closing chunk.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental payload of a streamed chunk.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ChunkDelta {
    /// Role announcement, present only on the opening chunk.
    #[serde(default)]
    pub role: Option<String>,

    /// The text fragment, absent on role-only and closing chunks.
    #[serde(default)]
    pub content: Option<String>,
}

impl CompletionChunk {
    /// Returns the text fragment carried by this chunk, if any.
    pub fn content_fragment(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
    }

    /// Returns the finish reason carried by this chunk, if any.
    pub fn finish_reason(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.finish_reason.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn request_serialization_minimal() {
        let request = CompletionRequest::new(
            "gpt-3.5-turbo",
            vec![WireMessage::new("user", "Hello!")],
        );
        let json = to_value(&request).unwrap();

        assert_eq!(
            json,
            json!({
                "model": "gpt-3.5-turbo",
                "messages": [
                    {"role": "user", "content": "Hello!"}
                ],
                "stream": true
            })
        );
    }

    #[test]
    fn request_serialization_with_sampling() {
        let request = CompletionRequest::new("gpt-4", vec![WireMessage::system("Be terse.")])
            .with_temperature(Some(0.0))
            .with_max_tokens(Some(256));
        let json = to_value(&request).unwrap();

        assert_eq!(json["temperature"], json!(0.0));
        assert_eq!(json["max_tokens"], json!(256));
    }

    #[test]
    fn wire_message_from_chat_message() {
        let human = crate::types::ChatMessage::human("2+2?");
        let wire = WireMessage::from(&human);
        assert_eq!(wire.role, "user");
        assert_eq!(wire.content, "2+2?");

        let system = crate::types::ChatMessage::system("You are helpful.");
        let wire = WireMessage::from(&system);
        assert_eq!(wire.role, "system");
    }

    #[test]
    fn chunk_deserialization() {
        let json = json!({
            "id": "chatcmpl-abc123",
            "object": "chat.completion.chunk",
            "created": 1700000000,
            "model": "gpt-3.5-turbo",
            "choices": [
                {"index": 0, "delta": {"content": "Hel"}, "finish_reason": null}
            ]
        });

        let chunk: CompletionChunk = serde_json::from_value(json).unwrap();
        assert_eq!(chunk.id, "chatcmpl-abc123");
        assert_eq!(chunk.content_fragment(), Some("Hel"));
        assert_eq!(chunk.finish_reason(), None);
    }

    #[test]
    fn closing_chunk_has_no_fragment() {
        let json = json!({
            "id": "chatcmpl-abc123",
            "choices": [
                {"index": 0, "delta": {}, "finish_reason": "stop"}
            ]
        });

        let chunk: CompletionChunk = serde_json::from_value(json).unwrap();
        assert_eq!(chunk.content_fragment(), None);
        assert_eq!(chunk.finish_reason(), Some("stop"));
    }

    #[test]
    fn role_only_chunk() {
        let json = json!({
            "choices": [
                {"index": 0, "delta": {"role": "assistant"}, "finish_reason": null}
            ]
        });

        let chunk: CompletionChunk = serde_json::from_value(json).unwrap();
        assert_eq!(chunk.content_fragment(), None);
        assert_eq!(chunk.choices[0].delta.role.as_deref(), Some("assistant"));
    }
}
