//! Provider trait — the abstraction over the reasoning backend.
//!
//! A Provider knows how to send a conversation plus tool schemas to a
//! reasoning model and get back one of three things: assistant text, a set
//! of tool requests, or both. The agent loop never looks past that contract.

use crate::error::ProviderError;
use crate::message::{Message, MessageToolCall};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gemini-2.5-flash")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A tool definition sent to the model so it knows what it may invoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated assistant message (text and/or tool calls)
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// What the model asked for this turn, decoded once at the boundary.
///
/// The loop branches on this tagged union instead of sniffing field
/// presence on the raw message.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// Final answer — no further tool work requested.
    Text(String),
    /// Tool requests only, no accompanying narration.
    ToolRequests(Vec<MessageToolCall>),
    /// Narration plus tool requests.
    Both(String, Vec<MessageToolCall>),
}

impl ProviderResponse {
    /// Decode this response into an explicit [`TurnOutcome`].
    pub fn outcome(&self) -> TurnOutcome {
        let text = self.message.content.trim();
        match (text.is_empty(), self.message.tool_calls.is_empty()) {
            (_, true) => TurnOutcome::Text(self.message.content.clone()),
            (true, false) => TurnOutcome::ToolRequests(self.message.tool_calls.clone()),
            (false, false) => TurnOutcome::Both(
                self.message.content.clone(),
                self.message.tool_calls.clone(),
            ),
        }
    }
}

/// The reasoning backend trait.
///
/// The agent loop calls `complete()` without knowing which backend is in
/// use — pure polymorphism. Implementations live in `siteforge-providers`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "gemini").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_request_defaults() {
        let req = ProviderRequest {
            model: "gemini-2.5-flash".into(),
            messages: vec![],
            temperature: default_temperature(),
            max_tokens: None,
            tools: vec![],
        };
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "create_file".into(),
            description: "Create a file at a path".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "file_path": { "type": "string" },
                    "content": { "type": "string" }
                },
                "required": ["file_path", "content"]
            }),
        };
        let json = serde_json::to_string(&tool).unwrap();
        assert!(json.contains("create_file"));
        assert!(json.contains("file_path"));
    }

    fn response_with(content: &str, calls: Vec<MessageToolCall>) -> ProviderResponse {
        ProviderResponse {
            message: Message::assistant_with_calls(content, calls),
            usage: None,
            model: "test".into(),
        }
    }

    fn call(id: &str) -> MessageToolCall {
        MessageToolCall {
            id: id.into(),
            name: "create_file".into(),
            arguments: json!({}),
        }
    }

    #[test]
    fn outcome_text_only() {
        let resp = response_with("All done!", vec![]);
        assert!(matches!(resp.outcome(), TurnOutcome::Text(t) if t == "All done!"));
    }

    #[test]
    fn outcome_tools_only() {
        let resp = response_with("", vec![call("c1")]);
        assert!(matches!(resp.outcome(), TurnOutcome::ToolRequests(calls) if calls.len() == 1));
    }

    #[test]
    fn outcome_both() {
        let resp = response_with("Creating files now", vec![call("c1"), call("c2")]);
        match resp.outcome() {
            TurnOutcome::Both(text, calls) => {
                assert_eq!(text, "Creating files now");
                assert_eq!(calls.len(), 2);
            }
            other => panic!("Expected Both, got {other:?}"),
        }
    }

    #[test]
    fn outcome_empty_text_no_tools_is_text() {
        // A degenerate response still terminates the loop as a final answer.
        let resp = response_with("", vec![]);
        assert!(matches!(resp.outcome(), TurnOutcome::Text(_)));
    }
}
