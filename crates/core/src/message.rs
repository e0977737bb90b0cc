//! Message and Conversation domain types.
//!
//! These are the core value objects that flow through a run:
//! a client submits a prompt → the agent loop solicits the reasoning model →
//! tool results are appended → the model answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (persona, rules)
    System,
    /// The human prompt
    User,
    /// The reasoning model
    Assistant,
    /// Tool execution result
    Tool,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create an assistant message carrying tool calls.
    pub fn assistant_with_calls(
        content: impl Into<String>,
        tool_calls: Vec<MessageToolCall>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            timestamp: Utc::now(),
        }
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call (unique within a run)
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON object
    pub arguments: serde_json::Value,
}

/// A conversation is an append-only ordered sequence of messages, owned
/// exclusively by one run for its duration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Ordered messages
    pub messages: Vec<Message>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// Ids of tool calls in the last assistant message that have no matching
    /// tool result yet. The loop must drain this before the next turn.
    pub fn unanswered_tool_calls(&self) -> Vec<&MessageToolCall> {
        let Some(last_assistant) = self
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
        else {
            return Vec::new();
        };

        last_assistant
            .tool_calls
            .iter()
            .filter(|tc| {
                !self.messages.iter().any(|m| {
                    m.role == Role::Tool && m.tool_call_id.as_deref() == Some(tc.id.as_str())
                })
            })
            .collect()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Build me a landing page");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Build me a landing page");
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn conversation_tracks_updates() {
        let mut conv = Conversation::new();
        let created = conv.created_at;

        conv.push(Message::user("First message"));
        assert_eq!(conv.messages.len(), 1);
        assert!(conv.updated_at >= created);
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::tool_result("call_1", "file written");
        let json = serde_json::to_string(&msg).unwrap();
        let deserialized: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.content, "file written");
        assert_eq!(deserialized.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn unanswered_tool_calls_drain() {
        let mut conv = Conversation::new();
        conv.push(Message::user("go"));
        conv.push(Message::assistant_with_calls(
            "",
            vec![
                MessageToolCall {
                    id: "call_1".into(),
                    name: "create_file".into(),
                    arguments: json!({"file_path": "index.html", "content": "<html/>"}),
                },
                MessageToolCall {
                    id: "call_2".into(),
                    name: "execute_command".into(),
                    arguments: json!({"command": "npm install"}),
                },
            ],
        ));

        assert_eq!(conv.unanswered_tool_calls().len(), 2);

        conv.push(Message::tool_result("call_1", "ok"));
        let pending = conv.unanswered_tool_calls();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "call_2");

        conv.push(Message::tool_result("call_2", "ok"));
        assert!(conv.unanswered_tool_calls().is_empty());
    }
}
