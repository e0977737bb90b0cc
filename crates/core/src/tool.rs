//! Raw tool invocation types.
//!
//! A [`ToolCall`] is what the reasoning backend emits; the `siteforge-tools`
//! crate parses it into a closed set of actions. A [`ToolResult`] is what
//! flows back into the conversation as a tool message.

use serde::{Deserialize, Serialize};

/// A request to execute a tool, as issued by the reasoning backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (unique within a run)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON object
    pub arguments: serde_json::Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output text fed back to the model
    pub output: String,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            success: true,
            output: output.into(),
        }
    }

    pub fn err(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            success: false,
            output: output.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_constructors() {
        let ok = ToolResult::ok("c1", "done");
        assert!(ok.success);
        assert_eq!(ok.call_id, "c1");

        let err = ToolResult::err("c2", "boom");
        assert!(!err.success);
        assert_eq!(err.output, "boom");
    }

    #[test]
    fn tool_call_roundtrip() {
        let call = ToolCall {
            id: "call_9".into(),
            name: "execute_command".into(),
            arguments: serde_json::json!({"command": "npm install"}),
        };
        let json = serde_json::to_string(&call).unwrap();
        let back: ToolCall = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "execute_command");
        assert_eq!(back.arguments["command"], "npm install");
    }
}
