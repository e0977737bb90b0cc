//! The tool registry — the closed set of actions the reasoning model may
//! request.
//!
//! Dispatch is a tagged enum, not a name→handler map: an unknown name
//! parses to an error the loop converts into a recoverable tool result,
//! never a lookup failure. [`definitions`] produces the JSON schemas sent
//! to the model so it knows what it may invoke.

use siteforge_core::error::ToolError;
use siteforge_core::provider::ToolDefinition;
use siteforge_core::tool::ToolCall;
use serde_json::json;

pub const CREATE_FILE: &str = "create_file";
pub const EXECUTE_COMMAND: &str = "execute_command";
pub const SAVE_CONTEXT: &str = "save_context";
pub const GET_CONTEXT: &str = "get_context";

/// A parsed, validated tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolKind {
    /// Write a file under the project root in the execution environment.
    CreateFile { file_path: String, content: String },

    /// Run a shell command in the environment. `background` launches a
    /// long-running service (dev server) instead of waiting for exit.
    ExecuteCommand { command: String, background: bool },

    /// Persist cross-session memory for this project.
    SaveContext {
        semantic: String,
        procedural: String,
        episodic: String,
    },

    /// Retrieve previously saved cross-session memory.
    GetContext,
}

impl ToolKind {
    /// Parse a raw tool call into a [`ToolKind`].
    ///
    /// Missing or empty required arguments and unknown tool names are
    /// [`ToolError`]s — input errors the loop reports back to the model
    /// conversationally.
    pub fn parse(call: &ToolCall) -> Result<Self, ToolError> {
        match call.name.as_str() {
            CREATE_FILE => {
                let file_path = required_str(call, "file_path")?;
                let content = optional_str(call, "content");
                Ok(Self::CreateFile { file_path, content })
            }
            EXECUTE_COMMAND => {
                let command = required_str(call, "command")?;
                let background = call.arguments["background"].as_bool().unwrap_or(false);
                Ok(Self::ExecuteCommand {
                    command,
                    background,
                })
            }
            SAVE_CONTEXT => {
                let semantic = required_str(call, "semantic")?;
                Ok(Self::SaveContext {
                    semantic,
                    procedural: optional_str(call, "procedural"),
                    episodic: optional_str(call, "episodic"),
                })
            }
            GET_CONTEXT => Ok(Self::GetContext),
            other => Err(ToolError::Unknown(other.to_string())),
        }
    }

    /// The wire name of this tool.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateFile { .. } => CREATE_FILE,
            Self::ExecuteCommand { .. } => EXECUTE_COMMAND,
            Self::SaveContext { .. } => SAVE_CONTEXT,
            Self::GetContext => GET_CONTEXT,
        }
    }
}

fn required_str(call: &ToolCall, key: &str) -> Result<String, ToolError> {
    match call.arguments[key].as_str() {
        Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
        _ => Err(ToolError::MissingArgument {
            tool_name: call.name.clone(),
            argument: key.to_string(),
        }),
    }
}

fn optional_str(call: &ToolCall, key: &str) -> String {
    call.arguments[key].as_str().unwrap_or_default().to_string()
}

/// Tool definitions sent to the reasoning model.
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: CREATE_FILE.into(),
            description: "Create a file with the given content at the specified path, \
                          relative to the project root (e.g., \"src/App.jsx\"). \
                          Parent directories are created as needed."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "The path where the file should be created, relative to the project root"
                    },
                    "content": {
                        "type": "string",
                        "description": "The complete content to write to the file"
                    }
                },
                "required": ["file_path", "content"]
            }),
        },
        ToolDefinition {
            name: EXECUTE_COMMAND.into(),
            description: "Execute a shell command in the project environment \
                          (e.g., \"npm install\"). Returns stdout, stderr, and the exit code. \
                          Set background=true for long-running services like \"npm run dev\"; \
                          the call then returns the service URL once the port is accepting \
                          connections."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The command to execute"
                    },
                    "background": {
                        "type": "boolean",
                        "description": "Launch as a background service instead of waiting for exit"
                    }
                },
                "required": ["command"]
            }),
        },
        ToolDefinition {
            name: SAVE_CONTEXT.into(),
            description: "Save project context (semantic, procedural, and episodic memory) \
                          for future sessions. The generated-file map is captured \
                          automatically."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "semantic": {
                        "type": "string",
                        "description": "Natural-language summary of the current project state (components, pages, libraries)"
                    },
                    "procedural": {
                        "type": "string",
                        "description": "Instructions or conventions for how to modify or extend the project"
                    },
                    "episodic": {
                        "type": "string",
                        "description": "Recent reasoning or decisions"
                    }
                },
                "required": ["semantic"]
            }),
        },
        ToolDefinition {
            name: GET_CONTEXT.into(),
            description: "Fetch the last saved context for this project: semantic, procedural, \
                          and episodic memory along with the code map from previous sessions."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {}
            }),
        },
    ]
}
