//! The agent reasoning loop implementation.

use siteforge_core::environment::{Environment, EnvironmentManager};
use siteforge_core::error::{Error, ToolError};
use siteforge_core::event::{EventRouter, RunEvent};
use siteforge_core::identity::Identity;
use siteforge_core::message::{Conversation, Message, MessageToolCall};
use siteforge_core::provider::{Provider, ProviderRequest, TurnOutcome};
use siteforge_core::session::{RunOutcome, RunStatus};
use siteforge_core::tool::{ToolCall, ToolResult};
use siteforge_store::SessionStore;
use siteforge_tools::ToolKind;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Hard bound on reason/act iterations per run.
pub const DEFAULT_MAX_ITERATIONS: u32 = 50;

/// Command text is echoed to observers truncated to this length.
const COMMAND_PREVIEW_LEN: usize = 200;

/// The note appended to conversation state when a run is cut off at the
/// iteration bound.
const TRUNCATION_NOTE: &str =
    "The run was stopped: the iteration limit was reached before a final answer was produced. \
     Work completed so far has been kept.";

/// Per-run state: conversation, iteration counter, and the borrowed
/// environment handle. Owned exclusively by one `run()` call; the
/// environment's lifecycle belongs to the manager.
struct RunSession {
    environment: Arc<dyn Environment>,
    conversation: Conversation,
    iterations: u32,
    status: RunStatus,
}

/// The core agent loop that orchestrates model calls and tool execution.
pub struct AgentLoop {
    /// The reasoning backend
    provider: Arc<dyn Provider>,

    /// The model to use
    model: String,

    /// Temperature setting
    temperature: f32,

    /// Max tokens per model response
    max_tokens: Option<u32>,

    /// Environment lifecycle owner
    environments: Arc<dyn EnvironmentManager>,

    /// Manifest + context persistence
    store: SessionStore,

    /// Event delivery to attached observers
    events: Arc<EventRouter>,

    /// System persona
    identity: Identity,

    /// Maximum loop iterations per run
    max_iterations: u32,

    /// Timeout applied to every foreground command
    command_timeout: Duration,

    /// Port background services are probed and exposed on
    dev_server_port: u16,
}

impl AgentLoop {
    /// Create a new agent loop.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        environments: Arc<dyn EnvironmentManager>,
        store: SessionStore,
        events: Arc<EventRouter>,
        identity: Identity,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            environments,
            store,
            events,
            identity,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            command_timeout: Duration::from_secs(120),
            dev_server_port: 5173,
        }
    }

    /// Set the maximum number of loop iterations.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the max tokens per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the foreground command timeout.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the dev server port used for background services.
    pub fn with_dev_server_port(mut self, port: u16) -> Self {
        self.dev_server_port = port;
        self
    }

    /// Run the loop for one prompt against one session.
    ///
    /// Errors from individual tools never abort the run; only reasoning
    /// backend failures and environment provisioning failures do.
    pub async fn run(&self, session_id: &str, prompt: &str) -> Result<RunOutcome, Error> {
        info!(session_id, "Starting run");
        self.events
            .emit(
                session_id,
                RunEvent::Started {
                    message: "Creating project...".into(),
                },
            )
            .await;

        // Environment provisioning failure is fatal to the run.
        let environment = match self.environments.ensure(session_id).await {
            Ok(env) => env,
            Err(e) => {
                self.events
                    .emit(
                        session_id,
                        RunEvent::Error {
                            message: format!("Environment creation failed: {e}"),
                        },
                    )
                    .await;
                return Err(e.into());
            }
        };

        let mut session = RunSession {
            environment,
            conversation: Conversation::new(),
            iterations: 0,
            status: RunStatus::Running,
        };
        session
            .conversation
            .push(Message::system(&self.identity.system_prompt));
        session.conversation.push(Message::user(prompt));

        let tool_definitions = siteforge_tools::definitions();

        session.status = loop {
            if session.iterations == self.max_iterations {
                warn!(
                    session_id,
                    iterations = session.iterations,
                    "Iteration bound reached, truncating run"
                );
                session.conversation.push(Message::system(TRUNCATION_NOTE));
                break RunStatus::Truncated;
            }
            session.iterations += 1;

            debug!(
                session_id,
                iteration = session.iterations,
                "Agent loop iteration"
            );

            // Every requested call got its result before this turn.
            debug_assert!(session.conversation.unanswered_tool_calls().is_empty());

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: session.conversation.messages.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tool_definitions.clone(),
            };

            // A backend failure here is unrecoverable: emit and propagate.
            let response = match self.provider.complete(request).await {
                Ok(r) => r,
                Err(e) => {
                    self.events
                        .emit(
                            session_id,
                            RunEvent::Error {
                                message: format!("Reasoning backend error: {e}"),
                            },
                        )
                        .await;
                    return Err(e.into());
                }
            };

            let outcome = response.outcome();
            session.conversation.push(response.message);

            let tool_calls = match outcome {
                TurnOutcome::Text(text) => {
                    if !text.trim().is_empty() {
                        self.events
                            .emit(session_id, RunEvent::Thinking { message: text })
                            .await;
                    }
                    // The only success exit: no tool requests this turn.
                    break RunStatus::Completed;
                }
                TurnOutcome::ToolRequests(calls) => calls,
                TurnOutcome::Both(text, calls) => {
                    self.events
                        .emit(session_id, RunEvent::Thinking { message: text })
                        .await;
                    calls
                }
            };

            // Strictly sequential, in emission order: later calls in the
            // same turn may depend on earlier ones' side effects.
            for call in &tool_calls {
                let result = self
                    .execute_tool(session_id, session.environment.as_ref(), call)
                    .await;
                debug!(session_id, tool = %call.name, success = result.success, "Tool result recorded");
                session
                    .conversation
                    .push(Message::tool_result(&result.call_id, &result.output));
            }
        };

        let files = self.store.load_manifest(session_id).await.unwrap_or_else(|e| {
            warn!(session_id, error = %e, "Manifest read failed at run end");
            Vec::new()
        });

        let completion_message = match session.status {
            RunStatus::Truncated => "Run stopped at the iteration limit".to_string(),
            _ => "Project created successfully".to_string(),
        };
        self.events
            .emit(
                session_id,
                RunEvent::Completed {
                    message: completion_message,
                    environment_id: session.environment.id().to_string(),
                    file_count: files.len(),
                },
            )
            .await;

        info!(
            session_id,
            status = %session.status,
            iterations = session.iterations,
            files = files.len(),
            "Run finished"
        );

        let environment_active = self.environments.get(session_id).await.is_some();
        Ok(RunOutcome {
            status: session.status,
            iterations: session.iterations,
            files,
            environment_id: Some(session.environment.id().to_string()),
            environment_active,
        })
    }

    /// Execute one tool call and produce the result text fed back to the
    /// model. Never fails the run: every failure becomes descriptive text
    /// plus a `tool_error` event.
    async fn execute_tool(
        &self,
        session_id: &str,
        environment: &dyn Environment,
        call: &MessageToolCall,
    ) -> ToolResult {
        let raw = ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        };

        let kind = match ToolKind::parse(&raw) {
            Ok(kind) => kind,
            Err(ToolError::Unknown(name)) => {
                // The model must be able to recover conversationally.
                debug!(session_id, tool = %name, "Unknown tool requested");
                return ToolResult::err(
                    &call.id,
                    format!(
                        "Unrecognized tool '{name}'. Available tools: create_file, \
                         execute_command, save_context, get_context."
                    ),
                );
            }
            Err(e) => {
                self.emit_tool_error(session_id, &call.name, &e.to_string())
                    .await;
                return ToolResult::err(&call.id, format!("Error: {e}"));
            }
        };

        let outcome = match kind {
            ToolKind::CreateFile { file_path, content } => {
                self.create_file(session_id, environment, &file_path, &content)
                    .await
            }
            ToolKind::ExecuteCommand {
                command,
                background,
            } => {
                if background {
                    self.start_service(session_id, environment, &command).await
                } else {
                    self.run_foreground(session_id, environment, &command).await
                }
            }
            ToolKind::SaveContext {
                semantic,
                procedural,
                episodic,
            } => self
                .save_context(session_id, &semantic, &procedural, &episodic)
                .await,
            ToolKind::GetContext => self.get_context(session_id).await,
        };

        match outcome {
            Ok(output) => ToolResult::ok(&call.id, output),
            Err(output) => ToolResult::err(&call.id, output),
        }
    }

    async fn create_file(
        &self,
        session_id: &str,
        environment: &dyn Environment,
        file_path: &str,
        content: &str,
    ) -> Result<String, String> {
        self.events
            .emit(
                session_id,
                RunEvent::FileCreating {
                    file_path: file_path.to_string(),
                },
            )
            .await;

        if let Err(e) = environment.write_file(file_path, content).await {
            self.emit_tool_error(session_id, siteforge_tools::CREATE_FILE, &e.to_string())
                .await;
            return Err(format!("Error: {e}"));
        }

        // Persist the manifest immediately: durability over batching.
        let entry = siteforge_core::session::FileManifestEntry {
            file_path: file_path.to_string(),
            content: content.to_string(),
        };
        if let Err(e) = self.store.append_manifest_entry(session_id, entry).await {
            self.emit_tool_error(session_id, siteforge_tools::CREATE_FILE, &e.to_string())
                .await;
            return Err(format!(
                "File {file_path} was written, but recording it failed: {e}"
            ));
        }

        self.events
            .emit(
                session_id,
                RunEvent::FileCreated {
                    file_path: file_path.to_string(),
                },
            )
            .await;

        Ok(format!("Created {file_path} ({} bytes)", content.len()))
    }

    async fn run_foreground(
        &self,
        session_id: &str,
        environment: &dyn Environment,
        command: &str,
    ) -> Result<String, String> {
        self.events
            .emit(
                session_id,
                RunEvent::Command {
                    command: preview(command),
                },
            )
            .await;

        let output = match environment.run_command(command, self.command_timeout).await {
            Ok(output) => output,
            Err(e) => {
                self.emit_tool_error(session_id, siteforge_tools::EXECUTE_COMMAND, &e.to_string())
                    .await;
                return Err(format!("Error: {e}"));
            }
        };

        // Non-zero exit codes are not fatal: the model sees the truth and
        // decides how to react.
        if output.success() {
            self.events
                .emit(
                    session_id,
                    RunEvent::CommandCompleted {
                        command: preview(command),
                        exit_code: output.exit_code,
                    },
                )
                .await;
            if output.stderr.is_empty() {
                Ok(output.stdout.trim().to_string())
            } else {
                Ok(format!(
                    "{}\n[stderr]: {}",
                    output.stdout.trim(),
                    output.stderr.trim()
                ))
            }
        } else {
            warn!(session_id, command = %preview(command), exit_code = output.exit_code, "Command failed");
            self.events
                .emit(
                    session_id,
                    RunEvent::CommandFailed {
                        error: output.stderr.trim().to_string(),
                        exit_code: output.exit_code,
                    },
                )
                .await;
            Err(format!(
                "[exit code: {}]\n{}\n{}",
                output.exit_code,
                output.stdout.trim(),
                output.stderr.trim()
            ))
        }
    }

    async fn start_service(
        &self,
        session_id: &str,
        environment: &dyn Environment,
        command: &str,
    ) -> Result<String, String> {
        self.events
            .emit(
                session_id,
                RunEvent::Command {
                    command: preview(command),
                },
            )
            .await;

        match environment
            .start_service(command, self.dev_server_port)
            .await
        {
            Ok(endpoint) => {
                self.events
                    .emit(
                        session_id,
                        RunEvent::DevServerStarted {
                            url: endpoint.url.clone(),
                            port: endpoint.port,
                        },
                    )
                    .await;
                Ok(format!(
                    "Service is running at {} (port {})",
                    endpoint.url, endpoint.port
                ))
            }
            Err(e) => {
                self.emit_tool_error(session_id, siteforge_tools::EXECUTE_COMMAND, &e.to_string())
                    .await;
                Err(format!("Error: {e}"))
            }
        }
    }

    async fn save_context(
        &self,
        session_id: &str,
        semantic: &str,
        procedural: &str,
        episodic: &str,
    ) -> Result<String, String> {
        match self
            .store
            .save_context(session_id, semantic, procedural, episodic)
            .await
        {
            Ok(record) => Ok(format!(
                "Context saved for future sessions ({} files in the code map)",
                record.file_paths.len()
            )),
            Err(e) => {
                self.emit_tool_error(session_id, siteforge_tools::SAVE_CONTEXT, &e.to_string())
                    .await;
                Err(format!("Error: {e}"))
            }
        }
    }

    async fn get_context(&self, session_id: &str) -> Result<String, String> {
        match self.store.load_context(session_id).await {
            Ok(Some(record)) => {
                let json = serde_json::to_string(&record)
                    .unwrap_or_else(|e| format!("<unserializable context: {e}>"));
                Ok(format!("Previously saved context for this project: {json}"))
            }
            Ok(None) => Ok("No saved context — this is a fresh project.".into()),
            Err(e) => {
                self.emit_tool_error(session_id, siteforge_tools::GET_CONTEXT, &e.to_string())
                    .await;
                Err(format!("Error: {e}"))
            }
        }
    }

    async fn emit_tool_error(&self, session_id: &str, tool: &str, error: &str) {
        warn!(session_id, tool, error, "Tool invocation failed");
        self.events
            .emit(
                session_id,
                RunEvent::ToolError {
                    tool: tool.to_string(),
                    error: error.to_string(),
                },
            )
            .await;
    }
}

fn preview(command: &str) -> String {
    command.chars().take(COMMAND_PREVIEW_LEN).collect()
}
