//! Run event protocol and delivery.
//!
//! [`RunEvent`] is the wire protocol the gateway pushes to an observing
//! client as the loop executes. [`EventRouter`] routes events to whichever
//! observer is currently attached to a session. Delivery is at-most-once
//! and best-effort: a missing, slow, or disconnected observer never blocks
//! or aborts the run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::{RwLock, mpsc};
use tracing::debug;

/// Events emitted during a run, in the order operations complete.
///
/// Consumers must tolerate gaps — no event kind guarantees delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// The run has been accepted and the environment is being prepared.
    Started { message: String },

    /// Narration text from the reasoning model.
    Thinking { message: String },

    /// A file write is about to happen.
    FileCreating { file_path: String },

    /// A file write succeeded.
    FileCreated { file_path: String },

    /// A command is starting (command text truncated for display).
    Command { command: String },

    /// A foreground command finished with exit code 0.
    CommandCompleted { command: String, exit_code: i32 },

    /// A foreground command finished with a non-zero exit code.
    CommandFailed { error: String, exit_code: i32 },

    /// A background service passed its readiness probe.
    DevServerStarted { url: String, port: u16 },

    /// A single tool invocation failed; the run continues.
    ToolError { tool: String, error: String },

    /// The run failed as a whole.
    Error { message: String },

    /// The run finished successfully.
    Completed {
        message: String,
        environment_id: String,
        file_count: usize,
    },
}

impl RunEvent {
    /// The kind tag, as serialized on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Thinking { .. } => "thinking",
            Self::FileCreating { .. } => "file_creating",
            Self::FileCreated { .. } => "file_created",
            Self::Command { .. } => "command",
            Self::CommandCompleted { .. } => "command_completed",
            Self::CommandFailed { .. } => "command_failed",
            Self::DevServerStarted { .. } => "dev_server_started",
            Self::ToolError { .. } => "tool_error",
            Self::Error { .. } => "error",
            Self::Completed { .. } => "completed",
        }
    }
}

/// Per-session event channel capacity. A consumer more than this many
/// events behind starts losing events rather than stalling the loop.
const CHANNEL_CAPACITY: usize = 256;

/// Routes run events to the observer attached to each session.
///
/// One observer per session: attaching replaces any previous sender, so a
/// reconnecting client starts receiving events for an in-flight run.
pub struct EventRouter {
    observers: RwLock<HashMap<String, mpsc::Sender<RunEvent>>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
        }
    }

    /// Attach an observer for a session, returning the receiving end.
    pub async fn attach(&self, session_id: &str) -> mpsc::Receiver<RunEvent> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.observers.write().await.insert(session_id.to_string(), tx);
        rx
    }

    /// Detach the observer for a session. Later events are dropped.
    pub async fn detach(&self, session_id: &str) {
        self.observers.write().await.remove(session_id);
    }

    /// Emit an event for a session. Best-effort: events for sessions with
    /// no observer, or with a full channel, are dropped.
    pub async fn emit(&self, session_id: &str, event: RunEvent) {
        let observers = self.observers.read().await;
        let Some(tx) = observers.get(session_id) else {
            return;
        };
        if let Err(e) = tx.try_send(event) {
            debug!(session_id, error = %e, "Dropping run event (observer gone or lagging)");
        }
    }

    /// Number of sessions with an attached observer.
    pub async fn observer_count(&self) -> usize {
        self.observers.read().await.len()
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_uses_kind_tag() {
        let event = RunEvent::FileCreated {
            file_path: "src/App.jsx".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event":"file_created""#));
        assert!(json.contains("src/App.jsx"));
    }

    #[test]
    fn event_kind_matches_wire_tag() {
        let event = RunEvent::DevServerStarted {
            url: "https://5173-env.example.dev".into(),
            port: 5173,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(&format!(r#""event":"{}""#, event.kind())));
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"event":"command_failed","error":"not found","exit_code":127}"#;
        let event: RunEvent = serde_json::from_str(json).unwrap();
        match event {
            RunEvent::CommandFailed { error, exit_code } => {
                assert_eq!(error, "not found");
                assert_eq!(exit_code, 127);
            }
            other => panic!("Wrong variant: {other:?}"),
        }
    }

    #[tokio::test]
    async fn emit_reaches_attached_observer() {
        let router = EventRouter::new();
        let mut rx = router.attach("s1").await;

        router
            .emit(
                "s1",
                RunEvent::Started {
                    message: "Creating project...".into(),
                },
            )
            .await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind(), "started");
    }

    #[tokio::test]
    async fn emit_without_observer_is_silent() {
        let router = EventRouter::new();
        // No observer attached — must not panic or block.
        router
            .emit(
                "nobody",
                RunEvent::Error {
                    message: "lost".into(),
                },
            )
            .await;
    }

    #[tokio::test]
    async fn detach_stops_delivery() {
        let router = EventRouter::new();
        let mut rx = router.attach("s1").await;
        router.detach("s1").await;

        router
            .emit(
                "s1",
                RunEvent::Thinking {
                    message: "hello".into(),
                },
            )
            .await;

        // Sender was removed, channel closes with nothing buffered.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn reattach_replaces_observer() {
        let router = EventRouter::new();
        let mut old_rx = router.attach("s1").await;
        let mut new_rx = router.attach("s1").await;

        router
            .emit(
                "s1",
                RunEvent::Thinking {
                    message: "to the new observer".into(),
                },
            )
            .await;

        assert!(new_rx.recv().await.is_some());
        assert!(old_rx.recv().await.is_none());
    }
}
