//! Environment traits — the abstraction over the remote execution sandbox.
//!
//! An [`Environment`] is one isolated, stateful workspace where files are
//! written and commands run. An [`EnvironmentManager`] owns the lifecycle
//! of environments keyed by session id. The agent loop borrows handles;
//! it never creates or destroys them directly.

use crate::error::SandboxError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Captured output of a foreground command.
///
/// A non-zero exit code is data, not an error: the loop conveys it to the
/// reasoning model, which decides how to react.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Where a background service can be reached once its readiness probe
/// passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub url: String,
    pub port: u16,
}

/// One isolated execution environment.
#[async_trait]
pub trait Environment: Send + Sync {
    /// The environment's unique id.
    fn id(&self) -> &str;

    /// Write `content` at `relative_path` under the project root, creating
    /// missing parent directories. Paths escaping the root are rejected.
    async fn write_file(&self, relative_path: &str, content: &str) -> Result<(), SandboxError>;

    /// Run a foreground command in the project directory and wait for it,
    /// up to `timeout`. Non-zero exit codes are returned, not raised.
    async fn run_command(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, SandboxError>;

    /// Launch a long-running service, wait (bounded) for `port` to accept
    /// connections, and return its externally reachable endpoint.
    async fn start_service(
        &self,
        command: &str,
        port: u16,
    ) -> Result<ServiceEndpoint, SandboxError>;

    /// Map an internal port to an externally reachable URL.
    async fn expose_port(&self, port: u16) -> Result<String, SandboxError>;
}

/// Lifecycle owner for environments, keyed by session id.
///
/// `ensure` must be atomic: concurrent calls for the same session must
/// never create two environments.
#[async_trait]
pub trait EnvironmentManager: Send + Sync {
    /// Return the session's environment, creating it on first call.
    async fn ensure(&self, session_id: &str) -> Result<Arc<dyn Environment>, SandboxError>;

    /// Return the session's environment if one exists.
    async fn get(&self, session_id: &str) -> Option<Arc<dyn Environment>>;

    /// Best-effort teardown. Errors are logged, never propagated — a
    /// session end must not be blocked by cleanup failure.
    async fn destroy(&self, session_id: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_output_success() {
        let ok = CommandOutput {
            stdout: "done".into(),
            stderr: String::new(),
            exit_code: 0,
        };
        assert!(ok.success());

        let failed = CommandOutput {
            stdout: String::new(),
            stderr: "boom".into(),
            exit_code: 1,
        };
        assert!(!failed.success());
    }

    #[test]
    fn service_endpoint_serializes() {
        let ep = ServiceEndpoint {
            url: "https://5173-abc.sandbox.dev".into(),
            port: 5173,
        };
        let json = serde_json::to_string(&ep).unwrap();
        assert!(json.contains("5173"));
    }
}
