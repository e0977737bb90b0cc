//! HTTP client for the remote sandbox service.
//!
//! The service exposes a small REST API:
//!
//! - `POST   /v1/environments`                      — create from a template
//! - `DELETE /v1/environments/{id}`                 — destroy
//! - `POST   /v1/environments/{id}/files`           — write a file
//! - `POST   /v1/environments/{id}/commands`        — run a foreground command
//! - `POST   /v1/environments/{id}/processes`       — spawn a background process
//! - `GET    /v1/environments/{id}/ports/{port}`    — is the port accepting connections?
//! - `POST   /v1/environments/{id}/ports/{port}/expose` — map to a public URL

use crate::manager::EnvironmentFactory;
use crate::path::validate_project_path;
use crate::probe;
use async_trait::async_trait;
use siteforge_config::SandboxConfig;
use siteforge_core::environment::{CommandOutput, Environment, ServiceEndpoint};
use siteforge_core::error::SandboxError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Client for the sandbox service API. Cheap to clone; clones share the
/// underlying connection pool.
#[derive(Clone)]
pub struct SandboxClient {
    http: reqwest::Client,
    config: SandboxConfig,
}

impl SandboxClient {
    /// Create a client from config.
    pub fn new(config: SandboxConfig) -> Result<Self, SandboxError> {
        // The HTTP timeout must outlast the longest foreground command.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.command_timeout_secs + 30))
            .build()
            .map_err(|e| SandboxError::Network(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn post_json<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, SandboxError> {
        let resp = self
            .authorize(self.http.post(self.url(path)).json(body))
            .send()
            .await
            .map_err(map_transport_error)?;
        deserialize_checked(resp).await
    }

    /// Create a fresh environment from the configured template.
    pub async fn create_environment(&self) -> Result<RemoteEnvironment, SandboxError> {
        #[derive(Serialize)]
        struct CreateRequest<'a> {
            template: &'a str,
        }
        #[derive(Deserialize)]
        struct CreateResponse {
            environment_id: String,
        }

        let resp: CreateResponse = self
            .post_json(
                "/v1/environments",
                &CreateRequest {
                    template: &self.config.template,
                },
            )
            .await
            .map_err(|e| SandboxError::CreationFailed(e.to_string()))?;

        info!(environment_id = %resp.environment_id, template = %self.config.template, "Environment created");
        Ok(RemoteEnvironment {
            client: self.clone(),
            environment_id: resp.environment_id,
        })
    }

    /// Destroy an environment. The caller decides whether failure matters.
    pub async fn destroy_environment(&self, environment_id: &str) -> Result<(), SandboxError> {
        let resp = self
            .authorize(
                self.http
                    .delete(self.url(&format!("/v1/environments/{environment_id}"))),
            )
            .send()
            .await
            .map_err(map_transport_error)?;
        check_status(resp).await?;
        info!(environment_id, "Environment destroyed");
        Ok(())
    }

    async fn write_file(
        &self,
        environment_id: &str,
        relative_path: &str,
        content: &str,
    ) -> Result<(), SandboxError> {
        #[derive(Serialize)]
        struct WriteRequest<'a> {
            path: String,
            content: &'a str,
        }

        let full_path = format!(
            "{}/{relative_path}",
            self.config.project_root.trim_end_matches('/')
        );
        let resp = self
            .authorize(
                self.http
                    .post(self.url(&format!("/v1/environments/{environment_id}/files")))
                    .json(&WriteRequest {
                        path: full_path,
                        content,
                    }),
            )
            .send()
            .await
            .map_err(|e| SandboxError::WriteFailed {
                path: relative_path.to_string(),
                reason: e.to_string(),
            })?;
        check_status(resp)
            .await
            .map_err(|e| SandboxError::WriteFailed {
                path: relative_path.to_string(),
                reason: e.to_string(),
            })?;
        debug!(environment_id, path = relative_path, "File written");
        Ok(())
    }

    async fn run_command(
        &self,
        environment_id: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, SandboxError> {
        #[derive(Serialize)]
        struct CommandRequest<'a> {
            command: &'a str,
            cwd: &'a str,
            timeout_secs: u64,
        }

        debug!(environment_id, command, "Running foreground command");
        self.post_json(
            &format!("/v1/environments/{environment_id}/commands"),
            &CommandRequest {
                command,
                cwd: &self.config.project_root,
                timeout_secs: timeout.as_secs(),
            },
        )
        .await
        .map_err(|e| match e {
            e @ SandboxError::ApiError { .. } => e,
            other => SandboxError::CommandFailed(other.to_string()),
        })
    }

    async fn spawn_process(
        &self,
        environment_id: &str,
        command: &str,
    ) -> Result<String, SandboxError> {
        #[derive(Serialize)]
        struct SpawnRequest<'a> {
            command: &'a str,
            cwd: &'a str,
        }
        #[derive(Deserialize)]
        struct SpawnResponse {
            process_id: String,
        }

        debug!(environment_id, command, "Spawning background process");
        let resp: SpawnResponse = self
            .post_json(
                &format!("/v1/environments/{environment_id}/processes"),
                &SpawnRequest {
                    command,
                    cwd: &self.config.project_root,
                },
            )
            .await
            .map_err(|e| SandboxError::CommandFailed(e.to_string()))?;
        Ok(resp.process_id)
    }

    async fn port_open(&self, environment_id: &str, port: u16) -> bool {
        #[derive(Deserialize)]
        struct PortStatus {
            open: bool,
        }

        let resp = self
            .authorize(
                self.http
                    .get(self.url(&format!("/v1/environments/{environment_id}/ports/{port}")))
                    .timeout(Duration::from_secs(5)),
            )
            .send()
            .await;

        match resp {
            Ok(resp) if resp.status().is_success() => resp
                .json::<PortStatus>()
                .await
                .map(|s| s.open)
                .unwrap_or(false),
            _ => false,
        }
    }

    async fn expose_port(&self, environment_id: &str, port: u16) -> Result<String, SandboxError> {
        #[derive(Deserialize)]
        struct ExposeResponse {
            url: String,
        }

        let resp: ExposeResponse = self
            .post_json(
                &format!("/v1/environments/{environment_id}/ports/{port}/expose"),
                &serde_json::json!({}),
            )
            .await
            .map_err(|e| SandboxError::ExposeFailed {
                port,
                reason: e.to_string(),
            })?;
        Ok(resp.url)
    }
}

#[async_trait]
impl EnvironmentFactory for SandboxClient {
    async fn create(&self) -> Result<Arc<dyn Environment>, SandboxError> {
        let env = self.create_environment().await?;
        Ok(Arc::new(env))
    }

    async fn destroy(&self, environment_id: &str) -> Result<(), SandboxError> {
        self.destroy_environment(environment_id).await
    }
}

/// A handle to one remote environment.
pub struct RemoteEnvironment {
    client: SandboxClient,
    environment_id: String,
}

#[async_trait]
impl Environment for RemoteEnvironment {
    fn id(&self) -> &str {
        &self.environment_id
    }

    async fn write_file(&self, relative_path: &str, content: &str) -> Result<(), SandboxError> {
        let normalized = validate_project_path(relative_path)?;
        self.client
            .write_file(&self.environment_id, &normalized, content)
            .await
    }

    async fn run_command(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput, SandboxError> {
        self.client
            .run_command(&self.environment_id, command, timeout)
            .await
    }

    async fn start_service(
        &self,
        command: &str,
        port: u16,
    ) -> Result<ServiceEndpoint, SandboxError> {
        let process_id = self.client.spawn_process(&self.environment_id, command).await?;
        debug!(environment_id = %self.environment_id, process_id, port, "Probing service readiness");

        let interval = Duration::from_millis(self.client.config.probe_interval_ms);
        let timeout = Duration::from_secs(self.client.config.probe_timeout_secs);
        let ready = probe::wait_until_ready(
            || self.client.port_open(&self.environment_id, port),
            interval,
            timeout,
        )
        .await;

        let Some(waited) = ready else {
            warn!(environment_id = %self.environment_id, port, "Service readiness probe timed out");
            return Err(SandboxError::ServiceNotReady {
                port,
                waited_secs: timeout.as_secs(),
            });
        };

        let url = self.client.expose_port(&self.environment_id, port).await?;
        info!(
            environment_id = %self.environment_id,
            port,
            waited_ms = waited.as_millis() as u64,
            url = %url,
            "Service ready"
        );
        Ok(ServiceEndpoint { url, port })
    }

    async fn expose_port(&self, port: u16) -> Result<String, SandboxError> {
        self.client.expose_port(&self.environment_id, port).await
    }
}

fn map_transport_error(e: reqwest::Error) -> SandboxError {
    if e.is_timeout() {
        SandboxError::Network(format!("request timed out: {e}"))
    } else {
        SandboxError::Network(e.to_string())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, SandboxError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(SandboxError::ApiError {
        status_code: status.as_u16(),
        message,
    })
}

async fn deserialize_checked<T: for<'de> Deserialize<'de>>(
    resp: reqwest::Response,
) -> Result<T, SandboxError> {
    let resp = check_status(resp).await?;
    resp.json::<T>()
        .await
        .map_err(|e| SandboxError::Network(format!("malformed response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SandboxConfig {
        SandboxConfig {
            base_url: "http://localhost:9999/".into(),
            ..SandboxConfig::default()
        }
    }

    #[test]
    fn url_joins_without_double_slash() {
        let client = SandboxClient::new(test_config()).unwrap();
        assert_eq!(
            client.url("/v1/environments"),
            "http://localhost:9999/v1/environments"
        );
    }

    #[test]
    fn command_output_deserializes_from_wire_shape() {
        let json = r#"{"stdout":"ok\n","stderr":"","exit_code":0}"#;
        let output: CommandOutput = serde_json::from_str(json).unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "ok\n");
    }

    #[test]
    fn command_output_nonzero_exit_deserializes() {
        let json = r#"{"stdout":"","stderr":"sh: vite: not found","exit_code":127}"#;
        let output: CommandOutput = serde_json::from_str(json).unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code, 127);
    }
}
