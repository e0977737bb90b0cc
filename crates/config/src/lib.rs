//! Configuration loading and validation for siteforge.
//!
//! Loads configuration from `~/.siteforge/config.toml` with environment
//! variable overrides. Validates settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.siteforge/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Reasoning backend API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Reasoning model
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Hard bound on agent loop iterations per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Root directory for per-session manifests and context records
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Optional system prompt override (replaces the built-in persona)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Execution environment configuration
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_max_iterations() -> u32 {
    50
}
fn default_data_dir() -> PathBuf {
    AppConfig::home_dir().join(".siteforge").join("data")
}

/// Gateway (HTTP server) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origin allowed to call the API and open event sockets
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8600
}
fn default_allowed_origin() -> String {
    "http://localhost:3000".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origin: default_allowed_origin(),
        }
    }
}

/// Execution environment (remote sandbox) settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Base URL of the sandbox service API
    #[serde(default = "default_sandbox_base_url")]
    pub base_url: String,

    /// Sandbox service API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment template to create sessions from
    #[serde(default = "default_template")]
    pub template: String,

    /// Project root inside the environment; all file writes land under it
    #[serde(default = "default_project_root")]
    pub project_root: String,

    /// Timeout applied to every foreground command
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Port the generated project's dev server listens on
    #[serde(default = "default_dev_server_port")]
    pub dev_server_port: u16,

    /// Readiness probe polling interval for background services
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,

    /// Overall readiness probe timeout for background services
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

fn default_sandbox_base_url() -> String {
    "https://api.sandbox.siteforge.dev".into()
}
fn default_template() -> String {
    "node-20".into()
}
fn default_project_root() -> String {
    "/home/user/app".into()
}
fn default_command_timeout_secs() -> u64 {
    120
}
fn default_dev_server_port() -> u16 {
    5173
}
fn default_probe_interval_ms() -> u64 {
    500
}
fn default_probe_timeout_secs() -> u64 {
    60
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            base_url: default_sandbox_base_url(),
            api_key: None,
            template: default_template(),
            project_root: default_project_root(),
            command_timeout_secs: default_command_timeout_secs(),
            dev_server_port: default_dev_server_port(),
            probe_interval_ms: default_probe_interval_ms(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_iterations", &self.max_iterations)
            .field("data_dir", &self.data_dir)
            .field("gateway", &self.gateway)
            .field("sandbox", &self.sandbox)
            .finish()
    }
}

impl std::fmt::Debug for SandboxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("template", &self.template)
            .field("project_root", &self.project_root)
            .field("command_timeout_secs", &self.command_timeout_secs)
            .field("dev_server_port", &self.dev_server_port)
            .field("probe_interval_ms", &self.probe_interval_ms)
            .field("probe_timeout_secs", &self.probe_timeout_secs)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_iterations: default_max_iterations(),
            data_dir: default_data_dir(),
            system_prompt_override: None,
            gateway: GatewayConfig::default(),
            sandbox: SandboxConfig::default(),
        }
    }
}

impl AppConfig {
    /// The user's home directory (HOME, then USERPROFILE, then ".").
    pub fn home_dir() -> PathBuf {
        std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
    }

    /// Default config file path: `~/.siteforge/config.toml`.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join(".siteforge").join("config.toml")
    }

    /// Load configuration from the default path, falling back to defaults
    /// if the file does not exist, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables beat the config file.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("SITEFORGE_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("SITEFORGE_SANDBOX_API_KEY") {
            self.sandbox.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("SITEFORGE_MODEL") {
            self.model = model;
        }
        if let Ok(dir) = std::env::var("SITEFORGE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "max_iterations must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature {} out of range [0.0, 2.0]",
                self.temperature
            )));
        }
        if self.sandbox.command_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "sandbox.command_timeout_secs must be non-zero".into(),
            ));
        }
        if self.sandbox.probe_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "sandbox.probe_timeout_secs must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Write a starter config file (used by `siteforge onboard`).
    /// Refuses to overwrite an existing file.
    pub fn write_starter(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::Invalid(format!(
                "config already exists at {}",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        let content = toml::to_string_pretty(&Self::default()).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Errors from config loading.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: String, reason: String },
    Parse { path: String, reason: String },
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, reason } => write!(f, "config I/O error at {path}: {reason}"),
            Self::Parse { path, reason } => write!(f, "config parse error at {path}: {reason}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.sandbox.command_timeout_secs, 120);
        assert_eq!(config.sandbox.dev_server_port, 5173);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config =
            AppConfig::load_from(Path::new("/nonexistent/siteforge/config.toml")).unwrap();
        assert_eq!(config.gateway.port, 8600);
    }

    #[test]
    fn parses_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
model = "gemini-2.5-pro"

[gateway]
port = 9000

[sandbox]
template = "node-22"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.sandbox.template, "node-22");
        // Untouched fields keep defaults
        assert_eq!(config.sandbox.project_root, "/home/user/app");
    }

    #[test]
    fn rejects_zero_iterations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_iterations = 0\n").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn debug_redacts_api_keys() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-secret".into());
        config.sandbox.api_key = Some("sb-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("sb-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn write_starter_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        AppConfig::write_starter(&path).unwrap();
        assert!(path.exists());
        assert!(AppConfig::write_starter(&path).is_err());
    }
}
