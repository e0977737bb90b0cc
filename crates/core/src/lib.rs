//! # siteforge Core
//!
//! Domain types, traits, and error definitions for the siteforge agent
//! service. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem boundary is defined as a trait or a plain data type here.
//! Implementations live in their respective crates. This enables:
//! - Swapping the reasoning backend or sandbox transport via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod environment;
pub mod error;
pub mod event;
pub mod identity;
pub mod message;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use environment::{CommandOutput, Environment, EnvironmentManager, ServiceEndpoint};
pub use error::{Error, ProviderError, Result, SandboxError, StoreError, ToolError};
pub use event::{EventRouter, RunEvent};
pub use identity::Identity;
pub use message::{Conversation, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, TurnOutcome, Usage};
pub use session::{ContextRecord, FileManifestEntry, RunOutcome, RunStatus};
pub use tool::{ToolCall, ToolResult};
