//! Execution environment client for siteforge.
//!
//! Talks to a remote sandbox service over HTTP: create/destroy isolated
//! environments, write files under a fixed project root, run commands
//! (foreground and background with a bounded readiness probe), and expose
//! network ports as externally reachable URLs.
//!
//! The [`SandboxManager`] owns the session→environment mapping with atomic
//! create-if-absent semantics; everything else borrows handles from it.

pub mod client;
pub mod manager;
pub mod path;
mod probe;

pub use client::{RemoteEnvironment, SandboxClient};
pub use manager::SandboxManager;
pub use path::validate_project_path;
