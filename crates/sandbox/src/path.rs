//! Project-relative path validation.
//!
//! Every file the agent writes lands under a fixed project root inside the
//! environment. Paths are validated before they ever reach the sandbox API:
//! no absolute paths, no traversal components, no empty segments.

use siteforge_core::error::SandboxError;

/// Validate a project-relative path and return its normalized form
/// (forward slashes, no leading `./`).
pub fn validate_project_path(path: &str) -> Result<String, SandboxError> {
    let reject = |reason: &str| {
        Err(SandboxError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        })
    };

    if path.trim().is_empty() {
        return reject("empty path");
    }

    let normalized = path.replace('\\', "/");

    if normalized.starts_with('/') {
        return reject("absolute paths are not allowed");
    }

    let mut segments = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            "" => return reject("empty path segment"),
            "." => continue,
            ".." => return reject("path traversal outside the project root"),
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return reject("path resolves to the project root itself");
    }

    Ok(segments.join("/"))
}
