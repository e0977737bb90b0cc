//! Run and session value objects.
//!
//! A *session* is a logical project identity that persists across runs; a
//! *run* is one execution of the agent loop. These types describe what a
//! run produces and what a session remembers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Terminal (and transient) states of a run.
///
/// `Truncated` is not an error: it means the iteration bound was reached
/// with tool requests still pending. Callers must be able to tell a clean
/// finish from a forced stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Truncated,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Truncated => "truncated",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// One generated file, as recorded in the session manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileManifestEntry {
    pub file_path: String,
    pub content: String,
}

/// What a finished run hands back to the submitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub status: RunStatus,

    /// How many loop iterations ran.
    pub iterations: u32,

    /// The session manifest as of run end (all files ever created for the
    /// session, in creation order).
    pub files: Vec<FileManifestEntry>,

    /// The environment serving this session, if one exists.
    pub environment_id: Option<String>,

    /// Whether the environment handle is still alive.
    pub environment_active: bool,
}

/// Cross-run memory for a session, written wholesale on save and read
/// wholesale on load. Absence is the expected fresh-session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRecord {
    /// Natural-language summary of the current project state.
    pub semantic: String,

    /// Conventions for how to modify or extend the project.
    #[serde(default)]
    pub procedural: String,

    /// Recent reasoning or decisions.
    #[serde(default)]
    pub episodic: String,

    /// file_path → content, derived from the manifest at save time.
    #[serde(default)]
    pub code_map: BTreeMap<String, String>,

    /// Ordered list of generated file paths.
    #[serde(default)]
    pub file_paths: Vec<String>,
}

impl ContextRecord {
    /// Build a record from summaries plus the current manifest. The code
    /// map always comes from the manifest, never from the caller, so
    /// context cannot drift from the actual generated file set.
    pub fn from_manifest(
        semantic: impl Into<String>,
        procedural: impl Into<String>,
        episodic: impl Into<String>,
        manifest: &[FileManifestEntry],
    ) -> Self {
        let code_map: BTreeMap<String, String> = manifest
            .iter()
            .map(|e| (e.file_path.clone(), e.content.clone()))
            .collect();
        let file_paths = manifest.iter().map(|e| e.file_path.clone()).collect();
        Self {
            semantic: semantic.into(),
            procedural: procedural.into(),
            episodic: episodic.into(),
            code_map,
            file_paths,
        }
    }
}
