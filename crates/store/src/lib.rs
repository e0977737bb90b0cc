//! Per-session persistence — file manifests and cross-run context records.
//!
//! Layout under the data directory:
//!
//! ```text
//! <data_dir>/sessions/<session_id>/manifest.json        — JSON array of {file_path, content}
//! <data_dir>/sessions/<session_id>/context/context.json — one ContextRecord
//! ```
//!
//! The manifest is rewritten on every append: durability is favored over
//! batching, so a crash mid-run loses at most the in-flight entry. A missing
//! context file is the expected fresh-session state (`Ok(None)`), distinct
//! from an I/O or parse failure (`Err`).

use siteforge_core::error::StoreError;
use siteforge_core::session::{ContextRecord, FileManifestEntry};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File-backed store for session manifests and context records.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// Create a store rooted at the given data directory. Directories are
    /// created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn session_dir(&self, session_id: &str) -> Result<PathBuf, StoreError> {
        validate_session_id(session_id)?;
        Ok(self.root.join("sessions").join(session_id))
    }

    fn manifest_path(&self, session_id: &str) -> Result<PathBuf, StoreError> {
        Ok(self.session_dir(session_id)?.join("manifest.json"))
    }

    fn context_path(&self, session_id: &str) -> Result<PathBuf, StoreError> {
        Ok(self
            .session_dir(session_id)?
            .join("context")
            .join("context.json"))
    }

    /// Load the manifest for a session. A missing file is an empty manifest.
    pub async fn load_manifest(
        &self,
        session_id: &str,
    ) -> Result<Vec<FileManifestEntry>, StoreError> {
        let path = self.manifest_path(session_id)?;
        read_json_or(&path, Vec::new).await
    }

    /// Append one entry to the manifest and persist immediately.
    /// Returns the manifest size after the append.
    pub async fn append_manifest_entry(
        &self,
        session_id: &str,
        entry: FileManifestEntry,
    ) -> Result<usize, StoreError> {
        let path = self.manifest_path(session_id)?;
        let mut manifest = read_json_or(&path, Vec::new).await?;
        manifest.push(entry);
        write_json(&path, &manifest).await?;
        debug!(session_id, files = manifest.len(), "Manifest persisted");
        Ok(manifest.len())
    }

    /// Save a context record. `semantic` is required and non-empty;
    /// `code_map`/`file_paths` always come from the current manifest, never
    /// from the caller.
    pub async fn save_context(
        &self,
        session_id: &str,
        semantic: &str,
        procedural: &str,
        episodic: &str,
    ) -> Result<ContextRecord, StoreError> {
        if semantic.trim().is_empty() {
            return Err(StoreError::InvalidInput(
                "context 'semantic' summary must be non-empty".into(),
            ));
        }

        let manifest = self.load_manifest(session_id).await?;
        let record = ContextRecord::from_manifest(
            semantic.trim(),
            procedural.trim(),
            episodic.trim(),
            &manifest,
        );

        let path = self.context_path(session_id)?;
        write_json(&path, &record).await?;
        debug!(session_id, files = record.file_paths.len(), "Context saved");
        Ok(record)
    }

    /// Load the context record for a session. `Ok(None)` means no context
    /// has ever been saved — the expected fresh-session state.
    pub async fn load_context(
        &self,
        session_id: &str,
    ) -> Result<Option<ContextRecord>, StoreError> {
        let path = self.context_path(session_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| StoreError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let record = serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(record))
    }
}

/// Session ids come straight from a URL path segment; keep them to a safe
/// character set so they cannot escape the sessions directory.
fn validate_session_id(session_id: &str) -> Result<(), StoreError> {
    let ok = !session_id.is_empty()
        && session_id.len() <= 128
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidInput(format!(
            "invalid session id '{session_id}'"
        )))
    }
}

async fn read_json_or<T, F>(path: &Path, default: F) -> Result<T, StoreError>
where
    T: serde::de::DeserializeOwned,
    F: FnOnce() -> T,
{
    if !path.exists() {
        return Ok(default());
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| StoreError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::Io {
                path: parent.display().to_string(),
                reason: e.to_string(),
            })?;
    }
    let content = serde_json::to_string_pretty(value).map_err(|e| StoreError::Corrupt {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| StoreError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, content: &str) -> FileManifestEntry {
        FileManifestEntry {
            file_path: path.into(),
            content: content.into(),
        }
    }

    #[tokio::test]
    async fn empty_manifest_for_fresh_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let manifest = store.load_manifest("fresh").await.unwrap();
        assert!(manifest.is_empty());
    }

    #[tokio::test]
    async fn append_persists_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        let count = store
            .append_manifest_entry("s1", entry("index.html", "<html/>"))
            .await
            .unwrap();
        assert_eq!(count, 1);

        // A second store instance sees the entry — it went to disk.
        let store2 = SessionStore::new(dir.path());
        let manifest = store2.load_manifest("s1").await.unwrap();
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest[0].file_path, "index.html");
    }

    #[tokio::test]
    async fn manifest_preserves_append_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        store
            .append_manifest_entry("s1", entry("package.json", "{}"))
            .await
            .unwrap();
        store
            .append_manifest_entry("s1", entry("src/App.jsx", "app"))
            .await
            .unwrap();
        store
            .append_manifest_entry("s1", entry("src/main.jsx", "main"))
            .await
            .unwrap();

        let paths: Vec<_> = store
            .load_manifest("s1")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.file_path)
            .collect();
        assert_eq!(paths, vec!["package.json", "src/App.jsx", "src/main.jsx"]);
    }

    #[tokio::test]
    async fn load_context_fresh_session_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load_context("never-saved").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_roundtrips_code_map() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        store
            .append_manifest_entry("s1", entry("index.html", "<html/>"))
            .await
            .unwrap();
        store
            .append_manifest_entry("s1", entry("src/App.jsx", "export default App"))
            .await
            .unwrap();

        let saved = store
            .save_context("s1", "a two-file react app", "edit src/", "built today")
            .await
            .unwrap();

        let loaded = store.load_context("s1").await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        // code_map matches the manifest exactly at save time
        assert_eq!(loaded.code_map.len(), 2);
        assert_eq!(loaded.code_map["index.html"], "<html/>");
        assert_eq!(loaded.file_paths, vec!["index.html", "src/App.jsx"]);
    }

    #[tokio::test]
    async fn save_context_ignores_later_manifest_growth() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        store
            .append_manifest_entry("s1", entry("a.txt", "a"))
            .await
            .unwrap();
        store.save_context("s1", "one file", "", "").await.unwrap();

        // New file after the save — the stored context must not change.
        store
            .append_manifest_entry("s1", entry("b.txt", "b"))
            .await
            .unwrap();

        let loaded = store.load_context("s1").await.unwrap().unwrap();
        assert_eq!(loaded.file_paths, vec!["a.txt"]);
    }

    #[tokio::test]
    async fn save_context_requires_semantic() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let result = store.save_context("s1", "   ", "p", "e").await;
        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn corrupt_context_is_an_error_not_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());

        let ctx_dir = dir.path().join("sessions").join("s1").join("context");
        std::fs::create_dir_all(&ctx_dir).unwrap();
        std::fs::write(ctx_dir.join("context.json"), "not json at all").unwrap();

        let result = store.load_context("s1").await;
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn rejects_traversal_in_session_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load_manifest("../evil").await.is_err());
        assert!(store.load_manifest("a/b").await.is_err());
        assert!(store.load_manifest("").await.is_err());
    }
}
