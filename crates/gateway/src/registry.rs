//! Active-run bookkeeping.
//!
//! At most one run may be active per session. The check and the
//! registration happen under one lock, so two concurrent submissions for
//! the same session can never both be accepted. Deregistration is RAII:
//! the guard releases the slot however the run ends.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Registry of sessions with an in-flight run.
pub struct RunRegistry {
    active: Mutex<HashSet<String>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Atomically claim the run slot for a session. Returns `None` if a run
    /// is already active.
    pub fn begin(self: &Arc<Self>, session_id: &str) -> Option<RunGuard> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(session_id.to_string()) {
            return None;
        }
        Some(RunGuard {
            registry: self.clone(),
            session_id: session_id.to_string(),
        })
    }

    /// Whether a run is currently active for the session.
    pub fn is_active(&self, session_id: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(session_id)
    }

    fn finish(&self, session_id: &str) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id);
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the session's run slot on drop.
pub struct RunGuard {
    registry: Arc<RunRegistry>,
    session_id: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.registry.finish(&self.session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_begin_is_rejected_while_active() {
        let registry = Arc::new(RunRegistry::new());

        let guard = registry.begin("s1").unwrap();
        assert!(registry.begin("s1").is_none());
        assert!(registry.is_active("s1"));

        drop(guard);
        assert!(!registry.is_active("s1"));
        assert!(registry.begin("s1").is_some());
    }

    #[test]
    fn sessions_are_independent() {
        let registry = Arc::new(RunRegistry::new());
        let _a = registry.begin("s1").unwrap();
        let _b = registry.begin("s2").unwrap();
        assert!(registry.is_active("s1"));
        assert!(registry.is_active("s2"));
    }

    #[test]
    fn guard_releases_on_panic_unwind() {
        let registry = Arc::new(RunRegistry::new());
        let registry2 = registry.clone();

        let result = std::panic::catch_unwind(move || {
            let _guard = registry2.begin("s1").unwrap();
            panic!("run blew up");
        });
        assert!(result.is_err());
        assert!(!registry.is_active("s1"));
    }

    #[test]
    fn concurrent_begin_admits_exactly_one() {
        let registry = Arc::new(RunRegistry::new());
        let mut handles = Vec::new();

        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                registry.begin("race").map(std::mem::forget).is_some()
            }));
        }

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(admitted, 1);
    }
}
