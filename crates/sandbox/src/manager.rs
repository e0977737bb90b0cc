//! Session→environment lifecycle management.
//!
//! The mapping from session id to environment handle is the one piece of
//! state shared across concurrent submissions for a session. Creation is
//! atomic: the map lock is held across the create call, so a check-then-act
//! race can never produce two environments for one session.

use async_trait::async_trait;
use siteforge_core::environment::{Environment, EnvironmentManager};
use siteforge_core::error::SandboxError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Creates and destroys environments. Implemented by [`crate::SandboxClient`]
/// in production and by mocks in tests.
#[async_trait]
pub trait EnvironmentFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn Environment>, SandboxError>;
    async fn destroy(&self, environment_id: &str) -> Result<(), SandboxError>;
}

/// Owns one environment per session for the session's lifetime. Handles are
/// reused across runs and destroyed when the session's observer disconnects.
pub struct SandboxManager {
    factory: Arc<dyn EnvironmentFactory>,
    handles: RwLock<HashMap<String, Arc<dyn Environment>>>,
}

impl SandboxManager {
    pub fn new(factory: Arc<dyn EnvironmentFactory>) -> Self {
        Self {
            factory,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live environments.
    pub async fn active_count(&self) -> usize {
        self.handles.read().await.len()
    }
}

#[async_trait]
impl EnvironmentManager for SandboxManager {
    async fn ensure(&self, session_id: &str) -> Result<Arc<dyn Environment>, SandboxError> {
        // Fast path: handle already exists.
        if let Some(env) = self.handles.read().await.get(session_id) {
            return Ok(env.clone());
        }

        // Slow path: re-check under the write lock, then create while still
        // holding it. Concurrent ensure() calls for the same session see
        // either the existing handle or wait for this creation.
        let mut handles = self.handles.write().await;
        if let Some(env) = handles.get(session_id) {
            return Ok(env.clone());
        }

        info!(session_id, "Creating environment for session");
        let env = self.factory.create().await?;
        handles.insert(session_id.to_string(), env.clone());
        Ok(env)
    }

    async fn get(&self, session_id: &str) -> Option<Arc<dyn Environment>> {
        self.handles.read().await.get(session_id).cloned()
    }

    async fn destroy(&self, session_id: &str) {
        let removed = self.handles.write().await.remove(session_id);
        let Some(env) = removed else {
            return;
        };

        if let Err(e) = self.factory.destroy(env.id()).await {
            // Teardown is best-effort; a session end must not be blocked
            // by cleanup failure.
            warn!(session_id, environment_id = %env.id(), error = %e, "Environment teardown failed");
        }
    }
}
