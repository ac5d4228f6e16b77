use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::info;

use crate::workspace::Workspace;

struct Entry {
    workspace: Workspace,
    /// Unix seconds after which the owning session can no longer be used.
    expires_at: usize,
}

/// Live workspaces keyed by session.
#[derive(Clone, Default)]
pub struct WorkspaceRegistry {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
}

impl WorkspaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, session_key: &str) -> Option<Workspace> {
        self.inner
            .read()
            .await
            .get(session_key)
            .map(|entry| entry.workspace.clone())
    }

    /// Returns the session's workspace, starting one with `spawn` on first use.
    /// `expires_at` is the session's expiry; the reaper stops the workspace
    /// once it has passed.
    pub async fn get_or_spawn<F>(&self, session_key: &str, expires_at: usize, spawn: F) -> Workspace
    where
        F: FnOnce() -> Workspace,
    {
        if let Some(workspace) = self.get(session_key).await {
            return workspace;
        }

        let mut workspaces = self.inner.write().await;
        workspaces
            .entry(session_key.to_string())
            .or_insert_with(|| {
                info!("Starting workspace for session {}", session_key);
                Entry {
                    workspace: spawn(),
                    expires_at,
                }
            })
            .workspace
            .clone()
    }

    /// Removes and stops the session's workspace, resetting its selection.
    pub async fn remove(&self, session_key: &str) {
        let removed = self.inner.write().await.remove(session_key);
        if let Some(entry) = removed {
            entry.workspace.shutdown().await;
            info!("Stopped workspace for session {}", session_key);
        }
    }

    /// Stops every workspace whose session expired at or before `now`
    /// (unix seconds). Returns how many were stopped.
    pub async fn reap_expired(&self, now: usize) -> usize {
        let expired: Vec<Workspace> = {
            let mut workspaces = self.inner.write().await;
            let keys: Vec<String> = workspaces
                .iter()
                .filter(|(_, entry)| entry.expires_at <= now)
                .map(|(key, _)| key.clone())
                .collect();
            keys.iter()
                .filter_map(|key| workspaces.remove(key))
                .map(|entry| entry.workspace)
                .collect()
        };

        for workspace in &expired {
            workspace.shutdown().await;
        }
        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Stops every workspace, for server shutdown.
    pub async fn shutdown_all(&self) {
        let drained: Vec<Entry> = self.inner.write().await.drain().map(|(_, e)| e).collect();
        for entry in drained {
            entry.workspace.shutdown().await;
        }
    }
}

/// Background task that stops workspaces of sessions that expired without
/// signing out.
pub async fn run_reaper(registry: WorkspaceRegistry, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let now = chrono::Utc::now().timestamp().max(0) as usize;
        let count = registry.reap_expired(now).await;
        if count > 0 {
            info!("Reaper: stopped {} expired workspaces", count);
        }
    }
}
