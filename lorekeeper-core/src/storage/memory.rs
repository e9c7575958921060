//! In-memory store for testing and throwaway deployments
//!
//! Snapshots are cloned in and out, so callers never share state with the
//! store. Nothing survives the process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::SessionStore;
use crate::error::{LoreError, Result};
use crate::session::Session;

/// Volatile session store backed by a map
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    fail_writes: AtomicBool,
}

impl InMemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// True when nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop every stored session
    pub async fn clear(&self) {
        self.sessions.write().await.clear();
    }

    /// Make every subsequent `save` fail with a storage error (or stop
    /// failing). Lets callers exercise persistence-failure paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Session> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| LoreError::SessionNotFound(session_id.to_string()))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LoreError::Storage("in-memory store rejected write".to_string()));
        }
        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool> {
        Ok(self.sessions.write().await.remove(session_id).is_some())
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>, keep: &[String]) -> Result<u64> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| session.last_update >= cutoff || keep.contains(id));
        Ok((before - sessions.len()) as u64)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
