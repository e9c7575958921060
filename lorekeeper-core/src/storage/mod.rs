//! Durable session store
//!
//! This module defines the `SessionStore` trait that every persistence
//! backend implements, keyed overwrite storage of whole session snapshots.
//! Two backends ship with the crate:
//!
//! - [`InMemorySessionStore`]: volatile map, for tests and throwaway runs
//! - [`SqliteSessionStore`]: relational store indexed by player id and
//!   last-update time
//!
//! No cross-session transactions are required of a backend.

mod memory;
mod sqlite;

pub use memory::InMemorySessionStore;
pub use sqlite::{SqliteSessionStore, StorageStats};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::StorageConfig;
use crate::error::Result;
use crate::session::Session;

/// Pluggable persistence for session snapshots
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` when nothing is stored under `session_id`,
    /// or a storage error if the backend fails.
    async fn load(&self, session_id: &str) -> Result<Session>;

    /// Insert or overwrite a session snapshot
    async fn save(&self, session: &Session) -> Result<()>;

    /// Delete a session, returns true if it existed
    async fn delete(&self, session_id: &str) -> Result<bool>;

    /// Every stored session id
    async fn list_ids(&self) -> Result<Vec<String>>;

    /// Delete sessions whose last update is older than `cutoff`, except the
    /// ids in `keep`; returns the number removed
    async fn purge_older_than(&self, cutoff: DateTime<Utc>, keep: &[String]) -> Result<u64>;

    /// Health check - verify the backend is operational
    async fn health_check(&self) -> Result<()> {
        self.list_ids().await.map(|_| ())
    }

    /// Short backend name for logs and metrics
    fn name(&self) -> &'static str;
}

/// Open the store described by `config`
pub async fn open(config: &StorageConfig) -> Result<Arc<dyn SessionStore>> {
    match config {
        StorageConfig::Memory => Ok(Arc::new(InMemorySessionStore::new())),
        StorageConfig::Sqlite { url, max_connections } => {
            let store = SqliteSessionStore::connect(url, *max_connections).await?;
            Ok(Arc::new(store))
        }
    }
}
