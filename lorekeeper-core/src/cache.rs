//! Session cache: the authoritative in-memory copy of hot sessions
//!
//! The cache fronts a [`SessionStore`]. Reads hit the cache and fall back to
//! the store on a miss; an id the store has never seen is synthesized as a
//! skeleton session and written through, so `get` never reports absence.
//!
//! # Concurrency
//!
//! The map lives behind one `tokio` `RwLock`. Any number of readers may
//! hold it at once; every mutation ([`SessionCache::put`],
//! [`SessionCache::update`]) takes the write lock for the whole
//! read-modify-write, so concurrent updates to the same session never lose
//! each other's deltas. Store I/O happens outside the lock except on the
//! rare path where an entry is evicted between loading and updating.
//!
//! Every entry carries a dirty flag and a version counter. A flush snapshots
//! the entry, writes it, and clears the dirty flag only if no mutation
//! landed in the meantime, so a failed or raced flush is retried by the next
//! one.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::session::Session;
use crate::storage::SessionStore;

/// Result of flushing one cached session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FlushOutcome {
    /// The snapshot was written to the store
    Flushed,
    /// Nothing changed since the last successful write (or the session is
    /// not cached)
    Skipped,
    /// The store rejected the write
    Failed {
        /// Store error message
        error: String,
        /// True when the entry stays cached and dirty for the next flush
        will_retry: bool,
    },
}

impl FlushOutcome {
    /// True for [`FlushOutcome::Failed`]
    pub fn is_failure(&self) -> bool {
        matches!(self, FlushOutcome::Failed { .. })
    }
}

/// Totals from flushing the whole cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushReport {
    /// Sessions written
    pub flushed: usize,
    /// Clean sessions left alone
    pub skipped: usize,
    /// Sessions whose write failed, with the error
    pub failed: Vec<(String, String)>,
}

impl FlushReport {
    /// True when every write succeeded
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, session_id: &str, outcome: FlushOutcome) {
        match outcome {
            FlushOutcome::Flushed => self.flushed += 1,
            FlushOutcome::Skipped => self.skipped += 1,
            FlushOutcome::Failed { error, .. } => self.failed.push((session_id.to_string(), error)),
        }
    }
}

/// Totals from an idle-eviction pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionReport {
    /// Ids dropped from the cache
    pub evicted: Vec<String>,
    /// Idle sessions kept because their flush failed
    pub retained: usize,
}

struct CacheEntry {
    session: Session,
    dirty: bool,
    version: u64,
    touched_at: Instant,
}

impl CacheEntry {
    fn new(session: Session, dirty: bool) -> Self {
        Self {
            session,
            dirty,
            version: 0,
            touched_at: Instant::now(),
        }
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
        self.version += 1;
        self.touched_at = Instant::now();
    }
}

/// Concurrent map of hot sessions in front of a durable store
pub struct SessionCache {
    store: Arc<dyn SessionStore>,
    entries: RwLock<HashMap<String, CacheEntry>>,
    purges: AtomicU64,
}

impl SessionCache {
    /// Create an empty cache over `store`
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            entries: RwLock::new(HashMap::new()),
            purges: AtomicU64::new(0),
        }
    }

    /// The backing store
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// A copy of the session, loading or synthesizing it on a miss.
    ///
    /// # Errors
    ///
    /// Only store failures other than not-found are returned.
    pub async fn get(&self, session_id: &str) -> Result<Session> {
        if let Some(entry) = self.entries.read().await.get(session_id) {
            return Ok(entry.session.clone());
        }

        self.ensure_cached(session_id).await?;
        match self.peek(session_id).await {
            Some(session) => Ok(session),
            // Evicted between load and read; the store copy is current.
            None => Ok(self.fetch_or_create(session_id).await?.0),
        }
    }

    /// Run `inspect` against the session without cloning it, loading or
    /// synthesizing it on a miss. `inspect` runs under the read lock.
    pub async fn read<T, F>(&self, session_id: &str, inspect: F) -> Result<T>
    where
        F: FnOnce(&Session) -> T,
    {
        self.ensure_cached(session_id).await?;
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(session_id) {
                return Ok(inspect(&entry.session));
            }
        }
        let (session, _) = self.fetch_or_create(session_id).await?;
        Ok(inspect(&session))
    }

    /// A copy of the session if it is cached, without touching the store
    pub async fn peek(&self, session_id: &str) -> Option<Session> {
        self.entries
            .read()
            .await
            .get(session_id)
            .map(|entry| entry.session.clone())
    }

    /// Overwrite the cached copy unconditionally (last writer wins)
    pub async fn put(&self, session: Session) {
        let mut entries = self.entries.write().await;
        match entries.entry(session.session_id.clone()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.session = session;
                entry.mark_dirty();
            }
            Entry::Vacant(vacant) => {
                let mut entry = CacheEntry::new(session, true);
                entry.version = 1;
                vacant.insert(entry);
            }
        }
    }

    /// Cache a session that was just written to the store
    pub async fn insert_clean(&self, session: Session) {
        self.entries
            .write()
            .await
            .insert(session.session_id.clone(), CacheEntry::new(session, false));
    }

    /// Atomically read-modify-write a session, loading it first if needed.
    ///
    /// `apply` runs under the cache write lock, so it must not block.
    pub async fn update<T, F>(&self, session_id: &str, apply: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> T,
    {
        self.ensure_cached(session_id).await?;

        let mut entries = self.entries.write().await;
        let entry = match entries.entry(session_id.to_string()) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                let (session, dirty) = self.fetch_or_create(session_id).await?;
                vacant.insert(CacheEntry::new(session, dirty))
            }
        };

        let out = apply(&mut entry.session);
        entry.mark_dirty();
        Ok(out)
    }

    /// True when the session is hot
    pub async fn contains(&self, session_id: &str) -> bool {
        self.entries.read().await.contains_key(session_id)
    }

    /// Number of hot sessions
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True when no session is hot
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Hot session ids, sorted
    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of hot sessions with unflushed changes
    pub async fn dirty_count(&self) -> usize {
        self.entries.read().await.values().filter(|e| e.dirty).count()
    }

    /// Drop a session from the cache without flushing it
    pub async fn remove(&self, session_id: &str) -> Option<Session> {
        self.entries
            .write()
            .await
            .remove(session_id)
            .map(|entry| entry.session)
    }

    /// Write one session to the store if it has unflushed changes
    pub async fn flush(&self, session_id: &str) -> FlushOutcome {
        let snapshot = {
            let entries = self.entries.read().await;
            match entries.get(session_id) {
                Some(entry) if entry.dirty => (entry.session.clone(), entry.version),
                _ => return FlushOutcome::Skipped,
            }
        };
        self.write_snapshot(snapshot.0, snapshot.1).await
    }

    /// Write every dirty session to the store
    pub async fn flush_all(&self) -> FlushReport {
        let (snapshots, total) = {
            let entries = self.entries.read().await;
            let snapshots: Vec<(Session, u64)> = entries
                .values()
                .filter(|e| e.dirty)
                .map(|e| (e.session.clone(), e.version))
                .collect();
            (snapshots, entries.len())
        };

        let mut report = FlushReport {
            skipped: total - snapshots.len(),
            ..FlushReport::default()
        };
        for (session, version) in snapshots {
            let session_id = session.session_id.clone();
            let outcome = self.write_snapshot(session, version).await;
            report.record(&session_id, outcome);
        }
        report
    }

    /// Flush and drop sessions nobody has written for `timeout`. A session
    /// whose flush fails stays cached.
    pub async fn evict_idle(&self, timeout: Duration) -> EvictionReport {
        let idle: Vec<String> = {
            let entries = self.entries.read().await;
            entries
                .iter()
                .filter(|(_, e)| e.touched_at.elapsed() >= timeout)
                .map(|(id, _)| id.clone())
                .collect()
        };

        let mut report = EvictionReport::default();
        for session_id in idle {
            if self.flush(&session_id).await.is_failure() {
                report.retained += 1;
                continue;
            }

            let mut entries = self.entries.write().await;
            let still_idle = entries
                .get(&session_id)
                .is_some_and(|e| !e.dirty && e.touched_at.elapsed() >= timeout);
            if still_idle {
                entries.remove(&session_id);
                debug!(session_id = %session_id, "Evicted idle session");
                report.evicted.push(session_id);
            }
        }
        report
    }

    async fn write_snapshot(&self, session: Session, version: u64) -> FlushOutcome {
        match self.store.save(&session).await {
            Ok(()) => {
                let mut entries = self.entries.write().await;
                if let Some(entry) = entries.get_mut(&session.session_id)
                    && entry.version == version
                {
                    entry.dirty = false;
                }
                FlushOutcome::Flushed
            }
            Err(e) => {
                warn!(session_id = %session.session_id, error = %e, "Failed to flush session");
                FlushOutcome::Failed {
                    error: e.to_string(),
                    will_retry: true,
                }
            }
        }
    }

    /// Delete stored sessions last updated before `cutoff`, sparing every
    /// hot session. Holds the write lock so nothing is cached mid-purge; a
    /// load that raced the purge is cached dirty and written back.
    pub async fn purge_store_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let entries = self.entries.write().await;
        self.purges.fetch_add(1, Ordering::SeqCst);
        let hot: Vec<String> = entries.keys().cloned().collect();
        self.store.purge_older_than(cutoff, &hot).await
    }

    async fn ensure_cached(&self, session_id: &str) -> Result<()> {
        if self.contains(session_id).await {
            return Ok(());
        }

        let purges = self.purges.load(Ordering::SeqCst);
        let (session, dirty) = self.fetch_or_create(session_id).await?;

        let mut entries = self.entries.write().await;
        let raced_purge = self.purges.load(Ordering::SeqCst) != purges;
        entries
            .entry(session_id.to_string())
            .or_insert_with(|| CacheEntry::new(session, dirty || raced_purge));
        Ok(())
    }

    /// Load from the store, or synthesize and persist a skeleton. The flag
    /// is true when the session still needs writing.
    async fn fetch_or_create(&self, session_id: &str) -> Result<(Session, bool)> {
        match self.store.load(session_id).await {
            Ok(session) => {
                debug!(session_id = %session_id, "Loaded session from store");
                Ok((session, false))
            }
            Err(e) if e.is_not_found() => {
                info!(session_id = %session_id, "Unknown session id, creating skeleton");
                let session = Session::skeleton(session_id, Utc::now());
                match self.store.save(&session).await {
                    Ok(()) => Ok((session, false)),
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Failed to persist skeleton session");
                        Ok((session, true))
                    }
                }
            }
            Err(e) => Err(e),
        }
    }
}
