//! The context engine facade
//!
//! [`ContextEngine`] owns the session cache, the event pipeline, the
//! persistence scheduler and the prompt synthesizer, and exposes the
//! operations transport layers call. Callers only ever receive copies or
//! projections of session state.
//!
//! # Ordering
//!
//! Actions recorded through [`ContextEngine::record_action`] are applied by
//! a single worker in submission order. The direct mutators
//! (`update_location`, `update_npc_relationship`, `update_character_health`,
//! `update_reputation`) apply synchronously as atomic read-modify-writes on
//! the cache. Each path is FIFO on its own, but a queued action and a
//! concurrent direct mutation on the same session may interleave either
//! way. Neither loses the other's changes.
//!
//! # Example
//!
//! ```rust,ignore
//! let engine = ContextEngine::open(LoreConfig::load()?).await?;
//! let session_id = engine.create_session("p1", "Aragorn").await?;
//! engine
//!     .record_action(&session_id, ActionRequest::from_command("/attack goblin")
//!         .outcome("Success! The goblin falls.")
//!         .consequence(Consequence::CombatVictory))
//!     .await?;
//! let prompt = engine.generate_prompt(&session_id).await?;
//! engine.shutdown().await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{error, info, warn};

use crate::cache::{FlushOutcome, FlushReport, SessionCache};
use crate::config::LoreConfig;
use crate::error::{LoreError, Result};
use crate::metrics::EngineMetrics;
use crate::persistence::{PersistenceSchedule, PersistenceScheduler};
use crate::pipeline::EventPipeline;
use crate::prompt::{ContextSummary, PromptData, PromptSynthesizer};
use crate::session::{ActionEvent, ActionRequest, Health, NpcRelationship, Session};
use crate::storage::{self, SessionStore};

/// Session context engine
pub struct ContextEngine {
    config: LoreConfig,
    cache: Arc<SessionCache>,
    pipeline: EventPipeline,
    scheduler: PersistenceScheduler,
    synthesizer: PromptSynthesizer,
    closed: AtomicBool,
    /// Held for read by mutators, for write by shutdown
    gate: RwLock<()>,
}

impl ContextEngine {
    /// Start an engine over `store`. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` fails validation.
    pub fn new(config: LoreConfig, store: Arc<dyn SessionStore>) -> Result<Self> {
        config.validate()?;

        let ctx = &config.context;
        let cache = Arc::new(SessionCache::new(store));
        let pipeline = EventPipeline::spawn(cache.clone(), ctx.queue_capacity, ctx.max_actions);
        let scheduler = PersistenceScheduler::spawn(cache.clone(), PersistenceSchedule::from(ctx));
        let synthesizer = PromptSynthesizer::new(config.prompt.clone());

        info!(
            backend = cache.store().name(),
            queue_capacity = ctx.queue_capacity,
            max_actions = ctx.max_actions,
            "Context engine started"
        );

        Ok(Self {
            config,
            cache,
            pipeline,
            scheduler,
            synthesizer,
            closed: AtomicBool::new(false),
            gate: RwLock::new(()),
        })
    }

    /// Open the configured store and start an engine over it
    pub async fn open(config: LoreConfig) -> Result<Self> {
        let store = storage::open(&config.storage).await?;
        store.health_check().await?;
        Self::new(config, store)
    }

    /// Active configuration
    pub fn config(&self) -> &LoreConfig {
        &self.config
    }

    /// The backing store
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        self.cache.store()
    }

    /// Admit a mutating call. Shutdown waits for every guard handed out
    /// here before its final flush.
    async fn admit(&self) -> Result<RwLockReadGuard<'_, ()>> {
        let guard = self.gate.read().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(LoreError::ShuttingDown);
        }
        Ok(guard)
    }

    /// Create and durably store a new session; returns its id.
    ///
    /// # Errors
    ///
    /// A storage error if the session cannot be written. No id is issued
    /// and nothing is cached in that case.
    pub async fn create_session(&self, player_id: &str, character_name: &str) -> Result<String> {
        let _open = self.admit().await?;
        if player_id.trim().is_empty() {
            return Err(LoreError::validation("player id is empty"));
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let session = Session::new(&session_id, player_id, character_name, Utc::now());

        if let Err(e) = self.cache.store().save(&session).await {
            error!(player_id = %player_id, error = %e, "Failed to persist new session");
            return Err(match e {
                LoreError::Storage(_) => e,
                other => LoreError::Storage(other.to_string()),
            });
        }
        self.cache.insert_clean(session).await;

        info!(session_id = %session_id, player_id = %player_id, "Created session");
        Ok(session_id)
    }

    /// A copy of the session; unknown ids get a fresh skeleton
    pub async fn session(&self, session_id: &str) -> Result<Session> {
        self.cache.get(session_id).await
    }

    /// Queue an action; returns the id of the recorded event.
    ///
    /// The event's location is the session's current location at
    /// submission unless the request names one.
    ///
    /// # Errors
    ///
    /// `Validation` for malformed requests, `QueueFull` when the pipeline
    /// is at capacity (the action is dropped), `ShuttingDown` after
    /// shutdown.
    pub async fn record_action(&self, session_id: &str, request: ActionRequest) -> Result<String> {
        let _open = self.admit().await?;
        request.validate()?;

        let location = match request.location() {
            Some(location) => location.to_string(),
            None => {
                self.cache
                    .read(session_id, |s| s.location.current.clone())
                    .await?
            }
        };

        let event = request.into_event(location, Utc::now());
        let action_id = event.id.clone();
        self.pipeline.submit(session_id, event)?;
        Ok(action_id)
    }

    /// Move the player. Moving to the current location is a no-op.
    pub async fn update_location(&self, session_id: &str, location: &str) -> Result<()> {
        let _open = self.admit().await?;
        let location = location.trim();
        if location.is_empty() {
            return Err(LoreError::validation("location is empty"));
        }

        self.cache
            .update(session_id, |s| s.move_to(location, Utc::now()))
            .await
    }

    /// Shift an NPC's disposition, learn new facts and recompute its mood;
    /// returns the updated relationship
    pub async fn update_npc_relationship(
        &self,
        session_id: &str,
        npc_id: &str,
        npc_name: &str,
        disposition_delta: i32,
        facts: Vec<String>,
    ) -> Result<NpcRelationship> {
        let _open = self.admit().await?;
        if npc_id.trim().is_empty() {
            return Err(LoreError::validation("npc id is empty"));
        }
        if facts.iter().any(|f| f.trim().is_empty()) {
            return Err(LoreError::validation("npc facts must not be empty"));
        }

        self.cache
            .update(session_id, |s| {
                s.interact_with_npc(npc_id, npc_name, disposition_delta, facts, Utc::now())
                    .clone()
            })
            .await
    }

    /// Shift health by `delta`, clamped to [0, max]; returns the new health
    pub async fn update_character_health(&self, session_id: &str, delta: i32) -> Result<Health> {
        let _open = self.admit().await?;
        self.cache
            .update(session_id, |s| {
                s.adjust_health(delta, Utc::now());
                s.character.health
            })
            .await
    }

    /// Shift reputation by `delta`, clamped to [-100, 100]; returns the new
    /// reputation
    pub async fn update_reputation(&self, session_id: &str, delta: i32) -> Result<i32> {
        let _open = self.admit().await?;
        self.cache
            .update(session_id, |s| {
                s.adjust_reputation(delta, Utc::now());
                s.character.reputation
            })
            .await
    }

    /// Up to `count` most recent actions, oldest first
    pub async fn recent_actions(&self, session_id: &str, count: usize) -> Result<Vec<ActionEvent>> {
        self.cache
            .read(session_id, |s| s.recent_actions(count).cloned().collect())
            .await
    }

    /// Structured summary for prompt consumers
    pub async fn context_summary(&self, session_id: &str) -> Result<ContextSummary> {
        let now = Utc::now();
        self.cache
            .read(session_id, |s| self.synthesizer.summary(s, now))
            .await
    }

    /// Game master prompt text
    pub async fn generate_prompt(&self, session_id: &str) -> Result<String> {
        let now = Utc::now();
        self.cache
            .read(session_id, |s| self.synthesizer.prompt(s, now))
            .await
    }

    /// Structured prompt data
    pub async fn prompt_data(&self, session_id: &str) -> Result<PromptData> {
        let now = Utc::now();
        self.cache
            .read(session_id, |s| self.synthesizer.prompt_data(s, now))
            .await
    }

    /// Time since the session was created
    pub async fn session_duration(&self, session_id: &str) -> Result<chrono::Duration> {
        let now = Utc::now();
        self.cache
            .read(session_id, |s| now.signed_duration_since(s.created_at))
            .await
    }

    /// Write one session to the store now if it has unflushed changes
    pub async fn flush_session(&self, session_id: &str) -> FlushOutcome {
        self.cache.flush(session_id).await
    }

    /// Ids of hot sessions
    pub async fn active_sessions(&self) -> Vec<String> {
        self.cache.ids().await
    }

    /// True when the session is hot
    pub async fn is_session_active(&self, session_id: &str) -> bool {
        self.cache.contains(session_id).await
    }

    /// Remove a session from the cache and the store; returns true if the
    /// store held it. Actions still queued for it will recreate a skeleton.
    pub async fn delete_session(&self, session_id: &str) -> Result<bool> {
        let _open = self.admit().await?;
        let cached = self.cache.remove(session_id).await.is_some();
        let stored = self.cache.store().delete(session_id).await?;
        info!(session_id = %session_id, cached, stored, "Deleted session");
        Ok(stored)
    }

    /// Delete stored sessions last updated before `cutoff`; hot sessions
    /// are kept. Returns the number removed.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let _open = self.admit().await?;
        let purged = self.cache.purge_store_older_than(cutoff).await?;
        info!(purged, cutoff = %cutoff, "Purged stored sessions");
        Ok(purged)
    }

    /// Snapshot of load and configured bounds
    pub async fn metrics(&self) -> EngineMetrics {
        let ctx = &self.config.context;
        EngineMetrics {
            cached_sessions: self.cache.len().await,
            dirty_sessions: self.cache.dirty_count().await,
            queue_depth: self.pipeline.depth(),
            queue_capacity: self.pipeline.capacity(),
            max_actions: ctx.max_actions,
            cache_timeout: ctx.cache_timeout,
            persist_interval: ctx.persist_interval,
            pipeline: self.pipeline.stats(),
            storage_backend: self.cache.store().name().to_string(),
            pipeline_paused: self.pipeline.is_paused(),
        }
    }

    /// Stop the pipeline worker from applying actions; submissions still
    /// queue until capacity
    pub fn pause_pipeline(&self) {
        self.pipeline.pause();
    }

    /// Let the pipeline worker continue
    pub fn resume_pipeline(&self) {
        self.pipeline.resume();
    }

    /// Wait until every queued action has been applied. Never returns while
    /// the pipeline is paused with work queued.
    pub async fn wait_idle(&self) {
        self.pipeline.wait_idle().await;
    }

    /// Stop intake, drain the pipeline and flush every cached session.
    ///
    /// Calls after the first return an empty report.
    pub async fn shutdown(&self) -> Result<FlushReport> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(FlushReport::default());
        }

        info!("Shutting down context engine");
        drop(self.gate.write().await);
        self.scheduler.stop().await;
        self.pipeline.shutdown().await;

        let report = self.cache.flush_all().await;
        if report.is_clean() {
            info!(flushed = report.flushed, skipped = report.skipped, "Final flush complete");
        } else {
            for (session_id, error) in &report.failed {
                warn!(session_id = %session_id, error = %error, "Session lost at shutdown");
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemorySessionStore;

    fn engine() -> (Arc<InMemorySessionStore>, ContextEngine) {
        let store = Arc::new(InMemorySessionStore::new());
        let engine = ContextEngine::new(LoreConfig::default(), store.clone()).unwrap();
        (store, engine)
    }

    #[tokio::test]
    async fn test_create_session_fails_when_store_down() {
        let (store, engine) = engine();
        store.set_fail_writes(true);

        let err = engine.create_session("p1", "Aragorn").await.unwrap_err();
        assert!(matches!(err, LoreError::Storage(_)));
        assert!(engine.active_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn test_validation_rejects_before_touching_cache() {
        let (_, engine) = engine();
        assert!(matches!(
            engine.update_location("s1", "  ").await,
            Err(LoreError::Validation(_))
        ));
        assert!(matches!(
            engine.update_npc_relationship("s1", "", "Bob", 1, vec![]).await,
            Err(LoreError::Validation(_))
        ));
        assert!(matches!(
            engine.record_action("s1", ActionRequest::new("")).await,
            Err(LoreError::Validation(_))
        ));
        assert!(!engine.is_session_active("s1").await);
    }

    #[tokio::test]
    async fn test_record_action_uses_current_location() {
        let (_, engine) = engine();
        let id = engine.create_session("p1", "Aragorn").await.unwrap();
        engine.update_location(&id, "dark_forest").await.unwrap();

        engine.record_action(&id, ActionRequest::from_command("/look")).await.unwrap();
        engine.wait_idle().await;

        let actions = engine.recent_actions(&id, 10).await.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].location, "dark_forest");
        assert_eq!(actions[0].kind, "examine");
    }

    #[tokio::test]
    async fn test_operations_after_shutdown() {
        let (_, engine) = engine();
        let id = engine.create_session("p1", "Aragorn").await.unwrap();
        engine.shutdown().await.unwrap();

        assert!(matches!(
            engine.update_reputation(&id, 1).await,
            Err(LoreError::ShuttingDown)
        ));
        assert!(matches!(
            engine.record_action(&id, ActionRequest::new("/wave")).await,
            Err(LoreError::ShuttingDown)
        ));
        assert_eq!(engine.shutdown().await.unwrap(), FlushReport::default());
    }

    /// Memory store whose loads stall, to hold a mutator mid-flight
    struct SlowLoadStore {
        inner: InMemorySessionStore,
        load_started: tokio::sync::Notify,
        delay: std::time::Duration,
    }

    #[async_trait::async_trait]
    impl SessionStore for SlowLoadStore {
        async fn load(&self, session_id: &str) -> Result<Session> {
            self.load_started.notify_one();
            tokio::time::sleep(self.delay).await;
            self.inner.load(session_id).await
        }

        async fn save(&self, session: &Session) -> Result<()> {
            self.inner.save(session).await
        }

        async fn delete(&self, session_id: &str) -> Result<bool> {
            self.inner.delete(session_id).await
        }

        async fn list_ids(&self) -> Result<Vec<String>> {
            self.inner.list_ids().await
        }

        async fn purge_older_than(&self, cutoff: DateTime<Utc>, keep: &[String]) -> Result<u64> {
            self.inner.purge_older_than(cutoff, keep).await
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_in_flight_mutation() {
        let store = Arc::new(SlowLoadStore {
            inner: InMemorySessionStore::new(),
            load_started: tokio::sync::Notify::new(),
            delay: std::time::Duration::from_secs(5),
        });
        store
            .inner
            .save(&Session::new("s1", "p1", "Aragorn", Utc::now()))
            .await
            .unwrap();
        let engine = Arc::new(ContextEngine::new(LoreConfig::default(), store.clone()).unwrap());

        let mutation = tokio::spawn({
            let engine = engine.clone();
            async move { engine.update_reputation("s1", 5).await }
        });
        store.load_started.notified().await;

        let report = engine.shutdown().await.unwrap();
        assert_eq!(mutation.await.unwrap().unwrap(), 5);
        assert_eq!(report.flushed, 1);
        assert_eq!(store.inner.load("s1").await.unwrap().character.reputation, 5);
    }

    #[tokio::test]
    async fn test_purge_older_than_after_shutdown() {
        let (_, engine) = engine();
        engine.shutdown().await.unwrap();
        assert!(matches!(
            engine.purge_older_than(Utc::now()).await,
            Err(LoreError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn test_delete_session() {
        let (store, engine) = engine();
        let id = engine.create_session("p1", "Aragorn").await.unwrap();

        assert!(engine.delete_session(&id).await.unwrap());
        assert!(!engine.is_session_active(&id).await);
        assert!(store.load(&id).await.unwrap_err().is_not_found());
    }
}
