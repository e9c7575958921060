//! Persistence scheduler: periodic flush, idle eviction and retention
//!
//! One background task wakes every `persist_interval`, writes every dirty
//! cached session to the store and evicts sessions idle longer than
//! `cache_timeout`. Failures are logged and left for the next tick. When a
//! retention window is configured, the task also purges stored sessions
//! whose last update is older than that window.
//!
//! The final shutdown flush is not this task's job; the engine performs it
//! after the event pipeline has drained.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::{EvictionReport, FlushReport, SessionCache};
use crate::config::ContextConfig;
use crate::error::{LoreError, Result};

/// What one scheduler tick did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Periodic flush totals
    pub flush: FlushReport,
    /// Idle eviction totals
    pub eviction: EvictionReport,
}

/// Timing knobs for the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceSchedule {
    /// Time between flushes
    pub persist_interval: Duration,
    /// Idle time before a session leaves the cache
    pub cache_timeout: Duration,
    /// Age after which stored sessions are purged; `None` disables purging
    pub retention: Option<Duration>,
    /// Time between retention purges
    pub retention_interval: Duration,
}

impl From<&ContextConfig> for PersistenceSchedule {
    fn from(config: &ContextConfig) -> Self {
        Self {
            persist_interval: config.persist_interval,
            cache_timeout: config.cache_timeout,
            retention: config.retention,
            retention_interval: config.retention_interval,
        }
    }
}

/// Handle to the background persistence task
pub struct PersistenceScheduler {
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PersistenceScheduler {
    /// Start the background task
    pub fn spawn(cache: Arc<SessionCache>, schedule: PersistenceSchedule) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(cache, schedule, cancel.clone()));

        Self {
            cancel,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Flush everything dirty, then evict idle sessions
    pub async fn run_cycle(cache: &SessionCache, cache_timeout: Duration) -> CycleReport {
        let flush = cache.flush_all().await;
        let eviction = cache.evict_idle(cache_timeout).await;
        CycleReport { flush, eviction }
    }

    /// Purge stored sessions last updated more than `retention` ago. Hot
    /// sessions are never purged.
    pub async fn purge_expired(cache: &SessionCache, retention: Duration) -> Result<u64> {
        let age = chrono::Duration::from_std(retention)
            .map_err(|e| LoreError::Configuration(format!("retention out of range: {}", e)))?;
        let cutoff = Utc::now()
            .checked_sub_signed(age)
            .ok_or_else(|| LoreError::Configuration("retention out of range".to_string()))?;
        cache.purge_store_older_than(cutoff).await
    }

    /// Stop the task and wait for it to exit
    pub async fn stop(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.lock().await.take()
            && let Err(e) = handle.await
        {
            error!(error = %e, "Persistence task panicked");
        }
    }
}

impl Drop for PersistenceScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn run(cache: Arc<SessionCache>, schedule: PersistenceSchedule, cancel: CancellationToken) {
    let mut flush_ticker = ticker(schedule.persist_interval);
    let mut retention_ticker = schedule
        .retention
        .map(|_| ticker(schedule.retention_interval));

    debug!(
        persist_interval = ?schedule.persist_interval,
        cache_timeout = ?schedule.cache_timeout,
        retention = ?schedule.retention,
        "Persistence scheduler started"
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = flush_ticker.tick() => {
                let report = PersistenceScheduler::run_cycle(&cache, schedule.cache_timeout).await;
                log_cycle(&report);
            }
            _ = async {
                match retention_ticker.as_mut() {
                    Some(ticker) => ticker.tick().await,
                    None => std::future::pending().await,
                }
            } => {
                if let Some(retention) = schedule.retention {
                    match PersistenceScheduler::purge_expired(&cache, retention).await {
                        Ok(0) => {}
                        Ok(purged) => info!(purged, "Purged expired sessions from store"),
                        Err(e) => warn!(error = %e, "Retention purge failed"),
                    }
                }
            }
        }
    }

    debug!("Persistence scheduler stopped");
}

fn log_cycle(report: &CycleReport) {
    for (session_id, error) in &report.flush.failed {
        warn!(session_id = %session_id, error = %error, "Session not persisted, will retry next tick");
    }
    if report.flush.flushed > 0 || !report.eviction.evicted.is_empty() {
        info!(
            flushed = report.flush.flushed,
            skipped = report.flush.skipped,
            failed = report.flush.failed.len(),
            evicted = report.eviction.evicted.len(),
            "Persistence cycle complete"
        );
    }
}
