//! Engine metrics snapshot

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineStats;

/// Point-in-time view of engine load and configured bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineMetrics {
    /// Hot sessions
    pub cached_sessions: usize,
    /// Hot sessions with unflushed changes
    pub dirty_sessions: usize,
    /// Actions waiting in the queue
    pub queue_depth: usize,
    /// Queue capacity
    pub queue_capacity: usize,
    /// Action log bound per session
    pub max_actions: usize,
    /// Idle time before eviction
    #[serde(with = "humantime_serde")]
    pub cache_timeout: Duration,
    /// Time between periodic flushes
    #[serde(with = "humantime_serde")]
    pub persist_interval: Duration,
    /// Pipeline counters
    pub pipeline: PipelineStats,
    /// Store backend name
    pub storage_backend: String,
    /// True while the worker is paused
    pub pipeline_paused: bool,
}

impl EngineMetrics {
    /// Queue fill ratio in [0, 1]
    pub fn queue_utilization(&self) -> f64 {
        if self.queue_capacity == 0 {
            return 0.0;
        }
        self.queue_depth as f64 / self.queue_capacity as f64
    }
}
