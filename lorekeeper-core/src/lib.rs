//! # Lorekeeper - Session Context Engine for AI-Driven Interactive Fiction
//!
//! Lorekeeper tracks each player's evolving state and turns it into bounded
//! prompts for a language-model game master:
//! - Character sheet, location history, action log and NPC relationships
//! - A concurrent session cache in front of a pluggable durable store
//! - A bounded asynchronous action pipeline with typed consequence rules
//! - Periodic and shutdown-triggered persistence with idle eviction
//! - Deterministic, size-bounded prompt synthesis
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lorekeeper_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let engine = ContextEngine::open(LoreConfig::default()).await?;
//!
//!     let session_id = engine.create_session("player-1", "Aragorn").await?;
//!     engine
//!         .record_action(
//!             &session_id,
//!             ActionRequest::from_command("/attack goblin")
//!                 .outcome("Success! The goblin flees.")
//!                 .consequence(Consequence::CombatVictory),
//!         )
//!         .await?;
//!     engine.wait_idle().await;
//!
//!     println!("{}", engine.generate_prompt(&session_id).await?);
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Storage Backends
//!
//! - `memory`: volatile in-process map
//! - `sqlite`: relational store via sqlx, indexed by player and recency

pub mod cache;
pub mod config;
pub mod consequence;
pub mod disposition;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod persistence;
pub mod pipeline;
pub mod prompt;
pub mod session;
pub mod storage;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::{EvictionReport, FlushOutcome, FlushReport, SessionCache};
    pub use crate::config::{
        ConfigBuilder, ContextConfig, LogFormat, LoggingConfig, LoreConfig, PromptConfig,
        StorageConfig,
    };
    pub use crate::consequence::{Consequence, apply_action};
    pub use crate::disposition::{
        DispositionBand, Mood, RelationshipTier, clamp_standing, reputation_description,
    };
    pub use crate::engine::ContextEngine;
    pub use crate::error::{LoreError, Result};
    pub use crate::metrics::EngineMetrics;
    pub use crate::persistence::{CycleReport, PersistenceSchedule, PersistenceScheduler};
    pub use crate::pipeline::{EventPipeline, PipelineStats};
    pub use crate::prompt::{
        ContextSummary, ExperienceLevel, GmPersonality, NpcContext, PlayStyle, PlayerFocus,
        PlayerMood, PlayerProfile, PromptData, PromptSynthesizer, WorldKnowledge, WorldState,
    };
    pub use crate::session::{
        ActionCategory, ActionEvent, ActionRequest, Character, EquipmentItem, Health,
        InventoryItem, LocationState, LocationVisit, NpcRelationship, Session, SessionStats,
        parse_command,
    };
    pub use crate::storage::{
        InMemorySessionStore, SessionStore, SqliteSessionStore, StorageStats,
    };
}
