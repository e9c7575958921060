//! Configuration types for Lorekeeper

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{LoreError, Result};

/// Main configuration for the session context engine
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoreConfig {
    /// Cache, pipeline and persistence configuration
    #[serde(default)]
    pub context: ContextConfig,

    /// Durable store configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Prompt synthesis bounds
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Logging configuration (consumed by binaries)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cache, pipeline and persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Actions kept per session (oldest evicted first)
    pub max_actions: usize,

    /// Event pipeline queue capacity
    pub queue_capacity: usize,

    /// Idle time after which a hot session is flushed and evicted
    #[serde(with = "humantime_serde")]
    pub cache_timeout: Duration,

    /// Interval between periodic flushes of the cache
    #[serde(with = "humantime_serde")]
    pub persist_interval: Duration,

    /// Store-side retention; sessions not updated within this window are purged
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub retention: Option<Duration>,

    /// Interval between retention purges
    #[serde(with = "humantime_serde")]
    pub retention_interval: Duration,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_actions: 50,
            queue_capacity: 1000,
            cache_timeout: Duration::from_secs(30 * 60),
            persist_interval: Duration::from_secs(5 * 60),
            retention: None,
            retention_interval: Duration::from_secs(6 * 60 * 60),
        }
    }
}

impl ContextConfig {
    /// Set the action log bound
    pub fn with_max_actions(mut self, max_actions: usize) -> Self {
        self.max_actions = max_actions;
        self
    }

    /// Set the event queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the idle eviction window
    pub fn with_cache_timeout(mut self, timeout: Duration) -> Self {
        self.cache_timeout = timeout;
        self
    }

    /// Set the periodic flush interval
    pub fn with_persist_interval(mut self, interval: Duration) -> Self {
        self.persist_interval = interval;
        self
    }

    /// Enable store-side retention
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }
}

/// Durable store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Volatile in-process map
    Memory,

    /// SQLite database via sqlx
    Sqlite {
        /// Connection URL, e.g. `sqlite://lorekeeper.db` or `sqlite::memory:`
        #[serde(default = "default_sqlite_url")]
        url: String,

        /// Pool size
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
}

fn default_sqlite_url() -> String {
    "sqlite://lorekeeper.db".to_string()
}

fn default_max_connections() -> u32 {
    4
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory
    }
}

impl StorageConfig {
    /// SQLite store at the given URL
    pub fn sqlite(url: impl Into<String>) -> Self {
        StorageConfig::Sqlite {
            url: url.into(),
            max_connections: default_max_connections(),
        }
    }
}

/// Bounds applied when synthesizing prompts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Actions rendered in the prompt body
    pub recent_actions: usize,

    /// Actions listed in the structured summary
    pub summary_actions: usize,

    /// Actions inspected by the player mood heuristic
    pub mood_window: usize,

    /// NPCs interacted with inside this window count as active
    #[serde(with = "humantime_serde")]
    pub active_npc_window: Duration,

    /// Cap on active NPCs rendered
    pub max_active_npcs: usize,

    /// Cap on known facts rendered per NPC (most recent kept)
    pub max_facts_per_npc: usize,

    /// Events included in structured prompt data
    pub prompt_data_events: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            recent_actions: 3,
            summary_actions: 5,
            mood_window: 5,
            active_npc_window: Duration::from_secs(24 * 60 * 60),
            max_active_npcs: 8,
            max_facts_per_npc: 5,
            prompt_data_events: 10,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, multi-line
    #[default]
    Pretty,
    /// Single line per event
    Compact,
    /// Newline-delimited JSON
    Json,
}

/// Builder for LoreConfig
pub struct ConfigBuilder {
    config: LoreConfig,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            config: LoreConfig::default(),
        }
    }

    /// Set context configuration
    pub fn context(mut self, config: ContextConfig) -> Self {
        self.config.context = config;
        self
    }

    /// Set storage configuration
    pub fn storage(mut self, config: StorageConfig) -> Self {
        self.config.storage = config;
        self
    }

    /// Set prompt configuration
    pub fn prompt(mut self, config: PromptConfig) -> Self {
        self.config.prompt = config;
        self
    }

    /// Set logging configuration
    pub fn logging(mut self, config: LoggingConfig) -> Self {
        self.config.logging = config;
        self
    }

    /// Build the configuration
    pub fn build(self) -> LoreConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoreConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `lorekeeper.toml` in the working directory
    /// 3. File named by `LOREKEEPER_CONFIG_PATH`
    /// 4. `LOREKEEPER_*` environment overrides (nested keys split on `__`)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source is invalid or validation fails.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(LoreConfig::default()))
            .merge(Toml::file("lorekeeper.toml"));

        if let Ok(path) = std::env::var("LOREKEEPER_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: LoreConfig = figment
            .merge(Env::prefixed("LOREKEEPER_").ignore(&["CONFIG_PATH"]).split("__"))
            .extract()
            .map_err(|e| LoreError::Configuration(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let config: LoreConfig = Figment::from(Serialized::defaults(LoreConfig::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                LoreError::Configuration(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any bound or interval is zero.
    pub fn validate(&self) -> Result<()> {
        let ctx = &self.context;
        if ctx.max_actions == 0 {
            return Err(LoreError::Configuration(
                "context.max_actions must be positive".to_string(),
            ));
        }
        if ctx.queue_capacity == 0 {
            return Err(LoreError::Configuration(
                "context.queue_capacity must be positive".to_string(),
            ));
        }
        if ctx.persist_interval.is_zero() || ctx.retention_interval.is_zero() {
            return Err(LoreError::Configuration(
                "persistence intervals must be non-zero".to_string(),
            ));
        }
        if ctx.cache_timeout.is_zero() {
            return Err(LoreError::Configuration(
                "context.cache_timeout must be non-zero".to_string(),
            ));
        }
        if let StorageConfig::Sqlite { url, max_connections } = &self.storage {
            if url.is_empty() {
                return Err(LoreError::Configuration("storage.url is empty".to_string()));
            }
            if *max_connections == 0 {
                return Err(LoreError::Configuration(
                    "storage.max_connections must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}
