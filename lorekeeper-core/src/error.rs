//! Error types for Lorekeeper operations

/// Result type for Lorekeeper operations
pub type Result<T> = std::result::Result<T, LoreError>;

/// Error types for the session context engine
#[derive(Debug, thiserror::Error)]
pub enum LoreError {
    /// No session is stored under this id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The event pipeline queue is full; the action was dropped
    #[error("Event queue full (capacity {capacity})")]
    QueueFull {
        /// Configured queue capacity
        capacity: usize,
    },

    /// Durable store I/O failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Malformed input rejected before touching any state
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The engine has stopped accepting work
    #[error("Engine is shutting down")]
    ShuttingDown,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoreError {
    /// Shorthand for a validation failure
    pub fn validation(msg: impl Into<String>) -> Self {
        LoreError::Validation(msg.into())
    }

    /// True when the error reports an unknown session id
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoreError::SessionNotFound(_))
    }

    /// True when the error reports an overflowing event queue
    pub fn is_capacity(&self) -> bool {
        matches!(self, LoreError::QueueFull { .. })
    }
}

impl From<sqlx::Error> for LoreError {
    fn from(err: sqlx::Error) -> Self {
        LoreError::Storage(err.to_string())
    }
}

impl From<String> for LoreError {
    fn from(s: String) -> Self {
        LoreError::Other(s)
    }
}

impl From<&str> for LoreError {
    fn from(s: &str) -> Self {
        LoreError::Other(s.to_string())
    }
}
