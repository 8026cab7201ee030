use thiserror::Error;

/// Front desk engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Staff-related errors
    #[error("Staff error: {0}")]
    Staff(String),

    /// Routing errors
    #[error("Routing error: {0}")]
    Routing(String),

    /// Callback scheduling errors
    #[error("Callback error: {0}")]
    Callback(String),

    /// Notification delivery errors
    #[error("Notification error: {0}")]
    Notification(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Snapshot (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Create a new Staff error
    pub fn staff<S: Into<String>>(msg: S) -> Self {
        Self::Staff(msg.into())
    }

    /// Create a new Routing error
    pub fn routing<S: Into<String>>(msg: S) -> Self {
        Self::Routing(msg.into())
    }

    /// Create a new Callback error
    pub fn callback<S: Into<String>>(msg: S) -> Self {
        Self::Callback(msg.into())
    }

    /// Create a new Notification error
    pub fn notification<S: Into<String>>(msg: S) -> Self {
        Self::Notification(msg.into())
    }

    /// Create a new Config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new NotFound error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type for front desk operations
pub type Result<T> = std::result::Result<T, EngineError>;
