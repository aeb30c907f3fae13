//! Error types for the upkeep maintenance core.

/// Top-level error type for the maintenance scheduler.
#[derive(Debug, thiserror::Error)]
pub enum UpkeepError {
    /// History store access or query error.
    #[error("store error: {0}")]
    Store(String),

    /// Wake-up scheduling error.
    #[error("schedule error: {0}")]
    Schedule(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, UpkeepError>;
