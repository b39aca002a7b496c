//! Error types for Cinder.

use thiserror::Error;

/// Top-level error type for Cinder operations.
#[derive(Debug, Error)]
pub enum CinderError {
    /// Enemy spawn failed
    #[error("Spawn error: {0}")]
    Spawn(String),

    /// Dungeon grid data was rejected
    #[error("Grid error: {0}")]
    Grid(String),

    /// Configuration could not be loaded
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Cinder operations.
pub type CinderResult<T> = Result<T, CinderError>;
