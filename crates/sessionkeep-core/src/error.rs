//! Error types for sessionkeep

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A stored payload could not be encoded or decoded as JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any failure reported by the underlying database engine
    #[error("Storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A sweep pass failed. Only handed to the cleanup error hook.
    #[error("Cleanup pass failed: {0}")]
    Cleanup(#[source] Box<Error>),

    #[error("Invalid session: {0}")]
    InvalidSession(String),
}

impl Error {
    /// Wrap a driver error without altering it
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Storage(Box::new(err))
    }

    /// Wrap an error raised during a background sweep
    pub fn cleanup(err: Error) -> Self {
        Error::Cleanup(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
