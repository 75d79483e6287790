//! Error types for paramate.

use thiserror::Error;

/// Main error type for paramate.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("System call failed: {0}")]
    Sys(#[from] nix::errno::Errno),

    #[error("'{0}' is not a permutation of 'kpc'")]
    BadOrder(String),

    #[error("Invalid partition: {0}")]
    BadPartition(String),

    #[error("Work queue error: {0}")]
    Queue(String),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("Engine error: {0}")]
    Engine(String),
}

/// Result type alias for paramate operations.
pub type Result<T> = std::result::Result<T, Error>;
