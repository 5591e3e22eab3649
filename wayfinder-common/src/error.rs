//! Common error types for Wayfinder

use thiserror::Error;

/// Common result type for Wayfinder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the Wayfinder crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Malformed encoded data (route polylines, recorded tracks)
    #[error("Parse error: {0}")]
    Parse(String),
}
