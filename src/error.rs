//! Error types for the revgraph extraction pipeline.
//!
//! Parsers keep their own small error enums (`ElfError`, `DisassemblerError`,
//! `IoError`); this module folds them into one `thiserror` type at the crate
//! boundary.

use thiserror::Error;

use crate::formats::elf::ElfError;
use crate::io::error::IoError;

/// Main error type for revgraph operations.
#[derive(Debug, Error)]
pub enum RevgraphError {
    /// The container could not be parsed
    #[error("Unparsable binary: {0}")]
    Unparsable(#[from] ElfError),

    /// Bounded file access failed
    #[error("File error: {0}")]
    FileIo(#[from] IoError),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource limit exceeded
    #[error("Resource limit exceeded: {resource} ({used}/{limit})")]
    ResourceExhausted {
        resource: String,
        used: usize,
        limit: usize,
    },

    /// Graph store read or write failure
    #[error("Graph store error: {0}")]
    Graph(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RevgraphError {
    fn from(e: serde_json::Error) -> Self {
        RevgraphError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for RevgraphError {
    fn from(e: serde_yaml::Error) -> Self {
        RevgraphError::Config(e.to_string())
    }
}

/// Result type alias for revgraph operations
pub type Result<T> = std::result::Result<T, RevgraphError>;
