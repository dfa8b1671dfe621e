//! Centralized error handling for RuEns
//!
//! Every fallible operation in the crate returns [`Result`], so failures in the
//! store, the processor or the renderer surface to the caller with their
//! original cause attached.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for RuEns operations
#[derive(Debug, Error)]
pub enum RuEnsError {
    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCDFError(#[from] netcdf::Error),

    /// Statistics computation errors
    #[error("Statistics computation error: {0}")]
    StatisticsError(String),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Repository metadata could not be (de)serialized
    #[error("Metadata error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Variable not found in a member file or in the store
    #[error("Variable '{var}' not found")]
    VariableNotFound { var: String },

    /// Field rank does not match the variable kind
    #[error("Variable '{var}' has shape {found:?}, expected {expected}")]
    ShapeMismatch {
        var: String,
        expected: String,
        found: Vec<usize>,
    },

    /// Invalid time window or timestamp
    #[error("Invalid time window: {message}")]
    InvalidWindow { message: String },

    /// Invalid variable selection
    #[error("Invalid variable selection: {message}")]
    InvalidSelection { message: String },

    /// Thread pool configuration error
    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    /// Array shape or dimension error
    #[error("Array error: {0}")]
    ArrayError(#[from] ndarray::ShapeError),

    /// Another process holds the repository commit lock
    #[error("Repository at {path:?} is locked by another writer")]
    RepositoryLocked { path: PathBuf },

    /// Repository layout is missing or unreadable
    #[error("Repository error: {0}")]
    RepositoryError(String),

    /// Stored chunk does not match its manifest entry
    #[error("Corrupt chunk {path:?}: {message}")]
    CorruptChunk { path: PathBuf, message: String },

    /// Committed data disagrees with the stored array layout
    #[error("Schema mismatch for '{var}': {message}")]
    SchemaMismatch { var: String, message: String },

    /// Nothing to commit
    #[error("Refusing to commit an empty result")]
    EmptyCommit,

    /// Plot rendering errors
    #[error("Render error: {0}")]
    RenderError(String),

    /// Background task failed to complete
    #[error("Task error: {0}")]
    TaskError(String),

    /// Generic error for ad-hoc messages
    #[error("{0}")]
    Generic(String),
}

impl From<tokio::task::JoinError> for RuEnsError {
    fn from(error: tokio::task::JoinError) -> Self {
        RuEnsError::TaskError(error.to_string())
    }
}

impl From<String> for RuEnsError {
    fn from(error: String) -> Self {
        RuEnsError::Generic(error)
    }
}

impl From<&str> for RuEnsError {
    fn from(error: &str) -> Self {
        RuEnsError::Generic(error.to_string())
    }
}

/// Result type alias for RuEns operations
pub type Result<T> = std::result::Result<T, RuEnsError>;
