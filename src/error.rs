//! Error types for heapdb
//!
//! This module defines all error types used throughout the engine.

use thiserror::Error;

/// The main error type for heapdb
#[derive(Error, Debug)]
pub enum Error {
    // ========== Storage Errors ==========
    #[error("Storage error: tuple not found - {0}")]
    TupleNotFound(String),

    #[error("Storage error: page {0} is full")]
    PageFull(usize),

    #[error("Storage error: malformed data - {0}")]
    MalformedData(String),

    #[error("Storage error: buffer pool is full ({0} pages pinned or dirty)")]
    BufferPoolFull(usize),

    // ========== Type Errors ==========
    #[error("Type error: incompatible types - {0}")]
    IncompatibleTypes(String),

    #[error("Type error: cannot compare {left} with {right}")]
    TypeMismatch { left: String, right: String },

    // ========== Catalog Errors ==========
    #[error("Catalog error: table '{0}' already exists")]
    DuplicateTable(String),

    #[error("Catalog error: table '{0}' not found")]
    NoSuchTable(String),

    #[error("Catalog error: name '{0}' is ambiguous")]
    AmbiguousName(String),

    // ========== Execution Errors ==========
    #[error("Execution error: illegal operation - {0}")]
    IllegalOperation(String),

    // ========== Transaction Errors ==========
    #[error("Transaction error: deadlock detected, transaction {0} aborted")]
    Deadlock(u64),

    #[error("Transaction error: transaction {0} is not active")]
    IllegalTransaction(u64),

    // ========== I/O and Configuration Errors ==========
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the caller may succeed by retrying the whole transaction later.
    ///
    /// Everything else is a contract violation that repeats if retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Deadlock(_) | Error::BufferPoolFull(_))
    }

    pub(crate) fn type_mismatch(left: &str, right: &str) -> Self {
        Error::TypeMismatch {
            left: left.to_string(),
            right: right.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type alias for heapdb operations
pub type Result<T> = std::result::Result<T, Error>;
