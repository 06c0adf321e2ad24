//! # Leakwatch - breach lookup over a normalized leak store
//!
//! Answers "which leaks mention this address / this domain" against three
//! collections kept apart on purpose: leaks, emails and the relations
//! between them. The store offers no joins, so every multi-entity answer is
//! assembled here from single-table lookups.
//!
//! Leakwatch provides:
//! - A storage gateway trait with a SQLite implementation
//! - A relation resolver built on one two-phase join primitive
//! - Leak reports that can be drained to a list or streamed one at a time
//! - An HTTP transport and a CLI on top of the same resolver

pub mod id;
pub mod model;
pub mod storage;
pub mod query;
pub mod server;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use id::RecordId;
pub use model::{Email, Leak, QueryKey, Relation};
pub use query::{LeakReport, LeakService, LeakStream, Resolver};
pub use storage::{LeakStore, SqliteStore};

/// Result type alias for Leakwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Leakwatch operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("Empty input: {0} is required")]
    EmptyInput(&'static str),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Integrity error: {0}")]
    Integrity(String),
}

/// Coarse classification of an [`Error`], the only thing transports branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller supplied a malformed or empty key; nothing was looked up
    Validation,
    /// A required single-entity lookup found no match
    NotFound,
    /// The store failed, returned malformed data, or broke an invariant
    Storage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidId(_) | Error::EmptyInput(_) | Error::InvalidInput(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Storage(_) | Error::Integrity(_) => ErrorKind::Storage,
        }
    }

    /// True when the caller is at fault (bad key or unknown entity)
    pub fn is_client_fault(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Storage)
    }
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Storage => "storage",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
