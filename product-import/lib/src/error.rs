//! Error types for the product import library.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while migrating products into the graph store.
///
/// `Connection` ends a run before it starts. Every other variant raised
/// inside a page is logged with the page's range and the run moves on.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A store could not be reached at startup.
    #[error("failed to connect to {store}: {message}")]
    Connection {
        /// Which store failed ("source store" or "graph store").
        store: &'static str,
        /// The driver's error message.
        message: String,
    },

    /// A count or fetch against the source collection failed.
    #[error("source store {operation} failed: {message}")]
    Store {
        /// The operation that failed (e.g. "count", "fetch").
        operation: &'static str,
        /// The driver's error message.
        message: String,
    },

    /// A page could not be serialized to CSV.
    #[error("failed to serialize page: {0}")]
    Format(#[from] csv::Error),

    /// Reading or writing the staging file failed.
    #[error("staging file {} failed: {source}", path.display())]
    Io {
        /// The file being written or removed.
        path: PathBuf,
        /// The underlying filesystem error.
        #[source]
        source: std::io::Error,
    },

    /// The graph store rejected the bulk statement.
    #[error("bulk load failed: {0}")]
    Load(String),
}

impl MigrationError {
    /// Builds a [`MigrationError::Connection`] from any displayable driver error.
    pub fn connection(store: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Connection {
            store,
            message: err.to_string(),
        }
    }

    /// Builds a [`MigrationError::Store`] from any displayable driver error.
    pub fn store(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Store {
            operation,
            message: err.to_string(),
        }
    }

    /// Builds a [`MigrationError::Io`] for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;
