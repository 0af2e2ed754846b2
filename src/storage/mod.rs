//! Storage seam: executes compiled queries and returns JSON rows.

mod sqlite;

pub use sqlite::SqliteStorage;

use crate::sql::{Dialect, Query};

/// One result row, keyed by output column name in select order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Errors raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to open database at {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Unexpected row shape: {0}")]
    RowShape(String),

    #[error("Engine renders {engine} SQL but the storage expects {storage}")]
    DialectMismatch { engine: Dialect, storage: Dialect },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Something that can run a [`Query`].
pub trait Storage {
    /// Execute `query` and return every row.
    fn fetch(&self, query: &Query) -> StorageResult<Vec<Row>>;

    /// Dialect the backend expects SQL in.
    fn dialect(&self) -> Dialect;
}

impl<S: Storage + ?Sized> Storage for &S {
    fn fetch(&self, query: &Query) -> StorageResult<Vec<Row>> {
        (**self).fetch(query)
    }

    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }
}
