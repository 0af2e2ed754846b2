//! rusqlite-backed storage.

use std::path::Path;

use base64::Engine as _;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::Value;
use tracing::debug;

use super::{Row, Storage, StorageError, StorageResult};
use crate::config::StorageSettings;
use crate::sql::{Dialect, Query};

/// A single SQLite connection.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Open (or create) a database file. `":memory:"` opens an in-memory
    /// database.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        if path.to_str() == Some(":memory:") {
            return Self::open_in_memory();
        }
        debug!(path = %path.display(), "opening SQLite database");
        let conn = Connection::open(path).map_err(|e| StorageError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Open the database configured in `[storage]`, in memory when unset.
    pub fn from_settings(settings: &StorageSettings) -> crate::Result<Self> {
        match settings.resolved_path()? {
            Some(path) => Ok(Self::open(path)?),
            None => Ok(Self::open_in_memory()?),
        }
    }

    /// Run a batch of statements (DDL, fixtures).
    pub fn execute_batch(&self, sql: &str) -> StorageResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Storage for SqliteStorage {
    fn fetch(&self, query: &Query) -> StorageResult<Vec<Row>> {
        let sql = query.to_sql(Dialect::Sqlite);
        debug!(sql = %sql, "executing query");

        let mut stmt = self.conn.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (i, name) in names.iter().enumerate() {
                if record.contains_key(name) {
                    return Err(StorageError::RowShape(format!(
                        "column '{}' appears twice in the result",
                        name
                    )));
                }
                record.insert(name.clone(), to_json(row.get_ref(i)?));
            }
            out.push(record);
        }

        debug!(rows = out.len(), "query complete");
        Ok(out)
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::from(n),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => {
            Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
    }
}
