//! Database layer for MDLAB.

mod appointments;
mod schema;
mod services;
mod users;

pub use appointments::*;
pub use schema::*;
#[allow(unused_imports)]
pub use services::*;
#[allow(unused_imports)]
pub use users::*;

use rusqlite::{Connection, ErrorCode};
use std::path::Path;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    /// True when the error is a UNIQUE violation on `table.column`.
    pub fn is_unique_violation(&self, table: &str, column: &str) -> bool {
        match self {
            DbError::Sqlite(e) => is_unique_violation(e, table, column),
            _ => false,
        }
    }
}

/// True when a SQLite error is a UNIQUE violation on `table.column`.
pub(crate) fn is_unique_violation(err: &rusqlite::Error, table: &str, column: &str) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg)) => {
            e.code == ErrorCode::ConstraintViolation
                && msg.contains("UNIQUE")
                && msg.contains(&format!("{}.{}", table, column))
        }
        _ => false,
    }
}

/// Database connection wrapper.
///
/// One handle is opened per process and passed to every operation.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_open_file_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mdlab.db");
        drop(Database::open(&path).unwrap());
        // Reopening re-applies the schema without error
        assert!(Database::open(&path).is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"services".to_string()));
        assert!(tables.contains(&"appointments".to_string()));
    }

    #[test]
    fn test_unique_violation_detection() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute(
                "INSERT INTO users (id, username, email, role, password_hash) VALUES ('1', 'a', 'a@x.io', 'patient', 'h')",
                [],
            )
            .unwrap();
        let err = db
            .conn()
            .execute(
                "INSERT INTO users (id, username, email, role, password_hash) VALUES ('2', 'a', 'b@x.io', 'patient', 'h')",
                [],
            )
            .unwrap_err();
        assert!(is_unique_violation(&err, "users", "username"));
        assert!(!is_unique_violation(&err, "users", "email"));
    }
}
