//! Shared connection handle.

use super::{DbError, DbResult};
use rusqlite::Connection;
use std::sync::Mutex;

/// One migrated SQLite connection shared between callers.
///
/// Each call to [`Database::with_conn`] holds the lock for its whole closure,
/// so a closure that opens a transaction owns the connection until commit.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Wraps an already bootstrapped connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with_conn<T, E>(&self, f: impl FnOnce(&mut Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let mut guard = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        f(&mut guard)
    }

    /// Cheap liveness probe used by health checks.
    pub fn ping(&self) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1;", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }
}
