//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections for both stores.
//! - Configure connection pragmas required by core behavior.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections have migrations fully applied.
//! - Returned connections expose `fold(text)`, the Unicode upper-casing used
//!   by case-insensitive filters.

use super::migrations::{apply_migrations, MigrationSet, INDEX_MIGRATIONS, PRIMARY_MIGRATIONS};
use super::DbResult;
use log::{error, info};
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens the primary SQLite database file and applies all pending migrations.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_with(Connection::open(path), "file", &PRIMARY_MIGRATIONS)
}

/// Opens an in-memory primary database and applies all pending migrations.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with(Connection::open_in_memory(), "memory", &PRIMARY_MIGRATIONS)
}

/// Opens the search index database file and applies its migrations.
pub fn open_index_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_with(Connection::open(path), "file", &INDEX_MIGRATIONS)
}

/// Opens an in-memory search index database.
pub fn open_index_db_in_memory() -> DbResult<Connection> {
    open_with(Connection::open_in_memory(), "memory", &INDEX_MIGRATIONS)
}

fn open_with(
    opened: rusqlite::Result<Connection>,
    mode: &'static str,
    migrations: &MigrationSet,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    let store = migrations.name;
    info!("event=db_open module=db status=start store={store} mode={mode}");

    let mut conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error store={store} mode={mode} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, migrations) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok store={store} mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error store={store} mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, migrations: &MigrationSet) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.create_scalar_function(
        FOLD_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        fold_text,
    )?;
    apply_migrations(conn, migrations)?;
    Ok(())
}

/// SQL name of the case-folding function registered on every connection.
pub const FOLD_FUNCTION: &str = "fold";

/// Folds `text` for case-insensitive matching. Criteria patterns go through
/// the same function so both sides of a `LIKE` agree.
pub fn fold_case(text: &str) -> String {
    text.to_uppercase()
}

fn fold_text(ctx: &Context<'_>) -> rusqlite::Result<Option<String>> {
    Ok(match ctx.get_raw(0) {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Text(bytes) => Some(fold_case(&String::from_utf8_lossy(bytes))),
        ValueRef::Integer(value) => Some(value.to_string()),
        ValueRef::Real(value) => Some(value.to_string()),
    })
}
