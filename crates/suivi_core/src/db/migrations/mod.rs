//! SQLite migration registries and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order, one registry
//!   per store (primary tables, search index).
//! - Apply pending migrations atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic within a registry.
//! - Applied migration version is mirrored to `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

/// Ordered migrations for one SQLite store.
#[derive(Debug)]
pub struct MigrationSet {
    /// Store label used in log events.
    pub name: &'static str,
    migrations: &'static [Migration],
}

impl MigrationSet {
    /// Returns the latest migration version known by this binary.
    pub fn latest_version(&self) -> u32 {
        self.migrations.last().map_or(0, |migration| migration.version)
    }
}

/// Entity tables of the primary relational store.
pub static PRIMARY_MIGRATIONS: MigrationSet = MigrationSet {
    name: "primary",
    migrations: &[
        Migration {
            version: 1,
            sql: include_str!("0001_init.sql"),
        },
        Migration {
            version: 2,
            sql: include_str!("0002_fiche_suivi_ouvrage.sql"),
        },
    ],
};

/// Document table of the search index store.
pub static INDEX_MIGRATIONS: MigrationSet = MigrationSet {
    name: "index",
    migrations: &[Migration {
        version: 1,
        sql: include_str!("index_0001_documents.sql"),
    }],
};

/// Returns the latest primary-store migration version.
pub fn latest_version() -> u32 {
    PRIMARY_MIGRATIONS.latest_version()
}

/// Applies all pending migrations of `set` on the provided connection.
pub fn apply_migrations(conn: &mut Connection, set: &MigrationSet) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = set.latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in set.migrations {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
