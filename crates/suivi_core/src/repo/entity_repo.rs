//! Generic entity repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD, criteria listing and counting over any [`Entity`] table.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `Entity::validate()` before SQL mutations.
//! - Listing and counting share the same criteria rendering, so a count
//!   always agrees with the unpaged list.

use crate::criteria::Criteria;
use crate::db::DbError;
use crate::model::{Entity, EntityId, ValidationError};
use crate::page::{PageError, Pageable};
use rusqlite::types::Value;
use rusqlite::{ffi, params_from_iter, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;

pub type RepoResult<T> = Result<T, RepoError>;

/// Which storage constraint rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    ForeignKey,
    Unique,
    Check,
    NotNull,
}

/// Generic repository error for entity persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound(EntityId),
    Constraint {
        kind: ConstraintKind,
        message: String,
    },
    Page(PageError),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "entity not found: {id}"),
            Self::Constraint { kind, message } => {
                write!(f, "{kind:?} constraint violated: {message}")
            }
            Self::Page(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Page(err) => Some(err),
            Self::NotFound(_) | Self::Constraint { .. } => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<PageError> for RepoError {
    fn from(value: PageError) -> Self {
        Self::Page(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = &value {
            let kind = match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(ConstraintKind::ForeignKey),
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    Some(ConstraintKind::Unique)
                }
                ffi::SQLITE_CONSTRAINT_CHECK => Some(ConstraintKind::Check),
                ffi::SQLITE_CONSTRAINT_NOTNULL => Some(ConstraintKind::NotNull),
                _ => None,
            };
            if let Some(kind) = kind {
                return Self::Constraint {
                    kind,
                    message: message.clone().unwrap_or_else(|| failure.to_string()),
                };
            }
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for entity CRUD and criteria queries.
pub trait EntityRepository<E: Entity> {
    /// Inserts a new row and returns the assigned id. Any id on `entity` is ignored.
    fn insert(&self, entity: &E) -> RepoResult<EntityId>;
    /// Replaces every column of an existing row.
    fn update(&self, id: EntityId, entity: &E) -> RepoResult<()>;
    fn find_by_id(&self, id: EntityId) -> RepoResult<Option<E>>;
    fn exists_by_id(&self, id: EntityId) -> RepoResult<bool>;
    fn find_by_criteria(&self, criteria: &Criteria, pageable: &Pageable) -> RepoResult<Vec<E>>;
    fn count_by_criteria(&self, criteria: &Criteria) -> RepoResult<u64>;
    /// Returns every row in id order.
    fn find_all(&self) -> RepoResult<Vec<E>>;
    fn count_all(&self) -> RepoResult<u64>;
    /// Deletes one row; returns whether a row existed.
    fn delete_by_id(&self, id: EntityId) -> RepoResult<bool>;
}

/// SQLite-backed repository for one entity table.
pub struct SqliteEntityRepository<'conn, E> {
    conn: &'conn Connection,
    _entity: PhantomData<fn() -> E>,
}

impl<'conn, E: Entity> SqliteEntityRepository<'conn, E> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            _entity: PhantomData,
        }
    }

    fn select_sql() -> String {
        let columns = E::COLUMNS
            .iter()
            .map(|column| format!("{}.{}", E::TABLE, column.name))
            .collect::<Vec<_>>()
            .join(", ");
        format!("SELECT {table}.id, {columns} FROM {table}", table = E::TABLE)
    }

    fn query_entities(&self, sql: &str, binds: Vec<Value>) -> RepoResult<Vec<E>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(E::from_row(row)?);
        }
        Ok(entities)
    }
}

impl<E: Entity> EntityRepository<E> for SqliteEntityRepository<'_, E> {
    fn insert(&self, entity: &E) -> RepoResult<EntityId> {
        entity.validate()?;

        let names = E::COLUMNS
            .iter()
            .map(|column| column.name)
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; E::COLUMNS.len()].join(", ");
        self.conn.execute(
            &format!(
                "INSERT INTO {} ({names}) VALUES ({placeholders});",
                E::TABLE
            ),
            params_from_iter(entity.column_values()),
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn update(&self, id: EntityId, entity: &E) -> RepoResult<()> {
        entity.validate()?;

        let assignments = E::COLUMNS
            .iter()
            .map(|column| format!("{} = ?", column.name))
            .collect::<Vec<_>>()
            .join(", ");
        let mut binds = entity.column_values();
        binds.push(Value::Integer(id));

        let changed = self.conn.execute(
            &format!("UPDATE {} SET {assignments} WHERE id = ?;", E::TABLE),
            params_from_iter(binds),
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn find_by_id(&self, id: EntityId) -> RepoResult<Option<E>> {
        let sql = format!("{} WHERE {}.id = ?1;", Self::select_sql(), E::TABLE);
        let entity = self
            .conn
            .query_row(&sql, [id], |row| E::from_row(row))
            .optional()?;
        Ok(entity)
    }

    fn exists_by_id(&self, id: EntityId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1);", E::TABLE),
            [id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn find_by_criteria(&self, criteria: &Criteria, pageable: &Pageable) -> RepoResult<Vec<E>> {
        let (where_sql, mut binds) = criteria.where_sql(E::TABLE);
        let order_sql = pageable.order_by_sql::<E>()?;
        let sql = format!(
            "{}{where_sql}{order_sql} LIMIT ? OFFSET ?;",
            Self::select_sql()
        );
        binds.push(Value::Integer(i64::from(pageable.size)));
        binds.push(Value::Integer(
            i64::try_from(pageable.offset()).unwrap_or(i64::MAX),
        ));
        self.query_entities(&sql, binds)
    }

    fn count_by_criteria(&self, criteria: &Criteria) -> RepoResult<u64> {
        let (where_sql, binds) = criteria.where_sql(E::TABLE);
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}{where_sql};", E::TABLE),
            params_from_iter(binds),
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn find_all(&self) -> RepoResult<Vec<E>> {
        let sql = format!("{} ORDER BY {}.id ASC;", Self::select_sql(), E::TABLE);
        self.query_entities(&sql, Vec::new())
    }

    fn count_all(&self) -> RepoResult<u64> {
        self.count_by_criteria(&Criteria::default())
    }

    fn delete_by_id(&self, id: EntityId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute(&format!("DELETE FROM {} WHERE id = ?1;", E::TABLE), [id])?;
        Ok(changed > 0)
    }
}
