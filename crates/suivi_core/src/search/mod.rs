//! Search index mirroring entity state for full-text queries.
//!
//! # Responsibility
//! - Define the [`SearchIndex`] contract the services write through to.
//! - Provide the SQLite FTS5 document index used in production.
//!
//! # Invariants
//! - Documents are the serialized entity, returned verbatim by searches.
//! - The index is a secondary store; the relational store stays authoritative.

pub mod fts;

use crate::db::DbError;
use crate::model::{Entity, EntityId};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use fts::SqliteSearchIndex;

/// Result type for search APIs.
pub type SearchResult<T> = Result<T, SearchError>;

/// Search-layer error for query parsing, DB interaction and document decoding.
#[derive(Debug)]
pub enum SearchError {
    /// User-provided query cannot be parsed by FTS5 syntax.
    InvalidQuery {
        query: String,
        message: String,
    },
    Db(DbError),
    InvalidDocument(String),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuery { query, message } => {
                write!(f, "invalid full-text query `{query}`: {message}")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidDocument(message) => write!(f, "invalid search document: {message}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidQuery { .. } | Self::InvalidDocument(_) => None,
        }
    }
}

impl From<DbError> for SearchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Search options for full-text query behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// User query text.
    pub text: String,
    /// Maximum number of hits to return.
    pub limit: u32,
    /// Number of hits to skip.
    pub offset: u64,
    /// Whether to pass text directly as raw FTS5 expression.
    ///
    /// Default is `false` so arbitrary user input never fails on syntax.
    pub raw_fts_syntax: bool,
}

impl SearchQuery {
    /// Creates a query returning the first 20 hits.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            limit: 20,
            offset: 0,
            raw_fts_syntax: false,
        }
    }
}

/// One window of search hits plus the total number of matches.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHits<E> {
    pub items: Vec<E>,
    pub total: u64,
}

impl<E> SearchHits<E> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

/// Secondary document store kept in sync with one entity table.
pub trait SearchIndex<E: Entity>: Send + Sync {
    /// Inserts or replaces the document for `entity` (which must carry an id).
    fn save(&self, entity: &E) -> SearchResult<()>;
    /// Removes the document for `id`; removing an absent document is not an error.
    fn delete(&self, id: EntityId) -> SearchResult<()>;
    fn search(&self, query: &SearchQuery) -> SearchResult<SearchHits<E>>;
    /// Drops every document of this entity, used before a full reindex.
    fn clear(&self) -> SearchResult<()>;
}
