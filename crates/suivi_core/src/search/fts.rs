//! SQLite FTS5-based search index.
//!
//! # Responsibility
//! - Store one JSON document and one text body per entity row.
//! - Answer keyword queries over the text body with ranked, paged hits.
//!
//! # Invariants
//! - At most one document exists per `(entity, entity_id)`.
//! - Result ordering is deterministic by rank, then id.

use super::{SearchError, SearchHits, SearchIndex, SearchQuery, SearchResult};
use crate::db::{Database, DbError};
use crate::model::{Entity, EntityId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};
use std::marker::PhantomData;
use std::sync::Arc;

/// FTS5 index for one entity type, sharing the index database.
pub struct SqliteSearchIndex<E> {
    db: Arc<Database>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> SqliteSearchIndex<E> {
    /// `db` must have been opened with `open_index_db*`.
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> SearchIndex<E> for SqliteSearchIndex<E> {
    fn save(&self, entity: &E) -> SearchResult<()> {
        let id = entity.id().ok_or_else(|| {
            SearchError::InvalidDocument(format!("{} without id", E::ENTITY_NAME))
        })?;
        let document = serde_json::to_string(entity)
            .map_err(|err| SearchError::InvalidDocument(err.to_string()))?;
        let body = entity.search_text();

        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM search_documents WHERE entity = ?1 AND entity_id = ?2;",
                params![E::ENTITY_NAME, id],
            )?;
            tx.execute(
                "INSERT INTO search_documents (entity, entity_id, document, body)
                 VALUES (?1, ?2, ?3, ?4);",
                params![E::ENTITY_NAME, id, document, body],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    fn delete(&self, id: EntityId) -> SearchResult<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM search_documents WHERE entity = ?1 AND entity_id = ?2;",
                params![E::ENTITY_NAME, id],
            )?;
            Ok(())
        })
    }

    fn search(&self, query: &SearchQuery) -> SearchResult<SearchHits<E>> {
        let Some(match_expr) = build_match_expression(query) else {
            return Ok(SearchHits::empty());
        };

        self.db.with_conn(|conn| {
            let total: i64 = conn
                .query_row(
                    "SELECT COUNT(*)
                     FROM search_documents
                     WHERE search_documents MATCH ?1
                       AND entity = ?2;",
                    params![match_expr, E::ENTITY_NAME],
                    |row| row.get(0),
                )
                .map_err(|err| map_query_error(err, &match_expr))?;

            if query.limit == 0 || total == 0 {
                return Ok(SearchHits {
                    items: Vec::new(),
                    total: u64::try_from(total).unwrap_or_default(),
                });
            }

            let bind_values = vec![
                Value::Text(match_expr.clone()),
                Value::Text(E::ENTITY_NAME.to_string()),
                Value::Integer(i64::from(query.limit)),
                Value::Integer(i64::try_from(query.offset).unwrap_or(i64::MAX)),
            ];
            let mut stmt = conn.prepare(
                "SELECT document
                 FROM search_documents
                 WHERE search_documents MATCH ?
                   AND entity = ?
                 ORDER BY bm25(search_documents), entity_id ASC
                 LIMIT ? OFFSET ?;",
            )?;
            let mut rows = stmt
                .query(params_from_iter(bind_values))
                .map_err(|err| map_query_error(err, &match_expr))?;
            let mut items = Vec::new();

            while let Some(row) = rows
                .next()
                .map_err(|err| map_query_error(err, &match_expr))?
            {
                items.push(parse_document::<E>(row)?);
            }

            Ok(SearchHits {
                items,
                total: u64::try_from(total).unwrap_or_default(),
            })
        })
    }

    fn clear(&self) -> SearchResult<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM search_documents WHERE entity = ?1;",
                [E::ENTITY_NAME],
            )?;
            Ok(())
        })
    }
}

fn parse_document<E: Entity>(row: &Row<'_>) -> SearchResult<E> {
    let document: String = row.get("document")?;
    serde_json::from_str(&document).map_err(|err| {
        SearchError::InvalidDocument(format!("{} document: {err}", E::ENTITY_NAME))
    })
}

/// Builds the FTS5 MATCH expression; `None` for blank input.
///
/// Terms are quoted and AND-ed; a trailing `*` on a term keeps prefix matching.
fn build_match_expression(query: &SearchQuery) -> Option<String> {
    let text = query.text.trim();
    if text.is_empty() {
        return None;
    }

    if query.raw_fts_syntax {
        return Some(text.to_string());
    }

    let terms = text
        .split_whitespace()
        .filter_map(escape_fts_term)
        .collect::<Vec<_>>();

    if terms.is_empty() {
        return None;
    }

    Some(terms.join(" AND "))
}

fn escape_fts_term(raw: &str) -> Option<String> {
    let (stem, prefix) = match raw.strip_suffix('*') {
        Some(stem) => (stem, true),
        None => (raw, false),
    };
    if stem.is_empty() {
        return None;
    }
    let escaped = stem.replace('"', "\"\"");
    Some(if prefix {
        format!("\"{escaped}\"*")
    } else {
        format!("\"{escaped}\"")
    })
}

fn map_query_error(err: rusqlite::Error, query: &str) -> SearchError {
    if is_match_syntax_error(&err) {
        return SearchError::InvalidQuery {
            query: query.to_string(),
            message: err.to_string(),
        };
    }

    SearchError::Db(DbError::Sqlite(err))
}

fn is_match_syntax_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            let msg = message.to_lowercase();
            (msg.contains("fts5") && msg.contains("syntax"))
                || msg.contains("malformed match expression")
                || msg.contains("unterminated")
        }
        _ => false,
    }
}
