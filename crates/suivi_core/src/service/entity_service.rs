//! Generic entity use-case service.
//!
//! # Responsibility
//! - Provide create/update/patch/get/list/count/delete/search for one entity.
//! - Run every write in one primary-store transaction, then mirror the
//!   committed state into the search index.
//!
//! # Invariants
//! - Any request rejected by id or field validation performs zero writes to
//!   either store.
//! - Each successful write makes exactly one index call, after commit.
//! - Index failures on the write path are logged and never fail the request.

use crate::criteria::{Criteria, CriteriaError};
use crate::db::{Database, DbError};
use crate::model::{Entity, EntityId, ValidationError};
use crate::page::{Page, PageError, Pageable};
use crate::repo::entity_repo::{
    ConstraintKind, EntityRepository, RepoError, SqliteEntityRepository,
};
use crate::search::{SearchError, SearchIndex, SearchQuery};
use crate::service::merge_patch::apply_merge_patch;
use log::{debug, error, info};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for entity use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// A new entity must not carry an id.
    IdExists,
    /// Update payload has no id.
    IdNull,
    /// Path id and payload id differ.
    IdMismatch { path: EntityId, body: EntityId },
    /// Update target does not exist.
    IdNotFound(EntityId),
    Validation(ValidationError),
    /// Merge-patch document is not applicable.
    InvalidPatch(String),
    Criteria(CriteriaError),
    Page(PageError),
    /// A write referenced a missing row or broke a uniqueness rule.
    InvalidReference(String),
    /// Delete target is still referenced by other rows.
    StillReferenced(EntityId),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
    Repo(RepoError),
    Search(SearchError),
}

impl ServiceError {
    /// Stable machine-readable key, rendered as `error.{key}` to clients.
    pub fn error_key(&self) -> &'static str {
        match self {
            Self::IdExists => "idexists",
            Self::IdNull => "idnull",
            Self::IdMismatch { .. } => "idinvalid",
            Self::IdNotFound(_) => "idnotfound",
            Self::Validation(_) => "validation",
            Self::InvalidPatch(_) => "patchinvalid",
            Self::Criteria(_) => "criteriainvalid",
            Self::Page(_) => "sortinvalid",
            Self::InvalidReference(_) => "referenceinvalid",
            Self::StillReferenced(_) => "referenced",
            Self::Search(SearchError::InvalidQuery { .. }) => "queryinvalid",
            Self::InconsistentState(_) | Self::Repo(_) | Self::Search(_) => "internal",
        }
    }

    /// Whether the caller sent a request that can never succeed as-is.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::InconsistentState(_)
                | Self::Repo(_)
                | Self::Search(SearchError::Db(_) | SearchError::InvalidDocument(_))
        )
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdExists => write!(f, "a new entity cannot already have an id"),
            Self::IdNull => write!(f, "invalid id: payload id is missing"),
            Self::IdMismatch { path, body } => {
                write!(f, "invalid id: path id {path} does not match payload id {body}")
            }
            Self::IdNotFound(id) => write!(f, "entity not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidPatch(message) => write!(f, "invalid merge patch: {message}"),
            Self::Criteria(err) => write!(f, "{err}"),
            Self::Page(err) => write!(f, "{err}"),
            Self::InvalidReference(message) => write!(f, "invalid reference: {message}"),
            Self::StillReferenced(id) => {
                write!(f, "entity {id} is still referenced by other records")
            }
            Self::InconsistentState(details) => write!(f, "inconsistent entity state: {details}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Search(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Criteria(err) => Some(err),
            Self::Page(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Search(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::Page(err) => Self::Page(err),
            RepoError::NotFound(id) => Self::IdNotFound(id),
            RepoError::Constraint { message, .. } => Self::InvalidReference(message),
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        RepoError::from(value).into()
    }
}

impl From<DbError> for ServiceError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<CriteriaError> for ServiceError {
    fn from(value: CriteriaError) -> Self {
        Self::Criteria(value)
    }
}

impl From<PageError> for ServiceError {
    fn from(value: PageError) -> Self {
        Self::Page(value)
    }
}

impl From<SearchError> for ServiceError {
    fn from(value: SearchError) -> Self {
        Self::Search(value)
    }
}

/// Entity service facade over the primary store and its search index.
pub struct EntityService<E: Entity> {
    db: Arc<Database>,
    index: Arc<dyn SearchIndex<E>>,
}

impl<E: Entity> EntityService<E> {
    pub fn new(db: Arc<Database>, index: Arc<dyn SearchIndex<E>>) -> Self {
        Self { db, index }
    }

    /// Persists a new entity and returns it with its assigned id.
    pub fn create(&self, entity: E) -> ServiceResult<E> {
        let started_at = Instant::now();
        if entity.id().is_some() {
            return Err(ServiceError::IdExists);
        }
        entity.validate()?;

        let saved = self.db.with_conn(|conn| -> ServiceResult<E> {
            let tx = conn.transaction()?;
            let saved = {
                let repo = SqliteEntityRepository::<E>::new(&tx);
                let id = repo.insert(&entity)?;
                repo.find_by_id(id)?
                    .ok_or(ServiceError::InconsistentState(
                        "created entity not found in read-back",
                    ))?
            };
            tx.commit()?;
            Ok(saved)
        })?;

        self.mirror_save(&saved);
        info!(
            "event=entity_create module=service status=ok entity={} id={} duration_ms={}",
            E::ENTITY_NAME,
            saved.id().unwrap_or_default(),
            started_at.elapsed().as_millis()
        );
        Ok(saved)
    }

    /// Replaces every field of the entity identified by `id`.
    pub fn update(&self, id: EntityId, entity: E) -> ServiceResult<E> {
        let started_at = Instant::now();
        check_body_id(id, entity.id())?;
        entity.validate()?;

        let saved = self.db.with_conn(|conn| -> ServiceResult<E> {
            let tx = conn.transaction()?;
            let saved = {
                let repo = SqliteEntityRepository::<E>::new(&tx);
                if !repo.exists_by_id(id)? {
                    return Err(ServiceError::IdNotFound(id));
                }
                repo.update(id, &entity)?;
                repo.find_by_id(id)?
                    .ok_or(ServiceError::InconsistentState(
                        "updated entity not found in read-back",
                    ))?
            };
            tx.commit()?;
            Ok(saved)
        })?;

        self.mirror_save(&saved);
        info!(
            "event=entity_update module=service status=ok entity={} id={} duration_ms={}",
            E::ENTITY_NAME,
            id,
            started_at.elapsed().as_millis()
        );
        Ok(saved)
    }

    /// Applies a JSON merge patch to the entity identified by `id`.
    ///
    /// The patch must carry the matching `id`; members it omits keep their
    /// stored values and `null` clears optional members.
    pub fn partial_update(&self, id: EntityId, patch: &Value) -> ServiceResult<E> {
        let started_at = Instant::now();
        let Value::Object(members) = patch else {
            return Err(ServiceError::InvalidPatch(
                "merge patch must be a JSON object".to_string(),
            ));
        };
        let body_id = match members.get("id") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.as_i64().ok_or_else(|| {
                ServiceError::InvalidPatch(format!("`id` must be an integer, got {value}"))
            })?),
        };
        check_body_id(id, body_id)?;

        let saved = self.db.with_conn(|conn| -> ServiceResult<E> {
            let tx = conn.transaction()?;
            let saved = {
                let repo = SqliteEntityRepository::<E>::new(&tx);
                let existing = repo.find_by_id(id)?.ok_or(ServiceError::IdNotFound(id))?;

                let mut document = serde_json::to_value(&existing)
                    .map_err(|err| ServiceError::InvalidPatch(err.to_string()))?;
                apply_merge_patch(&mut document, patch);
                let mut patched: E = serde_json::from_value(document)
                    .map_err(|err| ValidationError::Malformed(err.to_string()))?;
                patched.set_id(Some(id));

                if patched == existing {
                    debug!(
                        "event=entity_patch module=service status=noop entity={} id={}",
                        E::ENTITY_NAME,
                        id
                    );
                } else {
                    repo.update(id, &patched)?;
                }
                repo.find_by_id(id)?
                    .ok_or(ServiceError::InconsistentState(
                        "patched entity not found in read-back",
                    ))?
            };
            tx.commit()?;
            Ok(saved)
        })?;

        self.mirror_save(&saved);
        info!(
            "event=entity_patch module=service status=ok entity={} id={} duration_ms={}",
            E::ENTITY_NAME,
            id,
            started_at.elapsed().as_millis()
        );
        Ok(saved)
    }

    /// Gets one entity by id.
    pub fn find_one(&self, id: EntityId) -> ServiceResult<Option<E>> {
        self.db.with_conn(|conn| {
            let repo = SqliteEntityRepository::<E>::new(conn);
            Ok(repo.find_by_id(id)?)
        })
    }

    /// Lists one page of entities matching `criteria`, with the unpaged total.
    pub fn find_by_criteria(
        &self,
        criteria: &Criteria,
        pageable: &Pageable,
    ) -> ServiceResult<Page<E>> {
        self.db.with_conn(|conn| {
            let repo = SqliteEntityRepository::<E>::new(conn);
            let items = repo.find_by_criteria(criteria, pageable)?;
            let total = repo.count_by_criteria(criteria)?;
            Ok(Page {
                items,
                total,
                pageable: pageable.clone(),
            })
        })
    }

    pub fn count_by_criteria(&self, criteria: &Criteria) -> ServiceResult<u64> {
        self.db.with_conn(|conn| {
            let repo = SqliteEntityRepository::<E>::new(conn);
            Ok(repo.count_by_criteria(criteria)?)
        })
    }

    /// Deletes the entity identified by `id`.
    ///
    /// Deleting an unknown id is not an error; the index is told to drop the
    /// document either way. Returns whether a row existed.
    pub fn delete(&self, id: EntityId) -> ServiceResult<bool> {
        let started_at = Instant::now();
        let existed = self.db.with_conn(|conn| -> ServiceResult<bool> {
            let tx = conn.transaction()?;
            let existed = SqliteEntityRepository::<E>::new(&tx)
                .delete_by_id(id)
                .map_err(|err| match err {
                    RepoError::Constraint {
                        kind: ConstraintKind::ForeignKey,
                        ..
                    } => ServiceError::StillReferenced(id),
                    other => other.into(),
                })?;
            tx.commit()?;
            Ok(existed)
        })?;

        self.mirror_delete(id);
        info!(
            "event=entity_delete module=service status=ok entity={} id={} existed={} duration_ms={}",
            E::ENTITY_NAME,
            id,
            existed,
            started_at.elapsed().as_millis()
        );
        Ok(existed)
    }

    /// Runs a full-text query against the search index.
    pub fn search(&self, text: &str, pageable: &Pageable) -> ServiceResult<Page<E>> {
        let query = SearchQuery {
            text: text.to_string(),
            limit: pageable.size,
            offset: pageable.offset(),
            raw_fts_syntax: false,
        };
        let hits = self.index.search(&query)?;
        Ok(Page {
            items: hits.items,
            total: hits.total,
            pageable: pageable.clone(),
        })
    }

    /// Rebuilds this entity's search documents from the primary store.
    ///
    /// Unlike the write path, index failures here are returned to the caller.
    pub fn reindex(&self) -> ServiceResult<usize> {
        let started_at = Instant::now();
        let entities = self.db.with_conn(|conn| -> ServiceResult<Vec<E>> {
            Ok(SqliteEntityRepository::<E>::new(conn).find_all()?)
        })?;

        self.index.clear()?;
        for entity in &entities {
            self.index.save(entity)?;
        }

        info!(
            "event=search_reindex module=service status=ok entity={} documents={} duration_ms={}",
            E::ENTITY_NAME,
            entities.len(),
            started_at.elapsed().as_millis()
        );
        Ok(entities.len())
    }

    fn mirror_save(&self, entity: &E) {
        if let Err(err) = self.index.save(entity) {
            error!(
                "event=search_sync module=service status=error op=save entity={} id={} error={}",
                E::ENTITY_NAME,
                entity.id().unwrap_or_default(),
                err
            );
        }
    }

    fn mirror_delete(&self, id: EntityId) {
        if let Err(err) = self.index.delete(id) {
            error!(
                "event=search_sync module=service status=error op=delete entity={} id={} error={}",
                E::ENTITY_NAME,
                id,
                err
            );
        }
    }
}

fn check_body_id(path_id: EntityId, body_id: Option<EntityId>) -> ServiceResult<()> {
    match body_id {
        None => Err(ServiceError::IdNull),
        Some(body) if body != path_id => Err(ServiceError::IdMismatch {
            path: path_id,
            body,
        }),
        Some(_) => Ok(()),
    }
}
