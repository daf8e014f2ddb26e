//! Core domain logic for the suivi construction-tracking backend.
//! This crate is the single source of truth for entity invariants, storage
//! and search mirroring; HTTP concerns live in `suivi_api`.

pub mod criteria;
pub mod db;
pub mod logging;
pub mod model;
pub mod page;
pub mod repo;
pub mod search;
pub mod service;

pub use criteria::{Criteria, CriteriaError, Operator};
pub use db::{Database, DbError};
pub use logging::{active_logging, default_log_level, init_logging, LoggingConfig, LoggingError};
pub use model::{
    Annee, Entity, EntityId, EntityRef, FicheSuiviOuvrage, Macon, Prefabricant, Prevision,
    ValidationError,
};
pub use page::{Direction, Page, PageError, Pageable, SortOrder};
pub use repo::entity_repo::{
    ConstraintKind, EntityRepository, RepoError, RepoResult, SqliteEntityRepository,
};
pub use search::{
    SearchError, SearchHits, SearchIndex, SearchQuery, SearchResult, SqliteSearchIndex,
};
pub use service::entity_service::{EntityService, ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
