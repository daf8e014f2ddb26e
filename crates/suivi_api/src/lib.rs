//! HTTP surface of the suivi backend.
//!
//! # Responsibility
//! - Expose every entity service as a REST resource under `/api`.
//! - Map service outcomes to status codes and headers; no business rules
//!   live here.

pub mod error;
pub mod extract;
pub mod headers;
pub mod health;
pub mod middleware;
pub mod resource;

use axum::Router;
use std::sync::Arc;
use suivi_core::{
    Annee, Database, Entity, EntityService, FicheSuiviOuvrage, Macon, Prefabricant, Prevision,
    ServiceResult, SqliteSearchIndex,
};

pub use error::ApiError;
pub use resource::resource_routes;

/// Entity services shared by all request handlers.
#[derive(Clone)]
pub struct AppServices {
    pub db: Arc<Database>,
    pub annees: Arc<EntityService<Annee>>,
    pub macons: Arc<EntityService<Macon>>,
    pub prefabricants: Arc<EntityService<Prefabricant>>,
    pub previsions: Arc<EntityService<Prevision>>,
    pub fiche_suivi_ouvrages: Arc<EntityService<FicheSuiviOuvrage>>,
}

impl AppServices {
    /// Wires every service to the FTS5 index stored in `index_db`.
    pub fn with_sqlite_index(db: Arc<Database>, index_db: Arc<Database>) -> Self {
        fn service<E: Entity>(
            db: &Arc<Database>,
            index_db: &Arc<Database>,
        ) -> Arc<EntityService<E>> {
            Arc::new(EntityService::new(
                db.clone(),
                Arc::new(SqliteSearchIndex::<E>::new(index_db.clone())),
            ))
        }

        Self {
            annees: service(&db, &index_db),
            macons: service(&db, &index_db),
            prefabricants: service(&db, &index_db),
            previsions: service(&db, &index_db),
            fiche_suivi_ouvrages: service(&db, &index_db),
            db,
        }
    }

    /// Rebuilds every entity's search documents; returns `(entity, documents)`.
    pub fn reindex_all(&self) -> ServiceResult<Vec<(&'static str, usize)>> {
        Ok(vec![
            (Annee::ENTITY_NAME, self.annees.reindex()?),
            (Macon::ENTITY_NAME, self.macons.reindex()?),
            (Prefabricant::ENTITY_NAME, self.prefabricants.reindex()?),
            (Prevision::ENTITY_NAME, self.previsions.reindex()?),
            (
                FicheSuiviOuvrage::ENTITY_NAME,
                self.fiche_suivi_ouvrages.reindex()?,
            ),
        ])
    }
}

/// Assembles the full application router with request logging.
pub fn build_router(services: AppServices) -> Router {
    Router::new()
        .merge(resource_routes(services.annees))
        .merge(resource_routes(services.macons))
        .merge(resource_routes(services.prefabricants))
        .merge(resource_routes(services.previsions))
        .merge(resource_routes(services.fiche_suivi_ouvrages))
        .merge(health::health_routes(services.db))
        .layer(axum::middleware::from_fn(middleware::log_request))
}
