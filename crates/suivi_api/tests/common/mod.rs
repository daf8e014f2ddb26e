#![allow(dead_code)]

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use suivi_api::{build_router, AppServices};
use suivi_core::db::open_db_in_memory;
use suivi_core::{
    Database, Entity, EntityId, EntityService, SearchHits, SearchIndex, SearchQuery, SearchResult,
};
use tower::ServiceExt;

#[derive(Debug, Clone, PartialEq)]
pub enum IndexCall<E> {
    Save(E),
    Delete(EntityId),
    Search(SearchQuery),
    Clear,
}

/// Index double recording calls and serving canned search hits.
pub struct RecordingIndex<E> {
    calls: Mutex<Vec<IndexCall<E>>>,
    hits: Mutex<SearchHits<E>>,
}

impl<E: Entity> RecordingIndex<E> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            hits: Mutex::new(SearchHits::empty()),
        }
    }

    pub fn set_hits(&self, hits: SearchHits<E>) {
        *self.hits.lock().unwrap() = hits;
    }

    pub fn calls(&self) -> Vec<IndexCall<E>> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: IndexCall<E>) {
        self.calls.lock().unwrap().push(call);
    }
}

impl<E: Entity> SearchIndex<E> for RecordingIndex<E> {
    fn save(&self, entity: &E) -> SearchResult<()> {
        self.push(IndexCall::Save(entity.clone()));
        Ok(())
    }

    fn delete(&self, id: EntityId) -> SearchResult<()> {
        self.push(IndexCall::Delete(id));
        Ok(())
    }

    fn search(&self, query: &SearchQuery) -> SearchResult<SearchHits<E>> {
        self.push(IndexCall::Search(query.clone()));
        Ok(self.hits.lock().unwrap().clone())
    }

    fn clear(&self) -> SearchResult<()> {
        self.push(IndexCall::Clear);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub annees: Arc<RecordingIndex<suivi_core::Annee>>,
    pub macons: Arc<RecordingIndex<suivi_core::Macon>>,
    pub prefabricants: Arc<RecordingIndex<suivi_core::Prefabricant>>,
    pub previsions: Arc<RecordingIndex<suivi_core::Prevision>>,
    pub fiches: Arc<RecordingIndex<suivi_core::FicheSuiviOuvrage>>,
}

fn wire<E: Entity>(db: &Arc<Database>) -> (Arc<EntityService<E>>, Arc<RecordingIndex<E>>) {
    let index = Arc::new(RecordingIndex::new());
    (Arc::new(EntityService::new(db.clone(), index.clone())), index)
}

pub fn test_app() -> TestApp {
    let db = Arc::new(Database::new(open_db_in_memory().unwrap()));
    let (annees, annee_index) = wire(&db);
    let (macons, macon_index) = wire(&db);
    let (prefabricants, prefabricant_index) = wire(&db);
    let (previsions, prevision_index) = wire(&db);
    let (fiche_suivi_ouvrages, fiche_index) = wire(&db);

    let router = build_router(AppServices {
        db,
        annees,
        macons,
        prefabricants,
        previsions,
        fiche_suivi_ouvrages,
    });

    TestApp {
        router,
        annees: annee_index,
        macons: macon_index,
        prefabricants: prefabricant_index,
        previsions: prevision_index,
        fiches: fiche_index,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .get(name)
            .map(|value| value.to_str().unwrap())
            .unwrap_or_default()
    }
}

impl TestApp {
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<(&str, Value)>,
    ) -> TestResponse {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some((content_type, json)) => builder
                .header("content-type", content_type)
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::POST, uri, Some(("application/json", body)))
            .await
    }

    pub async fn put_json(&self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::PUT, uri, Some(("application/json", body)))
            .await
    }

    pub async fn patch_json(&self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::PATCH, uri, Some(("application/merge-patch+json", body)))
            .await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.send(Method::DELETE, uri, None).await
    }

    /// Creates an entity through the API and returns its id.
    pub async fn create(&self, plural: &str, body: Value) -> i64 {
        let response = self.post_json(&format!("/api/{plural}"), body).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"].as_i64().unwrap()
    }
}
