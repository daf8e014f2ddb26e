//! Generic REST resource for one entity.
//!
//! # Responsibility
//! - Route `/api/{plural}`, `/api/{plural}/count`, `/api/{plural}/{id}` and
//!   `/api/_search/{plural}` to the entity's service.
//! - Shape responses: status codes, `Location`, alert and pagination headers.
//!
//! # Invariants
//! - Handlers hold no state of their own; every decision about ids, fields
//!   and index mirroring belongs to `EntityService`.
//! - Service calls run on the blocking pool, never on a runtime worker.

use crate::error::ApiError;
use crate::extract::{IdPath, JsonBody, QueryPairs};
use crate::headers::{alert_headers, pagination_headers, AlertAction};
use axum::extract::State;
use axum::http::header::LOCATION;
use axum::http::{HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use std::sync::Arc;
use suivi_core::{Criteria, Entity, EntityService, Pageable};
use tokio::task;

type ServiceState<E> = State<Arc<EntityService<E>>>;
type ApiResult<T> = Result<T, ApiError>;

/// Builds every route of `E`'s resource, bound to `service`.
pub fn resource_routes<E: Entity>(service: Arc<EntityService<E>>) -> Router {
    let collection = format!("/api/{}", E::RESOURCE_PATH);
    Router::new()
        .route(&collection, get(list::<E>).post(create::<E>))
        .route(&format!("{collection}/count"), get(count::<E>))
        .route(
            &format!("{collection}/{{id}}"),
            get(get_one::<E>)
                .put(update::<E>)
                .patch(partial_update::<E>)
                .delete(delete::<E>),
        )
        .route(
            &format!("/api/_search/{}", E::RESOURCE_PATH),
            get(search::<E>),
        )
        .with_state(service)
}

async fn create<E: Entity>(
    State(service): ServiceState<E>,
    JsonBody(entity): JsonBody<E>,
) -> ApiResult<Response> {
    let saved = task::spawn_blocking(move || service.create(entity))
        .await?
        .map_err(ApiError::from_service::<E>)?;
    let id = saved.id().unwrap_or_default().to_string();

    let mut headers = alert_headers(E::ENTITY_NAME, AlertAction::Created, &id);
    let location = format!("/api/{}/{id}", E::RESOURCE_PATH);
    if let Ok(value) = HeaderValue::from_str(&location) {
        headers.insert(LOCATION, value);
    }
    Ok((StatusCode::CREATED, headers, Json(saved)).into_response())
}

async fn update<E: Entity>(
    State(service): ServiceState<E>,
    IdPath(id): IdPath,
    JsonBody(entity): JsonBody<E>,
) -> ApiResult<Response> {
    let saved = task::spawn_blocking(move || service.update(id, entity))
        .await?
        .map_err(ApiError::from_service::<E>)?;
    let headers = alert_headers(E::ENTITY_NAME, AlertAction::Updated, &id.to_string());
    Ok((headers, Json(saved)).into_response())
}

async fn partial_update<E: Entity>(
    State(service): ServiceState<E>,
    IdPath(id): IdPath,
    JsonBody(patch): JsonBody<Value>,
) -> ApiResult<Response> {
    let saved = task::spawn_blocking(move || service.partial_update(id, &patch))
        .await?
        .map_err(ApiError::from_service::<E>)?;
    let headers = alert_headers(E::ENTITY_NAME, AlertAction::Updated, &id.to_string());
    Ok((headers, Json(saved)).into_response())
}

async fn list<E: Entity>(
    State(service): ServiceState<E>,
    uri: Uri,
    QueryPairs(params): QueryPairs,
) -> ApiResult<Response> {
    let criteria =
        Criteria::parse::<E>(&params).map_err(|err| ApiError::from_service::<E>(err.into()))?;
    let pageable =
        Pageable::from_params(&params).map_err(|err| ApiError::from_service::<E>(err.into()))?;
    let page = task::spawn_blocking(move || service.find_by_criteria(&criteria, &pageable))
        .await?
        .map_err(ApiError::from_service::<E>)?;

    let headers = pagination_headers(uri.path(), &params, &page);
    Ok((headers, Json(page.items)).into_response())
}

async fn count<E: Entity>(
    State(service): ServiceState<E>,
    QueryPairs(params): QueryPairs,
) -> ApiResult<Json<u64>> {
    let criteria =
        Criteria::parse::<E>(&params).map_err(|err| ApiError::from_service::<E>(err.into()))?;
    let total = task::spawn_blocking(move || service.count_by_criteria(&criteria))
        .await?
        .map_err(ApiError::from_service::<E>)?;
    Ok(Json(total))
}

async fn get_one<E: Entity>(
    State(service): ServiceState<E>,
    IdPath(id): IdPath,
) -> ApiResult<Json<E>> {
    task::spawn_blocking(move || service.find_one(id))
        .await?
        .map_err(ApiError::from_service::<E>)?
        .map(Json)
        .ok_or_else(ApiError::not_found::<E>)
}

async fn delete<E: Entity>(
    State(service): ServiceState<E>,
    IdPath(id): IdPath,
) -> ApiResult<Response> {
    task::spawn_blocking(move || service.delete(id))
        .await?
        .map_err(ApiError::from_service::<E>)?;
    let headers = alert_headers(E::ENTITY_NAME, AlertAction::Deleted, &id.to_string());
    Ok((StatusCode::NO_CONTENT, headers).into_response())
}

async fn search<E: Entity>(
    State(service): ServiceState<E>,
    uri: Uri,
    query: QueryPairs,
) -> ApiResult<Response> {
    let text = query
        .get("query")
        .ok_or_else(|| {
            ApiError::bad_request("queryrequired", "missing `query` parameter").for_entity::<E>()
        })?
        .to_string();
    let pageable =
        Pageable::from_params(&query.0).map_err(|err| ApiError::from_service::<E>(err.into()))?;
    let page = task::spawn_blocking(move || service.search(&text, &pageable))
        .await?
        .map_err(ApiError::from_service::<E>)?;

    let headers = pagination_headers(uri.path(), &query.0, &page);
    Ok((headers, Json(page.items)).into_response())
}
