//! HTTP error mapping.
//!
//! # Responsibility
//! - Translate service and extraction failures into status codes.
//! - Render a problem JSON body plus the `x-suiviapp-error` header pair.
//!
//! # Invariants
//! - 5xx responses never expose internal error text to clients.

use crate::headers::{ERROR_HEADER, PARAMS_HEADER};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::{error, warn};
use serde_json::json;
use std::error::Error;
use std::fmt::{Display, Formatter};
use suivi_core::{Entity, ServiceError};
use tokio::task::JoinError;

const PROBLEM_TYPE: &str = "https://www.jhipster.tech/problem/problem-with-message";
const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

/// Failure returned by resource handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    /// Machine-readable key, rendered as `error.{key}`.
    pub error_key: &'static str,
    pub detail: String,
    pub entity_name: Option<&'static str>,
}

impl ApiError {
    pub fn new(status: StatusCode, error_key: &'static str, detail: impl Into<String>) -> Self {
        Self {
            status,
            error_key,
            detail: detail.into(),
            entity_name: None,
        }
    }

    pub fn bad_request(error_key: &'static str, detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_key, detail)
    }

    pub fn unsupported_media_type(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "unsupportedmediatype",
            detail,
        )
    }

    pub fn not_found<E: Entity>() -> Self {
        Self::new(StatusCode::NOT_FOUND, "notfound", "entity not found").for_entity::<E>()
    }

    pub fn for_entity<E: Entity>(mut self) -> Self {
        self.entity_name = Some(E::ENTITY_NAME);
        self
    }

    /// Maps a service failure raised while handling `E`.
    pub fn from_service<E: Entity>(err: ServiceError) -> Self {
        let status = match &err {
            ServiceError::StillReferenced(_) => StatusCode::CONFLICT,
            err if err.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let detail = if status.is_server_error() {
            error!(
                "event=http_error module=api status=error entity={} error_key={} error={}",
                E::ENTITY_NAME,
                err.error_key(),
                err
            );
            "internal server error".to_string()
        } else {
            warn!(
                "event=http_error module=api status=rejected entity={} error_key={} error={}",
                E::ENTITY_NAME,
                err.error_key(),
                err
            );
            err.to_string()
        };

        Self::new(status, err.error_key(), detail).for_entity::<E>()
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "internal server error",
        )
    }

    fn message(&self) -> String {
        format!("error.{}", self.error_key)
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.status.as_u16(), self.error_key, self.detail)
    }
}

impl Error for ApiError {}

/// A blocking database task that panicked or was cancelled.
impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        error!(
            "event=blocking_task module=api status=error panicked={} error={}",
            err.is_panic(),
            err
        );
        Self::internal()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.message();
        let body = json!({
            "type": PROBLEM_TYPE,
            "title": self.status.canonical_reason().unwrap_or("Error"),
            "status": self.status.as_u16(),
            "detail": self.detail,
            "entityName": self.entity_name,
            "errorKey": self.error_key,
            "message": message,
            "params": self.entity_name,
        });

        let mut response = (self.status, Json(body)).into_response();
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(PROBLEM_CONTENT_TYPE));
        if let Ok(value) = HeaderValue::from_str(&message) {
            headers.insert(ERROR_HEADER, value);
        }
        if let Some(entity_name) = self.entity_name {
            headers.insert(PARAMS_HEADER, HeaderValue::from_static(entity_name));
        }
        response
    }
}
