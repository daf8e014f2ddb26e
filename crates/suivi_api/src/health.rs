//! Management health probe.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use log::error;
use serde::Serialize;
use std::sync::Arc;
use suivi_core::Database;
use tokio::task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        let status = match self.status {
            HealthStatus::Up => StatusCode::OK,
            HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(self)).into_response()
    }
}

pub fn health_routes(db: Arc<Database>) -> Router {
    Router::new()
        .route("/management/health", get(health))
        .with_state(db)
}

async fn health(State(db): State<Arc<Database>>) -> HealthResponse {
    let status = match task::spawn_blocking(move || db.ping()).await {
        Ok(Ok(())) => HealthStatus::Up,
        Ok(Err(err)) => {
            error!("event=health_check module=api status=error error={err}");
            HealthStatus::Down
        }
        Err(err) => {
            error!(
                "event=health_check module=api status=error panicked={} error={err}",
                err.is_panic()
            );
            HealthStatus::Down
        }
    };
    HealthResponse {
        status,
        version: suivi_core::core_version(),
    }
}
