//! HTTP surface of the gateway.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::error::CascadeError;
use crate::exposure::{self, ExposureOptions, ItemsMcpServer};
use crate::gateway::Gateway;
use crate::items::ItemStore;
use crate::worker::CallOutcome;

/// Name of the gateway's own MCP surface.
pub const MAIN_MCP_NAME: &str = "main-mcp";

#[derive(Debug, Deserialize)]
struct CallParams {
    server: Option<String>,
}

/// `POST /call_mcp/:worker_name`, `GET /health`, and the gateway's own MCP
/// endpoint at `/mcp`.
pub fn router(gateway: Arc<Gateway>, cancel: CancellationToken) -> crate::Result<Router> {
    let main_mcp = ItemsMcpServer::new(MAIN_MCP_NAME, ItemStore::seeded(), &ExposureOptions::default())?
        .with_description("Cascade dynamic MCP gateway");
    let app = Router::new()
        .route("/call_mcp/:worker_name", post(call_mcp))
        .route("/health", get(health))
        .with_state(gateway);
    Ok(exposure::mount(app, "/mcp", main_mcp, None, cancel))
}

async fn call_mcp(
    State(gateway): State<Arc<Gateway>>,
    Path(worker_name): Path<String>,
    Query(params): Query<CallParams>,
    Json(payload): Json<Value>,
) -> Result<Json<CallOutcome>, AppError> {
    let outcome = gateway
        .call(&worker_name, payload, params.server.as_deref())
        .await?;
    Ok(Json(outcome))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// `{"detail": ...}` error body: 429 at capacity, 500 otherwise.
struct AppError(CascadeError);

impl From<CascadeError> for AppError {
    fn from(err: CascadeError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            CascadeError::CapacityExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => {
                tracing::error!(error = %self.0, "call_mcp failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({"detail": self.0.to_string()}))).into_response()
    }
}
