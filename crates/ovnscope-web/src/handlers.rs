//! HTTP request handlers and error mapping.

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::SecondsFormat;
use serde::Serialize;
use tracing::{error, warn};

use ovnscope_core::api::Snapshot;
use ovnscope_core::collector::CollectError;
use ovnscope_core::exec::{CancelToken, ExecError};
use ovnscope_core::storage::StoreError;

use crate::state::{AppState, SharedState, Source};

pub(crate) const SOURCE_HEALTH_HEADER: &str = "x-source-health";
const GENERATED_AT_HEADER: &str = "x-generated-at";

// ============================================================
// Errors
// ============================================================

/// JSON error payload.
#[derive(Serialize, utoipa::ToSchema)]
pub(crate) struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<CollectError> for ApiError {
    fn from(err: CollectError) -> Self {
        let status = match &err {
            CollectError::Config(_) => StatusCode::BAD_REQUEST,
            CollectError::Exec(ExecError::Config(_)) => StatusCode::SERVICE_UNAVAILABLE,
            CollectError::Exec(ExecError::Cancelled | ExecError::DeadlineExceeded) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            CollectError::Exec(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::InvalidNode(_) => StatusCode::BAD_REQUEST,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Io { .. } | StoreError::Json { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = self.status.as_u16(), error = %self.message, "request failed");
        }
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

// ============================================================
// Health
// ============================================================

#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service is healthy", body = String)
    )
)]
pub(crate) async fn handle_health() -> &'static str {
    "ok"
}

// ============================================================
// Snapshot
// ============================================================

/// Cancels the collection when the request future is dropped.
struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/nodes/{node}/snapshot",
    params(
        ("node" = String, Path, description = "Kubernetes node name")
    ),
    responses(
        (status = 200, description = "Topology snapshot for the node", body = Snapshot),
        (status = 400, description = "Blank or invalid node name", body = ErrorBody),
        (status = 404, description = "No snapshot for the node (fixture mode)", body = ErrorBody),
        (status = 502, description = "Target resolution or execution failed", body = ErrorBody),
        (status = 503, description = "Execution client not configured", body = ErrorBody),
        (status = 504, description = "Collection deadline exceeded", body = ErrorBody)
    )
)]
pub(crate) async fn handle_node_snapshot(
    State(state): AppState,
    Path(node): Path<String>,
) -> Result<Response, ApiError> {
    let node = node.trim().to_string();
    if node.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "node name must not be blank",
        ));
    }

    let snapshot = load_snapshot(state, node).await?;
    snapshot_response(&snapshot)
}

/// Runs the blocking collection (or fixture read) off the async runtime.
async fn load_snapshot(state: SharedState, node: String) -> Result<Snapshot, ApiError> {
    let cancel = CancelToken::with_timeout(state.request_timeout);
    let _guard = CancelOnDrop(cancel.clone());

    tokio::task::spawn_blocking(move || match &state.source {
        Source::Live(collector) => collector
            .collect(&node, &cancel, &state.options)
            .map_err(ApiError::from),
        Source::Fixtures(store) => store.load(&node).map_err(ApiError::from),
    })
    .await
    .map_err(|e| {
        error!(error = %e, "snapshot task failed");
        ApiError::internal(format!("snapshot task failed: {}", e))
    })?
}

fn snapshot_response(snapshot: &Snapshot) -> Result<Response, ApiError> {
    let json = serde_json::to_string(snapshot)
        .map_err(|e| ApiError::internal(format!("failed to encode snapshot: {}", e)))?;

    Response::builder()
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CACHE_CONTROL, "no-store")
        .header(SOURCE_HEALTH_HEADER, snapshot.metadata.source_health.as_str())
        .header(
            GENERATED_AT_HEADER,
            snapshot
                .metadata
                .generated_at
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        )
        .body(Body::from(json))
        .map_err(|e| ApiError::internal(format!("failed to build response: {}", e)))
}
