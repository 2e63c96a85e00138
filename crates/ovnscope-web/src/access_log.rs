//! Access log middleware.
//!
//! Snapshot requests are logged with the requested node and the source health
//! the handler reported; other API requests get a plain record. Swagger UI
//! asset requests only show up at debug level.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, info};

use crate::handlers::SOURCE_HEALTH_HEADER;

const NODES_PREFIX: &str = "/api/v1/nodes/";
const SNAPSHOT_SUFFIX: &str = "/snapshot";

/// Node name of a `/api/v1/nodes/{node}/snapshot` path.
fn snapshot_node(path: &str) -> Option<&str> {
    path.strip_prefix(NODES_PREFIX)?
        .strip_suffix(SNAPSHOT_SUFFIX)
        .filter(|node| !node.contains('/'))
}

pub(crate) async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "-".to_owned());
    let t0 = Instant::now();

    let response = next.run(req).await;
    let latency_ms = t0.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    if let Some(node) = snapshot_node(&path) {
        let health = response
            .headers()
            .get(SOURCE_HEALTH_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        info!(client, node, status, health, latency_ms, "{method} {path}");
    } else if path.starts_with("/api/") {
        info!(client, status, latency_ms, "{method} {path}");
    } else {
        debug!(client, status, latency_ms, "{method} {path}");
    }
    response
}
