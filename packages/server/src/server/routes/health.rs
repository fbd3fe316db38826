use std::time::Duration;

use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;

use crate::server::app::AxumAppState;

const UPSTREAM_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    upstream: UpstreamHealth,
}

#[derive(Serialize)]
pub struct UpstreamHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Health check endpoint
///
/// Probes the upstream web application. Any non-5xx answer within the timeout
/// counts as healthy.
///
/// Returns 200 OK if healthy, 503 Service Unavailable otherwise.
pub async fn health_handler(
    Extension(state): Extension<AxumAppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let upstream = match state.upstream.probe(UPSTREAM_PROBE_TIMEOUT).await {
        Ok(status) if !status.is_server_error() => UpstreamHealth {
            status: "ok".to_string(),
            http_status: Some(status.as_u16()),
            error: None,
        },
        Ok(status) => UpstreamHealth {
            status: "error".to_string(),
            http_status: Some(status.as_u16()),
            error: Some("Upstream returned a server error".to_string()),
        },
        Err(e) => UpstreamHealth {
            status: "error".to_string(),
            http_status: None,
            error: Some(format!("{:#}", e)),
        },
    };

    let is_healthy = upstream.status == "ok";

    let status_code = if is_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if is_healthy { "healthy" } else { "unhealthy" }.to_string(),
            upstream,
        }),
    )
}
