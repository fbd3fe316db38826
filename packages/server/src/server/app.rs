//! Application setup and server configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{extract::Extension, http::StatusCode, middleware, routing::get, Router};
use supabase::{SupabaseClient, SupabaseOptions};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::domains::auth::SessionCookieCodec;
use crate::domains::routing::RouteTable;
use crate::kernel::GateDeps;
use crate::server::middleware::{extract_client_ip, route_gate_middleware, RouteGate};
use crate::server::routes::{health_handler, proxy_handler, UpstreamClient};

/// Shared application state
#[derive(Clone)]
pub struct AxumAppState {
    pub upstream: Arc<UpstreamClient>,
}

/// Build the gate and its Supabase collaborators from configuration.
pub fn build_gate(config: &Config) -> Result<RouteGate> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.collaborator_timeout_secs))
        .build()
        .context("Failed to build Supabase HTTP client")?;
    let supabase = SupabaseClient::with_http_client(
        http,
        SupabaseOptions {
            url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        },
    );

    let project_ref = supabase
        .project_ref()
        .context("SUPABASE_URL must be an absolute URL with a host")?;
    let codec = SessionCookieCodec::new(&project_ref, config.cookie_secure);
    tracing::info!(cookie = codec.cookie_name(), "Session cookie configured");

    // Route table is fixed at deploy time
    let table = Arc::new(RouteTable::default());

    Ok(RouteGate::new(table, GateDeps::supabase(supabase, codec))
        .with_collaborator_timeout(Duration::from_secs(config.collaborator_timeout_secs)))
}

/// Build the Axum application router from configuration.
pub fn build_app(config: &Config) -> Result<Router> {
    let gate = Arc::new(build_gate(config)?);
    let upstream = Arc::new(UpstreamClient::new(&config.upstream_url)?);

    Ok(build_router(
        gate,
        AxumAppState { upstream },
        Duration::from_secs(config.request_timeout_secs),
    ))
}

/// Assemble the router around an already-built gate (tests inject mock collaborators here).
pub fn build_router(
    gate: Arc<RouteGate>,
    state: AxumAppState,
    request_timeout: Duration,
) -> Router {
    Router::new()
        // Health check, answered by the gateway itself
        .route("/health", get(health_handler))
        // Everything else is the web application's
        .fallback(proxy_handler)
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(move |req, next| {
            route_gate_middleware(gate.clone(), req, next)
        })) // Route gate
        .layer(middleware::from_fn(extract_client_ip))
        .layer(Extension(state)) // Add shared state (must be after middlewares that need it)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
}
