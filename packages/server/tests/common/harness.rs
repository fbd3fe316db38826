//! Test harness for driving the gateway router end to end.
//!
//! Each test gets a fresh wiremock server standing in for the upstream web
//! application; collaborators are injected per test through `TestDependencies`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
    Router,
};
use server_core::domains::routing::RouteTable;
use server_core::kernel::TestDependencies;
use server_core::server::middleware::RouteGate;
use server_core::server::routes::UpstreamClient;
use server_core::server::{build_router, AxumAppState};
use test_context::AsyncTestContext;
use tower::ServiceExt;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Body the fake upstream answers every request with.
pub const UPSTREAM_BODY: &str = "upstream page";

/// Test harness that manages the fake upstream.
///
/// # Example using test-context
///
/// ```ignore
/// use test_context::test_context;
///
/// #[test_context(GateHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &GateHarness) {
///     let app = ctx.router(&deps);
///     // ... test code
/// }
/// ```
pub struct GateHarness {
    pub upstream: MockServer,
}

impl AsyncTestContext for GateHarness {
    async fn setup() -> Self {
        Self::new().await
    }
}

impl GateHarness {
    pub async fn new() -> Self {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let upstream = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_string(UPSTREAM_BODY))
            .mount(&upstream)
            .await;

        Self { upstream }
    }

    /// Router wired to the fake upstream with the given collaborators.
    pub fn router(&self, deps: &TestDependencies) -> Router {
        router_for(deps, &self.upstream.uri())
    }

    /// Requests that made it through the gate to the upstream.
    pub async fn forwarded(&self) -> Vec<wiremock::Request> {
        self.upstream.received_requests().await.unwrap_or_default()
    }
}

pub fn router_for(deps: &TestDependencies, upstream_url: &str) -> Router {
    let gate = Arc::new(RouteGate::new(
        Arc::new(RouteTable::default()),
        deps.gate_deps(),
    ));
    let upstream = Arc::new(UpstreamClient::new(upstream_url).expect("upstream client"));

    build_router(gate, AxumAppState { upstream }, Duration::from_secs(5))
}

/// Send a GET through the router, optionally with a `Cookie` header.
pub async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response {
    let mut request = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }

    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect()
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
