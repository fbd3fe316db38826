//! Integration tests for the edge request gate.
//!
//! Drives the full router (gate + client IP + upstream forwarder) with mock
//! collaborators and a fake upstream:
//! - Callback bypass
//! - Authenticated callers on public auth routes
//! - Anonymous callers on protected routes
//! - Organizer gate and its invite carve-out
//! - Session cookie propagation

mod common;

use axum::http::StatusCode;
use common::*;
use server_core::kernel::{test_user, MockSessionProvider, MockUserStore, TestDependencies};
use server_core::server::routes::MAX_BODY_BYTES;
use test_context::test_context;

// ============================================================================
// Scenarios
// ============================================================================

#[test_context(GateHarness)]
#[tokio::test]
async fn test_anonymous_discover_redirects_to_login(ctx: &GateHarness) {
    let deps = TestDependencies::new(MockSessionProvider::anonymous(), MockUserStore::member());
    let app = ctx.router(&deps);

    let response = get(&app, "/discover", None).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/auth/login"));
    assert!(ctx.forwarded().await.is_empty(), "Redirects must not reach upstream");
}

#[test_context(GateHarness)]
#[tokio::test]
async fn test_signed_in_login_redirects_to_discover(ctx: &GateHarness) {
    let deps = TestDependencies::new(
        MockSessionProvider::signed_in(test_user()),
        MockUserStore::member(),
    );
    let app = ctx.router(&deps);

    for path in ["/auth/login", "/auth/signup", "/"] {
        let response = get(&app, path, Some("sb-x-auth-token=abc")).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "{path}");
        assert_eq!(location(&response), Some("/discover"), "{path}");
    }
}

#[test_context(GateHarness)]
#[tokio::test]
async fn test_non_organizer_create_event_redirects_to_discover(ctx: &GateHarness) {
    let user = test_user();
    let deps = TestDependencies::new(
        MockSessionProvider::signed_in(user.clone()),
        MockUserStore::member(),
    );
    let app = ctx.router(&deps);

    let response = get(&app, "/create-event", Some("sb-x-auth-token=abc")).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), Some("/discover"));
    assert_eq!(deps.user_store.lookups(), vec![user.id]);
}

#[test_context(GateHarness)]
#[tokio::test]
async fn test_non_organizer_invite_passes_through(ctx: &GateHarness) {
    let deps = TestDependencies::new(
        MockSessionProvider::signed_in(test_user()),
        MockUserStore::member(),
    );
    let app = ctx.router(&deps);

    let response = get(&app, "/create-event/invite", Some("sb-x-auth-token=abc")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, UPSTREAM_BODY);
    assert!(deps.user_store.lookups().is_empty());

    let forwarded = ctx.forwarded().await;
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].url.path(), "/create-event/invite");
}

#[test_context(GateHarness)]
#[tokio::test]
async fn test_organizer_create_event_passes_through(ctx: &GateHarness) {
    let deps = TestDependencies::new(
        MockSessionProvider::signed_in(test_user()),
        MockUserStore::organizer(),
    );
    let app = ctx.router(&deps);

    let response = get(&app, "/create-event", Some("sb-x-auth-token=abc")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, UPSTREAM_BODY);
}

#[test_context(GateHarness)]
#[tokio::test]
async fn test_callback_passes_through_without_session_call(ctx: &GateHarness) {
    let deps = TestDependencies::new(MockSessionProvider::failing(), MockUserStore::member());
    let app = ctx.router(&deps);

    let response = get(&app, "/auth/callback?code=abc", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(deps.session_provider.call_count(), 0);

    let forwarded = ctx.forwarded().await;
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].url.path(), "/auth/callback");
    assert_eq!(forwarded[0].url.query(), Some("code=abc"));
}

// ============================================================================
// Failure folding
// ============================================================================

#[test_context(GateHarness)]
#[tokio::test]
async fn test_failed_session_counts_as_anonymous(ctx: &GateHarness) {
    let deps = TestDependencies::new(MockSessionProvider::failing(), MockUserStore::organizer());
    let app = ctx.router(&deps);

    let response = get(&app, "/bookmarks", Some("sb-x-auth-token=abc")).await;
    assert_eq!(location(&response), Some("/auth/login"));

    // Public pages still load
    let response = get(&app, "/about", Some("sb-x-auth-token=abc")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[test_context(GateHarness)]
#[tokio::test]
async fn test_failed_organizer_lookup_redirects(ctx: &GateHarness) {
    for store in [MockUserStore::failing(), MockUserStore::missing()] {
        let deps = TestDependencies::new(MockSessionProvider::signed_in(test_user()), store);
        let app = ctx.router(&deps);

        let response = get(&app, "/create-event/new", Some("sb-x-auth-token=abc")).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), Some("/discover"));
    }
}

// ============================================================================
// Request matcher, idempotence, query handling
// ============================================================================

#[test_context(GateHarness)]
#[tokio::test]
async fn test_static_assets_skip_the_gate(ctx: &GateHarness) {
    let deps = TestDependencies::new(MockSessionProvider::failing(), MockUserStore::member());
    let app = ctx.router(&deps);

    for path in ["/_next/static/chunks/app.js", "/favicon.ico", "/discover/banner.png"] {
        let response = get(&app, path, None).await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }
    assert_eq!(deps.session_provider.call_count(), 0);
}

#[test_context(GateHarness)]
#[tokio::test]
async fn test_same_request_same_classification(ctx: &GateHarness) {
    let deps = TestDependencies::new(MockSessionProvider::anonymous(), MockUserStore::member());
    let app = ctx.router(&deps);

    let first = get(&app, "/my-events", None).await;
    let second = get(&app, "/my-events", None).await;

    assert_eq!(first.status(), second.status());
    assert_eq!(location(&first), location(&second));
    assert_eq!(deps.session_provider.call_count(), 2);
}

#[test_context(GateHarness)]
#[tokio::test]
async fn test_redirect_preserves_query_string(ctx: &GateHarness) {
    let deps = TestDependencies::new(MockSessionProvider::anonymous(), MockUserStore::member());
    let app = ctx.router(&deps);

    let response = get(&app, "/discover?city=chennai", None).await;

    assert_eq!(location(&response), Some("/auth/login?city=chennai"));
}

// ============================================================================
// Cookie propagation
// ============================================================================

#[test_context(GateHarness)]
#[tokio::test]
async fn test_refreshed_cookies_on_pass_through(ctx: &GateHarness) {
    let deps = TestDependencies::new(
        MockSessionProvider::signed_in(test_user())
            .with_refreshed_cookie("sb-x-auth-token", "fresh"),
        MockUserStore::member(),
    );
    let app = ctx.router(&deps);

    let response = get(&app, "/discover", Some("theme=dark; sb-x-auth-token=stale")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].starts_with("sb-x-auth-token=fresh"));

    // Upstream renders with the refreshed token, not the stale one
    let forwarded = ctx.forwarded().await;
    let cookie_header = forwarded[0]
        .headers
        .get("cookie")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert_eq!(cookie_header, "theme=dark; sb-x-auth-token=fresh");
}

#[test_context(GateHarness)]
#[tokio::test]
async fn test_refresh_keeps_other_cookies_verbatim(ctx: &GateHarness) {
    let deps = TestDependencies::new(
        MockSessionProvider::signed_in(test_user())
            .with_refreshed_cookie("sb-x-auth-token", "fresh"),
        MockUserStore::member(),
    );
    let app = ctx.router(&deps);

    let response = get(&app, "/discover", Some("consent; ab=x y; sb-x-auth-token=stale")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let forwarded = ctx.forwarded().await;
    assert_eq!(
        forwarded[0].headers.get("cookie").unwrap(),
        "consent; ab=x y; sb-x-auth-token=fresh"
    );
}

#[test_context(GateHarness)]
#[tokio::test]
async fn test_refreshed_cookies_on_redirect(ctx: &GateHarness) {
    let deps = TestDependencies::new(
        MockSessionProvider::signed_in(test_user())
            .with_refreshed_cookie("sb-x-auth-token", "fresh"),
        MockUserStore::member(),
    );
    let app = ctx.router(&deps);

    let response = get(&app, "/auth/login", Some("sb-x-auth-token=stale")).await;

    assert_eq!(location(&response), Some("/discover"));
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].starts_with("sb-x-auth-token=fresh"));
}

// ============================================================================
// Forwarding
// ============================================================================

#[test_context(GateHarness)]
#[tokio::test]
async fn test_forwarded_request_carries_client_ip(ctx: &GateHarness) {
    let deps = TestDependencies::new(MockSessionProvider::anonymous(), MockUserStore::member());
    let app = ctx.router(&deps);

    let request = axum::http::Request::builder()
        .uri("/about")
        .header("x-real-ip", "203.0.113.9")
        .header("host", "speaks.example")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let forwarded = ctx.forwarded().await;
    assert_eq!(
        forwarded[0].headers.get("x-forwarded-for").unwrap(),
        "203.0.113.9"
    );
    assert_eq!(
        forwarded[0].headers.get("x-forwarded-host").unwrap(),
        "speaks.example"
    );
}

#[test_context(GateHarness)]
#[tokio::test]
async fn test_peer_appended_to_forwarded_chain(ctx: &GateHarness) {
    let deps = TestDependencies::new(MockSessionProvider::anonymous(), MockUserStore::member());
    let app = ctx.router(&deps);

    let mut request = axum::http::Request::builder()
        .uri("/about")
        .header("x-forwarded-for", "203.0.113.1")
        .body(axum::body::Body::empty())
        .unwrap();
    let peer: std::net::SocketAddr = "10.0.0.5:4444".parse().unwrap();
    request.extensions_mut().insert(axum::extract::ConnectInfo(peer));
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let forwarded = ctx.forwarded().await;
    assert_eq!(
        forwarded[0].headers.get("x-forwarded-for").unwrap(),
        "203.0.113.1, 10.0.0.5"
    );
}

#[test_context(GateHarness)]
#[tokio::test]
async fn test_oversized_body_is_payload_too_large(ctx: &GateHarness) {
    let deps = TestDependencies::new(MockSessionProvider::anonymous(), MockUserStore::member());
    let app = ctx.router(&deps);

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/about")
        .body(axum::body::Body::from(vec![0u8; MAX_BODY_BYTES + 1]))
        .unwrap();
    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(ctx.forwarded().await.is_empty());
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let deps = TestDependencies::new(MockSessionProvider::anonymous(), MockUserStore::member());
    // Nothing listens on the discard port
    let app = router_for(&deps, "http://127.0.0.1:9");

    let response = get(&app, "/about", None).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[test_context(GateHarness)]
#[tokio::test]
async fn test_health_reports_upstream(ctx: &GateHarness) {
    let deps = TestDependencies::new(MockSessionProvider::anonymous(), MockUserStore::member());
    let app = ctx.router(&deps);

    let response = get(&app, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["upstream"]["status"], "ok");
}
