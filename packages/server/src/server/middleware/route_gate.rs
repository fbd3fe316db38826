use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use cookie::Cookie;
use tracing::{debug, warn};

use crate::common::auth::{AuthError, SessionResolution, SessionUser};
use crate::domains::auth::{merged_cookie_header, request_cookies};
use crate::domains::routing::{
    is_static_asset, organizer_decision, GateDecision, RedirectTarget, RouteTable, Verdict,
};
use crate::kernel::GateDeps;

pub const DEFAULT_COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(5);

/// Decision for one request plus the cookies the session provider asked to set.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub decision: GateDecision,
    pub cookies: Vec<Cookie<'static>>,
}

/// Edge request gate: decides pass-through vs. redirect before any page runs.
pub struct RouteGate {
    table: Arc<RouteTable>,
    deps: GateDeps,
    collaborator_timeout: Duration,
}

impl RouteGate {
    pub fn new(table: Arc<RouteTable>, deps: GateDeps) -> Self {
        Self {
            table,
            deps,
            collaborator_timeout: DEFAULT_COLLABORATOR_TIMEOUT,
        }
    }

    pub fn with_collaborator_timeout(mut self, timeout: Duration) -> Self {
        self.collaborator_timeout = timeout;
        self
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Evaluate the guard chain for `path`.
    ///
    /// Resolves the session at most once and never fails: a failed resolution
    /// counts as anonymous, a failed organizer lookup as "not an organizer".
    pub async fn evaluate(&self, path: &str, cookies: &[Cookie<'static>]) -> GateOutcome {
        if !self.table.requires_session(path) {
            return GateOutcome {
                decision: GateDecision::PassThrough,
                cookies: Vec::new(),
            };
        }

        let resolution = self.resolve_session(cookies).await;

        let decision = match self.table.verdict(path, resolution.is_authenticated()) {
            Verdict::Pass => GateDecision::PassThrough,
            Verdict::Redirect(target) => GateDecision::Redirect(target),
            Verdict::CheckOrganizer => match &resolution.user {
                Some(user) => {
                    let flag = self.lookup_organizer(user).await;
                    organizer_decision(&flag)
                }
                None => GateDecision::Redirect(RedirectTarget::Login),
            },
        };

        GateOutcome {
            decision,
            cookies: resolution.cookies,
        }
    }

    async fn resolve_session(&self, cookies: &[Cookie<'static>]) -> SessionResolution {
        let resolved = self
            .bounded(self.deps.session_provider.resolve(cookies))
            .await;

        resolved.unwrap_or_else(|e| {
            warn!(error = %e, "Session resolution failed, treating caller as anonymous");
            SessionResolution::anonymous()
        })
    }

    async fn lookup_organizer(&self, user: &SessionUser) -> Result<bool, AuthError> {
        let flag = self.bounded(self.deps.user_store.is_organizer(user)).await;

        if let Err(e) = &flag {
            warn!(user_id = %user.id, error = %e, "Organizer lookup failed, denying access");
        }
        flag
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, AuthError>>,
    ) -> Result<T, AuthError> {
        let limit = self.collaborator_timeout;
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| Err(AuthError::Timeout(limit.as_millis() as u64)))
    }
}

/// Route gate middleware
///
/// Static assets skip the gate. Everything else is evaluated by [`RouteGate`];
/// refreshed session cookies are written to the response whatever the decision,
/// and also replace the originals on a forwarded request.
pub async fn route_gate_middleware(
    gate: Arc<RouteGate>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if is_static_asset(&path) {
        return next.run(request).await;
    }

    let cookies = request_cookies(request.headers());
    let outcome = gate.evaluate(&path, &cookies).await;

    debug!(
        path = %path,
        decision = ?outcome.decision,
        refreshed_cookies = outcome.cookies.len(),
        "Route gate"
    );

    let mut response = match outcome.decision {
        GateDecision::PassThrough => {
            if !outcome.cookies.is_empty() {
                rewrite_request_cookies(request.headers_mut(), &outcome.cookies);
            }
            next.run(request).await
        }
        GateDecision::Redirect(target) => {
            redirect_to(gate.table().target_path(target), request.uri().query())
        }
    };

    append_set_cookies(response.headers_mut(), &outcome.cookies);
    response
}

/// 307 to `path`, carrying over the original query string.
fn redirect_to(path: &str, query: Option<&str>) -> Response {
    let location = match query {
        Some(query) if !query.is_empty() => format!("{}?{}", path, query),
        _ => path.to_string(),
    };
    Redirect::temporary(&location).into_response()
}

fn rewrite_request_cookies(headers: &mut HeaderMap, updates: &[Cookie<'static>]) {
    let merged = merged_cookie_header(headers, updates);
    headers.remove(header::COOKIE);
    if merged.is_empty() {
        return;
    }

    match HeaderValue::from_str(&merged) {
        Ok(value) => {
            headers.insert(header::COOKIE, value);
        }
        Err(e) => warn!(error = %e, "Merged cookie header is not a valid header value"),
    }
}

fn append_set_cookies(headers: &mut HeaderMap, cookies: &[Cookie<'static>]) {
    for cookie in cookies {
        match HeaderValue::from_str(&cookie.encoded().to_string()) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => warn!(cookie = cookie.name(), error = %e, "Skipping unencodable cookie"),
        }
    }
}
