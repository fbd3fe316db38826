//! Route classification table and the ordered guard chain evaluated against it.

use crate::common::auth::AuthError;

/// Where a redirect sends the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    Login,
    Landing,
}

/// Final outcome of the gate for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    PassThrough,
    Redirect(RedirectTarget),
}

/// Guards in the order they are evaluated. The first one that matches decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    CallbackBypass,
    AuthenticatedOnPublicRoute,
    UnauthenticatedOnProtectedRoute,
    OrganizerGate,
}

impl Guard {
    pub const PRIORITY: [Guard; 4] = [
        Guard::CallbackBypass,
        Guard::AuthenticatedOnPublicRoute,
        Guard::UnauthenticatedOnProtectedRoute,
        Guard::OrganizerGate,
    ];
}

/// What the guard chain concluded without consulting the user store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Redirect(RedirectTarget),
    /// Organizer-gated path with a session: the organizer flag decides.
    CheckOrganizer,
}

/// Static classification of paths. Built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct RouteTable {
    pub callback_path: String,
    pub root_path: String,
    /// Exact paths authenticated users must not see (login, signup).
    pub public_auth_paths: Vec<String>,
    /// Prefixes that require a session.
    pub protected_prefixes: Vec<String>,
    /// Prefix that requires a session and the organizer flag.
    pub organizer_prefix: String,
    /// Sub-path under the organizer prefix left open for invite-code redemption.
    pub organizer_carve_out: String,
    pub login_path: String,
    pub landing_path: String,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            callback_path: "/auth/callback".to_string(),
            root_path: "/".to_string(),
            public_auth_paths: vec!["/auth/login".to_string(), "/auth/signup".to_string()],
            protected_prefixes: [
                "/discover",
                "/create-event",
                "/profile",
                "/my-events",
                "/settings",
                "/contact",
                "/bookmarks",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            organizer_prefix: "/create-event".to_string(),
            organizer_carve_out: "/create-event/invite".to_string(),
            login_path: "/auth/login".to_string(),
            landing_path: "/discover".to_string(),
        }
    }
}

/// Drop one trailing `/` so `/create-event/invite/` classifies like `/create-event/invite`.
/// The root path is left alone.
pub fn normalize_path(path: &str) -> &str {
    match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    }
}

impl RouteTable {
    pub fn is_callback(&self, path: &str) -> bool {
        path == self.callback_path
    }

    pub fn is_public_auth_or_root(&self, path: &str) -> bool {
        path == self.root_path || self.public_auth_paths.iter().any(|p| p == path)
    }

    /// Plain string-prefix match: `/discover-more` counts as under `/discover`.
    pub fn is_protected(&self, path: &str) -> bool {
        self.protected_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn is_organizer_gated(&self, path: &str) -> bool {
        path.starts_with(self.organizer_prefix.as_str()) && path != self.organizer_carve_out
    }

    /// Whether the path needs a session resolved at all.
    pub fn requires_session(&self, path: &str) -> bool {
        !self.is_callback(normalize_path(path))
    }

    /// Whether a single guard fires for this path and session state.
    pub fn guard_matches(&self, guard: Guard, path: &str, authenticated: bool) -> bool {
        match guard {
            Guard::CallbackBypass => self.is_callback(path),
            Guard::AuthenticatedOnPublicRoute => {
                authenticated && self.is_public_auth_or_root(path)
            }
            Guard::UnauthenticatedOnProtectedRoute => !authenticated && self.is_protected(path),
            Guard::OrganizerGate => authenticated && self.is_organizer_gated(path),
        }
    }

    /// First guard that fires, in priority order.
    pub fn matching_guard(&self, path: &str, authenticated: bool) -> Option<Guard> {
        let path = normalize_path(path);
        Guard::PRIORITY
            .into_iter()
            .find(|guard| self.guard_matches(*guard, path, authenticated))
    }

    pub fn verdict(&self, path: &str, authenticated: bool) -> Verdict {
        match self.matching_guard(path, authenticated) {
            Some(Guard::CallbackBypass) | None => Verdict::Pass,
            Some(Guard::AuthenticatedOnPublicRoute) => Verdict::Redirect(RedirectTarget::Landing),
            Some(Guard::UnauthenticatedOnProtectedRoute) => {
                Verdict::Redirect(RedirectTarget::Login)
            }
            Some(Guard::OrganizerGate) => Verdict::CheckOrganizer,
        }
    }

    pub fn target_path(&self, target: RedirectTarget) -> &str {
        match target {
            RedirectTarget::Login => &self.login_path,
            RedirectTarget::Landing => &self.landing_path,
        }
    }
}

/// Fold an organizer lookup into a decision. A failed lookup counts as "not an organizer".
pub fn organizer_decision(flag: &Result<bool, AuthError>) -> GateDecision {
    match flag {
        Ok(true) => GateDecision::PassThrough,
        Ok(false) | Err(_) => GateDecision::Redirect(RedirectTarget::Landing),
    }
}
