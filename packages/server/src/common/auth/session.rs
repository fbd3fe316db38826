use cookie::Cookie;
use uuid::Uuid;

/// Identity resolved from the request's session cookie.
#[derive(Clone)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: Option<String>,
    /// Access token the identity was resolved with; row-level security on the
    /// user store runs as this token.
    pub access_token: String,
}

impl std::fmt::Debug for SessionUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionUser")
            .field("id", &self.id)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Result of resolving a session once for a request.
///
/// `cookies` holds any `Set-Cookie`s the provider issued while resolving (a
/// refreshed token pair, stale chunk removals). They must reach the response on
/// every path.
#[derive(Debug, Clone, Default)]
pub struct SessionResolution {
    pub user: Option<SessionUser>,
    pub cookies: Vec<Cookie<'static>>,
}

impl SessionResolution {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}
