// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no gating logic.
// The gate (server::middleware::route_gate) decides; these only fetch facts.
//
// Naming convention: Base* for trait names (e.g., BaseSessionProvider, BaseUserStore)

use async_trait::async_trait;
use cookie::Cookie;

use crate::common::auth::{AuthError, SessionResolution, SessionUser};

// =============================================================================
// Session Provider Trait (Infrastructure - external auth provider)
// =============================================================================

#[async_trait]
pub trait BaseSessionProvider: Send + Sync {
    /// Resolve the caller's identity from request cookies.
    ///
    /// Called at most once per request. Any cookies in the resolution must be
    /// written to the response even if the request is redirected.
    async fn resolve(&self, cookies: &[Cookie<'static>]) -> Result<SessionResolution, AuthError>;
}

// =============================================================================
// User Store Trait (Infrastructure - external user records)
// =============================================================================

#[async_trait]
pub trait BaseUserStore: Send + Sync {
    /// Organizer flag from the user's record.
    async fn is_organizer(&self, user: &SessionUser) -> Result<bool, AuthError>;
}
