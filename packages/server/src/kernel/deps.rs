//! Concrete collaborators backed by Supabase, and the bundle the gate is built from.

use std::sync::Arc;

use async_trait::async_trait;
use cookie::Cookie;
use serde::Deserialize;
use supabase::{AuthSession, SupabaseClient, SupabaseError};
use tracing::{debug, warn};

use super::{BaseSessionProvider, BaseUserStore};
use crate::common::auth::{AuthError, SessionResolution, SessionUser};
use crate::domains::auth::SessionCookieCodec;

/// Refresh once the access token is this close to expiry.
pub const EXPIRY_MARGIN_SECS: i64 = 90;

pub const USERS_TABLE: &str = "users";
pub const ORGANIZER_COLUMN: &str = "is_organizer";

// =============================================================================
// Session provider
// =============================================================================

/// Resolves sessions from the provider's cookie, refreshing the token pair when due.
pub struct SupabaseSessionProvider {
    client: SupabaseClient,
    codec: SessionCookieCodec,
}

impl SupabaseSessionProvider {
    pub fn new(client: SupabaseClient, codec: SessionCookieCodec) -> Self {
        Self { client, codec }
    }
}

fn needs_refresh(session: &AuthSession, now: i64) -> bool {
    session
        .expires_at
        .is_some_and(|expires_at| expires_at - now <= EXPIRY_MARGIN_SECS)
}

#[async_trait]
impl BaseSessionProvider for SupabaseSessionProvider {
    async fn resolve(&self, cookies: &[Cookie<'static>]) -> Result<SessionResolution, AuthError> {
        let Some(stored) = self.codec.decode(cookies) else {
            return Ok(SessionResolution::anonymous());
        };

        let mut set_cookies = Vec::new();
        let session = if needs_refresh(&stored, chrono::Utc::now().timestamp()) {
            match self.client.refresh_session(&stored.refresh_token).await {
                Ok(fresh) => {
                    set_cookies = self
                        .codec
                        .encode(&fresh, cookies)
                        .map_err(|e| AuthError::SessionResolution(e.to_string()))?;
                    fresh
                }
                Err(e) if e.is_client_error() => {
                    // Revoked or already-used refresh token: the session is over
                    debug!(error = %e, "Refresh rejected, clearing session cookies");
                    return Ok(SessionResolution {
                        user: None,
                        cookies: self.codec.clear(cookies),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            stored
        };

        let user = match self.client.get_user(&session.access_token).await {
            Ok(user) => user,
            Err(e) if !set_cookies.is_empty() => {
                // Keep the refreshed pair even though the identity is unknown this time
                warn!(error = %e, "User lookup failed after refresh");
                None
            }
            Err(e) => return Err(e.into()),
        };

        Ok(SessionResolution {
            user: user.map(|u| SessionUser {
                id: u.id,
                email: u.email,
                access_token: session.access_token.clone(),
            }),
            cookies: set_cookies,
        })
    }
}

// =============================================================================
// User store
// =============================================================================

#[derive(Debug, Deserialize)]
struct OrganizerRow {
    is_organizer: Option<bool>,
}

/// Reads the organizer flag from the `users` table as the user themselves.
pub struct SupabaseUserStore {
    client: SupabaseClient,
}

impl SupabaseUserStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BaseUserStore for SupabaseUserStore {
    async fn is_organizer(&self, user: &SessionUser) -> Result<bool, AuthError> {
        let row = self
            .client
            .fetch_single::<OrganizerRow>(
                USERS_TABLE,
                ORGANIZER_COLUMN,
                "id",
                &user.id.to_string(),
                &user.access_token,
            )
            .await
            .map_err(|e| match e {
                SupabaseError::NotFound(_) => AuthError::RecordNotFound,
                other => AuthError::OrganizerLookup(other.to_string()),
            })?;

        Ok(row.is_organizer.unwrap_or(false))
    }
}

// =============================================================================
// GateDeps
// =============================================================================

/// Collaborators the route gate consults (using traits for testability)
#[derive(Clone)]
pub struct GateDeps {
    pub session_provider: Arc<dyn BaseSessionProvider>,
    pub user_store: Arc<dyn BaseUserStore>,
}

impl GateDeps {
    pub fn new(
        session_provider: Arc<dyn BaseSessionProvider>,
        user_store: Arc<dyn BaseUserStore>,
    ) -> Self {
        Self {
            session_provider,
            user_store,
        }
    }

    /// Both collaborators backed by one Supabase project.
    pub fn supabase(client: SupabaseClient, codec: SessionCookieCodec) -> Self {
        Self::new(
            Arc::new(SupabaseSessionProvider::new(client.clone(), codec)),
            Arc::new(SupabaseUserStore::new(client)),
        )
    }
}
