// TestDependencies - mock implementations for testing
//
// Provides mock collaborators that can be injected into GateDeps for tests.

use async_trait::async_trait;
use cookie::Cookie;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use super::{BaseSessionProvider, BaseUserStore, GateDeps};
use crate::common::auth::{AuthError, SessionResolution, SessionUser};

// =============================================================================
// Mock Session Provider
// =============================================================================

#[derive(Clone)]
enum SessionBehavior {
    Anonymous,
    User(SessionUser),
    Fail,
}

pub struct MockSessionProvider {
    behavior: SessionBehavior,
    refreshed: Vec<Cookie<'static>>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockSessionProvider {
    /// No session: every request resolves anonymous.
    pub fn anonymous() -> Self {
        Self::with_behavior(SessionBehavior::Anonymous)
    }

    /// Every request resolves to `user`.
    pub fn signed_in(user: SessionUser) -> Self {
        Self::with_behavior(SessionBehavior::User(user))
    }

    /// Every request fails to resolve.
    pub fn failing() -> Self {
        Self::with_behavior(SessionBehavior::Fail)
    }

    fn with_behavior(behavior: SessionBehavior) -> Self {
        Self {
            behavior,
            refreshed: Vec::new(),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Cookies to hand back as if the token pair had been refreshed.
    pub fn with_refreshed_cookie(mut self, name: &str, value: &str) -> Self {
        self.refreshed
            .push(Cookie::build((name.to_string(), value.to_string())).path("/").build());
        self
    }

    /// Sleep before answering (for timeout tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Cookie names seen by each call.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl BaseSessionProvider for MockSessionProvider {
    async fn resolve(&self, cookies: &[Cookie<'static>]) -> Result<SessionResolution, AuthError> {
        self.calls
            .lock()
            .unwrap()
            .push(cookies.iter().map(|c| c.name().to_string()).collect());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behavior {
            SessionBehavior::Anonymous => Ok(SessionResolution {
                user: None,
                cookies: self.refreshed.clone(),
            }),
            SessionBehavior::User(user) => Ok(SessionResolution {
                user: Some(user.clone()),
                cookies: self.refreshed.clone(),
            }),
            SessionBehavior::Fail => Err(AuthError::SessionResolution(
                "mock provider unavailable".to_string(),
            )),
        }
    }
}

// =============================================================================
// Mock User Store
// =============================================================================

#[derive(Clone, Copy)]
enum OrganizerBehavior {
    Flag(bool),
    Missing,
    Fail,
}

pub struct MockUserStore {
    behavior: OrganizerBehavior,
    delay: Option<Duration>,
    lookups: Arc<Mutex<Vec<Uuid>>>,
}

impl MockUserStore {
    pub fn organizer() -> Self {
        Self::with_behavior(OrganizerBehavior::Flag(true))
    }

    pub fn member() -> Self {
        Self::with_behavior(OrganizerBehavior::Flag(false))
    }

    /// The user has no record.
    pub fn missing() -> Self {
        Self::with_behavior(OrganizerBehavior::Missing)
    }

    pub fn failing() -> Self {
        Self::with_behavior(OrganizerBehavior::Fail)
    }

    fn with_behavior(behavior: OrganizerBehavior) -> Self {
        Self {
            behavior,
            delay: None,
            lookups: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// User ids looked up so far.
    pub fn lookups(&self) -> Vec<Uuid> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseUserStore for MockUserStore {
    async fn is_organizer(&self, user: &SessionUser) -> Result<bool, AuthError> {
        self.lookups.lock().unwrap().push(user.id);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.behavior {
            OrganizerBehavior::Flag(flag) => Ok(flag),
            OrganizerBehavior::Missing => Err(AuthError::RecordNotFound),
            OrganizerBehavior::Fail => Err(AuthError::OrganizerLookup(
                "mock store unavailable".to_string(),
            )),
        }
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Mock collaborators plus handles to inspect them after the request.
pub struct TestDependencies {
    pub session_provider: Arc<MockSessionProvider>,
    pub user_store: Arc<MockUserStore>,
}

impl TestDependencies {
    pub fn new(session_provider: MockSessionProvider, user_store: MockUserStore) -> Self {
        Self {
            session_provider: Arc::new(session_provider),
            user_store: Arc::new(user_store),
        }
    }

    pub fn gate_deps(&self) -> GateDeps {
        GateDeps::new(self.session_provider.clone(), self.user_store.clone())
    }
}

/// A signed-in user with a random id.
pub fn test_user() -> SessionUser {
    SessionUser {
        id: Uuid::new_v4(),
        email: Some("delegate@example.com".to_string()),
        access_token: "test-access-token".to_string(),
    }
}
