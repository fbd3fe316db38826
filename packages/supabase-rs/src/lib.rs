//! Pure Supabase REST client.
//!
//! Covers the two surfaces the edge gateway talks to: the auth server (GoTrue) for
//! resolving and refreshing sessions, and PostgREST for single-row lookups.
//!
//! # Example
//!
//! ```rust,ignore
//! use supabase::{SupabaseClient, SupabaseOptions};
//!
//! let client = SupabaseClient::new(SupabaseOptions {
//!     url: "https://abc.supabase.co".into(),
//!     anon_key: "anon-key".into(),
//! });
//!
//! let user = client.get_user(&access_token).await?;
//! ```

pub mod error;
pub mod types;

pub use error::{Result, SupabaseError};
pub use types::{AuthSession, AuthUser, RefreshTokenRequest};

use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;

/// PostgREST media type that returns a single object instead of an array.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

#[derive(Debug, Clone)]
pub struct SupabaseOptions {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Clone)]
pub struct SupabaseClient {
    client: Client,
    options: SupabaseOptions,
}

impl SupabaseClient {
    pub fn new(options: SupabaseOptions) -> Self {
        Self::with_http_client(Client::new(), options)
    }

    /// Use a preconfigured reqwest client (timeouts, proxies).
    pub fn with_http_client(client: Client, mut options: SupabaseOptions) -> Self {
        options.url = options.url.trim_end_matches('/').to_string();
        Self { client, options }
    }

    pub fn url(&self) -> &str {
        &self.options.url
    }

    /// Project reference, i.e. the first DNS label of the project URL host.
    ///
    /// `https://abcd.supabase.co` -> `abcd`. Used to name the session cookie.
    pub fn project_ref(&self) -> Option<String> {
        let url = reqwest::Url::parse(&self.options.url).ok()?;
        let host = url.host_str()?;
        host.split('.').next().map(str::to_string)
    }

    /// Resolve the user behind an access token.
    ///
    /// Returns `Ok(None)` when the auth server rejects the token.
    pub async fn get_user(&self, access_token: &str) -> Result<Option<AuthUser>> {
        let url = format!("{}/auth/v1/user", self.options.url);
        let resp = self
            .client
            .get(&url)
            .header("apikey", &self.options.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match check(resp).await {
            Ok(resp) => {
                let user = resp
                    .json::<AuthUser>()
                    .await
                    .map_err(|e| SupabaseError::Decode(e.to_string()))?;
                Ok(Some(user))
            }
            Err(e) if e.is_unauthorized() => {
                tracing::debug!("Auth server rejected access token");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Exchange a refresh token for a new token pair.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession> {
        let url = format!("{}/auth/v1/token", self.options.url);
        let resp = self
            .client
            .post(&url)
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.options.anon_key)
            .json(&RefreshTokenRequest { refresh_token })
            .send()
            .await?;

        let session = check(resp)
            .await?
            .json::<AuthSession>()
            .await
            .map_err(|e| SupabaseError::Decode(e.to_string()))?;

        tracing::debug!(expires_at = ?session.expires_at, "Session refreshed");
        Ok(session)
    }

    /// Fetch exactly one row from `table` where `filter_column = filter_value`.
    ///
    /// The request runs with `bearer` as the caller's JWT so row-level security
    /// applies as that user.
    pub async fn fetch_single<T: DeserializeOwned>(
        &self,
        table: &str,
        columns: &str,
        filter_column: &str,
        filter_value: &str,
        bearer: &str,
    ) -> Result<T> {
        let url = format!("{}/rest/v1/{}", self.options.url, table);
        let filter = format!("eq.{}", filter_value);
        let resp = self
            .client
            .get(&url)
            .query(&[("select", columns), (filter_column, filter.as_str())])
            .header("apikey", &self.options.anon_key)
            .header(header::ACCEPT, SINGLE_OBJECT)
            .bearer_auth(bearer)
            .send()
            .await?;

        // PostgREST answers 406 when the object media type matches zero or many rows
        if resp.status() == StatusCode::NOT_ACCEPTABLE {
            return Err(SupabaseError::NotFound(table.to_string()));
        }

        check(resp)
            .await?
            .json::<T>()
            .await
            .map_err(|e| SupabaseError::Decode(e.to_string()))
    }
}

async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(SupabaseError::Api {
        status: status.as_u16(),
        message: body,
    })
}
