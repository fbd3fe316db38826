// Session cookie storage compatible with the auth provider's server-side helpers.
//
// The session is JSON, optionally `base64-` prefixed (base64url, no padding), stored
// either under `sb-<ref>-auth-token` or split into `sb-<ref>-auth-token.0`, `.1`, ...

use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use cookie::time::Duration;
use cookie::{Cookie, SameSite};
use supabase::AuthSession;
use tracing::debug;

/// Largest value written into a single cookie before splitting.
pub const MAX_CHUNK_SIZE: usize = 3180;

pub const BASE64_PREFIX: &str = "base64-";

/// Matches the provider's default cookie lifetime.
pub const COOKIE_MAX_AGE_DAYS: i64 = 400;

/// Reads and writes the session cookie for one project.
#[derive(Debug, Clone)]
pub struct SessionCookieCodec {
    name: String,
    secure: bool,
}

impl SessionCookieCodec {
    pub fn new(project_ref: &str, secure: bool) -> Self {
        Self {
            name: format!("sb-{}-auth-token", project_ref),
            secure,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.name
    }

    fn is_session_cookie(&self, name: &str) -> bool {
        name == self.name
            || name
                .strip_prefix(self.name.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .is_some_and(|index| index.parse::<usize>().is_ok())
    }

    /// Combined raw value: the unchunked cookie if present, otherwise chunks `.0..n`
    /// concatenated until the first gap.
    pub fn read(&self, cookies: &[Cookie<'_>]) -> Option<String> {
        let find = |name: &str| cookies.iter().find(|c| c.name() == name);

        if let Some(whole) = find(&self.name) {
            return Some(whole.value().to_string());
        }

        let mut combined = String::new();
        let mut index = 0;
        while let Some(chunk) = find(&format!("{}.{}", self.name, index)) {
            combined.push_str(chunk.value());
            index += 1;
        }

        (index > 0).then_some(combined)
    }

    /// Decode the stored session. Absent or corrupt cookies decode to `None`.
    pub fn decode(&self, cookies: &[Cookie<'_>]) -> Option<AuthSession> {
        let raw = self.read(cookies)?;

        let json = match raw.strip_prefix(BASE64_PREFIX) {
            Some(encoded) => {
                let bytes = URL_SAFE_NO_PAD
                    .decode(encoded.trim_end_matches('='))
                    .map_err(|e| debug!(error = %e, "Session cookie is not valid base64"))
                    .ok()?;
                String::from_utf8(bytes)
                    .map_err(|e| debug!(error = %e, "Session cookie is not UTF-8"))
                    .ok()?
            }
            None => raw,
        };

        serde_json::from_str(&json)
            .map_err(|e| debug!(error = %e, "Session cookie is not a session"))
            .ok()
    }

    /// `Set-Cookie`s that store `session`, plus removals for whatever layout the
    /// request carried that the new layout does not overwrite.
    pub fn encode(
        &self,
        session: &AuthSession,
        existing: &[Cookie<'_>],
    ) -> Result<Vec<Cookie<'static>>, serde_json::Error> {
        let json = serde_json::to_string(session)?;
        let value = format!("{}{}", BASE64_PREFIX, URL_SAFE_NO_PAD.encode(json));

        let mut cookies: Vec<Cookie<'static>> = if value.len() <= MAX_CHUNK_SIZE {
            vec![self.build(self.name.clone(), value)]
        } else {
            // base64url output is ASCII, so byte offsets are char boundaries
            value
                .as_bytes()
                .chunks(MAX_CHUNK_SIZE)
                .enumerate()
                .map(|(index, chunk)| {
                    let chunk = String::from_utf8_lossy(chunk).into_owned();
                    self.build(format!("{}.{}", self.name, index), chunk)
                })
                .collect()
        };

        let stale: Vec<Cookie<'static>> = existing
            .iter()
            .filter(|c| self.is_session_cookie(c.name()))
            .filter(|c| !cookies.iter().any(|n| n.name() == c.name()))
            .map(|c| self.removal(c.name().to_string()))
            .collect();
        cookies.extend(stale);

        Ok(cookies)
    }

    /// Removals for every session cookie the request carried.
    pub fn clear(&self, existing: &[Cookie<'_>]) -> Vec<Cookie<'static>> {
        existing
            .iter()
            .filter(|c| self.is_session_cookie(c.name()))
            .map(|c| self.removal(c.name().to_string()))
            .collect()
    }

    fn build(&self, name: String, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .same_site(SameSite::Lax)
            .max_age(Duration::days(COOKIE_MAX_AGE_DAYS))
            .secure(self.secure)
            .http_only(false)
            .build()
    }

    fn removal(&self, name: String) -> Cookie<'static> {
        let mut cookie = self.build(name, String::new());
        cookie.make_removal();
        cookie
    }
}

/// All cookies the request carries, across every `Cookie` header.
pub fn request_cookies(headers: &HeaderMap) -> Vec<Cookie<'static>> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| {
            Cookie::split_parse_encoded(value.to_string())
                .filter_map(|parsed| parsed.ok())
                .map(Cookie::into_owned)
                .collect::<Vec<_>>()
        })
        .collect()
}

pub fn is_removal(cookie: &Cookie<'_>) -> bool {
    cookie.max_age() == Some(Duration::ZERO)
}

/// `Cookie` header value for the forwarded request.
///
/// The original `name=value` segments are kept verbatim, across every `Cookie`
/// header, unless `updates` names them. Non-removal updates are appended.
pub fn merged_cookie_header(headers: &HeaderMap, updates: &[Cookie<'_>]) -> String {
    let replaced = |name: &str| updates.iter().any(|u| u.name() == name);

    let kept = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .filter(|segment| {
            let name = segment.split_once('=').map_or(*segment, |(name, _)| name);
            !replaced(name.trim())
        })
        .map(str::to_string);
    let added = updates
        .iter()
        .filter(|u| !is_removal(u))
        .map(|u| u.stripped().encoded().to_string());

    kept.chain(added).collect::<Vec<_>>().join("; ")
}
