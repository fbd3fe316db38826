use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{ConnectInfo, Extension, Request},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use reqwest::{redirect, Client};
use thiserror::Error;
use tracing::warn;

use crate::server::app::AxumAppState;
use crate::server::middleware::ClientIp;

/// Largest request body forwarded upstream.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

// Connection-scoped headers that must not be forwarded (RFC 9110 section 7.6.1)
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("Request body exceeds the forwarding limit")]
    PayloadTooLarge,

    #[error("Upstream request to {url} failed: {source}")]
    Upstream {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ForwardError {
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ForwardError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Forwards requests that passed the gate to the web application.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(base_url: &str) -> Result<Self> {
        // Redirects are the application's to send, not ours to follow
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .context("Failed to build upstream HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn forward(&self, request: Request) -> Result<Response, ForwardError> {
        let (parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("{}{}", self.base_url, path_and_query);

        let declared_length = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok());
        if declared_length.is_some_and(|len| len > MAX_BODY_BYTES) {
            return Err(ForwardError::PayloadTooLarge);
        }
        // Only the limit fails a body read in practice; a client that hangs up never reads the reply
        let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
            .await
            .map_err(|_| ForwardError::PayloadTooLarge)?;

        let mut headers = without_hop_by_hop(&parts.headers);
        headers.remove(header::HOST);
        if let Some(host) = parts.headers.get(header::HOST) {
            headers.insert(HeaderName::from_static("x-forwarded-host"), host.clone());
        }

        let client = parts.extensions.get::<ClientIp>().map(|ClientIp(ip)| *ip);
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let forwarded_for = HeaderName::from_static("x-forwarded-for");
        if let Some(value) = forwarded_for_value(headers.get(&forwarded_for), client, peer) {
            headers.insert(forwarded_for, value);
        }

        let upstream = self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|source| ForwardError::Upstream {
                url: url.clone(),
                source,
            })?;

        let status = upstream.status();
        let headers = without_hop_by_hop(upstream.headers());
        let bytes = upstream
            .bytes()
            .await
            .map_err(|source| ForwardError::Upstream { url, source })?;

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }

    /// Whether the upstream answers at all within `timeout`.
    pub async fn probe(&self, timeout: Duration) -> Result<StatusCode> {
        let response = self
            .client
            .get(&self.base_url)
            .timeout(timeout)
            .send()
            .await
            .context("Upstream unreachable")?;
        Ok(response.status())
    }
}

/// `X-Forwarded-For` for the upstream request.
///
/// An existing chain gets the connecting peer appended. Without one, the chain
/// starts at the resolved client address, followed by the peer when they differ.
fn forwarded_for_value(
    existing: Option<&HeaderValue>,
    client: Option<IpAddr>,
    peer: Option<IpAddr>,
) -> Option<HeaderValue> {
    let chain = match (existing.and_then(|v| v.to_str().ok()), client, peer) {
        (Some(chain), _, Some(peer)) => format!("{}, {}", chain, peer),
        (Some(_), _, None) => return None,
        (None, Some(client), Some(peer)) if client != peer => format!("{}, {}", client, peer),
        (None, Some(ip), _) | (None, None, Some(ip)) => ip.to_string(),
        (None, None, None) => return None,
    };
    HeaderValue::from_str(&chain).ok()
}

fn without_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = headers.clone();
    for name in HOP_BY_HOP {
        filtered.remove(name);
    }
    filtered
}

/// Fallback handler: everything the gate let through goes to the web application.
pub async fn proxy_handler(
    Extension(state): Extension<AxumAppState>,
    request: Request,
) -> Response {
    match state.upstream.forward(request).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Forwarding failed");
            let status = e.status();
            (status, status.canonical_reason().unwrap_or_default()).into_response()
        }
    }
}
