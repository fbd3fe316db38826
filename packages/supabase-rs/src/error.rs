//! Error types for the Supabase client.

use thiserror::Error;

/// Result type for Supabase client operations.
pub type Result<T> = std::result::Result<T, SupabaseError>;

/// Supabase client errors.
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// API error (non-2xx response)
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Single-row query matched no row
    #[error("Row not found in {0}")]
    NotFound(String),
}

impl SupabaseError {
    /// Whether the auth server rejected the credential itself (as opposed to being unreachable).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SupabaseError::Api { status: 401 | 403, .. })
    }

    /// Any 4xx: the request (e.g. a revoked refresh token) will never succeed as-is.
    pub fn is_client_error(&self) -> bool {
        matches!(self, SupabaseError::Api { status, .. } if (400..500).contains(status))
    }
}
