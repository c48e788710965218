use std::time::Duration;

use thiserror::Error;

/// Errors raised by page sources, independent of the upstream.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The upstream answered with an unexpected status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("Rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// Owner or organization does not exist upstream.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// The registry scope belongs to a user, not an organization.
    #[error("{scope} is a user, not an org")]
    ScopeIsUser { scope: String },

    /// The response did not have the expected shape.
    #[error("Malformed response: {message}")]
    Malformed { message: String },

    /// Network or connection error.
    #[error("Network error: {message}")]
    Network { message: String },
}

impl SourceError {
    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Whether retrying the same request can never succeed.
    ///
    /// Missing owners, user scopes, malformed bodies and client errors other
    /// than timeouts and throttling are configuration problems upstream.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::NotFound { .. } | Self::ScopeIsUser { .. } | Self::Malformed { .. } => true,
            Self::Api { status, .. } => {
                (400..500).contains(status) && !matches!(status, 408 | 429)
            }
            Self::RateLimited { .. } | Self::Network { .. } => false,
        }
    }
}

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which keeps multi-line upstream
/// bodies out of progress output.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for page source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
