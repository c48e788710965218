//! Error types for npm operations.

use thiserror::Error;

use crate::source::SourceError;

/// Errors that can occur when talking to the npm website or downloads API.
#[derive(Debug, Error)]
pub enum NpmError {
    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The organization scope does not exist.
    #[error("npm org {0} not found")]
    OrgNotFound(String),

    /// The scope exists but belongs to a user.
    #[error("{0} is a user, not an org")]
    ScopeIsUser(String),

    /// The response was valid JSON of the wrong shape.
    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Whether an error is npm throttling the caller.
pub fn is_rate_limit_error(err: &NpmError) -> bool {
    matches!(err, NpmError::Api { status: 429, .. })
}

impl From<NpmError> for SourceError {
    fn from(err: NpmError) -> Self {
        match err {
            NpmError::Http(message) => SourceError::Network { message },
            NpmError::Json(e) => SourceError::Malformed {
                message: format!("JSON parse error: {e}"),
            },
            NpmError::Api { status: 429, .. } => SourceError::RateLimited { retry_after: None },
            NpmError::Api { status, message } => SourceError::Api { status, message },
            NpmError::OrgNotFound(org) => SourceError::NotFound {
                resource: format!("npm org {org}"),
            },
            NpmError::ScopeIsUser(scope) => SourceError::ScopeIsUser { scope },
            NpmError::Malformed(message) => SourceError::Malformed { message },
            NpmError::Url(e) => SourceError::Malformed {
                message: e.to_string(),
            },
        }
    }
}

/// Get a short error message suitable for display.
pub fn short_error_message(err: &NpmError) -> String {
    match err {
        NpmError::Http(_) => "Network error".to_string(),
        NpmError::Json(_) => "JSON parse error".to_string(),
        NpmError::Api { status, .. } => format!("HTTP {status}"),
        NpmError::OrgNotFound(org) => format!("Org not found: {org}"),
        NpmError::ScopeIsUser(scope) => format!("User scope: {scope}"),
        NpmError::Malformed(_) => "Malformed response".to_string(),
        NpmError::Url(_) => "Invalid URL".to_string(),
    }
}
