//! Error types for GitHub operations.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::source::SourceError;

/// Errors that can occur when talking to GitHub.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Primary or secondary rate limit hit.
    #[error("Rate limit exceeded")]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    /// The user or organization does not exist.
    #[error("Owner not found: {0}")]
    OwnerNotFound(String),
}

impl From<GitHubError> for SourceError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::Http(message) => SourceError::Network { message },
            GitHubError::Json(e) => SourceError::Malformed {
                message: format!("JSON parse error: {e}"),
            },
            GitHubError::Api { status, message } => match status {
                404 => SourceError::NotFound { resource: message },
                429 => SourceError::RateLimited { retry_after: None },
                _ => SourceError::Api { status, message },
            },
            GitHubError::RateLimited { reset_at } => SourceError::RateLimited {
                retry_after: reset_at.and_then(|at| (at - Utc::now()).to_std().ok()),
            },
            GitHubError::OwnerNotFound(owner) => SourceError::NotFound {
                resource: format!("github owner {owner}"),
            },
        }
    }
}

/// Check if an error is a rate limit error.
pub fn is_rate_limit_error(err: &GitHubError) -> bool {
    matches!(
        err,
        GitHubError::RateLimited { .. } | GitHubError::Api { status: 429, .. }
    )
}

/// Get a short error message suitable for display.
pub fn short_error_message(err: &GitHubError) -> String {
    match err {
        GitHubError::Http(_) => "Network error".to_string(),
        GitHubError::Json(_) => "JSON parse error".to_string(),
        GitHubError::Api { status, message } => {
            if message.chars().count() > 50 {
                let truncated: String = message.chars().take(47).collect();
                format!("HTTP {status}: {truncated}...")
            } else {
                format!("HTTP {status}: {message}")
            }
        }
        GitHubError::RateLimited { .. } => "Rate limited".to_string(),
        GitHubError::OwnerNotFound(owner) => format!("Owner not found: {owner}"),
    }
}
