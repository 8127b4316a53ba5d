//! Error types for the query orchestration service

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {
    /// User has spent their daily token budget. Checked before any paid
    /// model call is issued.
    #[error("daily token budget exceeded: {used} of {budget} tokens used")]
    QuotaExceeded { used: u64, budget: u64 },

    /// Non-2xx from the model provider after retries are exhausted.
    /// Status and body are preserved for logs, never shown verbatim to users.
    #[error("model API error (status {status}): {detail}")]
    Upstream { status: u16, detail: String },

    /// The provider returned 2xx but the payload was empty or unusable.
    /// Terminal: retrying a malformed-but-successful response will not help.
    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("model request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AdvisorError {
    /// User-facing message for this error. Quota problems get a distinct,
    /// actionable message; upstream detail stays in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            AdvisorError::QuotaExceeded { .. } => {
                "You've reached your daily usage limit. Your limit resets every 24 hours - please try again later."
            }
            AdvisorError::Upstream { .. }
            | AdvisorError::Transport(_)
            | AdvisorError::MalformedResponse(_) => {
                "We couldn't process your question right now. Please try again in a moment."
            }
            AdvisorError::Config(_) | AdvisorError::Serialization(_) => {
                "Something went wrong on our side. Please try again in a moment."
            }
        }
    }

    /// Whether a retry of the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AdvisorError::Transport(_) => true,
            AdvisorError::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_message_is_distinct() {
        let quota = AdvisorError::QuotaExceeded {
            used: 1_000_000,
            budget: 1_000_000,
        };
        let upstream = AdvisorError::Upstream {
            status: 503,
            detail: "overloaded".to_string(),
        };

        assert_ne!(quota.user_message(), upstream.user_message());
        assert!(quota.user_message().contains("limit"));
    }

    #[test]
    fn test_upstream_detail_not_leaked_to_users() {
        let err = AdvisorError::Upstream {
            status: 500,
            detail: "internal stack trace xyz".to_string(),
        };
        assert!(!err.user_message().contains("stack trace"));
        // Detail is still available for logging via Display
        assert!(err.to_string().contains("stack trace"));
    }

    #[test]
    fn test_retryability() {
        assert!(AdvisorError::Upstream {
            status: 502,
            detail: String::new()
        }
        .is_retryable());
        assert!(!AdvisorError::Upstream {
            status: 429,
            detail: String::new()
        }
        .is_retryable());
        assert!(!AdvisorError::MalformedResponse("empty".to_string()).is_retryable());
    }
}
