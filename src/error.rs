//! Error types for identity-provider calls.
//!
//! Errors are classified by their effect on a run:
//! - QuotaExhausted: fatal for the rest of the run, trips the credit breaker
//! - Retryable: network issues, timeouts, rate limits, bad responses; the
//!   record stays unstamped and is picked up again next run
//! - RequiresUserAction: missing credentials

use thiserror::Error;

/// Errors from identity-provider operations.
///
/// "No data for this email/domain" is not an error; providers report it as
/// [`crate::provider::Lookup::NotFound`].
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider credits exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider request timed out")]
    Timeout,

    #[error("Provider rate limit exceeded")]
    RateLimited,

    #[error("Unexpected provider status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("No API key configured for the identity provider")]
    NoApiKey,
}

impl ProviderError {
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, ProviderError::QuotaExhausted(_))
    }

    /// Returns true if the same lookup may succeed on a later run.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Network(_)
                | ProviderError::Timeout
                | ProviderError::RateLimited
                | ProviderError::UnexpectedStatus { .. }
                | ProviderError::MalformedResponse(_)
        )
    }

    /// Returns true if an operator has to act before runs can make progress.
    pub fn requires_user_action(&self) -> bool {
        matches!(self, ProviderError::QuotaExhausted(_) | ProviderError::NoApiKey)
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ProviderError::QuotaExhausted(_) => {
                "Top up provider credits; unfinished records are retried on the next run"
            }
            ProviderError::NoApiKey => "Set apollo.apiKey in config.json or APOLLO_API_KEY",
            ProviderError::RateLimited => "Increase enrichment.throttleMs",
            _ => "The record will be retried on the next run",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_decode() {
            ProviderError::MalformedResponse(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_is_not_retryable() {
        let err = ProviderError::QuotaExhausted("insufficient credits".to_string());
        assert!(err.is_quota_exhausted());
        assert!(!err.is_retryable());
        assert!(err.requires_user_action());
    }

    #[test]
    fn test_transient_errors_are_retryable() {
        for err in [
            ProviderError::Network("reset".to_string()),
            ProviderError::Timeout,
            ProviderError::RateLimited,
            ProviderError::UnexpectedStatus { status: 503, message: "down".to_string() },
            ProviderError::MalformedResponse("eof".to_string()),
        ] {
            assert!(err.is_retryable(), "{} should be retryable", err);
            assert!(!err.is_quota_exhausted());
        }
    }

    #[test]
    fn test_no_api_key_requires_user_action() {
        let err = ProviderError::NoApiKey;
        assert!(!err.is_retryable());
        assert!(err.requires_user_action());
        assert!(err.recovery_suggestion().contains("APOLLO_API_KEY"));
    }
}
