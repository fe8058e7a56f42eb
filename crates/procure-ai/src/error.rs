//! Error types for procure-ai

use thiserror::Error;

/// Result type alias using procure-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the LLM provider
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response
    #[error("API error: {message} (type: {error_type})")]
    Api { error_type: String, message: String },

    /// Rate limit exceeded
    #[error("Rate limited: retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Invalid API key
    #[error("Invalid or missing API key")]
    InvalidApiKey,

    /// Server-sent events error
    #[error("SSE error: {0}")]
    Sse(String),
}

impl Error {
    /// Create an API error from type and message
    pub fn api(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Map a non-success HTTP status and its body to an error
    pub fn from_status(status: u16, body: impl Into<String>, retry_after: Option<u64>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => Error::Auth(body),
            429 => Error::RateLimited { retry_after },
            500..=599 => Error::api("server_error", format!("HTTP {}: {}", status, body)),
            _ => Error::api("invalid_request_error", format!("HTTP {}: {}", status, body)),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::RateLimited { .. } | Error::Sse(_) => true,
            Error::Api {
                error_type,
                message,
            } => {
                let et = error_type.to_lowercase();
                let msg = message.to_lowercase();
                et.contains("rate_limit")
                    || et.contains("server_error")
                    || et.contains("overloaded")
                    || msg.contains("rate limit")
                    || msg.contains("overloaded")
                    || msg.contains("too many requests")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_typed_variants() {
        assert!(Error::RateLimited { retry_after: Some(5) }.is_retryable());
        assert!(Error::Sse("connection reset".into()).is_retryable());
    }

    #[test]
    fn test_retryable_api_rate_limit_error_type() {
        let e = Error::api("rate_limit_exceeded", "You have exceeded your quota window");
        assert!(e.is_retryable());
    }

    #[test]
    fn test_retryable_api_server_error() {
        let e = Error::api("server_error", "The server had an error while processing");
        assert!(e.is_retryable());
    }

    #[test]
    fn test_retryable_api_too_many_requests() {
        let e = Error::api("error", "Too many requests");
        assert!(e.is_retryable());
    }

    #[test]
    fn test_not_retryable_api_invalid_request() {
        let e = Error::api("invalid_request_error", "Unknown parameter: 'foo'");
        assert!(!e.is_retryable());
    }

    #[test]
    fn test_not_retryable_non_api() {
        assert!(!Error::InvalidApiKey.is_retryable());
        assert!(!Error::Auth("bad key".into()).is_retryable());
    }

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(Error::from_status(401, "no", None), Error::Auth(_)));
        assert!(matches!(
            Error::from_status(429, "slow down", Some(3)),
            Error::RateLimited { retry_after: Some(3) }
        ));
        assert!(Error::from_status(503, "unavailable", None).is_retryable());
        assert!(!Error::from_status(400, "bad schema", None).is_retryable());
    }
}
