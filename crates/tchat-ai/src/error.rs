//! Error types for tchat-ai

use thiserror::Error;

/// Result type alias using tchat-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the model server
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned a non-success status
    #[error("API error: {message} (status: {status})")]
    Api { status: u16, message: String },

    /// Server reported an error inside the response stream
    #[error("Stream error: {0}")]
    Stream(String),

    /// Stream was aborted
    #[error("Request aborted")]
    Aborted,

    /// Unexpected response format
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an API error from an HTTP status and response body
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Error::Api { status, message } => {
                // Ollama answers 503 while a model is still loading
                *status == 429
                    || (500..600).contains(status)
                    || message.to_lowercase().contains("overloaded")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_rate_limit_status() {
        assert!(Error::api(429, "Too many requests").is_retryable());
    }

    #[test]
    fn test_retryable_server_errors() {
        assert!(Error::api(500, "internal").is_retryable());
        assert!(Error::api(503, "model is loading").is_retryable());
    }

    #[test]
    fn test_retryable_overloaded_message() {
        assert!(Error::api(400, "server overloaded, try later").is_retryable());
    }

    #[test]
    fn test_not_retryable_model_missing() {
        let e = Error::api(404, "model 'llama9' not found");
        assert!(!e.is_retryable());
    }

    #[test]
    fn test_not_retryable_non_api() {
        assert!(!Error::Aborted.is_retryable());
        assert!(!Error::Stream("boom".into()).is_retryable());
        assert!(!Error::ModelNotFound("x".into()).is_retryable());
    }

    #[test]
    fn test_api_display_includes_status() {
        let e = Error::api(404, "not found");
        assert_eq!(e.to_string(), "API error: not found (status: 404)");
    }
}
