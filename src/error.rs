// Error handling module
// Defines the error taxonomy surfaced by prediction sessions

use thiserror::Error;

/// Errors that can occur while generating predictions
#[derive(Error, Debug)]
pub enum PredictorError {
    /// No API key configured; raised before any session starts
    #[error("API key is not configured (use -k or set OPENROUTER_API_KEY)")]
    MissingCredential,

    /// Network or body read failure while talking to the completion service
    #[error("Transport error ({kind}): {message}")]
    Transport { kind: &'static str, message: String },

    /// Non-success HTTP status from the completion service
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The service did not send a single byte in time
    #[error("First token timeout: no response within {0}s")]
    FirstTokenTimeout(u64),

    /// Single-shot response did not carry the expected content
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Request validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Decoder operation called in the wrong lifecycle state
    #[error("Invalid decoder state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PredictorError {
    /// True for failures that happened while reading from the service
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            PredictorError::Transport { .. }
                | PredictorError::Api { .. }
                | PredictorError::FirstTokenTimeout(_)
        )
    }
}

impl From<reqwest::Error> for PredictorError {
    fn from(e: reqwest::Error) -> Self {
        // Categorize the error for better debugging
        let kind = if e.is_timeout() {
            "timeout"
        } else if e.is_connect() {
            "connection_failed"
        } else if e.is_request() {
            "request_error"
        } else if e.is_body() {
            "body_error"
        } else if e.is_decode() {
            "decode_error"
        } else {
            "unknown"
        };

        PredictorError::Transport {
            kind,
            message: e.to_string(),
        }
    }
}

/// Result type alias for predictor operations
pub type Result<T> = std::result::Result<T, PredictorError>;
